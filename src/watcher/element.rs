//! Typed UI element tree
//!
//! Accessibility trees are read through this trait so the matcher never
//! sees raw OS handles or does speculative casts. An attribute that is
//! absent, non-textual, or failed to read is `None`; traversal treats
//! all three the same way.

use std::fmt;

/// A node in the notification banner's element tree
pub trait UiElement: Send + fmt::Debug {
    /// Title attribute, if present and textual
    fn title(&self) -> Option<String>;

    /// Value attribute, if present and textual
    fn value(&self) -> Option<String>;

    /// Description attribute, if present and textual
    fn description(&self) -> Option<String>;

    /// Child elements; empty when there are none or the read failed
    fn children(&self) -> Vec<Box<dyn UiElement>>;
}

/// In-memory element tree for tests and hardware-free development
#[derive(Debug, Clone, Default)]
pub struct StaticElement {
    title: Option<String>,
    value: Option<String>,
    description: Option<String>,
    children: Vec<StaticElement>,
}

impl StaticElement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_child(mut self, child: StaticElement) -> Self {
        self.children.push(child);
        self
    }

    /// A chain of bare nodes, `levels` long, with `self` at the top and
    /// a titled leaf at the bottom (`levels` of 1 is just the leaf).
    pub fn nested(levels: usize, leaf_title: impl Into<String>) -> Self {
        let mut node = StaticElement::new().with_title(leaf_title);
        for _ in 1..levels {
            node = StaticElement::new().with_child(node);
        }
        node
    }
}

impl UiElement for StaticElement {
    fn title(&self) -> Option<String> {
        self.title.clone()
    }

    fn value(&self) -> Option<String> {
        self.value.clone()
    }

    fn description(&self) -> Option<String> {
        self.description.clone()
    }

    fn children(&self) -> Vec<Box<dyn UiElement>> {
        self.children
            .iter()
            .map(|child| Box::new(child.clone()) as Box<dyn UiElement>)
            .collect()
    }
}
