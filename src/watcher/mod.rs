//! Notification watching - element trees, matching, and source seams

pub mod element;
pub mod matcher;
pub mod source;

pub use element::{StaticElement, UiElement};
pub use matcher::{find_match, MAX_SCAN_DEPTH};
pub use source::{ForegroundSource, NotificationSource};
