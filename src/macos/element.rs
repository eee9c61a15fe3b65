//! AX element wrapper
//!
//! Owns one retained `AXUIElementRef` and reads its attributes on
//! demand. Every accessor tolerates the element disappearing between
//! calls; a vanished or unreadable attribute is simply `None`.

use core_foundation::base::TCFType;
use core_foundation::string::CFString;
use core_foundation_sys::array::{
    CFArrayGetCount, CFArrayGetTypeID, CFArrayGetValueAtIndex, CFArrayRef,
};
use core_foundation_sys::base::{CFGetTypeID, CFRelease, CFRetain, CFTypeRef};
use core_foundation_sys::string::CFStringRef;

use super::ffi::{self, AXUIElementRef};
use crate::watcher::element::UiElement;

/// A node of a process's accessibility tree
#[derive(Debug)]
pub struct AxElement {
    raw: AXUIElementRef,
}

// Retained CF objects may be queried and released from any thread
unsafe impl Send for AxElement {}

impl AxElement {
    /// Wrap a reference the caller already owns (+1).
    pub(crate) unsafe fn from_retained(raw: AXUIElementRef) -> Self {
        Self { raw }
    }

    /// Wrap a borrowed reference, retaining it for this element.
    pub(crate) unsafe fn from_borrowed(raw: AXUIElementRef) -> Self {
        CFRetain(raw as CFTypeRef);
        Self::from_retained(raw)
    }

    /// Copy an attribute value; the caller owns the returned ref.
    fn copy_attribute(&self, attribute: &str) -> Option<CFTypeRef> {
        let name = CFString::new(attribute);
        let mut value: CFTypeRef = std::ptr::null();
        let err = unsafe {
            ffi::AXUIElementCopyAttributeValue(self.raw, name.as_concrete_TypeRef(), &mut value)
        };
        if err != ffi::kAXErrorSuccess || value.is_null() {
            return None;
        }
        Some(value)
    }

    fn string_attribute(&self, attribute: &str) -> Option<String> {
        let value = self.copy_attribute(attribute)?;
        unsafe {
            if CFGetTypeID(value) == CFString::type_id() {
                let text = CFString::wrap_under_create_rule(value as CFStringRef);
                Some(text.to_string())
            } else {
                CFRelease(value);
                None
            }
        }
    }
}

impl Drop for AxElement {
    fn drop(&mut self) {
        unsafe { CFRelease(self.raw as CFTypeRef) };
    }
}

impl UiElement for AxElement {
    fn title(&self) -> Option<String> {
        self.string_attribute("AXTitle")
    }

    fn value(&self) -> Option<String> {
        self.string_attribute("AXValue")
    }

    fn description(&self) -> Option<String> {
        self.string_attribute("AXDescription")
    }

    fn children(&self) -> Vec<Box<dyn UiElement>> {
        let value = match self.copy_attribute("AXChildren") {
            Some(value) => value,
            None => return Vec::new(),
        };
        unsafe {
            if CFGetTypeID(value) != CFArrayGetTypeID() {
                CFRelease(value);
                return Vec::new();
            }
            let array = value as CFArrayRef;
            let count = CFArrayGetCount(array);
            let mut children: Vec<Box<dyn UiElement>> = Vec::with_capacity(count as usize);
            for index in 0..count {
                let child = CFArrayGetValueAtIndex(array, index) as AXUIElementRef;
                if child.is_null() {
                    continue;
                }
                // The array's reference dies with the array; each child
                // keeps its own retain
                children.push(Box::new(AxElement::from_borrowed(child)));
            }
            CFRelease(value);
            children
        }
    }
}
