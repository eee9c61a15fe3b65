//! Accessibility API declarations
//!
//! Hand-declared bindings for the AX observer and element calls this
//! crate needs, plus the process-trust helpers. Raw refs returned by
//! copy/create functions follow the CF create rule and must be
//! released by the caller.

#![allow(non_upper_case_globals)]

use std::os::raw::c_void;

use core_foundation::base::TCFType;
use core_foundation::boolean::CFBoolean;
use core_foundation::dictionary::CFDictionary;
use core_foundation::string::CFString;
use core_foundation_sys::base::CFTypeRef;
use core_foundation_sys::dictionary::CFDictionaryRef;
use core_foundation_sys::runloop::CFRunLoopSourceRef;
use core_foundation_sys::string::CFStringRef;

pub enum __AXUIElement {}
pub type AXUIElementRef = *const __AXUIElement;

pub enum __AXObserver {}
pub type AXObserverRef = *mut __AXObserver;

pub type AXError = i32;
pub const kAXErrorSuccess: AXError = 0;

/// Signature of an AX observer notification callback
pub type AXObserverCallback = extern "C" fn(
    observer: AXObserverRef,
    element: AXUIElementRef,
    notification: CFStringRef,
    refcon: *mut c_void,
);

#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    pub fn AXIsProcessTrusted() -> bool;
    pub fn AXIsProcessTrustedWithOptions(options: CFDictionaryRef) -> bool;

    pub fn AXUIElementCreateApplication(pid: i32) -> AXUIElementRef;
    pub fn AXUIElementCopyAttributeValue(
        element: AXUIElementRef,
        attribute: CFStringRef,
        value: *mut CFTypeRef,
    ) -> AXError;

    pub fn AXObserverCreate(
        application: i32,
        callback: AXObserverCallback,
        out_observer: *mut AXObserverRef,
    ) -> AXError;
    pub fn AXObserverAddNotification(
        observer: AXObserverRef,
        element: AXUIElementRef,
        notification: CFStringRef,
        refcon: *mut c_void,
    ) -> AXError;
    pub fn AXObserverRemoveNotification(
        observer: AXObserverRef,
        element: AXUIElementRef,
        notification: CFStringRef,
    ) -> AXError;
    pub fn AXObserverGetRunLoopSource(observer: AXObserverRef) -> CFRunLoopSourceRef;
}

/// Whether this process is trusted for accessibility access.
pub fn is_trusted() -> bool {
    unsafe { AXIsProcessTrusted() }
}

/// Check trust and ask the OS to show the grant dialog if it is missing.
/// The dialog is asynchronous; the return value reflects the state now.
pub fn is_trusted_with_prompt() -> bool {
    let key = CFString::new("AXTrustedCheckOptionPrompt");
    let value = CFBoolean::true_value();
    let options = CFDictionary::from_CFType_pairs(&[(key.as_CFType(), value.as_CFType())]);

    unsafe { AXIsProcessTrustedWithOptions(options.as_concrete_TypeRef()) }
}
