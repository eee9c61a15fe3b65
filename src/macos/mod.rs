//! macOS adapters
//!
//! Real implementations of the engine seams: the AX window observer,
//! the NSWorkspace foreground tracker, and the AVFoundation capture
//! backend. A host builds the set with [`default_adapters`] and hands
//! it to [`crate::engine::Engine::spawn`].

pub mod camera;
pub mod element;
pub mod ffi;
pub mod observer;
pub mod workspace;

pub use camera::AvCaptureBackend;
pub use element::AxElement;
pub use observer::AxNotificationSource;
pub use workspace::WorkspaceTracker;

use anyhow::Result;
use cocoa::base::id;
use objc::{msg_send, sel, sel_impl};

use crate::core::config::EngineConfig;
use crate::core::watchlist::WatchListStore;
use crate::engine::EngineAdapters;

/// Build the standard adapter set for a macOS host.
pub fn default_adapters(config: &EngineConfig) -> Result<EngineAdapters> {
    Ok(EngineAdapters {
        source: Box::new(AxNotificationSource::new(
            config.source.process_bundle_id.clone(),
        )),
        foreground: Box::new(WorkspaceTracker::new()),
        capture: Box::new(AvCaptureBackend::new()),
        store: WatchListStore::new()?,
    })
}

/// Convert an NSString to an owned Rust string.
pub(crate) unsafe fn nsstring_to_string(ns_string: id) -> Option<String> {
    if ns_string.is_null() {
        return None;
    }
    let bytes: *const std::os::raw::c_char = msg_send![ns_string, UTF8String];
    if bytes.is_null() {
        return None;
    }
    Some(
        std::ffi::CStr::from_ptr(bytes)
            .to_string_lossy()
            .into_owned(),
    )
}
