//! CamLight
//!
//! An embeddable engine that turns a camera's in-use light into a
//! notification indicator for a chosen set of apps.
//!
//! # Features
//! - Watches OS window-created events from the notification renderer
//! - Matches notification banners against a persisted watch list
//! - Switches a capture device on while any watched app has an
//!   unacknowledged notification, off once all are acknowledged
//! - Treats bringing a watched app to the foreground as acknowledgement
//! - Exposes a command/status surface for a host shell to embed
//!
//! The host constructs platform adapters ([`engine::EngineAdapters`]),
//! calls [`engine::Engine::spawn`], and drives the returned
//! [`engine::EngineHandle`]. On macOS the `macos` module provides the
//! real adapters; on other platforms the host supplies its own.

pub mod core;
pub mod engine;
pub mod light;
#[cfg(target_os = "macos")]
pub mod macos;
pub mod watcher;

pub use core::config::EngineConfig;
pub use core::error::{EngineError, EngineResult};
pub use core::events::{EngineCommand, EngineEvent};
pub use core::status::{EngineStatus, LightState, PermissionState};
pub use core::watchlist::{WatchList, WatchListStore, WatchedApp};
pub use engine::{Engine, EngineAdapters, EngineHandle};
