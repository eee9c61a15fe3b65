//! Engine status snapshots published to the host shell

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::watchlist::WatchedApp;

/// Observable state of the indicator light
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightState {
    /// Light is off (no capture session running)
    #[default]
    Off,
    /// Light is on (capture session running)
    On,
}

impl LightState {
    /// The opposite state, used by the manual toggle
    pub fn flipped(self) -> Self {
        match self {
            LightState::Off => LightState::On,
            LightState::On => LightState::Off,
        }
    }

    pub fn is_on(self) -> bool {
        matches!(self, LightState::On)
    }
}

/// Accessibility trust state as last observed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionState {
    /// Not checked yet
    #[default]
    Unknown,
    /// Trust granted
    Granted,
    /// Trust denied or revoked
    Denied,
}

/// Snapshot of engine state, published after every observable change
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineStatus {
    /// Whether the notification watcher is running
    pub watching: bool,
    /// Accessibility trust state
    pub permission: PermissionState,
    /// Last applied light state
    pub light: LightState,
    /// Whether a device operation is currently in flight
    pub in_flight: bool,
    /// The watch list, in registration order
    pub watched_apps: Vec<WatchedApp>,
    /// Ids with an unacknowledged notification, in registration order
    pub active_ids: Vec<String>,
    /// Name of the opened capture device, once known
    pub device_name: Option<String>,
    /// Most recent error, cleared by the next successful lifecycle change
    pub last_error: Option<String>,
    /// When the last detection or acknowledgement was processed
    pub last_event_at: Option<DateTime<Utc>>,
}

impl EngineStatus {
    /// Convert to JSON for host shells that bridge to non-Rust UIs
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// True when any watched app has an unacknowledged notification
    pub fn has_active(&self) -> bool {
        !self.active_ids.is_empty()
    }
}
