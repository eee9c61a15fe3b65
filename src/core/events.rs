//! Engine event definitions

use super::error::EngineError;
use super::status::LightState;
use super::watchlist::WatchedApp;
use crate::watcher::element::UiElement;
use tokio::sync::mpsc;

/// Wrapper around `mpsc::UnboundedSender<EngineEvent>` handed to OS
/// adapters and the light worker. Sends never block, so publishing from
/// an OS delivery thread cannot stall event delivery; the coordinator
/// thread drains the channel and is the only place state is touched.
#[derive(Clone)]
pub struct EngineSender {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EngineSender {
    pub fn new(tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { tx }
    }

    pub fn send(&self, event: EngineEvent) -> Result<(), mpsc::error::SendError<EngineEvent>> {
        self.tx.send(event)
    }

    /// Send a host command.
    pub fn command(&self, command: EngineCommand) {
        // Failure means the engine loop is gone; nothing left to notify
        let _ = self.send(EngineEvent::Command(command));
    }
}

/// Foreground activation payload from the workspace subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppActivation {
    /// Process id of the activated application
    pub process_id: i32,
    /// Bundle identifier, when the OS resolved one
    pub bundle_id: Option<String>,
}

/// Events consumed by the coordinator's single-writer loop
#[derive(Debug)]
pub enum EngineEvent {
    /// A window appeared in the notification-rendering process
    WindowCreated { element: Box<dyn UiElement> },

    /// An application came to the foreground
    AppActivated { activation: AppActivation },

    /// The light worker applied a desired state
    LightApplied { state: LightState },

    /// The light worker failed; observable state is unchanged
    LightFailed { error: EngineError },

    /// The light worker opened a capture device
    DeviceOpened { name: String },

    /// Request from the host shell
    Command(EngineCommand),
}

/// Host-shell requests
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    /// Start the notification watcher and foreground tracker
    StartWatching,

    /// Stop both subscriptions and clear all activations
    StopWatching,

    /// Register an app for monitoring
    AddApp(WatchedApp),

    /// Unregister an app; also clears its activation
    RemoveApp(String),

    /// Manually activate or deactivate a watched app
    SetAppActive { id: String, active: bool },

    /// Clear all activations
    ClearAll,

    /// Flip the light regardless of activations
    ToggleLight,

    /// Terminate the engine loop
    Shutdown,
}
