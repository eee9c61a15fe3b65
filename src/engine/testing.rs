//! In-memory source adapters
//!
//! Scriptable stand-ins for the OS subscriptions. The adapter half goes
//! into the engine; the handle half lets a test (or an off-platform
//! host) script permission state and publish events. Emission respects
//! the running gate, so nothing reaches the channel after `stop()`.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::error::{EngineError, EngineResult};
use crate::core::events::{AppActivation, EngineEvent, EngineSender};
use crate::watcher::element::StaticElement;
use crate::watcher::source::{ForegroundSource, NotificationSource};

struct ScriptedState {
    permission: AtomicBool,
    available: AtomicBool,
    running: AtomicBool,
    sender: Mutex<Option<EngineSender>>,
}

impl ScriptedState {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            permission: AtomicBool::new(true),
            available: AtomicBool::new(true),
            running: AtomicBool::new(false),
            sender: Mutex::new(None),
        })
    }

    fn emit(&self, event: EngineEvent) -> bool {
        if !self.running.load(Ordering::SeqCst) {
            return false;
        }
        match self.sender.lock().as_ref() {
            Some(events) => events.send(event).is_ok(),
            None => false,
        }
    }
}

/// Scriptable notification source
pub struct ScriptedNotificationSource {
    state: Arc<ScriptedState>,
}

/// Driver half of [`ScriptedNotificationSource`]
#[derive(Clone)]
pub struct ScriptedSourceHandle {
    state: Arc<ScriptedState>,
}

impl ScriptedNotificationSource {
    pub fn new() -> (Self, ScriptedSourceHandle) {
        let state = ScriptedState::new();
        (
            Self {
                state: Arc::clone(&state),
            },
            ScriptedSourceHandle { state },
        )
    }
}

impl NotificationSource for ScriptedNotificationSource {
    fn check_permission(&self) -> bool {
        self.state.permission.load(Ordering::SeqCst)
    }

    fn request_permission(&self) -> bool {
        self.state.permission.load(Ordering::SeqCst)
    }

    fn start(&mut self, events: EngineSender) -> EngineResult<()> {
        if self.state.running.load(Ordering::SeqCst) {
            return Ok(());
        }
        if !self.state.permission.load(Ordering::SeqCst) {
            return Err(EngineError::PermissionDenied(
                "accessibility trust not granted".to_string(),
            ));
        }
        if !self.state.available.load(Ordering::SeqCst) {
            return Err(EngineError::SourceUnavailable(
                "notification process not running".to_string(),
            ));
        }
        *self.state.sender.lock() = Some(events);
        self.state.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        self.state.running.store(false, Ordering::SeqCst);
        *self.state.sender.lock() = None;
    }

    fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }
}

impl ScriptedSourceHandle {
    /// Script whether the trust permission is granted.
    pub fn set_permission(&self, granted: bool) {
        self.state.permission.store(granted, Ordering::SeqCst);
    }

    /// Script whether the notification-rendering process exists.
    pub fn set_available(&self, available: bool) {
        self.state.available.store(available, Ordering::SeqCst);
    }

    /// Publish a window-created event. Returns false when the source is
    /// stopped, mirroring the closed publish gate of a real adapter.
    pub fn emit_window(&self, element: StaticElement) -> bool {
        self.state.emit(EngineEvent::WindowCreated {
            element: Box::new(element),
        })
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }
}

/// Scriptable foreground tracker
pub struct ScriptedForegroundSource {
    state: Arc<ScriptedState>,
    next_pid: Arc<AtomicI32>,
}

/// Driver half of [`ScriptedForegroundSource`]
#[derive(Clone)]
pub struct ScriptedForegroundHandle {
    state: Arc<ScriptedState>,
    next_pid: Arc<AtomicI32>,
}

impl ScriptedForegroundSource {
    pub fn new() -> (Self, ScriptedForegroundHandle) {
        let state = ScriptedState::new();
        let next_pid = Arc::new(AtomicI32::new(100));
        (
            Self {
                state: Arc::clone(&state),
                next_pid: Arc::clone(&next_pid),
            },
            ScriptedForegroundHandle { state, next_pid },
        )
    }
}

impl ForegroundSource for ScriptedForegroundSource {
    fn start(&mut self, events: EngineSender) -> EngineResult<()> {
        if self.state.running.load(Ordering::SeqCst) {
            return Ok(());
        }
        *self.state.sender.lock() = Some(events);
        self.state.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        self.state.running.store(false, Ordering::SeqCst);
        *self.state.sender.lock() = None;
    }

    fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }
}

impl ScriptedForegroundHandle {
    /// Publish an activation with a resolved bundle id.
    pub fn activate(&self, bundle_id: &str) -> bool {
        self.state.emit(EngineEvent::AppActivated {
            activation: AppActivation {
                process_id: self.next_pid.fetch_add(1, Ordering::SeqCst),
                bundle_id: Some(bundle_id.to_string()),
            },
        })
    }

    /// Publish an activation the OS could not resolve to a bundle id.
    pub fn activate_unresolved(&self) -> bool {
        self.state.emit(EngineEvent::AppActivated {
            activation: AppActivation {
                process_id: self.next_pid.fetch_add(1, Ordering::SeqCst),
                bundle_id: None,
            },
        })
    }
}
