//! Engine coordinator
//!
//! The engine runs a single-writer loop on its own thread. OS adapters
//! and the light worker publish typed events into one channel; the loop
//! is the only code that touches the watch list, the activation set, or
//! the status snapshot. The host shell talks to it through an
//! [`EngineHandle`]: commands go in on the same channel, state comes
//! back as [`EngineStatus`] snapshots on a watch channel.

pub mod testing;

use std::collections::VecDeque;
use std::thread;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::core::activation::{ActivationEdge, ActivationSet};
use crate::core::config::EngineConfig;
use crate::core::error::EngineError;
use crate::core::events::{EngineCommand, EngineEvent, EngineSender};
use crate::core::status::{EngineStatus, LightState, PermissionState};
use crate::core::watchlist::{WatchList, WatchListStore, WatchedApp};
use crate::light::capture::CaptureBackend;
use crate::light::controller::LightController;
use crate::watcher::matcher::find_match;
use crate::watcher::source::{ForegroundSource, NotificationSource};

/// OS-facing collaborators, constructed by the host and owned by the
/// engine. Platform code provides the real set; tests script their own.
pub struct EngineAdapters {
    pub source: Box<dyn NotificationSource>,
    pub foreground: Box<dyn ForegroundSource>,
    pub capture: Box<dyn CaptureBackend>,
    pub store: WatchListStore,
}

/// What the loop should do after handling an event
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    /// Discard queued detection events; they predate a stop
    DrainDetections,
    Shutdown,
}

/// The coordinator. Owns all mutable engine state for its lifetime.
pub struct Engine {
    watch_list: WatchList,
    store: WatchListStore,
    activation: ActivationSet,
    controller: LightController,
    source: Box<dyn NotificationSource>,
    foreground: Box<dyn ForegroundSource>,
    events: EngineSender,
    status: EngineStatus,
    status_tx: watch::Sender<EngineStatus>,
}

impl Engine {
    /// Load the watch list, start the light worker, and spawn the
    /// coordinator thread. Watching does not begin until the host sends
    /// [`EngineCommand::StartWatching`].
    pub fn spawn(config: EngineConfig, adapters: EngineAdapters) -> EngineHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let events = EngineSender::new(tx);

        let watch_list = match adapters.store.load() {
            Ok(list) => list,
            Err(err) => {
                warn!("Failed to load watch list, starting empty: {:#}", err);
                WatchList::new()
            }
        };
        info!("Loaded {} watched app(s)", watch_list.len());

        let controller = LightController::new(
            adapters.capture,
            config.light.preferred_device.clone(),
            events.clone(),
        );

        let status = EngineStatus::default();
        let (status_tx, status_rx) = watch::channel(status.clone());

        let mut engine = Engine {
            watch_list,
            store: adapters.store,
            activation: ActivationSet::new(),
            controller,
            source: adapters.source,
            foreground: adapters.foreground,
            events: events.clone(),
            status,
            status_tx,
        };
        engine.publish();

        let thread = thread::spawn(move || engine.run(rx));

        EngineHandle {
            events,
            status_rx,
            thread: Some(thread),
        }
    }

    fn run(mut self, mut rx: mpsc::UnboundedReceiver<EngineEvent>) {
        info!("Engine loop started");
        let mut deferred: VecDeque<EngineEvent> = VecDeque::new();

        loop {
            let event = match deferred.pop_front() {
                Some(event) => event,
                None => match rx.blocking_recv() {
                    Some(event) => event,
                    None => break,
                },
            };

            let flow = self.handle_event(event);
            self.publish();

            match flow {
                Flow::Continue => {}
                Flow::DrainDetections => {
                    while let Ok(event) = rx.try_recv() {
                        match event {
                            EngineEvent::WindowCreated { .. }
                            | EngineEvent::AppActivated { .. } => {}
                            other => deferred.push_back(other),
                        }
                    }
                }
                Flow::Shutdown => break,
            }
        }

        self.source.stop();
        self.foreground.stop();
        self.controller.shutdown();
        info!("Engine loop exited");
    }

    fn handle_event(&mut self, event: EngineEvent) -> Flow {
        match event {
            EngineEvent::WindowCreated { element } => {
                if !self.status.watching {
                    debug!("Ignoring window event while stopped");
                    return Flow::Continue;
                }
                if let Some(app) = find_match(element.as_ref(), self.watch_list.apps()) {
                    debug!("Notification matched watched app: {}", app.id);
                    let id = app.id.clone();
                    self.status.last_event_at = Some(Utc::now());
                    if let Some(edge) = self.activation.insert(&id) {
                        self.dispatch_edge(edge);
                    }
                }
                Flow::Continue
            }

            EngineEvent::AppActivated { activation } => {
                if !self.status.watching {
                    return Flow::Continue;
                }
                if let Some(bundle_id) = activation.bundle_id {
                    if self.activation.contains(&bundle_id) {
                        debug!("Foreground activation acknowledged: {}", bundle_id);
                        self.status.last_event_at = Some(Utc::now());
                        if let Some(edge) = self.activation.remove(&bundle_id) {
                            self.dispatch_edge(edge);
                        }
                    }
                }
                Flow::Continue
            }

            EngineEvent::LightApplied { state } => {
                debug!("Light state applied: {:?}", state);
                self.status.light = state;
                self.status.in_flight = false;
                self.status.last_error = None;
                Flow::Continue
            }

            EngineEvent::LightFailed { error } => {
                self.status.in_flight = false;
                self.record_error(error);
                Flow::Continue
            }

            EngineEvent::DeviceOpened { name } => {
                self.status.device_name = Some(name);
                Flow::Continue
            }

            EngineEvent::Command(command) => self.handle_command(command),
        }
    }

    fn handle_command(&mut self, command: EngineCommand) -> Flow {
        match command {
            EngineCommand::StartWatching => {
                self.start_watching();
                Flow::Continue
            }

            EngineCommand::StopWatching => {
                self.stop_watching();
                Flow::DrainDetections
            }

            EngineCommand::AddApp(app) => {
                let id = app.id.clone();
                if self.watch_list.add(app) {
                    info!("Watching app: {}", id);
                    self.persist_watch_list();
                } else {
                    debug!("Ignoring add for duplicate or invalid app: {}", id);
                }
                Flow::Continue
            }

            EngineCommand::RemoveApp(id) => {
                if let Some(removed) = self.watch_list.remove(&id) {
                    info!("Stopped watching app: {}", removed.id);
                    self.persist_watch_list();
                    if let Some(edge) = self.activation.remove(&id) {
                        self.dispatch_edge(edge);
                    }
                } else {
                    debug!("Ignoring remove for unknown app: {}", id);
                }
                Flow::Continue
            }

            EngineCommand::SetAppActive { id, active } => {
                if !self.watch_list.contains(&id) {
                    debug!("Ignoring manual activation for unknown app: {}", id);
                    return Flow::Continue;
                }
                debug!("Manual activation for {}: active={}", id, active);
                let edge = if active {
                    self.activation.insert(&id)
                } else {
                    self.activation.remove(&id)
                };
                if let Some(edge) = edge {
                    self.dispatch_edge(edge);
                }
                Flow::Continue
            }

            EngineCommand::ClearAll => {
                info!("Clearing all activations");
                if let Some(edge) = self.activation.clear() {
                    self.dispatch_edge(edge);
                }
                Flow::Continue
            }

            EngineCommand::ToggleLight => {
                let next = self.status.light.flipped();
                info!("Manual light toggle: {:?}", next);
                self.status.in_flight = true;
                self.controller.request(next);
                Flow::Continue
            }

            EngineCommand::Shutdown => {
                self.stop_watching();
                Flow::Shutdown
            }
        }
    }

    fn start_watching(&mut self) {
        if self.status.watching {
            debug!("Watcher already running");
            return;
        }

        if self.source.check_permission() {
            self.status.permission = PermissionState::Granted;
        } else {
            let granted = self.source.request_permission();
            self.status.permission = if granted {
                PermissionState::Granted
            } else {
                PermissionState::Denied
            };
            if !granted {
                self.record_error(EngineError::PermissionDenied(
                    "accessibility trust not granted".to_string(),
                ));
                return;
            }
        }

        if let Err(error) = self.source.start(self.events.clone()) {
            self.record_error(error);
            return;
        }
        if let Err(error) = self.foreground.start(self.events.clone()) {
            self.source.stop();
            self.record_error(error);
            return;
        }

        self.status.watching = true;
        self.status.last_error = None;
        info!("Started watching for notifications");
    }

    fn stop_watching(&mut self) {
        self.source.stop();
        self.foreground.stop();
        if !self.status.watching {
            return;
        }
        self.status.watching = false;
        self.status.last_error = None;
        if let Some(edge) = self.activation.clear() {
            self.dispatch_edge(edge);
        }
        info!("Stopped watching for notifications");
    }

    fn dispatch_edge(&mut self, edge: ActivationEdge) {
        let target = match edge {
            ActivationEdge::BecameActive => LightState::On,
            ActivationEdge::BecameIdle => LightState::Off,
        };
        debug!("Activation edge {:?}, requesting light {:?}", edge, target);
        self.status.in_flight = true;
        self.controller.request(target);
    }

    fn record_error(&mut self, error: EngineError) {
        warn!("{}", error);
        self.status.last_error = Some(error.to_string());
    }

    fn persist_watch_list(&mut self) {
        if let Err(err) = self.store.save(&self.watch_list) {
            self.record_error(EngineError::Persistence(format!("{:#}", err)));
        }
    }

    fn publish(&mut self) {
        self.status.watched_apps = self.watch_list.apps().to_vec();
        self.status.active_ids = self
            .watch_list
            .apps()
            .iter()
            .filter(|app| self.activation.contains(&app.id))
            .map(|app| app.id.clone())
            .collect();
        self.status_tx.send_replace(self.status.clone());
    }
}

/// Host-side handle to a running engine
pub struct EngineHandle {
    events: EngineSender,
    status_rx: watch::Receiver<EngineStatus>,
    thread: Option<thread::JoinHandle<()>>,
}

impl EngineHandle {
    pub fn command(&self, command: EngineCommand) {
        self.events.command(command);
    }

    pub fn start_watching(&self) {
        self.command(EngineCommand::StartWatching);
    }

    pub fn stop_watching(&self) {
        self.command(EngineCommand::StopWatching);
    }

    pub fn add_app(&self, app: WatchedApp) {
        self.command(EngineCommand::AddApp(app));
    }

    pub fn remove_app(&self, id: impl Into<String>) {
        self.command(EngineCommand::RemoveApp(id.into()));
    }

    pub fn set_app_active(&self, id: impl Into<String>, active: bool) {
        self.command(EngineCommand::SetAppActive {
            id: id.into(),
            active,
        });
    }

    pub fn clear_all(&self) {
        self.command(EngineCommand::ClearAll);
    }

    pub fn toggle_light(&self) {
        self.command(EngineCommand::ToggleLight);
    }

    /// Latest published status snapshot.
    pub fn status(&self) -> EngineStatus {
        self.status_rx.borrow().clone()
    }

    /// Receiver for awaiting status changes.
    pub fn status_stream(&self) -> watch::Receiver<EngineStatus> {
        self.status_rx.clone()
    }

    /// Stop the engine and wait for the coordinator thread to finish.
    pub fn shutdown(mut self) {
        self.command(EngineCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        // The engine holds a sender itself, so the channel never closes
        // on its own; an explicit shutdown ends the loop
        self.events.command(EngineCommand::Shutdown);
    }
}
