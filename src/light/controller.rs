//! Light resource controller
//!
//! Owns the capture backend and the worker thread that performs the
//! blocking device calls. Desired states land in a single slot: a newer
//! request overwrites one the worker has not claimed yet, so a burst of
//! activation edges collapses to its final state and at most one device
//! operation is ever in flight. Results travel back to the coordinator
//! as events; the controller itself holds no observable light state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use super::capture::{select_device, CaptureAuthorization, CaptureBackend, CaptureDevice};
use crate::core::error::{EngineError, EngineResult};
use crate::core::events::{EngineEvent, EngineSender};
use crate::core::status::LightState;

/// Drives the capture device from desired-state requests
pub struct LightController {
    shared: Arc<ControllerShared>,
}

struct ControllerShared {
    backend: Mutex<Box<dyn CaptureBackend>>,
    device: Mutex<Option<Box<dyn CaptureDevice>>>,
    desired: Mutex<Option<LightState>>,
    wake: Condvar,
    stop_worker: AtomicBool,
    events: EngineSender,
    preferred_device: Option<String>,
}

impl LightController {
    /// Create the controller and spawn its worker thread. The device is
    /// opened lazily on the first request that needs it.
    pub fn new(
        backend: Box<dyn CaptureBackend>,
        preferred_device: Option<String>,
        events: EngineSender,
    ) -> Self {
        let shared = Arc::new(ControllerShared {
            backend: Mutex::new(backend),
            device: Mutex::new(None),
            desired: Mutex::new(None),
            wake: Condvar::new(),
            stop_worker: AtomicBool::new(false),
            events,
            preferred_device,
        });

        let worker_shared = Arc::clone(&shared);
        thread::spawn(move || worker_loop(worker_shared));

        Self { shared }
    }

    /// Request a desired state. Never blocks; an unclaimed earlier
    /// request is superseded rather than queued.
    pub fn request(&self, state: LightState) {
        let mut desired = self.shared.desired.lock();
        if let Some(pending) = desired.replace(state) {
            debug!("Superseded pending light request {:?} with {:?}", pending, state);
        }
        self.shared.wake.notify_one();
    }

    /// Signal the worker to exit after any in-flight operation finishes.
    pub fn shutdown(&self) {
        self.shared.stop_worker.store(true, Ordering::Relaxed);
        self.shared.wake.notify_one();
    }
}

impl Drop for LightController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: Arc<ControllerShared>) {
    loop {
        let target = {
            let mut desired = shared.desired.lock();
            loop {
                if shared.stop_worker.load(Ordering::Relaxed) {
                    return;
                }
                if let Some(state) = desired.take() {
                    break state;
                }
                shared.wake.wait(&mut desired);
            }
        };

        match apply(&shared, target) {
            Ok(state) => {
                let _ = shared.events.send(EngineEvent::LightApplied { state });
            }
            Err(error) => {
                warn!("Light operation failed: {}", error);
                let _ = shared.events.send(EngineEvent::LightFailed { error });
            }
        }
    }
}

/// Apply one desired state to the device. Returns the applied state, or
/// an error with the previous device state intact.
fn apply(shared: &ControllerShared, target: LightState) -> EngineResult<LightState> {
    let mut device_slot = shared.device.lock();

    if device_slot.is_none() {
        if target == LightState::Off {
            // Nothing is running; off is already true
            return Ok(LightState::Off);
        }
        *device_slot = Some(open_device(shared)?);
    }

    let device = match device_slot.as_mut() {
        Some(device) => device,
        None => return Err(EngineError::ResourceUnavailable("no open device".to_string())),
    };

    let result = match target {
        LightState::On if !device.is_running() => device.start(),
        LightState::Off if device.is_running() => device.stop(),
        // Already in the requested state; no hardware call
        _ => Ok(()),
    };

    match result {
        Ok(()) => Ok(target),
        Err(error) => {
            if matches!(error, EngineError::ResourceUnavailable(_)) {
                // The device may be gone; rediscover on the next request
                *device_slot = None;
            }
            Err(error)
        }
    }
}

fn open_device(shared: &ControllerShared) -> EngineResult<Box<dyn CaptureDevice>> {
    let backend = shared.backend.lock();

    match backend.authorization() {
        CaptureAuthorization::Denied => {
            return Err(EngineError::PermissionDenied("camera access denied".to_string()));
        }
        CaptureAuthorization::NotDetermined => {
            debug!("Camera authorization undetermined, requesting access");
            if !backend.request_access() {
                return Err(EngineError::PermissionDenied("camera access denied".to_string()));
            }
        }
        CaptureAuthorization::Authorized => {}
    }

    let devices = backend.enumerate_devices()?;
    let info = select_device(&devices, shared.preferred_device.as_deref())
        .ok_or_else(|| EngineError::ResourceUnavailable("no camera found".to_string()))?;

    let device = backend.open(info)?;
    info!("Opened capture device: {}", info.name);
    let _ = shared.events.send(EngineEvent::DeviceOpened {
        name: info.name.clone(),
    });
    Ok(device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::mock::MockCaptureBackend;
    use std::time::{Duration, Instant};
    use tokio::sync::mpsc;

    fn controller() -> (
        LightController,
        crate::light::mock::MockCaptureProbe,
        mpsc::UnboundedReceiver<EngineEvent>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (backend, probe) = MockCaptureBackend::new();
        let controller = LightController::new(Box::new(backend), None, EngineSender::new(tx));
        (controller, probe, rx)
    }

    fn recv_event(rx: &mut mpsc::UnboundedReceiver<EngineEvent>) -> EngineEvent {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if let Ok(event) = rx.try_recv() {
                return event;
            }
            assert!(Instant::now() < deadline, "timed out waiting for event");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn recv_applied(rx: &mut mpsc::UnboundedReceiver<EngineEvent>) -> LightState {
        loop {
            match recv_event(rx) {
                EngineEvent::LightApplied { state } => return state,
                EngineEvent::DeviceOpened { .. } => continue,
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[test]
    fn test_on_then_off() {
        let (controller, probe, mut rx) = controller();

        controller.request(LightState::On);
        assert_eq!(recv_applied(&mut rx), LightState::On);
        assert!(probe.running());

        controller.request(LightState::Off);
        assert_eq!(recv_applied(&mut rx), LightState::Off);
        assert!(!probe.running());

        assert_eq!(probe.ops(), vec![LightState::On, LightState::Off]);
        assert_eq!(probe.open_count(), 1);
    }

    #[test]
    fn test_off_without_device_skips_open() {
        let (controller, probe, mut rx) = controller();

        controller.request(LightState::Off);
        assert_eq!(recv_applied(&mut rx), LightState::Off);
        assert_eq!(probe.open_count(), 0);
    }

    #[test]
    fn test_latest_wins_supersede() {
        let (controller, probe, mut rx) = controller();

        probe.hold_ops();
        controller.request(LightState::On);
        // Give the worker time to claim the first request and block
        std::thread::sleep(Duration::from_millis(50));
        controller.request(LightState::Off);
        controller.request(LightState::On);
        probe.release_ops();

        assert_eq!(recv_applied(&mut rx), LightState::On);
        assert_eq!(recv_applied(&mut rx), LightState::On);
        assert!(probe.running());
        // The superseded Off never reached the device
        assert_eq!(probe.ops(), vec![LightState::On]);
    }

    #[test]
    fn test_denied_authorization() {
        let (controller, probe, mut rx) = controller();

        probe.set_authorization(CaptureAuthorization::Denied);
        controller.request(LightState::On);

        match recv_event(&mut rx) {
            EngineEvent::LightFailed { error } => {
                assert!(error.is_permission());
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(probe.open_count(), 0);
        assert!(!probe.running());
    }

    #[test]
    fn test_undetermined_access_granted_at_prompt() {
        let (controller, probe, mut rx) = controller();

        probe.set_authorization(CaptureAuthorization::NotDetermined);
        controller.request(LightState::On);

        assert_eq!(recv_applied(&mut rx), LightState::On);
        assert_eq!(probe.access_requests(), 1);
        assert!(probe.running());
    }

    #[test]
    fn test_undetermined_access_denied_at_prompt() {
        let (controller, probe, mut rx) = controller();

        probe.set_authorization(CaptureAuthorization::NotDetermined);
        probe.set_access_response(false);
        controller.request(LightState::On);

        match recv_event(&mut rx) {
            EngineEvent::LightFailed { error } => {
                assert!(error.is_permission());
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(probe.access_requests(), 1);
        assert_eq!(probe.open_count(), 0);
        assert!(!probe.running());
    }

    #[test]
    fn test_no_devices() {
        let (controller, probe, mut rx) = controller();

        probe.clear_devices();
        controller.request(LightState::On);

        match recv_event(&mut rx) {
            EngineEvent::LightFailed { error } => {
                assert_eq!(
                    error,
                    EngineError::ResourceUnavailable("no camera found".to_string())
                );
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_failed_operation_keeps_state_and_reopens() {
        let (controller, probe, mut rx) = controller();

        probe.fail_next_op();
        controller.request(LightState::On);
        loop {
            match recv_event(&mut rx) {
                EngineEvent::LightFailed { error } => {
                    assert!(matches!(error, EngineError::ResourceUnavailable(_)));
                    break;
                }
                EngineEvent::DeviceOpened { .. } => continue,
                other => panic!("unexpected event: {:?}", other),
            }
        }
        assert!(!probe.running());

        // The next request rediscovers the device and succeeds
        controller.request(LightState::On);
        assert_eq!(recv_applied(&mut rx), LightState::On);
        assert!(probe.running());
        assert_eq!(probe.open_count(), 2);
    }

    #[test]
    fn test_shutdown_stops_worker() {
        let (controller, _probe, mut rx) = controller();

        controller.request(LightState::On);
        assert_eq!(recv_applied(&mut rx), LightState::On);

        controller.shutdown();
        // Requests after shutdown are never applied
        controller.request(LightState::Off);
        thread::sleep(Duration::from_millis(50));
        assert!(rx.try_recv().is_err());
    }
}
