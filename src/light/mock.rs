//! In-memory capture backend
//!
//! Stands in for the platform camera in tests and for development on
//! machines without one. The probe half injects failures and inspects
//! every device transition the controller performed.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::capture::{CaptureAuthorization, CaptureBackend, CaptureDevice, CaptureDeviceInfo};
use crate::core::error::{EngineError, EngineResult};
use crate::core::status::LightState;

struct MockShared {
    authorization: Mutex<CaptureAuthorization>,
    access_response: AtomicBool,
    access_requests: AtomicUsize,
    devices: Mutex<Vec<CaptureDeviceInfo>>,
    running: Mutex<bool>,
    ops: Mutex<Vec<LightState>>,
    open_count: AtomicUsize,
    fail_next_op: AtomicBool,
    hold: Mutex<bool>,
    hold_released: Condvar,
}

/// Backend half, handed to the controller
pub struct MockCaptureBackend {
    shared: Arc<MockShared>,
}

/// Test half, kept by the caller
#[derive(Clone)]
pub struct MockCaptureProbe {
    shared: Arc<MockShared>,
}

struct MockCaptureDevice {
    shared: Arc<MockShared>,
}

impl MockCaptureBackend {
    /// One authorized backend with a single device attached.
    pub fn new() -> (Self, MockCaptureProbe) {
        let shared = Arc::new(MockShared {
            authorization: Mutex::new(CaptureAuthorization::Authorized),
            access_response: AtomicBool::new(true),
            access_requests: AtomicUsize::new(0),
            devices: Mutex::new(vec![CaptureDeviceInfo {
                unique_id: "mock-0".to_string(),
                name: "Mock Camera".to_string(),
            }]),
            running: Mutex::new(false),
            ops: Mutex::new(Vec::new()),
            open_count: AtomicUsize::new(0),
            fail_next_op: AtomicBool::new(false),
            hold: Mutex::new(false),
            hold_released: Condvar::new(),
        });
        (
            Self {
                shared: Arc::clone(&shared),
            },
            MockCaptureProbe { shared },
        )
    }
}

impl CaptureBackend for MockCaptureBackend {
    fn authorization(&self) -> CaptureAuthorization {
        *self.shared.authorization.lock()
    }

    fn request_access(&self) -> bool {
        self.shared.access_requests.fetch_add(1, Ordering::SeqCst);
        let granted = self.shared.access_response.load(Ordering::SeqCst);
        *self.shared.authorization.lock() = if granted {
            CaptureAuthorization::Authorized
        } else {
            CaptureAuthorization::Denied
        };
        granted
    }

    fn enumerate_devices(&self) -> EngineResult<Vec<CaptureDeviceInfo>> {
        Ok(self.shared.devices.lock().clone())
    }

    fn open(&self, device: &CaptureDeviceInfo) -> EngineResult<Box<dyn CaptureDevice>> {
        let known = self
            .shared
            .devices
            .lock()
            .iter()
            .any(|d| d.unique_id == device.unique_id);
        if !known {
            return Err(EngineError::ResourceUnavailable(format!(
                "unknown device: {}",
                device.unique_id
            )));
        }
        self.shared.open_count.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockCaptureDevice {
            shared: Arc::clone(&self.shared),
        }))
    }
}

impl MockCaptureDevice {
    fn transition(&mut self, target: LightState) -> EngineResult<()> {
        {
            let mut hold = self.shared.hold.lock();
            while *hold {
                self.shared.hold_released.wait(&mut hold);
            }
        }
        if self.shared.fail_next_op.swap(false, Ordering::SeqCst) {
            return Err(EngineError::ResourceUnavailable(
                "mock device rejected the operation".to_string(),
            ));
        }
        *self.shared.running.lock() = target.is_on();
        self.shared.ops.lock().push(target);
        Ok(())
    }
}

impl CaptureDevice for MockCaptureDevice {
    fn start(&mut self) -> EngineResult<()> {
        self.transition(LightState::On)
    }

    fn stop(&mut self) -> EngineResult<()> {
        self.transition(LightState::Off)
    }

    fn is_running(&self) -> bool {
        *self.shared.running.lock()
    }
}

impl MockCaptureProbe {
    pub fn set_authorization(&self, authorization: CaptureAuthorization) {
        *self.shared.authorization.lock() = authorization;
    }

    /// Answer the next access request with `granted`.
    pub fn set_access_response(&self, granted: bool) {
        self.shared.access_response.store(granted, Ordering::SeqCst);
    }

    /// How many times the controller asked for camera access.
    pub fn access_requests(&self) -> usize {
        self.shared.access_requests.load(Ordering::SeqCst)
    }

    /// Detach every device; enumeration comes back empty.
    pub fn clear_devices(&self) {
        self.shared.devices.lock().clear();
    }

    /// Fail the next start or stop with `ResourceUnavailable`.
    pub fn fail_next_op(&self) {
        self.shared.fail_next_op.store(true, Ordering::SeqCst);
    }

    /// Block device operations until [`release_ops`](Self::release_ops).
    pub fn hold_ops(&self) {
        *self.shared.hold.lock() = true;
    }

    pub fn release_ops(&self) {
        *self.shared.hold.lock() = false;
        self.shared.hold_released.notify_all();
    }

    /// Whether the mock session is currently running.
    pub fn running(&self) -> bool {
        *self.shared.running.lock()
    }

    /// Every applied transition, in device order.
    pub fn ops(&self) -> Vec<LightState> {
        self.shared.ops.lock().clone()
    }

    /// How many times a device was opened.
    pub fn open_count(&self) -> usize {
        self.shared.open_count.load(Ordering::SeqCst)
    }
}
