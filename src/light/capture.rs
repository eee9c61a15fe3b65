//! Capture device seam
//!
//! The indicator light is the in-use lamp of a camera: starting a
//! capture session turns it on, stopping turns it off. Device access
//! goes through these traits so the controller logic runs against an
//! in-memory backend in tests.

use crate::core::error::EngineResult;

/// Authorization state of camera access for this process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureAuthorization {
    /// Access granted
    Authorized,
    /// Access denied or restricted
    Denied,
    /// Never asked; [`CaptureBackend::request_access`] raises the prompt
    NotDetermined,
}

/// A discoverable capture device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureDeviceInfo {
    /// Stable identifier used to open the device
    pub unique_id: String,
    /// Human-readable name
    pub name: String,
}

/// Entry point to the capture subsystem
pub trait CaptureBackend: Send {
    /// Current camera authorization for this process.
    fn authorization(&self) -> CaptureAuthorization;

    /// Raise the OS camera prompt and block until the user answers.
    /// Returns whether access is granted.
    fn request_access(&self) -> bool;

    /// All video capture devices currently attached.
    fn enumerate_devices(&self) -> EngineResult<Vec<CaptureDeviceInfo>>;

    /// Open a device for exclusive session control.
    fn open(&self, device: &CaptureDeviceInfo) -> EngineResult<Box<dyn CaptureDevice>>;
}

/// An opened capture device. `start` and `stop` block until the device
/// settles, which is why the controller calls them on a worker thread.
pub trait CaptureDevice: Send {
    fn start(&mut self) -> EngineResult<()>;

    fn stop(&mut self) -> EngineResult<()>;

    fn is_running(&self) -> bool;
}

/// Pick the device whose name contains `preferred` (case-insensitive),
/// falling back to the first device when no preference is set or the
/// preference matches nothing.
pub fn select_device<'a>(
    devices: &'a [CaptureDeviceInfo],
    preferred: Option<&str>,
) -> Option<&'a CaptureDeviceInfo> {
    if let Some(wanted) = preferred {
        let wanted = wanted.to_lowercase();
        if let Some(device) = devices
            .iter()
            .find(|d| d.name.to_lowercase().contains(&wanted))
        {
            return Some(device);
        }
    }
    devices.first()
}
