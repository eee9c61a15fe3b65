//! Indicator light - capture device seam and controller

pub mod capture;
pub mod controller;
pub mod mock;

pub use capture::{CaptureAuthorization, CaptureBackend, CaptureDevice, CaptureDeviceInfo};
pub use controller::LightController;
pub use mock::{MockCaptureBackend, MockCaptureProbe};
