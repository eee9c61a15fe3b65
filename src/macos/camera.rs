//! AVFoundation capture backend
//!
//! The indicator is the camera's in-use lamp: a minimal capture session
//! at the lowest preset lights it without consuming frames. Session
//! start and stop block until the hardware settles, which is why the
//! light controller calls them off the coordinator thread.

use block::ConcreteBlock;
use cocoa::base::{id, nil, BOOL, NO, YES};
use cocoa::foundation::{NSArray, NSString};
use objc::{class, msg_send, sel, sel_impl};
use tracing::debug;

use super::nsstring_to_string;
use crate::core::error::{EngineError, EngineResult};
use crate::light::capture::{
    CaptureAuthorization, CaptureBackend, CaptureDevice, CaptureDeviceInfo,
};

#[allow(non_upper_case_globals)]
#[link(name = "AVFoundation", kind = "framework")]
extern "C" {
    static AVMediaTypeVideo: id;
    static AVCaptureSessionPresetLow: id;
    static AVCaptureDeviceTypeBuiltInWideAngleCamera: id;
    static AVCaptureDeviceTypeExternalUnknown: id;
}

// AVAuthorizationStatus
const AUTHORIZATION_NOT_DETERMINED: isize = 0;
const AUTHORIZATION_RESTRICTED: isize = 1;
const AUTHORIZATION_DENIED: isize = 2;
const AUTHORIZATION_AUTHORIZED: isize = 3;

// AVCaptureDevicePositionUnspecified
const POSITION_UNSPECIFIED: isize = 0;

/// Camera access through AVFoundation
pub struct AvCaptureBackend;

impl AvCaptureBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AvCaptureBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for AvCaptureBackend {
    fn authorization(&self) -> CaptureAuthorization {
        let status: isize = unsafe {
            msg_send![
                class!(AVCaptureDevice),
                authorizationStatusForMediaType: AVMediaTypeVideo
            ]
        };
        match status {
            AUTHORIZATION_AUTHORIZED => CaptureAuthorization::Authorized,
            AUTHORIZATION_DENIED | AUTHORIZATION_RESTRICTED => CaptureAuthorization::Denied,
            AUTHORIZATION_NOT_DETERMINED => CaptureAuthorization::NotDetermined,
            other => {
                debug!("Unknown camera authorization status: {}", other);
                CaptureAuthorization::NotDetermined
            }
        }
    }

    fn request_access(&self) -> bool {
        let (tx, rx) = std::sync::mpsc::channel();
        // The completion handler runs on an arbitrary dispatch queue
        // after the user answers the prompt
        let handler = ConcreteBlock::new(move |granted: BOOL| {
            let _ = tx.send(granted == YES);
        });
        let handler = handler.copy();
        unsafe {
            let _: () = msg_send![
                class!(AVCaptureDevice),
                requestAccessForMediaType: AVMediaTypeVideo
                completionHandler: &*handler
            ];
        }
        let granted = rx.recv().unwrap_or(false);
        debug!("Camera access request granted: {}", granted);
        granted
    }

    fn enumerate_devices(&self) -> EngineResult<Vec<CaptureDeviceInfo>> {
        unsafe {
            let device_types = NSArray::arrayWithObjects(
                nil,
                &[
                    AVCaptureDeviceTypeBuiltInWideAngleCamera,
                    AVCaptureDeviceTypeExternalUnknown,
                ],
            );
            let session: id = msg_send![class!(AVCaptureDeviceDiscoverySession),
                discoverySessionWithDeviceTypes:device_types
                mediaType:AVMediaTypeVideo
                position:POSITION_UNSPECIFIED];
            if session == nil {
                return Err(EngineError::ResourceUnavailable(
                    "camera discovery failed".to_string(),
                ));
            }

            let devices: id = msg_send![session, devices];
            let count: usize = msg_send![devices, count];
            let mut found = Vec::with_capacity(count);
            for index in 0..count {
                let device: id = msg_send![devices, objectAtIndex: index];
                let unique_id: id = msg_send![device, uniqueID];
                let name: id = msg_send![device, localizedName];
                if let (Some(unique_id), Some(name)) =
                    (nsstring_to_string(unique_id), nsstring_to_string(name))
                {
                    found.push(CaptureDeviceInfo { unique_id, name });
                }
            }
            debug!("Discovered {} capture device(s)", found.len());
            Ok(found)
        }
    }

    fn open(&self, info: &CaptureDeviceInfo) -> EngineResult<Box<dyn CaptureDevice>> {
        unsafe {
            let unique_id = NSString::alloc(nil).init_str(&info.unique_id);
            let device: id = msg_send![class!(AVCaptureDevice), deviceWithUniqueID: unique_id];
            let _: () = msg_send![unique_id, release];
            if device == nil {
                return Err(EngineError::ResourceUnavailable(format!(
                    "camera {} is no longer present",
                    info.name
                )));
            }

            let session: id = msg_send![class!(AVCaptureSession), new];
            if session == nil {
                return Err(EngineError::ResourceUnavailable(
                    "could not create capture session".to_string(),
                ));
            }
            let _: () = msg_send![session, setSessionPreset: AVCaptureSessionPresetLow];

            let mut error: id = nil;
            let input: id =
                msg_send![class!(AVCaptureDeviceInput), deviceInputWithDevice:device error:&mut error];
            if input == nil {
                let _: () = msg_send![session, release];
                let reason = if error == nil {
                    "unknown error".to_string()
                } else {
                    let description: id = msg_send![error, localizedDescription];
                    nsstring_to_string(description).unwrap_or_else(|| "unknown error".to_string())
                };
                return Err(EngineError::ResourceUnavailable(format!(
                    "could not open {}: {}",
                    info.name, reason
                )));
            }

            let can_add: BOOL = msg_send![session, canAddInput: input];
            if can_add == NO {
                let _: () = msg_send![session, release];
                return Err(EngineError::ResourceUnavailable(format!(
                    "camera {} rejected the capture input",
                    info.name
                )));
            }
            let _: () = msg_send![session, addInput: input];

            debug!("Capture session ready for {}", info.name);
            Ok(Box::new(AvCaptureDevice {
                session: SessionPtr(session),
            }))
        }
    }
}

struct SessionPtr(id);
unsafe impl Send for SessionPtr {}

/// One camera driven through an AVCaptureSession
pub struct AvCaptureDevice {
    session: SessionPtr,
}

impl CaptureDevice for AvCaptureDevice {
    fn start(&mut self) -> EngineResult<()> {
        unsafe {
            let _: () = msg_send![self.session.0, startRunning];
        }
        if !self.is_running() {
            return Err(EngineError::ResourceUnavailable(
                "capture session did not start".to_string(),
            ));
        }
        Ok(())
    }

    fn stop(&mut self) -> EngineResult<()> {
        unsafe {
            let _: () = msg_send![self.session.0, stopRunning];
        }
        if self.is_running() {
            return Err(EngineError::ResourceUnavailable(
                "capture session did not stop".to_string(),
            ));
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        let running: BOOL = unsafe { msg_send![self.session.0, isRunning] };
        running == YES
    }
}

impl Drop for AvCaptureDevice {
    fn drop(&mut self) {
        unsafe {
            let running: BOOL = msg_send![self.session.0, isRunning];
            if running == YES {
                let _: () = msg_send![self.session.0, stopRunning];
            }
            let _: () = msg_send![self.session.0, release];
        }
    }
}
