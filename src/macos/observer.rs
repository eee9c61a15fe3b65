//! AX window-created subscription
//!
//! Observes the notification-rendering process for `AXWindowCreated`
//! and forwards each new window's element to the engine. The observer
//! schedules on the main run loop, so the host application must be
//! running one.

use std::os::raw::c_void;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use core_foundation::base::TCFType;
use core_foundation::runloop::{CFRunLoop, CFRunLoopSource};
use core_foundation::string::CFString;
use core_foundation_sys::base::{CFRelease, CFTypeRef};
use core_foundation_sys::runloop::kCFRunLoopDefaultMode;
use core_foundation_sys::string::CFStringRef;
use objc::runtime::Object;
use objc::{class, msg_send, sel, sel_impl};
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::element::AxElement;
use super::ffi::{self, AXObserverRef, AXUIElementRef};
use super::nsstring_to_string;
use crate::core::error::{EngineError, EngineResult};
use crate::core::events::{EngineEvent, EngineSender};
use crate::watcher::source::NotificationSource;

const WINDOW_CREATED: &str = "AXWindowCreated";

/// Window-created events from one process's accessibility tree
pub struct AxNotificationSource {
    bundle_id: String,
    state: Arc<SourceState>,
    // The callback refcon points here. The box lives as long as the
    // source, so a callback racing a stop never reads freed memory
    context: Box<CallbackContext>,
    observer: Option<ObserverHandle>,
}

struct SourceState {
    active: AtomicBool,
    sender: Mutex<Option<EngineSender>>,
}

struct CallbackContext {
    state: Arc<SourceState>,
}

struct ObserverHandle {
    observer: AXObserverRef,
    app_element: AXUIElementRef,
}

unsafe impl Send for ObserverHandle {}

impl AxNotificationSource {
    /// Observe windows of the process with the given bundle id.
    pub fn new(bundle_id: impl Into<String>) -> Self {
        let state = Arc::new(SourceState {
            active: AtomicBool::new(false),
            sender: Mutex::new(None),
        });
        let context = Box::new(CallbackContext {
            state: Arc::clone(&state),
        });
        Self {
            bundle_id: bundle_id.into(),
            state,
            context,
            observer: None,
        }
    }
}

impl NotificationSource for AxNotificationSource {
    fn check_permission(&self) -> bool {
        ffi::is_trusted()
    }

    fn request_permission(&self) -> bool {
        ffi::is_trusted_with_prompt()
    }

    fn start(&mut self, events: EngineSender) -> EngineResult<()> {
        if self.observer.is_some() {
            debug!("Notification source already running");
            return Ok(());
        }

        let pid = find_process(&self.bundle_id).ok_or_else(|| {
            EngineError::SourceUnavailable(format!("process {} is not running", self.bundle_id))
        })?;
        debug!("Observing windows of {} (pid {})", self.bundle_id, pid);

        unsafe {
            let mut observer: AXObserverRef = ptr::null_mut();
            let err = ffi::AXObserverCreate(pid, window_created_callback, &mut observer);
            if err != ffi::kAXErrorSuccess || observer.is_null() {
                return Err(EngineError::SourceUnavailable(format!(
                    "could not observe pid {}: AXError {}",
                    pid, err
                )));
            }

            let app_element = ffi::AXUIElementCreateApplication(pid);
            if app_element.is_null() {
                CFRelease(observer as CFTypeRef);
                return Err(EngineError::SourceUnavailable(format!(
                    "no accessibility element for pid {}",
                    pid
                )));
            }

            // Open the publish gate before subscribing so no event can
            // arrive while it is closed
            *self.state.sender.lock() = Some(events);
            self.state.active.store(true, Ordering::SeqCst);

            let notification = CFString::new(WINDOW_CREATED);
            let refcon = &*self.context as *const CallbackContext as *mut c_void;
            let err = ffi::AXObserverAddNotification(
                observer,
                app_element,
                notification.as_concrete_TypeRef(),
                refcon,
            );
            if err != ffi::kAXErrorSuccess {
                self.state.active.store(false, Ordering::SeqCst);
                *self.state.sender.lock() = None;
                CFRelease(app_element as CFTypeRef);
                CFRelease(observer as CFTypeRef);
                return Err(EngineError::SourceUnavailable(format!(
                    "could not subscribe to window events: AXError {}",
                    err
                )));
            }

            let source =
                CFRunLoopSource::wrap_under_get_rule(ffi::AXObserverGetRunLoopSource(observer));
            CFRunLoop::get_main().add_source(&source, kCFRunLoopDefaultMode);

            self.observer = Some(ObserverHandle {
                observer,
                app_element,
            });
        }
        Ok(())
    }

    fn stop(&mut self) {
        // Close the gate first; a callback already past it still finds
        // the context alive
        self.state.active.store(false, Ordering::SeqCst);
        *self.state.sender.lock() = None;

        if let Some(handle) = self.observer.take() {
            unsafe {
                let source = CFRunLoopSource::wrap_under_get_rule(ffi::AXObserverGetRunLoopSource(
                    handle.observer,
                ));
                CFRunLoop::get_main().remove_source(&source, kCFRunLoopDefaultMode);

                let notification = CFString::new(WINDOW_CREATED);
                let err = ffi::AXObserverRemoveNotification(
                    handle.observer,
                    handle.app_element,
                    notification.as_concrete_TypeRef(),
                );
                if err != ffi::kAXErrorSuccess {
                    warn!("Failed to remove window observer: AXError {}", err);
                }
                CFRelease(handle.app_element as CFTypeRef);
                CFRelease(handle.observer as CFTypeRef);
            }
            debug!("Notification source stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.observer.is_some()
    }
}

impl Drop for AxNotificationSource {
    fn drop(&mut self) {
        self.stop();
    }
}

extern "C" fn window_created_callback(
    _observer: AXObserverRef,
    element: AXUIElementRef,
    _notification: CFStringRef,
    refcon: *mut c_void,
) {
    if refcon.is_null() || element.is_null() {
        return;
    }
    let context = unsafe { &*(refcon as *const CallbackContext) };
    if !context.state.active.load(Ordering::SeqCst) {
        return;
    }
    let element = unsafe { AxElement::from_borrowed(element) };
    if let Some(sender) = context.state.sender.lock().as_ref() {
        let _ = sender.send(EngineEvent::WindowCreated {
            element: Box::new(element),
        });
    }
}

/// Find the pid of a running application by bundle id.
fn find_process(bundle_id: &str) -> Option<i32> {
    unsafe {
        let workspace: *mut Object = msg_send![class!(NSWorkspace), sharedWorkspace];
        let apps: *mut Object = msg_send![workspace, runningApplications];
        let count: usize = msg_send![apps, count];
        for index in 0..count {
            let app: *mut Object = msg_send![apps, objectAtIndex: index];
            let bid: *mut Object = msg_send![app, bundleIdentifier];
            if nsstring_to_string(bid).as_deref() == Some(bundle_id) {
                let pid: i32 = msg_send![app, processIdentifier];
                return Some(pid);
            }
        }
    }
    None
}
