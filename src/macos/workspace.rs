//! Foreground application tracking
//!
//! Subscribes to NSWorkspace activation notifications through a small
//! Objective-C observer class and forwards each activation to the
//! engine with the app's pid and bundle id.

use std::os::raw::c_void;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cocoa::base::{id, nil};
use objc::declare::ClassDecl;
use objc::runtime::{Class, Object, Sel};
use objc::{class, msg_send, sel, sel_impl};
use parking_lot::Mutex;
use tracing::debug;

use super::nsstring_to_string;
use crate::core::error::EngineResult;
use crate::core::events::{AppActivation, EngineEvent, EngineSender};
use crate::watcher::source::ForegroundSource;

#[allow(non_upper_case_globals)]
#[link(name = "AppKit", kind = "framework")]
extern "C" {
    static NSWorkspaceDidActivateApplicationNotification: id;
    static NSWorkspaceApplicationKey: id;
}

const OBSERVER_CLASS: &str = "CamLightWorkspaceObserver";
const CONTEXT_IVAR: &str = "_context";

/// App-activated events from NSWorkspace
pub struct WorkspaceTracker {
    state: Arc<ForegroundState>,
    // Ivar target of the observer instance; outlives any late delivery
    context: Box<ForegroundContext>,
    observer: Option<ObserverPtr>,
}

struct ForegroundState {
    active: AtomicBool,
    sender: Mutex<Option<EngineSender>>,
}

struct ForegroundContext {
    state: Arc<ForegroundState>,
}

struct ObserverPtr(id);
unsafe impl Send for ObserverPtr {}

impl WorkspaceTracker {
    pub fn new() -> Self {
        let state = Arc::new(ForegroundState {
            active: AtomicBool::new(false),
            sender: Mutex::new(None),
        });
        let context = Box::new(ForegroundContext {
            state: Arc::clone(&state),
        });
        Self {
            state,
            context,
            observer: None,
        }
    }
}

impl Default for WorkspaceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ForegroundSource for WorkspaceTracker {
    fn start(&mut self, events: EngineSender) -> EngineResult<()> {
        if self.observer.is_some() {
            debug!("Workspace tracker already running");
            return Ok(());
        }

        *self.state.sender.lock() = Some(events);
        self.state.active.store(true, Ordering::SeqCst);

        unsafe {
            let observer: id = msg_send![observer_class(), new];
            let context = &*self.context as *const ForegroundContext as *mut c_void;
            (*observer).set_ivar(CONTEXT_IVAR, context);

            let workspace: id = msg_send![class!(NSWorkspace), sharedWorkspace];
            let center: id = msg_send![workspace, notificationCenter];
            let _: () = msg_send![center, addObserver:observer
                                             selector:sel!(appDidActivate:)
                                                 name:NSWorkspaceDidActivateApplicationNotification
                                               object:nil];
            self.observer = Some(ObserverPtr(observer));
        }
        debug!("Workspace tracker started");
        Ok(())
    }

    fn stop(&mut self) {
        self.state.active.store(false, Ordering::SeqCst);
        *self.state.sender.lock() = None;

        if let Some(ObserverPtr(observer)) = self.observer.take() {
            unsafe {
                let workspace: id = msg_send![class!(NSWorkspace), sharedWorkspace];
                let center: id = msg_send![workspace, notificationCenter];
                let _: () = msg_send![center, removeObserver: observer];
                let _: () = msg_send![observer, release];
            }
            debug!("Workspace tracker stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.observer.is_some()
    }
}

impl Drop for WorkspaceTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

extern "C" fn app_did_activate(this: &Object, _cmd: Sel, notification: id) {
    unsafe {
        let context: *mut c_void = *this.get_ivar(CONTEXT_IVAR);
        if context.is_null() {
            return;
        }
        let context = &*(context as *const ForegroundContext);
        if !context.state.active.load(Ordering::SeqCst) {
            return;
        }

        let user_info: id = msg_send![notification, userInfo];
        if user_info == nil {
            return;
        }
        let app: id = msg_send![user_info, objectForKey: NSWorkspaceApplicationKey];
        if app == nil {
            return;
        }
        let pid: i32 = msg_send![app, processIdentifier];
        let bundle: id = msg_send![app, bundleIdentifier];
        let activation = AppActivation {
            process_id: pid,
            bundle_id: nsstring_to_string(bundle),
        };

        if let Some(sender) = context.state.sender.lock().as_ref() {
            let _ = sender.send(EngineEvent::AppActivated { activation });
        }
    }
}

fn observer_class() -> &'static Class {
    if let Some(existing) = Class::get(OBSERVER_CLASS) {
        return existing;
    }

    let superclass = class!(NSObject);
    let mut decl = ClassDecl::new(OBSERVER_CLASS, superclass)
        .expect("Failed to create workspace observer class");
    decl.add_ivar::<*mut c_void>(CONTEXT_IVAR);
    unsafe {
        decl.add_method(
            sel!(appDidActivate:),
            app_did_activate as extern "C" fn(&Object, Sel, id),
        );
    }
    decl.register()
}
