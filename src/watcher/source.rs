//! OS event source seams
//!
//! The coordinator owns both sources boxed behind these traits. Real
//! implementations subscribe to OS events and publish them through the
//! engine sender; in-memory implementations drive tests and development
//! on machines without the OS permissions.

use crate::core::error::EngineResult;
use crate::core::events::EngineSender;

/// Subscription to "window created" events in the notification-rendering
/// process.
///
/// Contracts shared by all implementations:
/// - `start` is idempotent; starting a running source is a no-op.
/// - `stop` is idempotent, must not block, and closes the publish gate:
///   once it returns, no further events reach the channel.
/// - Event publication never blocks the OS delivery thread.
pub trait NotificationSource: Send {
    /// Whether the process-trust permission is currently granted.
    fn check_permission(&self) -> bool;

    /// Ask the OS to prompt for the permission; returns the state after
    /// the request (the prompt itself is asynchronous).
    fn request_permission(&self) -> bool;

    /// Begin the subscription, publishing `WindowCreated` events.
    fn start(&mut self, events: EngineSender) -> EngineResult<()>;

    /// End the subscription.
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

/// Subscription to system-wide "application activated" events,
/// publishing `AppActivated` events. Same lifecycle contracts as
/// [`NotificationSource`]; no permission is required.
pub trait ForegroundSource: Send {
    fn start(&mut self, events: EngineSender) -> EngineResult<()>;

    fn stop(&mut self);

    fn is_running(&self) -> bool;
}
