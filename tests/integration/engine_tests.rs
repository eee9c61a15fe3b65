//! Engine integration tests
//!
//! Drive a full engine through scripted OS sources and the in-memory
//! capture backend, asserting on published status snapshots and on the
//! operations that actually reached the device.

use std::thread;
use std::time::{Duration, Instant};

use camlight::engine::testing::{
    ScriptedForegroundHandle, ScriptedForegroundSource, ScriptedNotificationSource,
    ScriptedSourceHandle,
};
use camlight::engine::{Engine, EngineAdapters};
use camlight::light::mock::{MockCaptureBackend, MockCaptureProbe};
use camlight::watcher::element::StaticElement;
use camlight::{EngineConfig, EngineHandle, EngineStatus, LightState, WatchListStore, WatchedApp};

struct TestEngine {
    handle: EngineHandle,
    source: ScriptedSourceHandle,
    foreground: ScriptedForegroundHandle,
    probe: MockCaptureProbe,
}

fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

fn spawn_engine(store: WatchListStore) -> TestEngine {
    init_tracing();
    let (source, source_handle) = ScriptedNotificationSource::new();
    let (foreground, foreground_handle) = ScriptedForegroundSource::new();
    let (capture, probe) = MockCaptureBackend::new();

    let handle = Engine::spawn(
        EngineConfig::default(),
        EngineAdapters {
            source: Box::new(source),
            foreground: Box::new(foreground),
            capture: Box::new(capture),
            store,
        },
    );

    TestEngine {
        handle,
        source: source_handle,
        foreground: foreground_handle,
        probe,
    }
}

fn engine_in(dir: &tempfile::TempDir, apps: &[(&str, &str)]) -> TestEngine {
    let engine = spawn_engine(WatchListStore::with_path(dir.path().join("watchlist.json")));
    for (id, name) in apps {
        engine.handle.add_app(WatchedApp::new(*id, *name));
    }
    engine
}

fn wait_status<F>(handle: &EngineHandle, f: F) -> EngineStatus
where
    F: Fn(&EngineStatus) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let status = handle.status();
        if f(&status) {
            return status;
        }
        assert!(
            Instant::now() < deadline,
            "timed out waiting for status, last: {:?}",
            status
        );
        thread::sleep(Duration::from_millis(5));
    }
}

/// A banner window whose body text sits one level below the window.
fn banner(text: &str) -> StaticElement {
    StaticElement::new().with_child(StaticElement::new().with_title(text))
}

#[test]
fn test_mail_and_slack_notification_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let fx = engine_in(
        &dir,
        &[
            ("com.apple.mail", "Mail"),
            ("com.tinyspeck.slackmacgap", "Slack"),
        ],
    );
    fx.handle.start_watching();
    wait_status(&fx.handle, |s| s.watching);

    // A Slack banner arrives and the light turns on
    assert!(fx.source.emit_window(banner("Slack: 3 new messages")));
    let status = wait_status(&fx.handle, |s| s.light.is_on() && !s.in_flight);
    assert_eq!(
        status.active_ids,
        vec!["com.tinyspeck.slackmacgap".to_string()]
    );

    // A Mail banner joins; the light is already on, so no device call
    assert!(fx.source.emit_window(banner("You have new Mail")));
    let status = wait_status(&fx.handle, |s| s.active_ids.len() == 2);
    assert_eq!(
        status.active_ids,
        vec![
            "com.apple.mail".to_string(),
            "com.tinyspeck.slackmacgap".to_string()
        ]
    );
    assert!(status.light.is_on());

    // Bringing Slack to the foreground acknowledges only Slack
    assert!(fx.foreground.activate("com.tinyspeck.slackmacgap"));
    let status = wait_status(&fx.handle, |s| s.active_ids.len() == 1);
    assert_eq!(status.active_ids, vec!["com.apple.mail".to_string()]);
    assert!(status.light.is_on());

    // Acknowledging Mail empties the set and the light goes off
    assert!(fx.foreground.activate("com.apple.mail"));
    let status = wait_status(&fx.handle, |s| !s.light.is_on() && !s.in_flight);
    assert!(status.active_ids.is_empty());

    // One physical toggle each way across the whole exchange
    assert_eq!(fx.probe.ops(), vec![LightState::On, LightState::Off]);
}

#[test]
fn test_deep_banner_text_beyond_scan_bound_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let fx = engine_in(
        &dir,
        &[
            ("com.example.mailer", "Mailer"),
            ("com.example.other", "Other"),
        ],
    );
    fx.handle.start_watching();
    wait_status(&fx.handle, |s| s.watching);

    // A title five hops below the root is past the scan bound; four
    // hops is not. Events process in order, so when the second one
    // lands the first has already been (not) matched
    assert!(fx
        .source
        .emit_window(StaticElement::nested(6, "New MAILER message")));
    assert!(fx
        .source
        .emit_window(StaticElement::nested(5, "Other: one ping")));

    let status = wait_status(&fx.handle, |s| !s.active_ids.is_empty());
    assert_eq!(status.active_ids, vec!["com.example.other".to_string()]);
}

#[test]
fn test_unrelated_events_cause_no_activity() {
    let dir = tempfile::tempdir().unwrap();
    let fx = engine_in(&dir, &[("com.apple.mail", "Mail")]);
    fx.handle.start_watching();
    wait_status(&fx.handle, |s| s.watching);

    // None of these involve a watched app
    assert!(fx.source.emit_window(banner("Discord: ping")));
    assert!(fx.foreground.activate("com.hnc.Discord"));
    assert!(fx.foreground.activate_unresolved());

    // A matching banner afterwards bounds the wait
    assert!(fx.source.emit_window(banner("You have new Mail")));
    let status = wait_status(&fx.handle, |s| s.light.is_on() && !s.in_flight);
    assert_eq!(status.active_ids, vec!["com.apple.mail".to_string()]);
    assert_eq!(fx.probe.ops(), vec![LightState::On]);
}

#[test]
fn test_watch_cycle_restart() {
    let dir = tempfile::tempdir().unwrap();
    let fx = engine_in(&dir, &[("com.apple.mail", "Mail")]);
    fx.handle.start_watching();
    wait_status(&fx.handle, |s| s.watching);

    assert!(fx.source.emit_window(banner("You have new Mail")));
    wait_status(&fx.handle, |s| s.light.is_on() && !s.in_flight);

    // Stopping clears the activation set and turns the light off
    fx.handle.stop_watching();
    let status = wait_status(&fx.handle, |s| {
        !s.watching && !s.light.is_on() && !s.in_flight
    });
    assert!(status.active_ids.is_empty());

    // A stopped source publishes nothing
    assert!(!fx.source.emit_window(banner("You have new Mail")));

    // Watching again picks up fresh notifications
    fx.handle.start_watching();
    wait_status(&fx.handle, |s| s.watching);
    assert!(fx.source.emit_window(banner("You have new Mail")));
    let status = wait_status(&fx.handle, |s| s.light.is_on() && !s.in_flight);
    assert_eq!(status.active_ids, vec!["com.apple.mail".to_string()]);
}

#[test]
fn test_light_settles_to_final_state_under_burst() {
    let dir = tempfile::tempdir().unwrap();
    let fx = engine_in(
        &dir,
        &[
            ("com.apple.mail", "Mail"),
            ("com.tinyspeck.slackmacgap", "Slack"),
        ],
    );
    fx.handle.start_watching();
    wait_status(&fx.handle, |s| s.watching);

    // Block the device mid-operation, then run a full notify/ack burst
    fx.probe.hold_ops();
    assert!(fx.source.emit_window(banner("You have new Mail")));
    // Give the worker time to claim the first request and block
    thread::sleep(Duration::from_millis(50));
    assert!(fx.source.emit_window(banner("Slack: hey")));
    assert!(fx.foreground.activate("com.apple.mail"));
    assert!(fx.foreground.activate("com.tinyspeck.slackmacgap"));
    fx.probe.release_ops();

    // The light settles to the final emptiness of the set
    let status = wait_status(&fx.handle, |s| !s.light.is_on() && !s.in_flight);
    assert!(status.active_ids.is_empty());
    assert!(!fx.probe.running());
    assert_eq!(fx.probe.ops(), vec![LightState::On, LightState::Off]);
}

#[test]
fn test_watch_list_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("watchlist.json");

    let first = spawn_engine(WatchListStore::with_path(path.clone()));
    first
        .handle
        .add_app(WatchedApp::new("com.apple.mail", "Mail"));
    first
        .handle
        .add_app(WatchedApp::new("com.tinyspeck.slackmacgap", "Slack"));
    wait_status(&first.handle, |s| s.watched_apps.len() == 2);
    first.handle.shutdown();

    // A fresh engine on the same store loads the list in order
    let second = spawn_engine(WatchListStore::with_path(path));
    let status = wait_status(&second.handle, |s| s.watched_apps.len() == 2);
    let ids: Vec<&str> = status.watched_apps.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["com.apple.mail", "com.tinyspeck.slackmacgap"]);
}

#[test]
fn test_status_stream_signals_changes() {
    let dir = tempfile::tempdir().unwrap();
    let fx = spawn_engine(WatchListStore::with_path(dir.path().join("watchlist.json")));
    let mut stream = fx.handle.status_stream();
    // Mark the spawn-time snapshot seen so changed() waits for the next
    // publish
    assert!(stream.borrow_and_update().watched_apps.is_empty());

    let mut changed = tokio_test::task::spawn(stream.changed());
    tokio_test::assert_pending!(changed.poll());

    fx.handle.add_app(WatchedApp::new("com.apple.mail", "Mail"));

    let deadline = Instant::now() + Duration::from_secs(2);
    while !changed.is_woken() {
        assert!(Instant::now() < deadline, "status change never signalled");
        thread::sleep(Duration::from_millis(5));
    }
    tokio_test::assert_ready_ok!(changed.poll());
    drop(changed);
    assert_eq!(stream.borrow_and_update().watched_apps.len(), 1);
}
