//! StreamRegistry lifecycle tests
//!
//! Handles, loading, closing and the behaviour of operations on handles that
//! do not (or no longer) resolve to a stream.

mod helpers;

use helpers::scripted::chunk_value;
use helpers::{samples, test_config, wait_until, Script, ScriptedBackend, WAIT};
use std::time::{Duration, Instant};
use vxa_player::{Error, StreamHandle, StreamRegistry, StreamState};

fn scripted_registry(script: Script) -> StreamRegistry<ScriptedBackend> {
    StreamRegistry::new(ScriptedBackend::new(script), test_config()).unwrap()
}

fn occupancy(registry: &StreamRegistry<ScriptedBackend>, handle: StreamHandle) -> usize {
    registry
        .stream_stats(handle)
        .map_or(0, |stats| stats.occupancy)
}

#[test]
fn test_load_starts_paused_with_worker() {
    let registry = scripted_registry(Script::default());
    let handle = registry.load("song.ogg", false);

    assert!(handle.is_valid());
    assert_eq!(registry.state(handle), Some(StreamState::Paused));
    assert!(registry.is_paused(handle));
    assert!(!registry.is_playing(handle));
    assert!((registry.length(handle) - 2.0).abs() < 1e-4);
    assert_eq!(registry.stream_count(), 1);
    assert_eq!(registry.active_workers(), 1);
    assert_eq!(registry.volume(handle), 100.0);

    // Paused streams do not decode
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(occupancy(&registry, handle), 0);
}

#[test]
fn test_missing_file_returns_invalid_without_worker() {
    let registry = scripted_registry(Script::default());

    let handle = registry.load("missing.ogg", false);
    assert_eq!(handle, StreamHandle::INVALID);
    assert_eq!(registry.active_workers(), 0);
    assert_eq!(registry.stream_count(), 0);
    assert_eq!(registry.backend().sinks_opened(), 0);

    let result = registry.try_load("missing.ogg", false);
    assert!(matches!(result, Err(Error::Open(_))));
}

#[test]
fn test_missing_file_on_default_backend() {
    let registry = StreamRegistry::with_config(test_config()).unwrap();

    let handle = registry.load("/nonexistent/dir/missing.mp3", false);
    assert!(!handle.is_valid());
    assert_eq!(registry.active_workers(), 0);
    assert_eq!(registry.stream_count(), 0);
}

#[test]
fn test_invalid_handle_operations_are_inert() {
    let registry = scripted_registry(Script::default());
    let handle = StreamHandle::INVALID;

    registry.play(handle, true);
    registry.pause(handle);
    registry.stop(handle);
    registry.set_position(handle, 3.0);
    registry.set_volume(handle, 50.0);
    registry.set_max_volume(handle, 50.0);
    registry.fade(handle, 0.0, 1.0);
    registry.fade_and_close(handle, 0.0, 1.0);
    registry.cancel_fade(handle);
    registry.close(handle);
    registry.update();

    assert_eq!(registry.length(handle), 0.0);
    assert_eq!(registry.position(handle), 0.0);
    assert_eq!(registry.volume(handle), 0.0);
    assert!(!registry.is_playing(handle));
    assert!(!registry.is_paused(handle));
    assert!(!registry.is_finished(handle));
    assert!(!registry.is_fading(handle));
    assert_eq!(registry.state(handle), None);
    assert_eq!(registry.stream_stats(handle), None);
}

#[test]
fn test_double_close_and_ops_on_closed_handle() {
    let registry = scripted_registry(Script::default());
    let handle = registry.load("song.ogg", false);
    let probe = registry.backend().last_probe();
    registry.play(handle, false);

    registry.close(handle);
    registry.close(handle);
    assert!(matches!(
        registry.state(handle),
        None | Some(StreamState::Closing) | Some(StreamState::Closed)
    ));

    assert!(wait_until(WAIT, || registry.state(handle).is_none()));
    assert!(probe.is_closed());
    assert!(wait_until(WAIT, || registry.active_workers() == 0));

    registry.close(handle);
    registry.play(handle, false);
    registry.set_position(handle, 1.0);
    registry.set_volume(handle, 10.0);
    registry.fade_and_stop(handle, 0.0, 0.1);

    assert!(!registry.is_playing(handle));
    assert!(!registry.is_paused(handle));
    assert_eq!(registry.position(handle), 0.0);
    assert_eq!(registry.length(handle), 0.0);
    assert_eq!(registry.stream_count(), 0);
}

#[test]
fn test_close_does_not_wait_for_device_teardown() {
    let script = Script {
        close_delay: Duration::from_millis(500),
        ..Script::default()
    };
    let registry = scripted_registry(script);
    let handle = registry.load("song.ogg", false);
    let probe = registry.backend().last_probe();
    registry.play(handle, false);

    let started = Instant::now();
    registry.close(handle);
    assert!(
        started.elapsed() < Duration::from_millis(100),
        "close blocked for {:?}",
        started.elapsed()
    );
    assert_eq!(registry.state(handle), Some(StreamState::Closing));
    assert!(!probe.is_closed());
    assert_eq!(registry.stream_count(), 0);

    // Other streams stay usable while the device shuts down
    let other = registry.load("other.ogg", false);
    registry.play(other, false);
    assert!(registry.is_playing(other));
    assert_eq!(registry.state(handle), Some(StreamState::Closing));

    assert!(wait_until(WAIT, || registry.state(handle).is_none()));
    assert!(probe.is_closed());
    assert!(started.elapsed() >= Duration::from_millis(500));
}

#[test]
fn test_closing_stream_ignores_commands() {
    let registry = scripted_registry(Script::default());
    let handle = registry.load("song.ogg", false);

    registry.close(handle);
    // Whether teardown has finished or not, the stream never plays again
    registry.play(handle, false);
    assert!(!registry.is_playing(handle));
    assert_eq!(registry.stream_count(), 0);
}

#[test]
fn test_handles_are_not_reused() {
    let registry = scripted_registry(Script::default());
    let first = registry.load("a.ogg", false);
    registry.close(first);
    assert!(wait_until(WAIT, || registry.state(first).is_none()));

    let second = registry.load("b.ogg", false);
    assert!(second.is_valid());
    assert_ne!(first, second);

    // The stale handle must not reach the new stream
    registry.play(first, false);
    assert!(registry.is_paused(second));
    assert!(!registry.is_playing(second));
}

#[test]
fn test_shutdown_closes_everything_and_joins_workers() {
    let registry = scripted_registry(Script::default());
    let handles: Vec<_> = (0..3).map(|i| registry.load(format!("song{}.ogg", i), false)).collect();
    for &handle in &handles {
        registry.play(handle, true);
    }
    assert_eq!(registry.stream_count(), 3);
    assert_eq!(registry.active_workers(), 3);

    registry.shutdown();

    assert_eq!(registry.stream_count(), 0);
    assert_eq!(registry.active_workers(), 0);
    for handle in handles {
        assert_eq!(registry.state(handle), None);
    }
}

#[test]
fn test_load_play_fade_and_stop() {
    let registry = scripted_registry(Script::default());
    let handle = registry.load("song.ogg", false);
    let probe = registry.backend().last_probe();

    registry.play(handle, false);
    assert!(registry.is_playing(handle));
    assert!(probe.is_playing());
    assert!(wait_until(WAIT, || occupancy(&registry, handle) >= 1600));

    let start = Instant::now();
    registry.fade_and_stop(handle, 0.0, 0.5);
    assert!(registry.is_fading(handle));

    // Volume falls monotonically while the fade runs
    let mut previous = registry.volume(handle);
    for step in 1..5u64 {
        registry.update_at(start + Duration::from_millis(step * 50));
        let volume = registry.volume(handle);
        assert!(volume <= previous, "volume rose from {} to {}", previous, volume);
        previous = volume;
    }

    registry.update_at(start + Duration::from_millis(250));
    let halfway = registry.volume(handle);
    assert!((45.0..=60.0).contains(&halfway), "halfway volume {}", halfway);

    // Output is scaled by the fade
    let (out, read) = probe.pull(800);
    assert_eq!(read, 800);
    let value = samples(&out)[0];
    let full = chunk_value(0) as f32;
    assert!((value as f32) < full * 0.65 && (value as f32) > full * 0.4, "sample {}", value);

    registry.update_at(start + Duration::from_secs(1));
    assert!(!registry.is_fading(handle));
    assert_eq!(registry.volume(handle), 0.0);
    assert!(!registry.is_playing(handle));

    assert!(wait_until(WAIT, || registry.state(handle) == Some(StreamState::Paused)));
    assert_eq!(registry.position(handle), 0.0);
    assert!(probe.pause_calls() >= 1);
}

#[test]
fn test_fade_and_pause_keeps_position() {
    let registry = scripted_registry(Script::default());
    let handle = registry.load("song.ogg", false);
    registry.play(handle, false);

    let start = Instant::now();
    registry.fade_and_pause(handle, 0.0, 0.1);
    registry.update_at(start + Duration::from_millis(500));

    assert_eq!(registry.state(handle), Some(StreamState::Paused));
    assert_eq!(registry.volume(handle), 0.0);
    let frozen = registry.position(handle);
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(registry.position(handle), frozen);
}

#[test]
fn test_fade_and_close_removes_stream() {
    let registry = scripted_registry(Script::default());
    let handle = registry.load("song.ogg", false);
    let probe = registry.backend().last_probe();
    registry.play(handle, false);

    registry.fade_and_close(handle, 0.0, 0.0);
    registry.update();

    assert!(wait_until(WAIT, || registry.state(handle).is_none()));
    assert!(probe.is_closed());
    assert!(wait_until(WAIT, || registry.active_workers() == 0));
}

#[test]
fn test_set_volume_cancels_fade() {
    let registry = scripted_registry(Script::default());
    let handle = registry.load("song.ogg", false);

    registry.fade(handle, 0.0, 10.0);
    assert!(registry.is_fading(handle));
    registry.set_volume(handle, 30.0);
    assert!(!registry.is_fading(handle));
    assert!((registry.volume(handle) - 30.0).abs() < 1e-3);

    registry.fade(handle, 100.0, 10.0);
    registry.cancel_fade(handle);
    assert!(!registry.is_fading(handle));
    assert!((registry.volume(handle) - 30.0).abs() < 1e-3);
}

#[test]
fn test_volume_percent_is_clamped() {
    let registry = scripted_registry(Script::default());
    let handle = registry.load("song.ogg", false);

    registry.set_volume(handle, 250.0);
    assert_eq!(registry.volume(handle), 100.0);
    registry.set_volume(handle, -20.0);
    assert_eq!(registry.volume(handle), 0.0);
}

#[test]
fn test_global_volume_scales_new_and_existing_streams() {
    let registry = scripted_registry(Script::default());
    let existing = registry.load("a.ogg", false);
    let existing_probe = registry.backend().last_probe();

    registry.set_global_volume(50.0);
    assert_eq!(registry.global_volume(), 50.0);

    let fresh = registry.load("b.ogg", false);
    let fresh_probe = registry.backend().last_probe();

    for (handle, probe) in [(existing, existing_probe), (fresh, fresh_probe)] {
        registry.play(handle, false);
        assert!(wait_until(WAIT, || occupancy(&registry, handle) >= 800));
        let (out, read) = probe.pull(800);
        assert_eq!(read, 800);
        assert!(samples(&out).iter().all(|&v| v == chunk_value(0) / 2));
    }
}

#[test]
fn test_max_volume_scales_output() {
    let registry = scripted_registry(Script::default());
    let handle = registry.load("a.ogg", false);
    let probe = registry.backend().last_probe();

    registry.set_max_volume(handle, 25.0);
    registry.play(handle, false);
    assert!(wait_until(WAIT, || occupancy(&registry, handle) >= 800));

    let (out, _) = probe.pull(800);
    assert!(samples(&out).iter().all(|&v| v == chunk_value(0) / 4));
}
