mod common;

use common::{TRIP, load};
use std::thread;
use std::time::{Duration, Instant};
use towersim::{Engine, Runtime, RuntimeError, Speed};

fn runtime() -> Runtime {
    Runtime::new(Engine::new(load(TRIP)).expect("failed to create engine"))
}

/// Poll the published snapshot until `done` holds or a few seconds pass.
fn wait_for(runtime: &Runtime, done: impl Fn(u64) -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if let Ok(snapshot) = runtime.get_snapshot()
            && done(snapshot.tick)
        {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn no_snapshot_before_first_tick() {
    let mut runtime = runtime();
    assert_eq!(runtime.get_snapshot().unwrap_err(), RuntimeError::NotReady);
    assert_eq!(runtime.advance(0).unwrap_err(), RuntimeError::NotReady);

    let snapshot = runtime.advance(1).expect("failed to advance");
    assert_eq!(snapshot.tick, 1);
    assert_eq!(snapshot.speed, Some(Speed::Normal));
}

#[test]
fn snapshots_are_stable_between_ticks() {
    let mut runtime = runtime();
    runtime.advance(3).expect("failed to advance");
    let first = runtime.get_snapshot().expect("snapshot");
    let second = runtime.get_snapshot().expect("snapshot");
    assert_eq!(first, second);
    assert_eq!(first.tick, runtime.with_engine(|engine| engine.tick()));
}

#[test]
fn unknown_speed_is_rejected() {
    let mut runtime = runtime();
    runtime.set_speed("slow").expect("slow is a valid speed");

    let error = runtime.set_speed("warp").unwrap_err();
    assert_eq!(
        error,
        RuntimeError::UnknownSpeed {
            level: "warp".to_string()
        }
    );
    assert_eq!(runtime.speed(), Speed::Slow);

    let snapshot = runtime.advance(1).expect("failed to advance");
    assert_eq!(snapshot.speed, Some(Speed::Slow));

    assert_eq!(runtime.set_speed(" FAST "), Ok(Speed::Fast));
    assert_eq!(runtime.get_snapshot().expect("snapshot").speed, Some(Speed::Fast));
}

#[test]
fn speed_levels_parse() {
    for speed in Speed::ALL {
        assert_eq!(speed.as_str().parse::<Speed>(), Ok(speed));
        assert_eq!(speed.to_string().to_uppercase().parse::<Speed>(), Ok(speed));
    }
    assert!("".parse::<Speed>().is_err());
}

#[test]
fn start_and_stop() {
    let mut runtime = runtime();
    runtime.set_speed("fast").expect("fast is a valid speed");
    runtime.start().expect("failed to start");
    assert!(runtime.is_running());
    assert_eq!(runtime.start().unwrap_err(), RuntimeError::AlreadyRunning);
    assert_eq!(runtime.advance(1).unwrap_err(), RuntimeError::AlreadyRunning);

    assert!(wait_for(&runtime, |tick| tick >= 3), "loop never ticked");

    runtime.stop().expect("failed to stop");
    assert!(!runtime.is_running());
    assert_eq!(runtime.stop().unwrap_err(), RuntimeError::NotRunning);

    let stopped = runtime.get_snapshot().expect("snapshot").tick;
    thread::sleep(Duration::from_millis(50));
    assert_eq!(runtime.get_snapshot().expect("snapshot").tick, stopped);

    // The engine is still usable after the loop exits.
    let snapshot = runtime.advance(1).expect("failed to advance");
    assert_eq!(snapshot.tick, stopped + 1);
}

#[test]
fn paused_loop_waits_for_speed_change() {
    let mut runtime = runtime();
    runtime.set_speed("paused").expect("paused is a valid speed");
    runtime.start().expect("failed to start");

    thread::sleep(Duration::from_millis(50));
    assert_eq!(runtime.get_snapshot().unwrap_err(), RuntimeError::NotReady);

    runtime.set_speed("fast").expect("fast is a valid speed");
    assert!(wait_for(&runtime, |tick| tick >= 1), "loop never resumed");
    assert_eq!(runtime.get_snapshot().expect("snapshot").speed, Some(Speed::Fast));

    runtime.stop().expect("failed to stop");
}

#[test]
fn dropping_a_running_runtime_stops_the_loop() {
    let mut runtime = runtime();
    runtime.set_speed("fast").expect("fast is a valid speed");
    runtime.start().expect("failed to start");
    assert!(wait_for(&runtime, |tick| tick >= 1));
    drop(runtime);
}

#[test]
fn frequent_speed_changes_do_not_stall_the_loop() {
    let mut runtime = runtime();
    runtime.set_speed("fast").expect("fast is a valid speed");
    runtime.start().expect("failed to start");

    // Re-send the speed more often than the 5 ms tick interval.
    let until = Instant::now() + Duration::from_millis(300);
    while Instant::now() < until {
        runtime.set_speed("fast").expect("fast is a valid speed");
        thread::sleep(Duration::from_millis(1));
    }
    runtime.stop().expect("failed to stop");

    let ticks = runtime.get_snapshot().map_or(0, |snapshot| snapshot.tick);
    assert!(ticks >= 5, "only {ticks} ticks while the speed kept changing");
}
