use towersim::time::{MINUTES_PER_DAY, SimTime, minutes_to_clock, sunlight};

#[test]
fn clock_labels_use_twelve_hours() {
    let cases = [
        (0, "12:00 AM"),
        (59, "12:59 AM"),
        (65, "01:05 AM"),
        (719, "11:59 AM"),
        (720, "12:00 PM"),
        (779, "12:59 PM"),
        (1439, "11:59 PM"),
        (1440, "12:00 AM"),
    ];
    for (minute, label) in cases {
        assert_eq!(minutes_to_clock(minute), label, "minute {minute}");
    }
}

#[test]
fn display_includes_day_number() {
    assert_eq!(SimTime::new(0, 365).to_string(), "Day 1 06:05 AM");
    assert_eq!(SimTime::new(2, 1380).to_string(), "Day 3 11:00 PM");
}

#[test]
fn advance_wraps_into_next_day() {
    let mut time = SimTime::new(0, 1430);
    assert!(!time.advance(5));
    assert_eq!(time, SimTime { day: 0, minute: 1435 });

    assert!(time.advance(5));
    assert_eq!(time, SimTime { day: 1, minute: 0 });
    assert_eq!(time.minute_of_simulation(), MINUTES_PER_DAY as u64);

    assert!(time.advance(3000));
    assert_eq!(time, SimTime { day: 3, minute: 120 });
    assert_eq!(time.minute_of_simulation(), 3 * 1440 + 120);
}

#[test]
fn new_normalizes_overflowing_minutes() {
    assert_eq!(SimTime::new(0, 1500), SimTime { day: 1, minute: 60 });
}

#[test]
fn sunlight_follows_day_and_night_arcs() {
    let sunrise = sunlight(360);
    assert!(sunrise.is_day);
    assert!(sunrise.sun_altitude.abs() < 1e-9);
    assert!((sunrise.brightness - 0.25).abs() < 1e-9);

    // Midway between 06:00 and 19:00.
    let noon = sunlight(750);
    assert!(noon.is_day);
    assert!((noon.sun_altitude - 1.0).abs() < 1e-9);
    assert!((noon.brightness - 1.0).abs() < 1e-9);

    // Midway between 19:00 and 06:00.
    let midnight = sunlight(30);
    assert!(!midnight.is_day);
    assert!((midnight.sun_altitude + 1.0).abs() < 1e-9);
    assert!((midnight.brightness - 0.30).abs() < 1e-9);

    for minute in 0..MINUTES_PER_DAY {
        let light = sunlight(minute);
        assert_eq!(light.is_day, (360..=1140).contains(&minute), "minute {minute}");
        assert!((0.05 - 1e-9..=1.0 + 1e-9).contains(&light.brightness));
        if light.is_day {
            assert!(light.sun_altitude >= -1e-9);
        } else {
            assert!(light.sun_altitude <= 1e-9);
        }
    }
}
