mod common;

use common::{CROWD, TRIP, check_tick, load};
use std::sync::Arc;
use towersim::building::Place;
use towersim::events::EventKind;
use towersim::persona::ActivityKind;
use towersim::resident::{Status, Whereabouts};
use towersim::snapshot::LocationType;
use towersim::time::TICKS_PER_DAY;
use towersim::{Config, Engine};

#[test]
fn builtin_day_keeps_invariants() {
    let mut engine = Engine::new(Config::builtin().expect("failed to load builtin config"))
        .expect("failed to create engine");
    assert!(engine.config_warnings().is_empty(), "{:?}", engine.config_warnings());

    let mut prev = engine.snapshot();
    for _ in 0..TICKS_PER_DAY + 12 {
        engine.step();
        let next = engine.snapshot();
        check_tick(&prev, &next);
        prev = next;
    }

    assert_eq!(prev.time.day, 1);
    assert_eq!(prev.day_stats.day, 1);
    for resident in engine.residents() {
        resident
            .schedule
            .check_coverage()
            .expect("regenerated schedule must cover the day");
    }
}

#[test]
fn builtin_day_moves_people() {
    let mut engine = Engine::new(Config::builtin().expect("failed to load builtin config"))
        .expect("failed to create engine");

    let mut boardings = 0;
    let mut seen_work = false;
    let mut seen_sleep = false;
    for _ in 0..TICKS_PER_DAY - 1 {
        engine.step();
        let snapshot = engine.snapshot();
        boardings = boardings.max(snapshot.day_stats.boardings);
        seen_work |= snapshot.count(ActivityKind::Work) > 0;
        seen_sleep |= snapshot.count(ActivityKind::Sleep) > 0;
    }

    assert!(boardings > 0, "nobody used the elevator");
    assert!(seen_work);
    assert!(seen_sleep);
    assert!(engine.events().total() > 0);
    assert!(engine.events().len() <= engine.config().events.retention);
}

#[test]
fn same_seed_same_run() {
    let run = || {
        let mut engine = Engine::new(Config::builtin().expect("failed to load builtin config"))
            .expect("failed to create engine");
        engine.run_ticks(150);
        engine.snapshot()
    };

    let first = run();
    let second = run();
    assert_eq!(first.events, second.events);
    assert_eq!(first.residents, second.residents);
    assert_eq!(first, second);
}

#[test]
fn different_seed_different_population() {
    let mut cfg = Config::builtin().expect("failed to load builtin config");
    let first = Engine::new(cfg.clone()).expect("failed to create engine");
    cfg.seed += 1;
    let second = Engine::new(cfg).expect("failed to create engine");

    let names = |engine: &Engine| {
        engine
            .residents()
            .iter()
            .map(|resident| resident.name.clone())
            .collect::<Vec<_>>()
    };
    assert_ne!(names(&first), names(&second));
}

#[test]
fn amenity_trip_across_floors() {
    let mut engine = Engine::new(load(TRIP)).expect("failed to create engine");
    let studio = engine
        .building()
        .amenity_by_name("Studio")
        .expect("studio exists")
        .id;
    assert_eq!(engine.residents().len(), 2);

    let mut prev = engine.snapshot();
    let mut reached = vec![None; 2];
    let mut returned = vec![None; 2];
    let mut rode = vec![false; 2];

    while engine.clock().minute < 780 {
        engine.step();
        let next = engine.snapshot();
        check_tick(&prev, &next);
        prev = next;

        let minute = engine.clock().minute;
        for (idx, resident) in engine.residents().iter().enumerate() {
            rode[idx] |= resident.status == Status::InElevator;
            let at_studio = resident.whereabouts == Whereabouts::At(Place::Amenity(studio));
            if resident.status == Status::InEvent && at_studio && reached[idx].is_none() {
                assert!(minute >= 600);
                reached[idx] = Some(minute);
            }
            let at_home = resident.whereabouts == Whereabouts::At(resident.home_place());
            if resident.status == Status::InEvent
                && at_home
                && reached[idx].is_some()
                && returned[idx].is_none()
            {
                assert!(minute >= 660);
                returned[idx] = Some(minute);
            }
        }
    }

    for idx in 0..2 {
        let reached = reached[idx].expect("resident never reached the studio");
        assert!(reached < 660, "reached the studio at minute {reached}");
        let returned = returned[idx].expect("resident never came home");
        assert!(returned <= 720, "came home at minute {returned}");
        assert!(rode[idx]);
    }

    let resident = &engine.residents()[0];
    assert_eq!(resident.activity, ActivityKind::AtHome);
    assert_eq!(resident.floor, 1);

    let descriptions: Vec<&str> = engine
        .events()
        .iter()
        .filter(|event| event.resident == Some(resident.id))
        .map(|event| event.description.as_str())
        .collect();
    assert!(descriptions.contains(&"Waiting for elevator to 03"));
    assert!(descriptions.contains(&"Boarded elevator to 03"));
    assert!(descriptions.contains(&"Arrived on floor 03"));
    assert!(descriptions.contains(&"Studio session"));
    assert!(descriptions.contains(&"Left Studio"));
    assert!(descriptions.contains(&"Arrived on floor 01"));
}

#[test]
fn crowding_fires_once() {
    let mut engine = Engine::new(load(CROWD)).expect("failed to create engine");
    assert_eq!(engine.residents().len(), 5);

    let mut prev = engine.snapshot();
    let mut peak = 0;
    while engine.clock().minute < 700 {
        engine.step();
        let next = engine.snapshot();
        check_tick(&prev, &next);

        let present = next
            .residents
            .iter()
            .filter(|resident| resident.status == Status::InEvent && resident.location == "Nook")
            .count();
        assert_eq!(next.amenity_occupancy["Nook"], present, "at {}", next.time);
        assert!(present <= 5);
        peak = peak.max(present);
        prev = next;
    }

    assert_eq!(peak, 5);
    let crowding: Vec<_> = engine
        .events()
        .iter()
        .filter(|event| event.kind == EventKind::Crowding)
        .collect();
    assert_eq!(crowding.len(), 1, "{crowding:?}");
    assert_eq!(crowding[0].location, "Nook");
    assert_eq!(engine.day_stats().crowding_events, 1);
    assert_eq!(engine.day_stats().peak_occupancy["Nook"], 5);
    assert_eq!(engine.snapshot().amenity_occupancy["Nook"], 0);
}

#[test]
fn crowding_hurts_mood() {
    let mut engine = Engine::new(load(CROWD)).expect("failed to create engine");
    while engine.clock().minute < 600 {
        engine.step();
    }
    let before: Vec<f64> = engine.residents().iter().map(|r| r.mood).collect();
    while engine.clock().minute < 650 {
        engine.step();
    }
    for (resident, before) in engine.residents().iter().zip(before) {
        assert!(resident.mood < before, "{} {} >= {before}", resident.id, resident.mood);
    }
}

#[test]
fn snapshot_is_stable_between_ticks() {
    let mut engine = Engine::new(load(TRIP)).expect("failed to create engine");
    engine.run_ticks(14);
    assert_eq!(engine.snapshot(), engine.snapshot());
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.clock, "Day 1 10:10 AM");
    assert_eq!(snapshot.minute_of_simulation, 610);
}

#[test]
fn snapshot_carries_building_outline() {
    let mut engine = Engine::new(load(TRIP)).expect("failed to create engine");
    let first = engine.snapshot();
    engine.step();
    let second = engine.snapshot();
    assert!(Arc::ptr_eq(&first.building, &second.building));

    let outline = &first.building;
    assert_eq!(outline.name, "Test Tower");
    let numbers: Vec<i32> = outline.floors.iter().map(|floor| floor.number).collect();
    assert_eq!(numbers, vec![0, 1, 2, 3]);
    assert_eq!(outline.floors[0].label, "L");
    assert_eq!(outline.floors[1].label, "01");

    let units: Vec<(&str, f64)> = outline.floors[1]
        .units
        .iter()
        .map(|unit| (unit.label.as_str(), unit.position))
        .collect();
    assert_eq!(units, vec![("0101", 0.2), ("0102", 0.8)]);
    assert!(outline.floors[1].units.iter().all(|unit| unit.bedrooms >= 1));

    let studio = &outline.floors[3].amenities;
    assert_eq!(studio.len(), 1);
    assert_eq!(studio[0].name, "Studio");
    assert_eq!(studio[0].capacity, 10);

    for resident in &first.residents {
        assert_eq!(resident.floor_label, "01");
        assert_eq!(resident.location_type, LocationType::Unit);
    }
}

#[test]
fn hourly_observer_fires_with_unaligned_clock() {
    let mut cfg = load(TRIP);
    cfg.start_minute = 542;
    let mut engine = Engine::new(cfg).expect("failed to create engine");

    let mut observed = Vec::new();
    engine
        .run_days(1, |snapshot| {
            observed.push(snapshot.time.minute);
            Ok(())
        })
        .expect("failed to run day");
    assert_eq!(observed.len(), 24);
    assert!(observed.iter().all(|minute| minute % 60 < 5));
}

#[test]
fn hourly_observer_fires_on_the_hour() {
    let mut engine = Engine::new(load(TRIP)).expect("failed to create engine");
    let mut observed = Vec::new();
    engine
        .run_days(2, |snapshot| {
            observed.push(snapshot.time);
            Ok(())
        })
        .expect("failed to run days");
    assert_eq!(observed.len(), 48);
    assert!(observed.iter().all(|time| time.minute % 60 == 0));
}
