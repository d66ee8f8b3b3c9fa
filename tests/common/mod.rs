#![allow(dead_code)]

use towersim::resident::Status;
use towersim::{Config, Snapshot};

/// Two residents on floor 1 who spend [600, 660) in a studio on floor 3.
pub const TRIP: &str = r#"
seed = 7
start_minute = 540

[elevator]
capacity = 4
floors_per_tick = 1.0
dwell_ticks = 1

[runtime]
slow_ms = 20
normal_ms = 10
fast_ms = 5

[building]
name = "Test Tower"

[[building.floors]]
number = 0
label = "L"

[[building.floors]]
number = 1
units = [
    { id = "0101", position = 0.2 },
    { id = "0102", position = 0.8 },
]

[[building.floors]]
number = 2

[[building.floors]]
number = 3

[[building.amenities]]
name = "Studio"
category = "workspace"
floor = 3
capacity = 10
position = 0.5

[[personas]]
name = "visitor"

[[personas.rules]]
activity = "at_home"
label = "At home"
windows = [[0, 600], [660, 1440]]
duration = [1440, 1440]

[[personas.rules]]
activity = "amenity"
label = "Studio session"
windows = [[600, 660]]
duration = [60, 60]
mandatory = true
location = { kind = "named_amenity", name = "Studio" }
"#;

/// Five ground-floor residents converging on a nook that fits two.
pub const CROWD: &str = r#"
seed = 11
start_minute = 540

[building]
name = "Nook House"

[[building.floors]]
number = 0
label = "G"
units = [
    { id = "G1", position = 0.1 },
    { id = "G2", position = 0.3 },
    { id = "G3", position = 0.5 },
    { id = "G4", position = 0.7 },
    { id = "G5", position = 0.9 },
]

[[building.amenities]]
name = "Nook"
category = "lounge"
floor = 0
capacity = 2
position = 0.5

[[personas]]
name = "neighbour"

[[personas.rules]]
activity = "at_home"
label = "At home"
windows = [[0, 600], [660, 1440]]
duration = [1440, 1440]

[[personas.rules]]
activity = "leisure"
label = "Coffee at the nook"
windows = [[600, 660]]
duration = [60, 60]
mandatory = true
location = { kind = "named_amenity", name = "Nook" }
"#;

pub fn load(text: &str) -> Config {
    Config::from_toml_str(text).expect("failed to load scenario config")
}

/// Check the per-tick invariants between two consecutive snapshots.
pub fn check_tick(prev: &Snapshot, next: &Snapshot) {
    assert_eq!(next.tick, prev.tick + 1);

    let total: usize = next.activity_counts.values().sum();
    assert_eq!(total, next.residents.len(), "activity counts at {}", next.time);

    assert!(next.elevator.passengers.len() <= next.elevator.capacity);

    for (before, after) in prev.residents.iter().zip(&next.residents) {
        assert_eq!(before.id, after.id);
        assert!(
            before.status.can_become(after.status),
            "{} went from {:?} to {:?} at {}",
            after.id,
            before.status,
            after.status,
            next.time
        );
        if after.status == Status::InElevator {
            assert_eq!(after.floor, next.elevator.floor, "{} at {}", after.id, next.time);
        }
        assert!((0.0..=1.0).contains(&after.mood));
    }
}
