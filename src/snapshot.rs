//! Immutable per-tick views of the simulation, handed to readers.

use crate::building::{AmenityCategory, Building};
use crate::elevator::{Direction, DoorState, Phase};
use crate::events::Event;
use crate::persona::ActivityKind;
use crate::resident::{Appearance, ResidentId, Status};
use crate::runtime::Speed;
use crate::time::{SimTime, Sunlight};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Static layout of the building, built once per run and shared by every snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingOutline {
    pub name: String,
    pub address: String,
    pub street_x: f64,
    /// Floors by ascending number.
    pub floors: Vec<FloorOutline>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorOutline {
    pub number: i32,
    pub label: String,
    pub units: Vec<UnitOutline>,
    pub amenities: Vec<AmenityOutline>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitOutline {
    pub label: String,
    pub position: f64,
    pub width: f64,
    pub room_type: String,
    pub bedrooms: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmenityOutline {
    pub name: String,
    pub category: AmenityCategory,
    pub capacity: usize,
    pub position: f64,
    pub width: f64,
    pub open: u32,
    pub close: u32,
}

impl BuildingOutline {
    pub fn new(building: &Building) -> Self {
        let floors = building
            .floors()
            .iter()
            .map(|floor| FloorOutline {
                number: floor.number,
                label: floor.label.clone(),
                units: floor
                    .units
                    .iter()
                    .map(|&id| {
                        let unit = building.unit(id);
                        UnitOutline {
                            label: unit.label.clone(),
                            position: unit.position,
                            width: unit.width,
                            room_type: unit.room_type.clone(),
                            bedrooms: unit.bedrooms,
                        }
                    })
                    .collect(),
                amenities: floor
                    .amenities
                    .iter()
                    .map(|&id| {
                        let amenity = building.amenity(id);
                        AmenityOutline {
                            name: amenity.name.clone(),
                            category: amenity.category,
                            capacity: amenity.capacity,
                            position: amenity.position,
                            width: amenity.width,
                            open: amenity.open,
                            close: amenity.close,
                        }
                    })
                    .collect(),
            })
            .collect();

        Self {
            name: building.name().to_string(),
            address: building.address().to_string(),
            street_x: building.street_x(),
            floors,
        }
    }
}

/// Coarse kind of a resident's current location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    Unit,
    Amenity,
    Outside,
    Corridor,
    ElevatorLobby,
    Elevator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidentView {
    pub id: ResidentId,
    pub name: String,
    pub persona: String,
    pub occupation: String,
    pub age: u32,
    pub home: String,
    pub appearance: Appearance,
    pub mood: f64,
    pub status: Status,
    pub activity: ActivityKind,
    /// Label of the schedule segment being followed.
    pub plan: String,
    pub location: String,
    pub location_type: LocationType,
    pub floor: i32,
    pub floor_label: String,
    pub vertical: f64,
    pub x: f64,
    pub target_x: f64,
    pub destination: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevatorView {
    pub position: f64,
    pub floor: i32,
    pub floor_label: String,
    pub doors: DoorState,
    pub phase: Phase,
    pub direction: Option<Direction>,
    pub capacity: usize,
    pub passengers: Vec<ResidentId>,
    /// Waiting residents per floor number.
    pub waiting: BTreeMap<i32, usize>,
}

/// Totals accumulated since the start of the current simulated day.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DayStats {
    pub day: u32,
    pub boardings: u64,
    pub arrivals: u64,
    pub crowding_events: u64,
    pub wait_ticks: u64,
    pub peak_occupancy: BTreeMap<String, usize>,
}

impl DayStats {
    pub fn new(day: u32) -> Self {
        Self {
            day,
            ..Self::default()
        }
    }
}

/// A fully built view of the building at the end of one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Ticks performed since the engine was created.
    pub tick: u64,
    pub time: SimTime,
    /// Minutes since midnight of day 0.
    pub minute_of_simulation: u64,
    /// Day number and 12-hour clock, e.g. `Day 1 06:05 AM`.
    pub clock: String,
    pub sunlight: Sunlight,
    pub building: Arc<BuildingOutline>,
    pub residents: Vec<ResidentView>,
    pub elevator: ElevatorView,
    /// Residents per activity kind; every kind is present.
    pub activity_counts: BTreeMap<ActivityKind, usize>,
    /// Residents present per amenity name; every amenity is present.
    pub amenity_occupancy: BTreeMap<String, usize>,
    pub events: Vec<Event>,
    pub day_stats: DayStats,
    /// Playback speed, set when published by a [`crate::runtime::Runtime`].
    pub speed: Option<Speed>,
}

impl Snapshot {
    pub fn count(&self, activity: ActivityKind) -> usize {
        self.activity_counts.get(&activity).copied().unwrap_or(0)
    }

    pub fn status_count(&self, status: Status) -> usize {
        self.residents
            .iter()
            .filter(|resident| resident.status == status)
            .count()
    }

    /// Amenities sorted by descending occupancy, then by name.
    pub fn busiest_amenities(&self) -> Vec<(&str, usize)> {
        let mut busiest: Vec<(&str, usize)> = self
            .amenity_occupancy
            .iter()
            .map(|(name, count)| (name.as_str(), *count))
            .collect();
        busiest.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        busiest
    }
}
