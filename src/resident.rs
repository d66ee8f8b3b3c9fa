//! Resident records and population synthesis.

use crate::building::{Building, Place, UnitId};
use crate::config::{MoodConfig, PopulationConfig};
use crate::persona::{ActivityKind, Palette, PersonaCatalog};
use crate::schedule::{Schedule, Segment};
use crate::snapshot::LocationType;
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_distr::{Bernoulli, Uniform};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResidentId(pub u32);

impl fmt::Display for ResidentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{:04}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Idle,
    Walking,
    WaitingElevator,
    InElevator,
    InEvent,
}

impl Status {
    /// Whether the engine may move a resident from `self` to `next` within one tick.
    pub fn can_become(self, next: Status) -> bool {
        use Status::*;
        match (self, next) {
            (a, b) if a == b => true,
            (Idle, Walking | WaitingElevator | InEvent) => true,
            (InEvent, Walking | WaitingElevator) => true,
            (Walking, WaitingElevator | InEvent) => true,
            (WaitingElevator, InElevator) => true,
            // The call was withdrawn because the target moved onto the waiting floor.
            (WaitingElevator, Walking) => true,
            (InElevator, Walking) => true,
            _ => false,
        }
    }
}

/// Where a resident physically is right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "place", rename_all = "snake_case")]
pub enum Whereabouts {
    At(Place),
    Corridor,
    ElevatorLobby,
    Elevator,
}

impl Whereabouts {
    pub fn label<'a>(&self, building: &'a Building) -> &'a str {
        match self {
            Whereabouts::At(place) => building.place_label(*place),
            Whereabouts::Corridor => "Corridor",
            Whereabouts::ElevatorLobby => "Elevator Lobby",
            Whereabouts::Elevator => "Elevator",
        }
    }

    pub fn location_type(&self) -> LocationType {
        match self {
            Whereabouts::At(Place::Unit(_)) => LocationType::Unit,
            Whereabouts::At(Place::Amenity(_)) => LocationType::Amenity,
            Whereabouts::At(Place::Outside) => LocationType::Outside,
            Whereabouts::Corridor => LocationType::Corridor,
            Whereabouts::ElevatorLobby => LocationType::ElevatorLobby,
            Whereabouts::Elevator => LocationType::Elevator,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appearance {
    pub hair: String,
    pub outfit: String,
    pub accent: String,
}

impl Appearance {
    fn from_palette<R: Rng>(palette: &Palette, rng: &mut R) -> Self {
        let pick = |choices: &[String], fallback: &str, rng: &mut R| {
            choices
                .choose(rng)
                .cloned()
                .unwrap_or_else(|| fallback.to_string())
        };
        Self {
            hair: pick(&palette.hair, "#ffffff", rng),
            outfit: pick(&palette.outfit, "#94a3b8", rng),
            accent: pick(&palette.accent, "#22d3ee", rng),
        }
    }
}

/// One inhabitant: static identity plus live state mutated by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resident {
    pub id: ResidentId,
    pub name: String,
    pub persona: String,
    pub occupation: String,
    pub age: u32,
    pub home: UnitId,
    pub appearance: Appearance,

    pub mood: f64,
    pub baseline_mood: f64,
    pub schedule: Schedule,

    pub status: Status,
    pub activity: ActivityKind,
    pub whereabouts: Whereabouts,
    pub floor: i32,
    /// Floor-equivalent height; fractional while riding the elevator.
    pub vertical: f64,
    pub x: f64,
    pub target_x: f64,
    /// Place of the last resolved segment, whether reached yet or not.
    pub destination: Option<Place>,
    /// Consecutive ticks spent waiting for the elevator.
    pub wait_ticks: u32,

    /// Index of the schedule segment resolved on the last tick.
    pub(crate) segment: Option<usize>,
}

impl Resident {
    pub fn home_place(&self) -> Place {
        Place::Unit(self.home)
    }

    /// The schedule segment the resident is currently following.
    pub fn current_segment(&self) -> Option<&Segment> {
        self.segment.and_then(|idx| self.schedule.segments().get(idx))
    }
}

/// Create the population: at most one resident per unit, each kept with
/// probability `occupancy`.
///
/// Schedules start as a whole day idle at home; the engine generates real
/// ones before the first tick.
pub fn populate<R: Rng>(
    building: &Building,
    catalog: &PersonaCatalog,
    population: &PopulationConfig,
    mood: &MoodConfig,
    rng: &mut R,
) -> Result<Vec<Resident>> {
    let occupied = Bernoulli::new(population.occupancy).context("invalid occupancy")?;
    let mood_dist = if mood.initial_max > mood.initial_min {
        Some(Uniform::new(mood.initial_min, mood.initial_max).context("invalid mood range")?)
    } else {
        None
    };

    let mut residents = Vec::with_capacity(building.units().len());
    for unit in building.units() {
        if !occupied.sample(rng) {
            continue;
        }
        let persona = catalog.sample(rng);
        let id = ResidentId(residents.len() as u32);
        let name = match (
            population.first_names.choose(rng),
            population.last_names.choose(rng),
        ) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            _ => format!("Resident {id}"),
        };
        let [age_min, age_max] = persona.age_range;
        let age = rng.random_range(age_min..=age_max);
        let occupation = persona
            .occupations
            .choose(rng)
            .cloned()
            .unwrap_or_else(|| persona.name.clone());
        let appearance = Appearance::from_palette(&persona.appearance, rng);
        let initial_mood = match &mood_dist {
            Some(dist) => dist.sample(rng),
            None => mood.initial_min,
        };

        residents.push(Resident {
            id,
            name,
            persona: persona.name.clone(),
            occupation,
            age,
            home: unit.id,
            appearance,
            mood: initial_mood,
            baseline_mood: initial_mood,
            schedule: Schedule::idle_at(Place::Unit(unit.id)),
            status: Status::Idle,
            activity: ActivityKind::Idle,
            whereabouts: Whereabouts::At(Place::Unit(unit.id)),
            floor: unit.floor,
            vertical: unit.floor as f64,
            x: unit.position,
            target_x: unit.position,
            destination: None,
            wait_ticks: 0,
            segment: None,
        });
    }

    log::info!(
        "populated {} residents across {} units",
        residents.len(),
        building.units().len()
    );
    Ok(residents)
}
