use crate::building::{Building, BuildingConfig};
use crate::persona::{PersonaCatalog, PersonaTemplate};
use crate::time::{MINUTES_PER_DAY, TICK_MINUTES};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

const BUILTIN_CONFIG: &str = include_str!("../config/optima.toml");

/// Simulation configuration.
///
/// Loaded from a TOML document and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Seed of the random number generator driving population and schedules.
    #[serde(default)]
    pub seed: u64,
    /// Minute of day the clock starts at, a multiple of the tick length.
    #[serde(default = "default_start_minute")]
    pub start_minute: u32,

    #[serde(default)]
    pub elevator: ElevatorConfig,
    #[serde(default)]
    pub movement: MovementConfig,
    #[serde(default)]
    pub mood: MoodConfig,
    #[serde(default)]
    pub events: EventConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub population: PopulationConfig,

    /// Static floor/unit/amenity description.
    pub building: BuildingConfig,
    /// Persona templates used for population and schedule generation.
    pub personas: Vec<PersonaTemplate>,
}

/// Elevator car parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ElevatorConfig {
    /// Maximum number of boarded passengers.
    pub capacity: usize,
    /// Floor-equivalents travelled per tick.
    pub floors_per_tick: f64,
    /// Extra ticks the doors stay open after arriving.
    pub dwell_ticks: u32,
    /// Horizontal position of the car.
    pub car_x: f64,
    /// Horizontal position where residents wait for the car.
    pub lobby_x: f64,
}

impl Default for ElevatorConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            floors_per_tick: 1.0,
            dwell_ticks: 2,
            car_x: 0.5,
            lobby_x: 0.45,
        }
    }
}

/// Horizontal walking parameters (fractions of the building width).
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    pub walk_speed: f64,
    pub arrival_tolerance: f64,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            walk_speed: 0.18,
            arrival_tolerance: 0.05,
        }
    }
}

/// Mood drift parameters, applied once per tick.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MoodConfig {
    pub initial_min: f64,
    pub initial_max: f64,
    /// Mood lost per consecutive tick spent waiting, multiplied by the wait length.
    pub wait_penalty: f64,
    /// Mood lost per tick spent in a crowded amenity.
    pub crowding_penalty: f64,
    /// Occupancy/capacity fraction above which an amenity counts as crowded.
    pub crowding_threshold: f64,
    /// Fraction of the distance to baseline recovered per restful tick.
    pub recovery_rate: f64,
    pub work_drain: f64,
    pub commute_drain: f64,
}

impl Default for MoodConfig {
    fn default() -> Self {
        Self {
            initial_min: 0.45,
            initial_max: 0.55,
            wait_penalty: 0.002,
            crowding_penalty: 0.01,
            crowding_threshold: 0.8,
            recovery_rate: 0.05,
            work_drain: 0.0075,
            commute_drain: 0.015,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Number of events kept in the log.
    pub retention: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self { retention: 300 }
    }
}

/// Wall-clock delay between ticks for each running speed.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub slow_ms: u64,
    pub normal_ms: u64,
    pub fast_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            slow_ms: 1200,
            normal_ms: 600,
            fast_ms: 180,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    /// Probability that a unit is occupied.
    pub occupancy: f64,
    pub first_names: Vec<String>,
    pub last_names: Vec<String>,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            occupancy: 1.0,
            first_names: Vec::new(),
            last_names: Vec::new(),
        }
    }
}

fn default_start_minute() -> u32 {
    6 * 60
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let text = fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml_str(&text).with_context(|| format!("failed to load {file:?}"))
    }

    /// Parse and validate a [`Config`] from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).context("failed to deserialize config")?;
        config.validate().context("failed to validate config")?;
        Ok(config)
    }

    /// The bundled Optima Signature configuration.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_CONFIG).context("failed to load builtin config")
    }

    fn validate(&self) -> Result<()> {
        check_num(self.start_minute, 0..MINUTES_PER_DAY).context("invalid start minute")?;
        if self.start_minute % TICK_MINUTES != 0 {
            bail!(
                "start minute must be a multiple of {TICK_MINUTES}, but is {}",
                self.start_minute
            );
        }

        let elevator = &self.elevator;
        check_num(elevator.capacity, 1..=1000).context("invalid elevator capacity")?;
        check_num(elevator.floors_per_tick, 0.01..=100.0).context("invalid elevator speed")?;
        check_num(elevator.dwell_ticks, 0..=100).context("invalid elevator dwell")?;
        check_num(elevator.car_x, 0.0..=1.0).context("invalid elevator car position")?;
        check_num(elevator.lobby_x, 0.0..=1.0).context("invalid elevator lobby position")?;

        let movement = &self.movement;
        check_num(movement.walk_speed, 0.001..=1.0).context("invalid walk speed")?;
        check_num(movement.arrival_tolerance, 0.0..0.5).context("invalid arrival tolerance")?;

        let mood = &self.mood;
        check_num(mood.initial_min, 0.0..=1.0).context("invalid minimum initial mood")?;
        check_num(mood.initial_max, mood.initial_min..=1.0)
            .context("invalid maximum initial mood")?;
        check_num(mood.wait_penalty, 0.0..=1.0).context("invalid wait penalty")?;
        check_num(mood.crowding_penalty, 0.0..=1.0).context("invalid crowding penalty")?;
        check_num(mood.crowding_threshold, 0.01..=10.0).context("invalid crowding threshold")?;
        check_num(mood.recovery_rate, 0.0..=1.0).context("invalid recovery rate")?;
        check_num(mood.work_drain, 0.0..=1.0).context("invalid work drain")?;
        check_num(mood.commute_drain, 0.0..=1.0).context("invalid commute drain")?;

        check_num(self.events.retention, 1..=100_000).context("invalid event retention")?;

        let runtime = &self.runtime;
        check_num(runtime.slow_ms, 1..=60_000).context("invalid slow interval")?;
        check_num(runtime.normal_ms, 1..=60_000).context("invalid normal interval")?;
        check_num(runtime.fast_ms, 1..=60_000).context("invalid fast interval")?;

        check_num(self.population.occupancy, 0.0..=1.0).context("invalid occupancy")?;

        Building::from_config(&self.building).context("invalid building")?;
        PersonaCatalog::new(self.personas.clone()).context("invalid persona catalog")?;

        Ok(())
    }
}

pub(crate) fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}
