use crate::building::{Building, Place};
use crate::config::Config;
use crate::elevator::{CallOutcome, Elevator};
use crate::events::{Event, EventKind, EventLog};
use crate::persona::{ActivityKind, PersonaCatalog};
use crate::resident::{Resident, ResidentId, Status, Whereabouts, populate};
use crate::schedule::{self, AmenityLoad, ConfigWarning, ResidentContext, Schedule};
use crate::snapshot::{BuildingOutline, DayStats, ElevatorView, ResidentView, Snapshot};
use crate::time::{SimTime, TICK_MINUTES, TICKS_PER_DAY, sunlight};
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Simulation engine.
///
/// Owns the configuration, building, population, elevator and random number
/// generator, and advances all of them one tick at a time. The engine is the
/// only writer of simulation state; readers get [`Snapshot`] values.
pub struct Engine {
    cfg: Config,
    building: Building,
    outline: Arc<BuildingOutline>,
    catalog: PersonaCatalog,
    residents: Vec<Resident>,
    elevator: Elevator,
    events: EventLog,
    clock: SimTime,
    tick: u64,
    day_stats: DayStats,
    /// Whether each amenity was over the crowding threshold on the last tick.
    crowded: Vec<bool>,
    warnings: Vec<ConfigWarning>,
    rng: ChaCha12Rng,
}

/// An elevator call to submit once the car has moved for this tick.
struct PendingCall {
    resident: ResidentId,
    origin: i32,
    destination: i32,
}

impl Engine {
    /// Build the building, catalog and population described by `cfg` and
    /// generate the first day of schedules.
    pub fn new(cfg: Config) -> Result<Self> {
        let building = Building::from_config(&cfg.building).context("failed to build building")?;
        let catalog =
            PersonaCatalog::new(cfg.personas.clone()).context("failed to build persona catalog")?;
        let mut rng = ChaCha12Rng::seed_from_u64(cfg.seed);

        let residents = populate(&building, &catalog, &cfg.population, &cfg.mood, &mut rng)
            .context("failed to populate building")?;
        let elevator = Elevator::new(
            &cfg.elevator,
            building.min_floor(),
            building.max_floor(),
            building.ground_floor(),
        );
        let clock = SimTime::new(0, cfg.start_minute);

        let mut engine = Self {
            events: EventLog::new(cfg.events.retention),
            crowded: vec![false; building.amenities().len()],
            outline: Arc::new(BuildingOutline::new(&building)),
            day_stats: DayStats::new(clock.day),
            cfg,
            building,
            catalog,
            residents,
            elevator,
            clock,
            tick: 0,
            warnings: Vec::new(),
            rng,
        };
        engine.regenerate_schedules();
        engine.settle_at_home();

        Ok(engine)
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn building(&self) -> &Building {
        &self.building
    }

    pub fn catalog(&self) -> &PersonaCatalog {
        &self.catalog
    }

    pub fn residents(&self) -> &[Resident] {
        &self.residents
    }

    pub fn elevator(&self) -> &Elevator {
        &self.elevator
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn clock(&self) -> SimTime {
        self.clock
    }

    /// Ticks performed so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn day_stats(&self) -> &DayStats {
        &self.day_stats
    }

    /// Distinct configuration warnings of the latest schedule regeneration.
    pub fn config_warnings(&self) -> &[ConfigWarning] {
        &self.warnings
    }

    /// Perform `ticks` ticks.
    pub fn run_ticks(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    /// Run `days` whole days, handing a snapshot to `observe` each time the clock crosses an hour.
    pub fn run_days<F>(&mut self, days: u32, mut observe: F) -> Result<()>
    where
        F: FnMut(&Snapshot) -> Result<()>,
    {
        let total = days as u64 * TICKS_PER_DAY as u64;
        for done in 1..=total {
            let hour = self.clock.minute_of_simulation() / 60;
            self.step();
            if self.clock.minute_of_simulation() / 60 != hour {
                observe(&self.snapshot()).context("failed to observe snapshot")?;
            }
            if done % TICKS_PER_DAY as u64 == 0 {
                let progress = 100.0 * done as f64 / total as f64;
                log::info!("completed {progress:06.2}%");
            }
        }
        Ok(())
    }

    /// Advance the simulation by one tick.
    pub fn step(&mut self) {
        // 1. Clock and day rollover.
        let wrapped = self.clock.advance(TICK_MINUTES);
        self.tick += 1;
        if wrapped {
            log::info!("starting {}", self.clock);
            self.regenerate_schedules();
            self.day_stats = DayStats::new(self.clock.day);
        }

        let mut transitioned = vec![false; self.residents.len()];
        let mut calls = Vec::new();

        // 2. Resolve the active segment and start transitions.
        for idx in 0..self.residents.len() {
            transitioned[idx] = self.resolve_target(idx, &mut calls);
        }

        // 3. Walk and wait.
        for idx in 0..self.residents.len() {
            if !transitioned[idx] {
                self.advance_on_foot(idx, &mut calls);
            }
        }

        // 4. Elevator, then the calls raised during this tick.
        self.step_elevator();
        for call in calls {
            match self.elevator.call(call.resident, call.origin, call.destination) {
                CallOutcome::Queued | CallOutcome::Coalesced => {}
                outcome => log::warn!("unexpected call outcome {outcome:?} for {}", call.resident),
            }
        }

        // 5. and 6. Mood, crowding and statistics.
        let occupancy = self.amenity_occupancy();
        self.apply_mood(&occupancy);
        self.update_crowding(&occupancy);

        debug_assert!(self.elevator.passengers().len() <= self.elevator.capacity());
    }

    /// Build the snapshot of the current state.
    pub fn snapshot(&self) -> Snapshot {
        let building = &self.building;

        let residents = self
            .residents
            .iter()
            .map(|resident| ResidentView {
                id: resident.id,
                name: resident.name.clone(),
                persona: resident.persona.clone(),
                occupation: resident.occupation.clone(),
                age: resident.age,
                home: building.unit(resident.home).label.clone(),
                appearance: resident.appearance.clone(),
                mood: resident.mood,
                status: resident.status,
                activity: resident.activity,
                plan: resident
                    .current_segment()
                    .map_or_else(|| "Idle".to_string(), |segment| segment.label.clone()),
                location: resident.whereabouts.label(building).to_string(),
                location_type: resident.whereabouts.location_type(),
                floor: resident.floor,
                floor_label: building.floor_label(resident.floor),
                vertical: resident.vertical,
                x: resident.x,
                target_x: resident.target_x,
                destination: match resident.status {
                    Status::Idle | Status::InEvent => None,
                    _ => resident
                        .destination
                        .map(|place| building.place_label(place).to_string()),
                },
            })
            .collect();

        let mut activity_counts: BTreeMap<ActivityKind, usize> =
            ActivityKind::ALL.iter().map(|kind| (*kind, 0)).collect();
        for resident in &self.residents {
            *activity_counts.entry(resident.activity).or_default() += 1;
        }

        let amenity_occupancy = building
            .amenities()
            .iter()
            .zip(self.amenity_occupancy())
            .map(|(amenity, count)| (amenity.name.clone(), count))
            .collect();

        let elevator = &self.elevator;
        let elevator = ElevatorView {
            position: elevator.position(),
            floor: elevator.floor(),
            floor_label: building.floor_label(elevator.floor()),
            doors: elevator.doors(),
            phase: elevator.phase(),
            direction: elevator.direction(),
            capacity: elevator.capacity(),
            passengers: elevator.passengers().iter().map(|p| p.resident).collect(),
            waiting: elevator.waiting_counts(),
        };

        Snapshot {
            tick: self.tick,
            time: self.clock,
            minute_of_simulation: self.clock.minute_of_simulation(),
            clock: self.clock.to_string(),
            sunlight: sunlight(self.clock.minute),
            building: Arc::clone(&self.outline),
            residents,
            elevator,
            activity_counts,
            amenity_occupancy,
            events: self.events.iter().cloned().collect(),
            day_stats: self.day_stats.clone(),
            speed: None,
        }
    }

    /// Generate a fresh schedule for every resident.
    fn regenerate_schedules(&mut self) {
        let mut load = AmenityLoad::new(&self.building);
        let mut warnings = BTreeSet::new();

        for resident in &mut self.residents {
            let home = resident.home_place();
            resident.segment = None;
            let Some(persona) = self.catalog.get(&resident.persona) else {
                log::warn!("{} has unknown persona {}", resident.id, resident.persona);
                resident.schedule = Schedule::idle_at(home);
                continue;
            };

            let mut ctx = ResidentContext {
                home: resident.home,
                building: &self.building,
                load: &mut load,
            };
            let generated = schedule::generate(persona, &mut ctx, &mut self.rng);
            warnings.extend(generated.warnings);

            resident.schedule = match generated.schedule.check_coverage() {
                Ok(()) => generated.schedule,
                Err(error) => {
                    log::warn!("replacing schedule of {}: {error:#}", resident.id);
                    Schedule::idle_at(home)
                }
            };
        }

        for warning in &warnings {
            log::warn!("skipped persona rule: {warning}");
        }
        self.warnings = warnings.into_iter().collect();
        log::debug!(
            "generated schedules of {} residents for {}",
            self.residents.len(),
            self.clock
        );
    }

    /// Put residents whose first segment is at home straight into it.
    fn settle_at_home(&mut self) {
        let minute = self.clock.minute;
        for resident in &mut self.residents {
            let home = resident.home_place();
            let Some((idx, segment)) = resident.schedule.segment_at(minute) else {
                continue;
            };
            if segment.place == home {
                resident.activity = segment.activity;
                resident.status = Status::InEvent;
                resident.destination = Some(home);
                resident.segment = Some(idx);
            }
        }
    }

    /// Resolve the segment active now and start a transition if its place changed.
    ///
    /// Returns whether the resident changed status.
    fn resolve_target(&mut self, idx: usize, calls: &mut Vec<PendingCall>) -> bool {
        let Self {
            building,
            residents,
            elevator,
            events,
            day_stats,
            cfg,
            clock,
            ..
        } = self;
        let resident = &mut residents[idx];

        let Some((segment_idx, place, activity)) = resident
            .schedule
            .segment_at(clock.minute)
            .map(|(segment_idx, segment)| (segment_idx, segment.place, segment.activity))
        else {
            debug_assert!(false, "{} has no segment at {}", resident.id, clock);
            log::warn!("{} has no segment at {clock}; skipping", resident.id);
            return false;
        };
        resident.segment = Some(segment_idx);

        if resident.destination == Some(place) {
            if resident.status == Status::InEvent {
                resident.activity = activity;
            }
            return false;
        }

        let previous = resident.destination.replace(place);
        let target_floor = building.place_floor(place);
        resident.target_x = building.place_x(place);
        log::trace!(
            "{} heads to {} on floor {target_floor}",
            resident.id,
            building.place_label(place)
        );

        match resident.status {
            Status::InElevator => {
                elevator.redirect(resident.id, target_floor);
                false
            }
            Status::WaitingElevator => {
                if target_floor == resident.floor {
                    elevator.withdraw(resident.id);
                    resident.status = Status::Walking;
                    resident.whereabouts = Whereabouts::Corridor;
                    resident.wait_ticks = 0;
                    true
                } else {
                    elevator.redirect(resident.id, target_floor);
                    false
                }
            }
            Status::Walking => {
                if target_floor != resident.floor {
                    wait_for_elevator(resident, building, events, *clock, target_floor, calls);
                    true
                } else {
                    false
                }
            }
            Status::Idle | Status::InEvent => {
                if resident.status == Status::InEvent
                    && let Some(previous) = previous
                {
                    events.push(resident_event(
                        *clock,
                        EventKind::Departure,
                        resident,
                        format!("Left {}", building.place_label(previous)),
                        building.place_label(previous),
                    ));
                }
                resident.activity = ActivityKind::Commute;

                let tolerance = cfg.movement.arrival_tolerance;
                if target_floor != resident.floor {
                    wait_for_elevator(resident, building, events, *clock, target_floor, calls);
                } else if (resident.x - resident.target_x).abs() <= tolerance {
                    arrive(resident, place, building, events, day_stats, *clock);
                } else {
                    resident.status = Status::Walking;
                    resident.whereabouts = Whereabouts::Corridor;
                }
                true
            }
        }
    }

    /// Move walking residents and let waiting ones drift to the elevator lobby.
    fn advance_on_foot(&mut self, idx: usize, calls: &mut Vec<PendingCall>) {
        let Self {
            building,
            residents,
            events,
            day_stats,
            cfg,
            clock,
            ..
        } = self;
        let resident = &mut residents[idx];
        let walk_speed = cfg.movement.walk_speed;

        match resident.status {
            Status::Walking => {
                resident.x = approach(resident.x, resident.target_x, walk_speed);
                if (resident.x - resident.target_x).abs() > cfg.movement.arrival_tolerance {
                    return;
                }
                let Some(place) = resident.destination else {
                    log::warn!("{} is walking without a destination", resident.id);
                    return;
                };
                let target_floor = building.place_floor(place);
                if target_floor == resident.floor {
                    arrive(resident, place, building, events, day_stats, *clock);
                } else {
                    wait_for_elevator(resident, building, events, *clock, target_floor, calls);
                }
            }
            Status::WaitingElevator => {
                resident.x = approach(resident.x, cfg.elevator.lobby_x, walk_speed);
                resident.wait_ticks += 1;
                day_stats.wait_ticks += 1;
            }
            Status::Idle | Status::InElevator | Status::InEvent => {}
        }
    }

    fn step_elevator(&mut self) {
        let outcome = self.elevator.step();
        let car_x = self.cfg.elevator.car_x;
        let lobby_x = self.cfg.elevator.lobby_x;

        for &(id, floor) in &outcome.deboarded {
            let Some(resident) = self.residents.get_mut(id.0 as usize) else {
                continue;
            };
            debug_assert!(resident.status.can_become(Status::Walking));
            resident.status = Status::Walking;
            resident.whereabouts = Whereabouts::ElevatorLobby;
            resident.floor = floor;
            resident.vertical = floor as f64;
            resident.x = lobby_x;
            resident.target_x = match resident.destination {
                Some(place) => self.building.place_x(place),
                None => lobby_x,
            };
            let label = self.building.floor_label(floor);
            self.events.push(resident_event(
                self.clock,
                EventKind::Elevator,
                resident,
                format!("Arrived on floor {label}"),
                "Elevator Lobby",
            ));
        }

        for &(id, floor) in &outcome.boarded {
            let Some(resident) = self.residents.get_mut(id.0 as usize) else {
                continue;
            };
            debug_assert!(resident.status.can_become(Status::InElevator));
            resident.status = Status::InElevator;
            resident.whereabouts = Whereabouts::Elevator;
            resident.floor = floor;
            resident.x = car_x;
            resident.target_x = car_x;
            resident.wait_ticks = 0;
            self.day_stats.boardings += 1;
            let destination = resident
                .destination
                .map_or(floor, |place| self.building.place_floor(place));
            let label = self.building.floor_label(destination);
            self.events.push(resident_event(
                self.clock,
                EventKind::Elevator,
                resident,
                format!("Boarded elevator to {label}"),
                "Elevator",
            ));
        }

        if outcome.doors_closed && outcome.left_behind > 0 {
            let label = self.building.floor_label(outcome.floor);
            self.events.push(Event {
                time: self.clock,
                clock: self.clock.clock_label(),
                kind: EventKind::Elevator,
                resident: None,
                resident_name: None,
                description: format!(
                    "Elevator full, {} left waiting on floor {label}",
                    outcome.left_behind
                ),
                location: "Elevator Lobby".to_string(),
            });
        }

        let floor = self.elevator.floor();
        let position = self.elevator.position();
        for resident in &mut self.residents {
            if resident.status == Status::InElevator {
                resident.floor = floor;
                resident.vertical = position;
                resident.x = car_x;
            }
        }
    }

    /// Residents present at each amenity, indexed by amenity id.
    fn amenity_occupancy(&self) -> Vec<usize> {
        let mut occupancy = vec![0; self.building.amenities().len()];
        for resident in &self.residents {
            if resident.status == Status::InEvent
                && let Whereabouts::At(Place::Amenity(id)) = resident.whereabouts
            {
                occupancy[id.0] += 1;
            }
        }
        occupancy
    }

    fn is_crowded(&self, count: usize, capacity: usize) -> bool {
        count as f64 / capacity as f64 > self.cfg.mood.crowding_threshold
    }

    fn apply_mood(&mut self, occupancy: &[usize]) {
        let mood = &self.cfg.mood;
        let crowded: Vec<bool> = self
            .building
            .amenities()
            .iter()
            .map(|amenity| self.is_crowded(occupancy[amenity.id.0], amenity.capacity))
            .collect();

        for resident in &mut self.residents {
            let in_crowd = resident.status == Status::InEvent
                && matches!(
                    resident.whereabouts,
                    Whereabouts::At(Place::Amenity(id)) if crowded[id.0]
                );

            let mut delta = 0.0;
            if resident.status == Status::WaitingElevator {
                delta -= mood.wait_penalty * resident.wait_ticks as f64;
            }
            if in_crowd {
                delta -= mood.crowding_penalty;
            }
            match resident.activity {
                ActivityKind::Work => delta -= mood.work_drain,
                ActivityKind::Commute => delta -= mood.commute_drain,
                ActivityKind::Sleep => {
                    delta += (resident.baseline_mood - resident.mood) * mood.recovery_rate;
                }
                ActivityKind::Leisure | ActivityKind::Amenity if !in_crowd => {
                    delta += (resident.baseline_mood - resident.mood) * mood.recovery_rate;
                }
                _ => {}
            }
            resident.mood = (resident.mood + delta).clamp(0.0, 1.0);
        }
    }

    /// Emit one crowding event per threshold crossing and track daily peaks.
    fn update_crowding(&mut self, occupancy: &[usize]) {
        for amenity in self.building.amenities() {
            let count = occupancy[amenity.id.0];
            let crowded = self.is_crowded(count, amenity.capacity);
            if crowded && !self.crowded[amenity.id.0] {
                self.day_stats.crowding_events += 1;
                self.events.push(Event {
                    time: self.clock,
                    clock: self.clock.clock_label(),
                    kind: EventKind::Crowding,
                    resident: None,
                    resident_name: None,
                    description: format!(
                        "{} is crowded ({count}/{})",
                        amenity.name, amenity.capacity
                    ),
                    location: amenity.name.clone(),
                });
            }
            self.crowded[amenity.id.0] = crowded;

            let peak = self
                .day_stats
                .peak_occupancy
                .entry(amenity.name.clone())
                .or_default();
            *peak = (*peak).max(count);
        }
    }
}

fn resident_event(
    time: SimTime,
    kind: EventKind,
    resident: &Resident,
    description: String,
    location: &str,
) -> Event {
    Event {
        time,
        clock: time.clock_label(),
        kind,
        resident: Some(resident.id),
        resident_name: Some(resident.name.clone()),
        description,
        location: location.to_string(),
    }
}

fn approach(current: f64, target: f64, speed: f64) -> f64 {
    if (target - current).abs() <= speed {
        target
    } else {
        current + speed * (target - current).signum()
    }
}

fn arrive(
    resident: &mut Resident,
    place: Place,
    building: &Building,
    events: &mut EventLog,
    day_stats: &mut DayStats,
    time: SimTime,
) {
    resident.status = Status::InEvent;
    resident.whereabouts = Whereabouts::At(place);
    resident.x = building.place_x(place);
    resident.target_x = resident.x;
    resident.activity = resident
        .current_segment()
        .map_or(ActivityKind::Idle, |segment| segment.activity);
    day_stats.arrivals += 1;

    let label = resident
        .current_segment()
        .map_or_else(|| "Arrived".to_string(), |segment| segment.label.clone());
    events.push(resident_event(
        time,
        EventKind::Arrival,
        resident,
        label,
        building.place_label(place),
    ));
}

fn wait_for_elevator(
    resident: &mut Resident,
    building: &Building,
    events: &mut EventLog,
    time: SimTime,
    target_floor: i32,
    calls: &mut Vec<PendingCall>,
) {
    resident.status = Status::WaitingElevator;
    resident.whereabouts = Whereabouts::ElevatorLobby;
    resident.wait_ticks = 0;
    calls.push(PendingCall {
        resident: resident.id,
        origin: resident.floor,
        destination: target_floor,
    });

    let label = building.floor_label(target_floor);
    events.push(resident_event(
        time,
        EventKind::Elevator,
        resident,
        format!("Waiting for elevator to {label}"),
        "Elevator Lobby",
    ));
}
