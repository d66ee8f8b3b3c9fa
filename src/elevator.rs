//! The single shared elevator car.
//!
//! Hall calls are queued per floor (first come, first boarded) and served
//! with the classic elevator algorithm: the car keeps travelling in its
//! current direction while any stop lies ahead, and only reverses once
//! nothing is left that way.

use crate::config::ElevatorConfig;
use crate::resident::ResidentId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

const FLOOR_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorState {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Moving,
    Boarding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub resident: ResidentId,
    pub origin: i32,
    pub destination: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passenger {
    pub resident: ResidentId,
    pub destination: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Queued,
    /// The resident already had a call; its destination was updated.
    Coalesced,
    /// The resident is already in the car; the car was redirected.
    Riding,
    /// Origin and destination are the same floor; nothing to do.
    SameFloor,
}

/// What happened during one [`Elevator::step`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StepOutcome {
    /// Residents that entered the car, with the floor they boarded at.
    pub boarded: Vec<(ResidentId, i32)>,
    /// Residents that left the car, with the floor they left at.
    pub deboarded: Vec<(ResidentId, i32)>,
    pub doors_opened: bool,
    pub doors_closed: bool,
    /// Residents still waiting on the floor when the doors closed.
    pub left_behind: usize,
    pub floor: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Elevator {
    capacity: usize,
    floors_per_tick: f64,
    dwell_ticks: u32,
    min_floor: i32,
    max_floor: i32,

    position: f64,
    direction: Option<Direction>,
    doors: DoorState,
    phase: Phase,
    dwell_remaining: u32,

    waiting: BTreeMap<i32, VecDeque<Call>>,
    passengers: Vec<Passenger>,
}

impl Elevator {
    pub fn new(cfg: &ElevatorConfig, min_floor: i32, max_floor: i32, start_floor: i32) -> Self {
        Self {
            capacity: cfg.capacity,
            floors_per_tick: cfg.floors_per_tick,
            dwell_ticks: cfg.dwell_ticks,
            min_floor,
            max_floor,
            position: start_floor.clamp(min_floor, max_floor) as f64,
            direction: None,
            doors: DoorState::Closed,
            phase: Phase::Idle,
            dwell_remaining: 0,
            waiting: BTreeMap::new(),
            passengers: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fractional floor position of the car.
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Floor the car is at or passing.
    pub fn floor(&self) -> i32 {
        self.position.round() as i32
    }

    pub fn doors(&self) -> DoorState {
        self.doors
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    pub fn passengers(&self) -> &[Passenger] {
        &self.passengers
    }

    pub fn is_riding(&self, resident: ResidentId) -> bool {
        self.passengers.iter().any(|p| p.resident == resident)
    }

    pub fn is_waiting(&self, resident: ResidentId) -> bool {
        self.waiting
            .values()
            .any(|queue| queue.iter().any(|call| call.resident == resident))
    }

    /// Number of residents waiting per floor.
    pub fn waiting_counts(&self) -> BTreeMap<i32, usize> {
        self.waiting
            .iter()
            .filter(|(_, queue)| !queue.is_empty())
            .map(|(floor, queue)| (*floor, queue.len()))
            .collect()
    }

    /// Register a hall call from `origin` to `destination`.
    ///
    /// A resident has at most one call; calling again updates its destination.
    pub fn call(&mut self, resident: ResidentId, origin: i32, destination: i32) -> CallOutcome {
        let origin = origin.clamp(self.min_floor, self.max_floor);
        let destination = destination.clamp(self.min_floor, self.max_floor);

        if self.redirect(resident, destination) {
            return if self.is_riding(resident) {
                CallOutcome::Riding
            } else {
                CallOutcome::Coalesced
            };
        }
        if origin == destination {
            return CallOutcome::SameFloor;
        }

        self.waiting.entry(origin).or_default().push_back(Call {
            resident,
            origin,
            destination,
        });
        log::trace!("call from {resident} at floor {origin} to {destination}");
        CallOutcome::Queued
    }

    /// Change the destination of a waiting or riding resident.
    pub fn redirect(&mut self, resident: ResidentId, destination: i32) -> bool {
        let destination = destination.clamp(self.min_floor, self.max_floor);
        if let Some(passenger) = self.passengers.iter_mut().find(|p| p.resident == resident) {
            passenger.destination = destination;
            return true;
        }
        for queue in self.waiting.values_mut() {
            if let Some(call) = queue.iter_mut().find(|call| call.resident == resident) {
                call.destination = destination;
                return true;
            }
        }
        false
    }

    /// Remove a resident's pending hall call.
    pub fn withdraw(&mut self, resident: ResidentId) -> bool {
        let mut withdrawn = false;
        for queue in self.waiting.values_mut() {
            let before = queue.len();
            queue.retain(|call| call.resident != resident);
            withdrawn |= queue.len() != before;
        }
        self.waiting.retain(|_, queue| !queue.is_empty());
        withdrawn
    }

    /// Advance the car by one tick.
    pub fn step(&mut self) -> StepOutcome {
        let mut out = StepOutcome::default();

        // Once the dwell has run out the doors close and the car departs in the same tick.
        if self.doors == DoorState::Open {
            let floor = self.floor();
            self.exchange(floor, &mut out);
            if self.dwell_remaining > 0 {
                self.dwell_remaining -= 1;
                out.floor = floor;
                return out;
            }
            self.doors = DoorState::Closed;
            self.phase = Phase::Idle;
            out.doors_closed = true;
            out.left_behind = self.waiting.get(&floor).map_or(0, VecDeque::len);
            log::trace!("doors closed at floor {floor}");
        }

        let Some(target) = self.next_stop() else {
            self.phase = Phase::Idle;
            out.floor = self.floor();
            return out;
        };

        let distance = target as f64 - self.position;
        if distance.abs() > FLOOR_TOLERANCE {
            self.direction = Some(if distance > 0.0 {
                Direction::Up
            } else {
                Direction::Down
            });
            self.phase = Phase::Moving;
            let travel = self.floors_per_tick.min(distance.abs());
            self.position = (self.position + travel * distance.signum())
                .clamp(self.min_floor as f64, self.max_floor as f64);
        }
        if (target as f64 - self.position).abs() <= FLOOR_TOLERANCE {
            self.position = target as f64;
            self.doors = DoorState::Open;
            self.phase = Phase::Boarding;
            self.dwell_remaining = self.dwell_ticks;
            out.doors_opened = true;
            self.exchange(target, &mut out);
            log::trace!("doors opened at floor {target}");
        }

        out.floor = self.floor();
        out
    }

    /// Next floor to serve, continuing in the current direction when possible.
    fn next_stop(&self) -> Option<i32> {
        let mut stops: BTreeSet<i32> = self.passengers.iter().map(|p| p.destination).collect();
        // A full car cannot pick anyone up, so waiting floors are not stops.
        if self.passengers.len() < self.capacity {
            stops.extend(self.waiting.keys().copied());
        }

        let here = self.position;
        let ahead_up = stops
            .iter()
            .copied()
            .find(|&floor| floor as f64 >= here - FLOOR_TOLERANCE);
        let ahead_down = stops
            .iter()
            .rev()
            .copied()
            .find(|&floor| floor as f64 <= here + FLOOR_TOLERANCE);

        match self.direction {
            Some(Direction::Up) => ahead_up.or(ahead_down),
            Some(Direction::Down) => ahead_down.or(ahead_up),
            None => match (ahead_up, ahead_down) {
                (Some(up), Some(down)) => {
                    if up as f64 - here <= here - down as f64 {
                        Some(up)
                    } else {
                        Some(down)
                    }
                }
                (up, down) => up.or(down),
            },
        }
    }

    /// Let passengers out at `floor`, then board waiting residents up to capacity.
    fn exchange(&mut self, floor: i32, out: &mut StepOutcome) {
        let mut riding = Vec::with_capacity(self.passengers.len());
        for passenger in self.passengers.drain(..) {
            if passenger.destination == floor {
                out.deboarded.push((passenger.resident, floor));
            } else {
                riding.push(passenger);
            }
        }
        self.passengers = riding;

        if let Some(queue) = self.waiting.get_mut(&floor) {
            while self.passengers.len() < self.capacity {
                let Some(call) = queue.pop_front() else {
                    break;
                };
                out.boarded.push((call.resident, floor));
                self.passengers.push(Passenger {
                    resident: call.resident,
                    destination: call.destination,
                });
            }
            if queue.is_empty() {
                self.waiting.remove(&floor);
            }
        }

        debug_assert!(
            self.passengers.len() <= self.capacity,
            "elevator over capacity"
        );
    }
}
