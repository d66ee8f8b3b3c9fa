//! Daily schedule synthesis.
//!
//! [`generate`] walks a day forward from midnight, sampling one persona rule
//! at a time among those whose window contains the cursor, and emits a
//! gap-free, non-overlapping list of segments covering `[0, 1440)`.

use crate::building::{Amenity, AmenityId, Building, Place, UnitId};
use crate::persona::{ActivityKind, ActivityRule, LocationRule, PersonaTemplate};
use crate::time::{MINUTES_PER_DAY, TICK_MINUTES, TICKS_PER_DAY};
use anyhow::{Result, bail};
use rand::prelude::*;
use rand_distr::weighted::WeightedIndex;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt};

/// A contiguous interval during which a resident performs one activity at one place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: u32,
    /// Exclusive.
    pub end: u32,
    pub activity: ActivityKind,
    pub place: Place,
    pub label: String,
}

impl Segment {
    pub fn contains(&self, minute: u32) -> bool {
        (self.start..self.end).contains(&minute)
    }
}

/// One resident's schedule for one day.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Schedule {
    segments: Vec<Segment>,
}

impl Schedule {
    /// A whole day idle at `place`.
    pub fn idle_at(place: Place) -> Self {
        Self {
            segments: vec![Segment {
                start: 0,
                end: MINUTES_PER_DAY,
                activity: ActivityKind::Idle,
                place,
                label: "Idle".to_string(),
            }],
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Index and segment active at `minute`.
    pub fn segment_at(&self, minute: u32) -> Option<(usize, &Segment)> {
        let idx = self.segments.partition_point(|segment| segment.end <= minute);
        self.segments
            .get(idx)
            .filter(|segment| segment.contains(minute))
            .map(|segment| (idx, segment))
    }

    /// Check that segments are sorted, contiguous and cover exactly `[0, 1440)`.
    pub fn check_coverage(&self) -> Result<()> {
        let Some(first) = self.segments.first() else {
            bail!("schedule is empty");
        };
        if first.start != 0 {
            bail!("schedule starts at minute {}, not 0", first.start);
        }
        for segment in &self.segments {
            if segment.start >= segment.end {
                bail!("segment {}..{} is empty or inverted", segment.start, segment.end);
            }
        }
        for pair in self.segments.windows(2) {
            if pair[0].end != pair[1].start {
                bail!("gap or overlap between minute {} and {}", pair[0].end, pair[1].start);
            }
        }
        let last_end = self.segments.last().map_or(0, |segment| segment.end);
        if last_end != MINUTES_PER_DAY {
            bail!("schedule ends at minute {last_end}, not {MINUTES_PER_DAY}");
        }
        Ok(())
    }
}

/// A recoverable persona-configuration fault found while generating.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ConfigWarning {
    pub persona: String,
    pub rule: usize,
    pub message: String,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "persona {} rule {}: {}",
            self.persona, self.rule, self.message
        )
    }
}

/// Projected head count per amenity and tick slot for the day being generated.
#[derive(Debug, Clone, PartialEq)]
pub struct AmenityLoad {
    slots: Vec<Vec<u32>>,
}

impl AmenityLoad {
    pub fn new(building: &Building) -> Self {
        Self {
            slots: vec![vec![0; TICKS_PER_DAY as usize]; building.amenities().len()],
        }
    }

    /// Peak projected head count over the day.
    pub fn peak(&self, id: AmenityId) -> u32 {
        self.slots[id.0].iter().copied().max().unwrap_or(0)
    }

    /// Peak projected occupancy fraction of `amenity` over `[start, end)`.
    fn projected(&self, amenity: &Amenity, start: u32, end: u32) -> f64 {
        let peak = self.slots[amenity.id.0][slot_range(start, end)]
            .iter()
            .copied()
            .max()
            .unwrap_or(0);
        peak as f64 / amenity.capacity as f64
    }

    fn book(&mut self, id: AmenityId, start: u32, end: u32) {
        for count in &mut self.slots[id.0][slot_range(start, end)] {
            *count += 1;
        }
    }
}

fn slot_range(start: u32, end: u32) -> std::ops::Range<usize> {
    let first = (start / TICK_MINUTES) as usize;
    let last = end.div_ceil(TICK_MINUTES).min(TICKS_PER_DAY) as usize;
    first..last.max(first)
}

/// What the generator needs to know about the resident it is planning for.
pub struct ResidentContext<'a> {
    pub home: UnitId,
    pub building: &'a Building,
    pub load: &'a mut AmenityLoad,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub schedule: Schedule,
    pub warnings: Vec<ConfigWarning>,
}

/// Generate one day of schedule for a resident of `persona`.
///
/// Always returns a schedule satisfying [`Schedule::check_coverage`]: gaps in
/// the persona's windows are filled with idle time at home.
pub fn generate<R: Rng>(
    persona: &PersonaTemplate,
    ctx: &mut ResidentContext<'_>,
    rng: &mut R,
) -> Generated {
    let rules = &persona.rules;
    let home = Place::Unit(ctx.home);
    let mut warnings = Vec::new();

    let mut usable = Vec::with_capacity(rules.len());
    for (idx, rule) in rules.iter().enumerate() {
        match rule.problem() {
            Some(message) => warnings.push(ConfigWarning {
                persona: persona.name.clone(),
                rule: idx,
                message,
            }),
            None => usable.push(idx),
        }
    }

    let mut used = vec![0u32; rules.len()];
    let mut fired: BTreeSet<(usize, usize)> = BTreeSet::new();
    let mut segments: Vec<Segment> = Vec::new();
    let mut cursor = 0;

    while cursor < MINUTES_PER_DAY {
        let available: Vec<usize> = usable
            .iter()
            .copied()
            .filter(|&idx| rules[idx].max_per_day.is_none_or(|max| used[idx] < max))
            .collect();

        // Mandatory rules due at the cursor take precedence over everything else.
        let mut candidates: Vec<(usize, usize, [u32; 2])> = available
            .iter()
            .filter(|&&idx| rules[idx].mandatory)
            .filter_map(|&idx| {
                rules[idx]
                    .window_at(cursor)
                    .filter(|(window_idx, _)| !fired.contains(&(idx, *window_idx)))
                    .map(|(window_idx, window)| (idx, window_idx, window))
            })
            .collect();
        let due = !candidates.is_empty();
        if !due {
            candidates = available
                .iter()
                .filter_map(|&idx| {
                    rules[idx]
                        .window_at(cursor)
                        .map(|(window_idx, window)| (idx, window_idx, window))
                })
                .collect();
        }

        if candidates.is_empty() {
            let next = available
                .iter()
                .flat_map(|&idx| rules[idx].windows.iter().map(|window| window[0]))
                .filter(|&start| start > cursor)
                .min()
                .unwrap_or(MINUTES_PER_DAY);
            segments.push(Segment {
                start: cursor,
                end: next,
                activity: ActivityKind::Idle,
                place: home,
                label: "Idle".to_string(),
            });
            cursor = next;
            continue;
        }

        let (rule_idx, window_idx, window) = pick_candidate(&candidates, rules, rng);
        let rule = &rules[rule_idx];
        if due {
            fired.insert((rule_idx, window_idx));
        }

        let [min, max] = rule.duration;
        let duration = rng.random_range(min..=max);
        let barrier = next_mandatory_start(&available, rules, &fired, cursor);
        let end = (cursor + duration)
            .min(window[1])
            .min(barrier)
            .min(MINUTES_PER_DAY);

        let (place, end) = resolve_place(persona, rule_idx, ctx, cursor, end, rng, &mut warnings);
        debug_assert!(end > cursor, "segment must make progress");
        let end = end.max(cursor + 1);

        used[rule_idx] += 1;
        segments.push(Segment {
            start: cursor,
            end,
            activity: rule.activity,
            place,
            label: rule.label(),
        });
        cursor = end;
    }

    let schedule = Schedule {
        segments: merge_segments(segments),
    };
    debug_assert!(schedule.check_coverage().is_ok());

    Generated { schedule, warnings }
}

/// Earliest start after `cursor` of a mandatory window that has not fired yet.
fn next_mandatory_start(
    available: &[usize],
    rules: &[ActivityRule],
    fired: &BTreeSet<(usize, usize)>,
    cursor: u32,
) -> u32 {
    let mut barrier = MINUTES_PER_DAY;
    for &idx in available.iter().filter(|&&idx| rules[idx].mandatory) {
        for (window_idx, window) in rules[idx].windows.iter().enumerate() {
            if window[0] > cursor && !fired.contains(&(idx, window_idx)) {
                barrier = barrier.min(window[0]);
            }
        }
    }
    barrier
}

fn pick_candidate<R: Rng>(
    candidates: &[(usize, usize, [u32; 2])],
    rules: &[ActivityRule],
    rng: &mut R,
) -> (usize, usize, [u32; 2]) {
    if candidates.len() == 1 {
        return candidates[0];
    }
    let weights: Vec<f64> = candidates.iter().map(|(idx, _, _)| rules[*idx].weight).collect();
    match WeightedIndex::new(&weights) {
        Ok(dist) => candidates[dist.sample(rng)],
        Err(_) => candidates[0],
    }
}

fn resolve_place<R: Rng>(
    persona: &PersonaTemplate,
    rule_idx: usize,
    ctx: &mut ResidentContext<'_>,
    start: u32,
    end: u32,
    rng: &mut R,
    warnings: &mut Vec<ConfigWarning>,
) -> (Place, u32) {
    let home = Place::Unit(ctx.home);
    let building = ctx.building;
    match &persona.rules[rule_idx].location {
        LocationRule::Home => (home, end),
        LocationRule::Outside => (Place::Outside, end),
        LocationRule::Amenity { categories } => {
            let open: Vec<&Amenity> = building
                .amenities_in(categories)
                .filter(|amenity| amenity.is_open(start))
                .collect();
            match least_loaded(&open, ctx.load, start, end, rng) {
                Some(amenity) => {
                    let end = end.min(amenity.close);
                    ctx.load.book(amenity.id, start, end);
                    (Place::Amenity(amenity.id), end)
                }
                None => {
                    log::trace!("no open amenity in {categories:?} at minute {start}");
                    (home, end)
                }
            }
        }
        LocationRule::NamedAmenity { name } => match building.amenity_by_name(name) {
            Some(amenity) if amenity.is_open(start) => {
                let end = end.min(amenity.close);
                ctx.load.book(amenity.id, start, end);
                (Place::Amenity(amenity.id), end)
            }
            Some(_) => (home, end),
            None => {
                warnings.push(ConfigWarning {
                    persona: persona.name.clone(),
                    rule: rule_idx,
                    message: format!("unknown amenity {name}"),
                });
                (home, end)
            }
        },
    }
}

/// Pick the amenity with the lowest projected occupancy, breaking ties at random.
fn least_loaded<'a, R: Rng>(
    open: &[&'a Amenity],
    load: &AmenityLoad,
    start: u32,
    end: u32,
    rng: &mut R,
) -> Option<&'a Amenity> {
    let loads: Vec<f64> = open
        .iter()
        .map(|amenity| load.projected(amenity, start, end.min(amenity.close)))
        .collect();
    let lowest = loads.iter().copied().min_by(f64::total_cmp)?;
    let tied: Vec<&'a Amenity> = open
        .iter()
        .zip(&loads)
        .filter(|(_, load)| **load == lowest)
        .map(|(amenity, _)| *amenity)
        .collect();
    tied.choose(rng).copied()
}

/// Merge adjacent segments with the same activity and place.
fn merge_segments(segments: Vec<Segment>) -> Vec<Segment> {
    let mut merged: Vec<Segment> = Vec::with_capacity(segments.len());
    for segment in segments {
        match merged.last_mut() {
            Some(prev)
                if prev.activity == segment.activity
                    && prev.place == segment.place
                    && prev.end == segment.start =>
            {
                prev.end = segment.end;
            }
            _ => merged.push(segment),
        }
    }
    merged
}
