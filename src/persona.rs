//! Persona templates: probability-weighted activity rules per archetype.

use crate::building::AmenityCategory;
use crate::config::check_num;
use crate::time::MINUTES_PER_DAY;
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rand_distr::weighted::WeightedIndex;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Sleep,
    AtHome,
    Commute,
    Work,
    Eat,
    Errand,
    Leisure,
    Amenity,
    Away,
    Idle,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 10] = [
        ActivityKind::Sleep,
        ActivityKind::AtHome,
        ActivityKind::Commute,
        ActivityKind::Work,
        ActivityKind::Eat,
        ActivityKind::Errand,
        ActivityKind::Leisure,
        ActivityKind::Amenity,
        ActivityKind::Away,
        ActivityKind::Idle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Sleep => "sleep",
            ActivityKind::AtHome => "at_home",
            ActivityKind::Commute => "commute",
            ActivityKind::Work => "work",
            ActivityKind::Eat => "eat",
            ActivityKind::Errand => "errand",
            ActivityKind::Leisure => "leisure",
            ActivityKind::Amenity => "amenity",
            ActivityKind::Away => "away",
            ActivityKind::Idle => "idle",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an activity rule sends the resident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LocationRule {
    Home,
    Outside,
    /// The least loaded open amenity among these categories.
    Amenity { categories: Vec<AmenityCategory> },
    NamedAmenity { name: String },
}

/// One probability-weighted activity of a persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRule {
    pub activity: ActivityKind,
    #[serde(default)]
    pub label: Option<String>,
    /// Half-open `[start, end)` minute-of-day windows. The rule may start
    /// anywhere inside a window and its segment is clipped to end by the
    /// window's end.
    pub windows: Vec<[u32; 2]>,
    /// Inclusive `[min, max]` duration in minutes.
    pub duration: [u32; 2],
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default = "default_location")]
    pub location: LocationRule,
    /// A mandatory rule fires exactly at the start of each of its windows and
    /// no other segment may run across that start.
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub max_per_day: Option<u32>,
}

fn default_weight() -> f64 {
    1.0
}

fn default_location() -> LocationRule {
    LocationRule::Home
}

fn default_age_range() -> [u32; 2] {
    [25, 45]
}

impl ActivityRule {
    pub fn label(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => self.activity.to_string(),
        }
    }

    /// Index and bounds of the window containing `minute`.
    pub fn window_at(&self, minute: u32) -> Option<(usize, [u32; 2])> {
        self.windows
            .iter()
            .enumerate()
            .find(|(_, window)| (window[0]..window[1]).contains(&minute))
            .map(|(idx, window)| (idx, *window))
    }

    /// Describe why the rule cannot produce a valid segment, if it cannot.
    pub fn problem(&self) -> Option<String> {
        let [min, max] = self.duration;
        if min == 0 || max < min {
            return Some(format!("duration range {min}..={max} is empty or zero-length"));
        }
        if !(self.weight.is_finite() && self.weight > 0.0) {
            return Some(format!("weight {} is not positive", self.weight));
        }
        if self.windows.is_empty() {
            return Some("no time window".to_string());
        }
        if let Some(window) = self
            .windows
            .iter()
            .find(|window| window[0] >= window[1] || window[1] > MINUTES_PER_DAY)
        {
            return Some(format!("window {}..{} is inverted or out of day", window[0], window[1]));
        }
        if self.max_per_day == Some(0) {
            return Some("max_per_day is zero".to_string());
        }
        None
    }
}

/// Colour choices for a persona's residents; purely cosmetic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub hair: Vec<String>,
    pub outfit: Vec<String>,
    pub accent: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaTemplate {
    pub name: String,
    /// Relative frequency of this persona in the population.
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default = "default_age_range")]
    pub age_range: [u32; 2],
    #[serde(default)]
    pub occupations: Vec<String>,
    #[serde(default)]
    pub appearance: Palette,
    pub rules: Vec<ActivityRule>,
}

/// Named persona templates, loaded once.
#[derive(Debug, Clone)]
pub struct PersonaCatalog {
    personas: Vec<PersonaTemplate>,
    persona_dist: WeightedIndex<f64>,
}

impl PersonaCatalog {
    /// Build a catalog, rejecting structural faults.
    ///
    /// Malformed individual rules are tolerated here; the schedule generator
    /// skips them with a warning.
    pub fn new(personas: Vec<PersonaTemplate>) -> Result<Self> {
        if personas.is_empty() {
            bail!("catalog must have at least one persona");
        }
        let mut names = BTreeSet::new();
        for persona in &personas {
            if !names.insert(persona.name.as_str()) {
                bail!("persona {} is declared more than once", persona.name);
            }
            check_num(persona.weight, f64::MIN_POSITIVE..=1e6)
                .with_context(|| format!("invalid weight of persona {}", persona.name))?;
            let [age_min, age_max] = persona.age_range;
            check_num(age_max, age_min..=150)
                .with_context(|| format!("invalid age range of persona {}", persona.name))?;
        }

        let weights: Vec<f64> = personas.iter().map(|persona| persona.weight).collect();
        let persona_dist = WeightedIndex::new(&weights).context("invalid persona weights")?;

        Ok(Self {
            personas,
            persona_dist,
        })
    }

    pub fn personas(&self) -> &[PersonaTemplate] {
        &self.personas
    }

    pub fn get(&self, name: &str) -> Option<&PersonaTemplate> {
        self.personas.iter().find(|persona| persona.name == name)
    }

    /// Draw a persona according to the persona weights.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> &PersonaTemplate {
        &self.personas[self.persona_dist.sample(rng)]
    }
}
