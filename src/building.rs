//! Static description of the tower: floors, units and amenities.

use crate::config::check_num;
use crate::time::MINUTES_PER_DAY;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Index of a unit in [`Building::units`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub usize);

/// Index of an amenity in [`Building::amenities`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AmenityId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmenityCategory {
    Lounge,
    Pool,
    Fitness,
    Workspace,
    Sports,
    Spa,
    Family,
    Dining,
}

/// A location a resident can be at or be heading to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Place {
    Unit(UnitId),
    Amenity(AmenityId),
    /// The street outside the ground-floor entrance.
    Outside,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub label: String,
    pub floor: i32,
    pub position: f64,
    pub width: f64,
    pub room_type: String,
    pub bedrooms: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amenity {
    pub id: AmenityId,
    pub name: String,
    pub category: AmenityCategory,
    pub floor: i32,
    pub capacity: usize,
    pub position: f64,
    pub width: f64,
    pub open: u32,
    pub close: u32,
}

impl Amenity {
    pub fn is_open(&self, minute: u32) -> bool {
        (self.open..self.close).contains(&minute)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Floor {
    pub number: i32,
    pub label: String,
    pub units: Vec<UnitId>,
    pub amenities: Vec<AmenityId>,
}

/// Immutable building model shared by the generator and the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    name: String,
    address: String,
    street_x: f64,
    floors: Vec<Floor>,
    units: Vec<Unit>,
    amenities: Vec<Amenity>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct BuildingConfig {
    pub name: String,
    #[serde(default)]
    pub address: String,
    /// Horizontal position of the street entrance on the ground floor.
    #[serde(default = "default_street_x")]
    pub street_x: f64,
    #[serde(default)]
    pub floors: Vec<FloorConfig>,
    #[serde(default)]
    pub typical: Option<TypicalFloors>,
    #[serde(default)]
    pub amenities: Vec<AmenityConfig>,
}

/// An explicitly described floor; overrides any typical floor with the same number.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct FloorConfig {
    pub number: i32,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub units: Vec<UnitConfig>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct UnitConfig {
    pub id: String,
    pub position: f64,
    #[serde(default = "default_unit_width")]
    pub width: f64,
    #[serde(default = "default_room_type")]
    pub room_type: String,
    #[serde(default = "default_bedrooms")]
    pub bedrooms: u32,
}

/// A run of identical residential floors stamped from a unit template.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct TypicalFloors {
    pub first: i32,
    pub last: i32,
    pub units: Vec<UnitTemplate>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct UnitTemplate {
    pub suffix: String,
    pub position: f64,
    #[serde(default = "default_unit_width")]
    pub width: f64,
    #[serde(default = "default_room_type")]
    pub room_type: String,
    #[serde(default = "default_bedrooms")]
    pub bedrooms: u32,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct AmenityConfig {
    pub name: String,
    pub category: AmenityCategory,
    pub floor: i32,
    pub capacity: usize,
    pub position: f64,
    #[serde(default = "default_amenity_width")]
    pub width: f64,
    #[serde(default)]
    pub open: u32,
    #[serde(default = "default_close")]
    pub close: u32,
}

fn default_street_x() -> f64 {
    0.15
}

fn default_unit_width() -> f64 {
    0.2
}

fn default_amenity_width() -> f64 {
    0.3
}

fn default_room_type() -> String {
    "unit".to_string()
}

fn default_bedrooms() -> u32 {
    1
}

fn default_close() -> u32 {
    MINUTES_PER_DAY
}

impl Building {
    /// Build and validate a [`Building`] from its configuration.
    pub fn from_config(cfg: &BuildingConfig) -> Result<Self> {
        check_num(cfg.street_x, 0.0..=1.0).context("invalid street position")?;

        // Floor number -> (label, units), typical floors first so explicit ones override them.
        let mut layout: BTreeMap<i32, (Option<String>, Vec<UnitConfig>)> = BTreeMap::new();
        if let Some(typical) = &cfg.typical {
            if typical.first > typical.last {
                bail!(
                    "typical floors must be ordered, but range is {}..={}",
                    typical.first,
                    typical.last
                );
            }
            for number in typical.first..=typical.last {
                let units = typical
                    .units
                    .iter()
                    .map(|tpl| UnitConfig {
                        id: format!("{number:02}{}", tpl.suffix),
                        position: tpl.position,
                        width: tpl.width,
                        room_type: tpl.room_type.clone(),
                        bedrooms: tpl.bedrooms,
                    })
                    .collect();
                layout.insert(number, (None, units));
            }
        }
        let mut explicit = BTreeSet::new();
        for floor in &cfg.floors {
            if !explicit.insert(floor.number) {
                bail!("floor {} is described more than once", floor.number);
            }
            layout.insert(floor.number, (floor.label.clone(), floor.units.clone()));
        }
        if layout.is_empty() {
            bail!("building must have at least one floor");
        }

        let mut floors = Vec::with_capacity(layout.len());
        let mut units = Vec::new();
        let mut unit_labels = BTreeSet::new();
        for (number, (label, unit_cfgs)) in layout {
            check_num(number, -10..=500).context("invalid floor number")?;
            let mut floor = Floor {
                number,
                label: label.unwrap_or_else(|| format!("{number:02}")),
                units: Vec::with_capacity(unit_cfgs.len()),
                amenities: Vec::new(),
            };
            for unit_cfg in unit_cfgs {
                if !unit_labels.insert(unit_cfg.id.clone()) {
                    bail!("unit {} is declared more than once", unit_cfg.id);
                }
                check_num(unit_cfg.position, 0.0..=1.0)
                    .with_context(|| format!("invalid position of unit {}", unit_cfg.id))?;
                check_num(unit_cfg.width, 0.0..=1.0)
                    .with_context(|| format!("invalid width of unit {}", unit_cfg.id))?;
                let id = UnitId(units.len());
                floor.units.push(id);
                units.push(Unit {
                    id,
                    label: unit_cfg.id,
                    floor: number,
                    position: unit_cfg.position,
                    width: unit_cfg.width,
                    room_type: unit_cfg.room_type,
                    bedrooms: unit_cfg.bedrooms,
                });
            }
            floors.push(floor);
        }

        let mut amenities = Vec::with_capacity(cfg.amenities.len());
        let mut amenity_names = BTreeSet::new();
        for amenity_cfg in &cfg.amenities {
            let name = &amenity_cfg.name;
            if !amenity_names.insert(name.clone()) {
                bail!("amenity {name} is declared more than once");
            }
            check_num(amenity_cfg.capacity, 1..=100_000)
                .with_context(|| format!("invalid capacity of amenity {name}"))?;
            check_num(amenity_cfg.position, 0.0..=1.0)
                .with_context(|| format!("invalid position of amenity {name}"))?;
            check_num(amenity_cfg.width, 0.0..=1.0)
                .with_context(|| format!("invalid width of amenity {name}"))?;
            check_num(amenity_cfg.close, 1..=MINUTES_PER_DAY)
                .with_context(|| format!("invalid closing time of amenity {name}"))?;
            check_num(amenity_cfg.open, 0..amenity_cfg.close)
                .with_context(|| format!("invalid opening time of amenity {name}"))?;

            let id = AmenityId(amenities.len());
            let floor = floors
                .iter_mut()
                .find(|floor| floor.number == amenity_cfg.floor)
                .with_context(|| format!("amenity {name} is on a missing floor"))?;
            floor.amenities.push(id);
            amenities.push(Amenity {
                id,
                name: name.clone(),
                category: amenity_cfg.category,
                floor: amenity_cfg.floor,
                capacity: amenity_cfg.capacity,
                position: amenity_cfg.position,
                width: amenity_cfg.width,
                open: amenity_cfg.open,
                close: amenity_cfg.close,
            });
        }

        Ok(Self {
            name: cfg.name.clone(),
            address: cfg.address.clone(),
            street_x: cfg.street_x,
            floors,
            units,
            amenities,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Floors sorted by ascending number.
    pub fn floors(&self) -> &[Floor] {
        &self.floors
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn amenities(&self) -> &[Amenity] {
        &self.amenities
    }

    pub fn unit(&self, id: UnitId) -> &Unit {
        &self.units[id.0]
    }

    pub fn amenity(&self, id: AmenityId) -> &Amenity {
        &self.amenities[id.0]
    }

    pub fn amenity_by_name(&self, name: &str) -> Option<&Amenity> {
        self.amenities.iter().find(|amenity| amenity.name == name)
    }

    pub fn amenities_in<'a>(
        &'a self,
        categories: &'a [AmenityCategory],
    ) -> impl Iterator<Item = &'a Amenity> + 'a {
        self.amenities
            .iter()
            .filter(move |amenity| categories.contains(&amenity.category))
    }

    pub fn floor(&self, number: i32) -> Option<&Floor> {
        self.floors.iter().find(|floor| floor.number == number)
    }

    pub fn floor_label(&self, number: i32) -> String {
        match self.floor(number) {
            Some(floor) => floor.label.clone(),
            None => number.to_string(),
        }
    }

    pub fn min_floor(&self) -> i32 {
        self.floors.first().map_or(0, |floor| floor.number)
    }

    pub fn max_floor(&self) -> i32 {
        self.floors.last().map_or(0, |floor| floor.number)
    }

    /// Floor holding the street entrance: floor 0 when present, else the lowest floor.
    pub fn ground_floor(&self) -> i32 {
        if self.floor(0).is_some() {
            0
        } else {
            self.min_floor()
        }
    }

    pub fn street_x(&self) -> f64 {
        self.street_x
    }

    pub fn place_floor(&self, place: Place) -> i32 {
        match place {
            Place::Unit(id) => self.unit(id).floor,
            Place::Amenity(id) => self.amenity(id).floor,
            Place::Outside => self.ground_floor(),
        }
    }

    pub fn place_x(&self, place: Place) -> f64 {
        match place {
            Place::Unit(id) => self.unit(id).position,
            Place::Amenity(id) => self.amenity(id).position,
            Place::Outside => self.street_x,
        }
    }

    pub fn place_label(&self, place: Place) -> &str {
        match place {
            Place::Unit(id) => &self.unit(id).label,
            Place::Amenity(id) => &self.amenity(id).name,
            Place::Outside => "Outside",
        }
    }
}
