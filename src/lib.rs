//! Residential tower simulation: persona-driven residents, a shared elevator
//! and a tick engine publishing immutable snapshots.

pub mod building;
pub mod config;
pub mod elevator;
pub mod engine;
pub mod events;
pub mod persona;
pub mod resident;
pub mod runtime;
pub mod schedule;
pub mod snapshot;
pub mod time;

pub use config::Config;
pub use engine::Engine;
pub use runtime::{Runtime, RuntimeError, Speed};
pub use snapshot::Snapshot;
