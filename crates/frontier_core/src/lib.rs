//! # Frontier Core
//!
//! Deterministic fixed-timestep RTS simulation core.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No sockets, threads or clocks
//! - No system randomness
//! - No floating-point math (integer milli-units and fixed-point factors)
//!
//! This separation enables:
//! - Lockstep multiplayer (identical simulation across peers)
//! - Headless hosts
//! - Replay scrubbing and rollback
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`simulation`] - The [`Simulator`](simulation::Simulator) and its tick loop
//! - [`world`] - The mutable world state and its hash
//! - [`components`] - Entity, command and order definitions
//! - [`data`] - Content definitions loaded from RON
//! - [`orders`], [`movement`], [`combat`], [`economy`], [`buildings`],
//!   [`production`], [`research`], [`vision`] - Per-tick subsystems
//! - [`pathfinding`], [`flow_field`], [`spatial`] - Navigation and queries
//! - [`snapshot`], [`replay`], [`rollback`] - Persistence and time travel
//! - [`lockstep`] - Input synchronization and desync detection
//! - [`ai`] - Behavior-tree opponents that play through the command API
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod ai;
pub mod buildings;
pub mod combat;
pub mod components;
pub mod config;
pub mod data;
pub mod economy;
pub mod error;
pub mod events;
pub mod factions;
pub mod flow_field;
pub mod hash;
pub mod lockstep;
pub mod math;
pub mod movement;
pub mod orders;
pub mod pathfinding;
pub mod production;
pub mod replay;
pub mod research;
pub mod rng;
pub mod rollback;
pub mod simulation;
pub mod snapshot;
pub mod spatial;
pub mod unit_types;
pub mod vision;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::components::*;
    pub use crate::config::SimConfig;
    pub use crate::data::{BuildingData, ContentRegistry, TechData, TechEffect, UnitData};
    pub use crate::error::{GameError, Result};
    pub use crate::events::{DamageEvent, SimEvent, SimEventKind};
    pub use crate::factions::{Faction, FactionId, ResourceKind, ResourceStock};
    pub use crate::lockstep::{LockstepConfig, LockstepManager, LockstepTransport};
    pub use crate::math::Fixed;
    pub use crate::simulation::{Simulator, MS_PER_TICK, TICK_RATE};
    pub use crate::snapshot::WorldSnapshot;
}
