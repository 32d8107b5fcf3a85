//! Error types for the simulation core.
//!
//! Nothing on the per-tick path returns an error. These variants surface
//! from the command API (capacity rejections), from persistence, and from
//! lockstep hash comparison.

use thiserror::Error;

use crate::components::{BuildingTypeId, EntityId, TechId, UnitTypeId};
use crate::factions::{FactionId, ResourceKind};

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all simulation errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Faction index outside the fixed faction table.
    #[error("Invalid faction: {0}")]
    InvalidFaction(FactionId),

    /// Unit type was never registered.
    #[error("Unknown unit type: {0}")]
    UnknownUnitType(UnitTypeId),

    /// Building type has no entry in the content registry.
    #[error("Unknown building type: {0}")]
    UnknownBuildingType(BuildingTypeId),

    /// Tech has no entry in the content registry.
    #[error("Unknown tech: {0}")]
    UnknownTech(TechId),

    /// Tech tree requirement not met.
    #[error("Tech requirement not met: {0}")]
    TechRequirementNotMet(String),

    /// Tech was already researched or is in progress.
    #[error("Tech {0} already researched or in progress")]
    AlreadyResearched(TechId),

    /// Every research slot of the faction is busy.
    #[error("No free research slot for faction {0}")]
    NoResearchSlot(FactionId),

    /// Insufficient resources.
    #[error("Insufficient resources: need {required} {resource}, have {available}")]
    InsufficientResources {
        /// Resource type.
        resource: ResourceKind,
        /// Amount required.
        required: i32,
        /// Amount available.
        available: i32,
    },

    /// Population headroom exhausted.
    #[error("Population cap reached: {pop} + {cost} > {cap}")]
    PopulationCapReached {
        /// Current population.
        pop: i32,
        /// Population cost of the rejected unit.
        cost: i32,
        /// Current population cap.
        cap: i32,
    },

    /// Production queue already holds the maximum number of items.
    #[error("Production queue full for building {0}")]
    ProductionQueueFull(EntityId),

    /// Building cannot produce while under construction.
    #[error("Building {0} is still under construction")]
    UnderConstruction(EntityId),

    /// Footprint is out of bounds or overlaps an occupied tile.
    #[error("Cannot place building at tile ({x}, {y})")]
    PlacementBlocked {
        /// Tile x of the footprint origin.
        x: i32,
        /// Tile y of the footprint origin.
        y: i32,
    },

    /// Nothing to cancel.
    #[error("Nothing queued on building {0}")]
    NothingQueued(EntityId),

    /// Data file parsing error.
    #[error("Failed to parse data '{path}': {message}")]
    DataParseError {
        /// Path or label of the data that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Encoding or decoding of persisted state failed.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Replay file written by an incompatible build.
    #[error("Replay version mismatch: expected {expected}, found {found}")]
    ReplayVersionMismatch {
        /// Version this build writes.
        expected: u32,
        /// Version found in the file.
        found: u32,
    },

    /// Filesystem error while saving or loading.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),

    /// Desync detected in multiplayer.
    #[error("Desync detected at tick {tick}: local hash {local_hash:#018x}, remote hash {remote_hash:#018x}")]
    DesyncDetected {
        /// Tick where desync occurred.
        tick: u64,
        /// Local simulation hash.
        local_hash: u64,
        /// Remote simulation hash.
        remote_hash: u64,
    },
}
