//! Entity data definitions.
//!
//! Entities are plain data stored in dense arrays owned by the world state.
//! Behavior lives in the per-tick subsystems.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::factions::{FactionId, ResourceKind};
use crate::math::TILE_SIZE;

/// Unique identifier for entities of every kind.
///
/// Ids come from one monotonically increasing counter, so a value is never
/// reused for a later entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Index of a registered unit type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UnitTypeId(pub u16);

impl UnitTypeId {
    /// Position in the unit type table.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for UnitTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit-type {}", self.0)
    }
}

/// Index of a building definition in the content registry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BuildingTypeId(pub u16);

impl BuildingTypeId {
    /// Position in the building definition list.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BuildingTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "building-type {}", self.0)
    }
}

/// Index of a tech definition; also its bit in the faction tech mask.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TechId(pub u16);

impl TechId {
    /// Position in the tech definition list.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Bit in the faction tech mask, or `None` past the 64th tech.
    #[must_use]
    pub const fn flag(self) -> Option<u64> {
        if self.0 < 64 {
            Some(1u64 << self.0)
        } else {
            None
        }
    }
}

impl fmt::Display for TechId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tech {}", self.0)
    }
}

// ============================================================================
// Orders and commands
// ============================================================================

/// The single active order of a unit. `Idle` is the "None" state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OrderType {
    /// No active order.
    #[default]
    Idle,
    /// Walking to a point.
    Move,
    /// Attacking an explicit target.
    Attack,
    /// Gathering from a resource node.
    Gather,
    /// Walking to a point, engaging hostiles met on the way.
    AttackMove,
}

impl OrderType {
    /// Stable code folded into the tick hash.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Idle => 0,
            Self::Move => 1,
            Self::Attack => 2,
            Self::Gather => 3,
            Self::AttackMove => 4,
        }
    }
}

/// Kind of an externally submitted command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    /// Move to `(target_x, target_y)`.
    Move,
    /// Attack the entity packed into `target_x`.
    Attack,
    /// Gather from the node packed into `target_x`.
    Gather,
    /// Attack-move to `(target_x, target_y)`.
    AttackMove,
    /// Drop every queued and active order.
    Stop,
}

impl CommandKind {
    /// Stable code folded into the tick hash.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Move => 1,
            Self::Attack => 2,
            Self::Gather => 3,
            Self::AttackMove => 4,
            Self::Stop => 5,
        }
    }
}

/// An externally issued intent, ready once `issue_tick <= current tick`.
///
/// For [`CommandKind::Attack`] and [`CommandKind::Gather`] the target entity
/// id travels in `target_x`; `target_y` is unused. This keeps the wire shape
/// identical for every kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Command {
    /// Tick at (or after) which the command may execute.
    pub issue_tick: u64,
    /// What to do.
    pub kind: CommandKind,
    /// Acting unit.
    pub entity: EntityId,
    /// Target x in milli-units, or the packed target entity id.
    pub target_x: i32,
    /// Target y in milli-units.
    pub target_y: i32,
}

impl Command {
    /// Build a point-targeted command.
    #[must_use]
    pub const fn at_point(issue_tick: u64, kind: CommandKind, entity: EntityId, x: i32, y: i32) -> Self {
        Self {
            issue_tick,
            kind,
            entity,
            target_x: x,
            target_y: y,
        }
    }

    /// Build an entity-targeted command, packing the target id into `target_x`.
    #[must_use]
    pub const fn at_entity(
        issue_tick: u64,
        kind: CommandKind,
        entity: EntityId,
        target: EntityId,
    ) -> Self {
        Self {
            issue_tick,
            kind,
            entity,
            target_x: target.0 as i32,
            target_y: 0,
        }
    }

    /// Target entity of an Attack or Gather command.
    #[must_use]
    pub const fn target_entity(&self) -> EntityId {
        EntityId(self.target_x as u32)
    }

    /// Whether the command may execute at `tick`.
    #[must_use]
    pub const fn is_ready(&self, tick: u64) -> bool {
        self.issue_tick <= tick
    }
}

/// A validated command waiting in a unit's FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueuedOrder {
    /// Walk to a point.
    Move {
        /// Destination x.
        x: i32,
        /// Destination y.
        y: i32,
    },
    /// Attack an entity.
    Attack {
        /// Unit or building to attack.
        target: EntityId,
    },
    /// Gather from a node.
    Gather {
        /// Resource node.
        node: EntityId,
    },
    /// Attack-move to a point.
    AttackMove {
        /// Destination x.
        x: i32,
        /// Destination y.
        y: i32,
    },
}

impl QueuedOrder {
    /// `(kind code, a, b)` as folded into the tick hash. Entity targets
    /// occupy `a`; point orders use `a` and `b` for the coordinates.
    #[must_use]
    pub const fn hash_words(self) -> (i32, i32, i32) {
        match self {
            Self::Move { x, y } => (1, x, y),
            Self::Attack { target } => (2, target.0 as i32, 0),
            Self::Gather { node } => (3, node.0 as i32, 0),
            Self::AttackMove { x, y } => (4, x, y),
        }
    }
}

// ============================================================================
// Combat types
// ============================================================================

/// Damage classification shared by offense multipliers and armor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DamageType {
    /// Close combat.
    #[default]
    Melee,
    /// Arrows, bolts and bullets.
    Pierce,
    /// Siege engines.
    Siege,
    /// Spells.
    Magic,
}

impl DamageType {
    /// All damage types in resolution order.
    pub const ALL: [Self; 4] = [Self::Melee, Self::Pierce, Self::Siege, Self::Magic];

    /// Stable code folded into the tick hash.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Melee => 0,
            Self::Pierce => 1,
            Self::Siege => 2,
            Self::Magic => 3,
        }
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A mobile unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Identity.
    pub id: EntityId,
    /// Registered type.
    pub type_id: UnitTypeId,
    /// Owner.
    pub faction: FactionId,
    /// Position x in milli-units.
    pub x: i32,
    /// Position y in milli-units.
    pub y: i32,
    /// Current hit points.
    pub hp: i32,
    /// Final movement destination x.
    pub target_x: i32,
    /// Final movement destination y.
    pub target_y: i32,
    /// Whether the unit is walking toward `(target_x, target_y)`.
    pub has_move_target: bool,
    /// Time until the next attack may start.
    pub attack_cooldown_ms: i32,
    /// Remaining pre-commit windup; nonzero means an attack is winding up.
    pub attack_windup_remaining_ms: i32,
    /// Remaining delay before a committed melee hit lands.
    pub impact_remaining_ms: i32,
    /// Target of the attack currently winding up or awaiting impact.
    pub pending_attack_target: Option<EntityId>,
    /// The active order.
    pub current_order: OrderType,
    /// Entity the active order refers to (attack target or resource node).
    pub order_target: Option<EntityId>,
    /// Explicit preferred attack target.
    pub attack_target: Option<EntityId>,
    /// Accumulated gather progress in ms * rate.
    pub gather_progress: i32,
    /// Resources carried.
    pub carry_amount: i32,
    /// Type of the carried resources.
    pub carry_kind: ResourceKind,
    /// Walking back to a drop-off with cargo.
    pub returning_with_cargo: bool,
}

impl Unit {
    /// Create an idle unit at a position.
    #[must_use]
    pub fn new(id: EntityId, type_id: UnitTypeId, faction: FactionId, x: i32, y: i32, hp: i32) -> Self {
        Self {
            id,
            type_id,
            faction,
            x,
            y,
            hp,
            target_x: x,
            target_y: y,
            has_move_target: false,
            attack_cooldown_ms: 0,
            attack_windup_remaining_ms: 0,
            impact_remaining_ms: 0,
            pending_attack_target: None,
            current_order: OrderType::Idle,
            order_target: None,
            attack_target: None,
            gather_progress: 0,
            carry_amount: 0,
            carry_kind: ResourceKind::Food,
            returning_with_cargo: false,
        }
    }

    /// Idle in the sense used by order promotion.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        !self.has_move_target && matches!(self.current_order, OrderType::Idle)
    }

    /// Start walking toward a point.
    pub fn set_move_target(&mut self, x: i32, y: i32) {
        self.target_x = x;
        self.target_y = y;
        self.has_move_target = true;
    }
}

/// Active training slot of a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingSlot {
    /// Unit being trained.
    pub unit_type: UnitTypeId,
    /// Time left.
    pub remaining_ms: i32,
    /// Total train time.
    pub total_ms: i32,
}

/// A placed structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    /// Identity.
    pub id: EntityId,
    /// Content definition index.
    pub type_id: BuildingTypeId,
    /// Owner.
    pub faction: FactionId,
    /// Footprint origin x in milli-units.
    pub x: i32,
    /// Footprint origin y in milli-units.
    pub y: i32,
    /// Current hit points.
    pub hp: i32,
    /// Maximum hit points.
    pub max_hp: i32,
    /// Footprint width in tiles.
    pub footprint_w: i32,
    /// Footprint height in tiles.
    pub footprint_h: i32,
    /// Still being built.
    pub under_construction: bool,
    /// Total build time.
    pub build_total_ms: i32,
    /// Build time left.
    pub build_remaining_ms: i32,
    /// Active training slot.
    pub training: Option<TrainingSlot>,
    /// Units waiting behind the active slot.
    pub pending: Vec<UnitTypeId>,
    /// Where trained units walk after spawning.
    pub rally_point: Option<(i32, i32)>,
}

impl Building {
    /// Footprint origin tile.
    #[must_use]
    pub const fn origin_tile(&self) -> (i32, i32) {
        (crate::math::to_tile(self.x), crate::math::to_tile(self.y))
    }

    /// Center of the footprint in milli-units.
    #[must_use]
    pub const fn center(&self) -> (i32, i32) {
        let (tx, ty) = self.origin_tile();
        (
            tx * TILE_SIZE + self.footprint_w * TILE_SIZE / 2,
            ty * TILE_SIZE + self.footprint_h * TILE_SIZE / 2,
        )
    }

    /// Number of items in the active slot and pending list.
    #[must_use]
    pub fn queued_count(&self) -> usize {
        usize::from(self.training.is_some()) + self.pending.len()
    }
}

/// A harvestable resource deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNode {
    /// Identity.
    pub id: EntityId,
    /// What it yields.
    pub kind: ResourceKind,
    /// Position x in milli-units.
    pub x: i32,
    /// Position y in milli-units.
    pub y: i32,
    /// Amount left; never negative.
    pub amount_remaining: i32,
}

/// A projectile in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projectile {
    /// Identity.
    pub id: EntityId,
    /// Position x in milli-units.
    pub x: i32,
    /// Position y in milli-units.
    pub y: i32,
    /// Entity it was fired at.
    pub target: EntityId,
    /// Unit type that fired it; its offense profile resolves the hit.
    pub source_type: UnitTypeId,
    /// Faction of the shooter.
    pub faction: FactionId,
    /// Speed in milli-units per second.
    pub speed: i32,
    /// Base damage before armor.
    pub damage: i32,
    /// Primary damage type.
    pub damage_type: DamageType,
    /// Time before it fizzles.
    pub lifetime_remaining_ms: i32,
    /// Shooter.
    pub attacker: EntityId,
    /// Follows the target instead of flying to the aim point.
    pub homing: bool,
    /// Aim point x for non-homing shots.
    pub aim_x: i32,
    /// Aim point y for non-homing shots.
    pub aim_y: i32,
}
