//! Scenario loading and configuration.
//!
//! Scenarios define the initial simulator state for headless runs: config,
//! content, per-faction starting entities, resource nodes and the orders
//! issued before the first tick. Everything is authored in RON and
//! addressed by string id.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use frontier_core::components::{EntityId, UnitTypeId};
use frontier_core::config::SimConfig;
use frontier_core::data::ContentRegistry;
use frontier_core::error::GameError;
use frontier_core::factions::{FactionId, ResourceKind, ResourceStock};
use frontier_core::simulation::Simulator;
use frontier_test_utils::fixtures::{reference_content, reference_scenario, REFERENCE_TICKS};

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// A placement names a unit type the content does not define.
    #[error("Unknown unit type id '{0}'")]
    UnknownUnitType(String),
    /// A placement names a building the content does not define.
    #[error("Unknown building id '{0}'")]
    UnknownBuilding(String),
    /// An order refers to a resource node index that does not exist.
    #[error("Order refers to missing resource node {0}")]
    UnknownNode(usize),
    /// The simulator rejected a placement.
    #[error("Scenario setup rejected: {0}")]
    Rejected(#[from] GameError),
}

/// A complete scenario configuration.
///
/// # Example RON
///
/// ```ron
/// Scenario(
///     name: "mirror",
///     ticks: 600,
///     config: (map_width: 24, map_height: 24),
///     factions: [
///         (faction: 0, pop_cap: 20, units: [(unit_type: "worker", x: 2000, y: 2000, count: 3)]),
///     ],
///     resource_nodes: [(kind: Food, x: 6000, y: 2000, amount: 300)],
///     orders: [(faction: 0, unit_type: "worker", order: Gather(node: 0))],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Ticks a run lasts.
    pub ticks: u64,
    /// Simulator configuration.
    pub config: SimConfig,
    /// Content; the reference units and buildings when left empty.
    pub content: ContentRegistry,
    /// Per-faction starting state.
    pub factions: Vec<FactionSetup>,
    /// Resource nodes, addressed by index from orders.
    pub resource_nodes: Vec<NodePlacement>,
    /// Orders issued before the first tick, in order.
    pub orders: Vec<ScenarioOrder>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            name: "unnamed".to_string(),
            ticks: REFERENCE_TICKS,
            config: SimConfig::default(),
            content: ContentRegistry::default(),
            factions: Vec::new(),
            resource_nodes: Vec::new(),
            orders: Vec::new(),
        }
    }
}

/// Setup for a single faction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FactionSetup {
    /// Faction index.
    pub faction: u8,
    /// Population cap; 0 leaves population unlimited.
    pub pop_cap: i32,
    /// Starting stockpile.
    pub resources: ResourceStock,
    /// Completed buildings, placed before units.
    pub buildings: Vec<BuildingPlacement>,
    /// Starting units.
    pub units: Vec<UnitPlacement>,
}

/// A group of identical units in a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPlacement {
    /// Unit type id from the content.
    pub unit_type: String,
    /// X of the first unit, in milli-units.
    pub x: i32,
    /// Y of every unit.
    pub y: i32,
    /// Number of units, spaced [`UnitPlacement::SPACING`] apart along x.
    #[serde(default = "one")]
    pub count: u32,
}

impl UnitPlacement {
    /// Distance between units of one placement.
    pub const SPACING: i32 = 300;
}

const fn one() -> u32 {
    1
}

/// A completed building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingPlacement {
    /// Building id from the content.
    pub building_type: String,
    /// Footprint origin x, in milli-units.
    pub x: i32,
    /// Footprint origin y, in milli-units.
    pub y: i32,
}

/// A resource node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePlacement {
    /// Resource held.
    pub kind: ResourceKind,
    /// X in milli-units.
    pub x: i32,
    /// Y in milli-units.
    pub y: i32,
    /// Starting amount.
    pub amount: i32,
}

/// What a [`ScenarioOrder`] tells its units to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSpec {
    /// Walk to a point.
    Move {
        /// Target x.
        x: i32,
        /// Target y.
        y: i32,
    },
    /// Walk to a point, engaging enemies on the way.
    AttackMove {
        /// Target x.
        x: i32,
        /// Target y.
        y: i32,
    },
    /// Gather from a resource node.
    Gather {
        /// Index into [`Scenario::resource_nodes`].
        node: usize,
    },
}

/// An order for every unit of one type owned by one faction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioOrder {
    /// Owning faction.
    pub faction: u8,
    /// Unit type id from the content.
    pub unit_type: String,
    /// The order.
    pub order: OrderSpec,
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Self = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Build a simulator at tick 0 with every order already issued.
    pub fn build(&self) -> Result<Simulator, ScenarioError> {
        let content = if self.content.units.is_empty() && self.content.buildings.is_empty() {
            reference_content()
        } else {
            self.content.clone()
        };
        let mut sim = Simulator::with_content(self.config.clone(), content);

        let mut spawned: Vec<(FactionId, UnitTypeId, EntityId)> = Vec::new();
        for setup in &self.factions {
            let faction = FactionId(setup.faction);
            sim.set_faction_pop_cap(faction, setup.pop_cap)?;
            sim.set_faction_resources(faction, setup.resources)?;
            for building in &setup.buildings {
                let building_type = sim
                    .content()
                    .building_index(&building.building_type)
                    .ok_or_else(|| ScenarioError::UnknownBuilding(building.building_type.clone()))?;
                sim.spawn_building(building_type, faction, building.x, building.y)?;
            }
            for group in &setup.units {
                let unit_type = unit_type_by_id(&sim, &group.unit_type)?;
                let mut x = group.x;
                for _ in 0..group.count {
                    let id = sim.spawn_unit(unit_type, faction, x, group.y, 0)?;
                    spawned.push((faction, unit_type, id));
                    x = x.saturating_add(UnitPlacement::SPACING);
                }
            }
        }

        let nodes: Vec<EntityId> = self
            .resource_nodes
            .iter()
            .map(|n| sim.spawn_resource_node(n.kind, n.x, n.y, n.amount))
            .collect();

        for order in &self.orders {
            let faction = FactionId(order.faction);
            let unit_type = unit_type_by_id(&sim, &order.unit_type)?;
            let node = match order.order {
                OrderSpec::Gather { node } => {
                    Some(*nodes.get(node).ok_or(ScenarioError::UnknownNode(node))?)
                }
                _ => None,
            };
            for &(_, _, unit) in spawned
                .iter()
                .filter(|(f, t, _)| *f == faction && *t == unit_type)
            {
                match (order.order, node) {
                    (OrderSpec::Move { x, y }, _) => sim.issue_move(unit, x, y),
                    (OrderSpec::AttackMove { x, y }, _) => sim.issue_attack_move(unit, x, y),
                    (OrderSpec::Gather { .. }, Some(node)) => sim.issue_gather(unit, node),
                    (OrderSpec::Gather { .. }, None) => {}
                }
            }
        }
        Ok(sim)
    }
}

fn unit_type_by_id(sim: &Simulator, id: &str) -> Result<UnitTypeId, ScenarioError> {
    sim.unit_types()
        .iter()
        .find(|(_, data)| data.id == id)
        .map(|(type_id, _)| type_id)
        .ok_or_else(|| ScenarioError::UnknownUnitType(id.to_string()))
}

/// Where a run's starting state comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioSource {
    /// The built-in reference scenario pinned by the golden hash.
    Reference,
    /// A scenario loaded from RON.
    Custom(Scenario),
}

impl ScenarioSource {
    /// Load from `path`, or use the reference scenario.
    pub fn from_path(path: Option<&Path>) -> Result<Self, ScenarioError> {
        path.map_or(Ok(Self::Reference), |p| Scenario::load(p).map(Self::Custom))
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Reference => "reference",
            Self::Custom(scenario) => &scenario.name,
        }
    }

    /// Ticks a run lasts.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        match self {
            Self::Reference => REFERENCE_TICKS,
            Self::Custom(scenario) => scenario.ticks,
        }
    }

    /// Build a fresh simulator at tick 0.
    pub fn build(&self) -> Result<Simulator, ScenarioError> {
        match self {
            Self::Reference => Ok(reference_scenario().0),
            Self::Custom(scenario) => scenario.build(),
        }
    }
}
