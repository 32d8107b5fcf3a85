//! Versioned table of registered unit types.
//!
//! The simulator owns the table. Research is the only writer after
//! registration; every write bumps `version` so consumers can cache
//! derived values.

use serde::{Deserialize, Serialize};

use crate::components::UnitTypeId;
use crate::data::UnitData;

/// Registered unit types, indexed by [`UnitTypeId`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnitTypeTable {
    types: Vec<UnitData>,
    version: u64,
}

impl UnitTypeTable {
    /// Empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            types: Vec::new(),
            version: 0,
        }
    }

    /// Append a type and return its id, or `None` once the id space is full.
    pub fn register(&mut self, data: UnitData) -> Option<UnitTypeId> {
        let id = u16::try_from(self.types.len()).ok()?;
        self.types.push(data);
        self.version += 1;
        Some(UnitTypeId(id))
    }

    /// Look up a type.
    #[must_use]
    pub fn get(&self, id: UnitTypeId) -> Option<&UnitData> {
        self.types.get(id.index())
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Bumped on every registration and research mutation.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Fastest registered speed, or zero for an empty table.
    #[must_use]
    pub fn max_speed(&self) -> i32 {
        self.types.iter().map(|t| t.speed).max().unwrap_or(0).max(0)
    }

    /// Iterate `(id, data)` in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (UnitTypeId, &UnitData)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, data)| (UnitTypeId(i as u16), data))
    }

    /// Rebuild a table from persisted types and version.
    pub(crate) fn restore(types: Vec<UnitData>, version: u64) -> Self {
        Self { types, version }
    }

    /// Apply a mutation to every registered type.
    pub(crate) fn modify_all(&mut self, mut f: impl FnMut(&mut UnitData)) {
        for data in &mut self.types {
            f(data);
        }
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_assigns_sequential_ids() {
        let mut table = UnitTypeTable::new();
        let a = table.register(UnitData::default());
        let b = table.register(UnitData::default());
        assert_eq!(a, Some(UnitTypeId(0)));
        assert_eq!(b, Some(UnitTypeId(1)));
        assert_eq!(table.len(), 2);
        assert_eq!(table.version(), 2);
    }

    #[test]
    fn test_modify_all_bumps_version() {
        let mut table = UnitTypeTable::new();
        table.register(UnitData {
            max_hp: 10,
            ..UnitData::default()
        });
        let before = table.version();
        table.modify_all(|t| t.max_hp *= 2);
        assert_eq!(table.get(UnitTypeId(0)).map(|t| t.max_hp), Some(20));
        assert_eq!(table.version(), before + 1);
        assert!(table.get(UnitTypeId(5)).is_none());
    }
}
