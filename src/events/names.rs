//! Declared event names
//!
//! Queued events must carry a declared name. This catches typos in scenario
//! files before a trigger silently waits forever for an event nobody sends.

use std::collections::BTreeSet;

/// Event names known to the engine out of the box
pub const BUILTIN_EVENT_NAMES: &[&str] = &[
    "UnitWithTypeProduced",
    "FacilityWithTypeConstructed",
    "UnitWithTypeDestroyed",
    "AllUnitsDestroyed",
    "LostMinimap",
    "GainedMinimap",
    "AllMobileUnitsDestroyed",
    "AllFacilitiesDestroyed",
    "AllUnitsWithTypeDestroyed",
    "ProducedUnitWithTypePlaced",
    "UnitsWithTypeDestroyedCount",
    "EnemyUnitsWithTypeDestroyedCount",
    "UnitsWithTypeLostCount",
    "UnitWithIdUnfogged",
    "UnitsWithTypeUnfogged",
    "TechnologyWithTypeResearched",
    "StartProductionOfUnitWithType",
    "StartProductionOfTechnologyWithType",
    "PauseProductionOfUnitWithType",
    "PauseProductionOfTechnologyWithType",
    "ContinueProductionOfUnitWithType",
    "ContinueProductionOfTechnologyWithType",
    "StopProductionOfUnitWithType",
    "StopProductionOfTechnologyWithType",
    "PlayerLost",
    "PlayerWon",
    "GameOver",
    "Advance",
    "CustomEvent",
    "CustomStringEvent",
];

/// Set of event names that may be queued
#[derive(Debug, Clone, Default)]
pub struct EventNames {
    names: BTreeSet<String>,
}

impl EventNames {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set holding the built-in names
    pub fn builtin() -> Self {
        let mut names = Self::new();
        for name in BUILTIN_EVENT_NAMES {
            names.declare(*name);
        }
        names
    }

    pub fn declare(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|s| s.as_str())
    }
}
