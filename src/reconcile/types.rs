use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::fleet::{Namespace, SlotKind};
use crate::report::PartDamage;

/// New quantity for one `MagSaveData` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadAssignment {
    pub socket_index: usize,
    pub kind: SlotKind,
    pub entry_index: usize,
    pub namespace: Namespace,
    /// Normalized munition name
    pub key: String,
    pub previous: u32,
    pub quantity: u32,
}

/// New `RestoresConsumed` value for one damage-control locker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockerAssignment {
    pub socket_index: usize,
    pub previous: u32,
    pub restores_consumed: u32,
}

/// Reconciled state of one surviving ship.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShipReconciliation {
    pub name: String,
    /// Final total per munition type, every type the ship carries
    pub munitions: BTreeMap<String, u32>,
    /// Final total per missile type, every type the ship carries
    pub missiles: BTreeMap<String, u32>,
    /// Per-entry quantities for the types the report changed
    pub assignments: Vec<LoadAssignment>,
    pub lockers: Vec<LockerAssignment>,
    /// Damage to write onto the ship's `Parts`, matched by key
    pub part_damage: Vec<PartDamage>,
    /// Some quantities came from the aggregate ammo percentage
    pub used_percentage_fallback: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconciliationResult {
    /// Surviving template ships with a report entry, template order
    pub ships: Vec<ShipReconciliation>,
    /// Every ship the report lists as lost, prefix stripped
    pub eliminated: BTreeSet<String>,
}

impl ReconciliationResult {
    pub fn ship(&self, name: &str) -> Option<&ShipReconciliation> {
        self.ships.iter().find(|s| s.name == name)
    }
}
