use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

/// How a ship ended the battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SurvivalStatus {
    NotEliminated,
    Eliminated,
    Destroyed,
    Evacuated,
    /// Any other status text. Treated as lost, since only `NotEliminated` means the ship is still in the fleet.
    Other(String),
}

impl SurvivalStatus {
    pub fn parse(text: &str) -> Self {
        match text.trim() {
            "NotEliminated" => SurvivalStatus::NotEliminated,
            "Eliminated" => SurvivalStatus::Eliminated,
            "Destroyed" => SurvivalStatus::Destroyed,
            "Evacuated" => SurvivalStatus::Evacuated,
            other => SurvivalStatus::Other(other.to_string()),
        }
    }

    pub fn is_eliminated(&self) -> bool {
        *self != SurvivalStatus::NotEliminated
    }
}

/// Rounds carried and fired by one weapon group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WeaponTally {
    pub rounds_carried: u32,
    pub shots_fired: u32,
}

impl WeaponTally {
    pub fn merge(&mut self, other: WeaponTally) {
        self.rounds_carried = self.rounds_carried.saturating_add(other.rounds_carried);
        self.shots_fired = self.shots_fired.saturating_add(other.shots_fired);
    }
}

/// Carried/expended counts for a missile or decoy type.
///
/// `total_carried` is optional: without it the report says nothing
/// authoritative about the loadout and the template value stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExpendableTally {
    pub total_carried: Option<u32>,
    pub total_expended: u32,
}

impl ExpendableTally {
    pub fn merge(&mut self, other: ExpendableTally) {
        self.total_carried = match (self.total_carried, other.total_carried) {
            (Some(a), Some(b)) => Some(a.saturating_add(b)),
            (a, b) => a.or(b),
        };
        self.total_expended = self.total_expended.saturating_add(other.total_expended);
    }

    /// What is left after the battle, if the report carries a loadout total.
    pub fn remaining(&self) -> Option<u32> {
        self.total_carried
            .map(|carried| carried.saturating_sub(self.total_expended))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CraftTally {
    pub carried: u32,
    pub lost: u32,
}

/// Post-battle state of one ship part, keyed like the fleet's `Parts` entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartDamage {
    pub key: String,
    pub destroyed: bool,
    /// Fraction of hit points left, 0.0 to 1.0
    pub health_percent: Option<f64>,
}

/// Damage-control restore counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RestoreTally {
    pub total: Option<u32>,
    pub consumed: Option<u32>,
    pub remaining: Option<u32>,
}

impl RestoreTally {
    /// Restores used during the battle: the explicit count, else `total - remaining`.
    pub fn consumed(&self) -> u32 {
        match (self.consumed, self.total, self.remaining) {
            (Some(consumed), _, _) => consumed,
            (None, Some(total), Some(remaining)) => total.saturating_sub(remaining),
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShipBattleReport {
    /// Ship name as reported, fleet prefix included
    pub name: String,
    pub status: SurvivalStatus,
    pub condition: Option<f64>,
    pub ammo_percentage_expended: Option<f64>,
    /// Keyed by normalized munition name
    pub munitions: BTreeMap<String, WeaponTally>,
    pub missiles: BTreeMap<String, ExpendableTally>,
    pub decoys: BTreeMap<String, ExpendableTally>,
    pub restores: Option<RestoreTally>,
    pub part_damage: Vec<PartDamage>,
}

impl ShipBattleReport {
    pub fn new(name: impl Into<String>, status: SurvivalStatus) -> Self {
        Self {
            name: name.into(),
            status,
            condition: None,
            ammo_percentage_expended: None,
            munitions: BTreeMap::new(),
            missiles: BTreeMap::new(),
            decoys: BTreeMap::new(),
            restores: None,
            part_damage: Vec::new(),
        }
    }

    /// Lost by status, or reported with no condition left.
    pub fn is_eliminated(&self) -> bool {
        self.status.is_eliminated() || self.condition.is_some_and(|c| c <= 0.0)
    }

    /// Missile and decoy tallies together; both refill missile-namespace loads.
    pub fn expendables(&self) -> impl Iterator<Item = (&String, &ExpendableTally)> {
        self.missiles.iter().chain(self.decoys.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BattleReport {
    pub local_team: String,
    /// Stripped from the start of report ship names before matching
    pub fleet_prefix: String,
    pub ships: Vec<ShipBattleReport>,
    /// Craft launched by the local player, per craft type. The report
    /// keeps these on the player, not on the carrier ship.
    pub craft: BTreeMap<String, CraftTally>,
}

impl BattleReport {
    /// Remove the fleet prefix from the start of a reported name and trim it.
    pub fn strip_prefix<'a>(&self, reported: &'a str) -> &'a str {
        let without = if self.fleet_prefix.is_empty() {
            reported
        } else {
            reported
                .strip_prefix(self.fleet_prefix.as_str())
                .unwrap_or(reported)
        };
        without.trim()
    }

    /// Template-side name of each ship paired with its report.
    pub fn ships_by_name(&self) -> impl Iterator<Item = (&str, &ShipBattleReport)> {
        self.ships.iter().map(|s| (self.strip_prefix(&s.name), s))
    }

    pub fn ship(&self, template_name: &str) -> Option<&ShipBattleReport> {
        self.ships_by_name()
            .find(|(name, _)| *name == template_name)
            .map(|(_, ship)| ship)
    }

    /// Names of ships still in the fleet, prefix stripped.
    pub fn survivors(&self) -> BTreeSet<String> {
        self.ships_by_name()
            .filter(|(_, s)| !s.is_eliminated())
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Names of ships lost in the battle, prefix stripped.
    pub fn eliminated(&self) -> BTreeSet<String> {
        self.ships_by_name()
            .filter(|(_, s)| s.is_eliminated())
            .map(|(name, _)| name.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(prefix: &str, ships: Vec<ShipBattleReport>) -> BattleReport {
        BattleReport {
            local_team: "TeamA".to_string(),
            fleet_prefix: prefix.to_string(),
            ships,
            craft: BTreeMap::new(),
        }
    }

    #[test]
    fn test_prefix_stripped_from_start_only() {
        let r = report("ABC", vec![]);
        assert_eq!(r.strip_prefix("ABC Ardent"), "Ardent");
        assert_eq!(r.strip_prefix("Ardent ABC"), "Ardent ABC");
        // Case-sensitive
        assert_eq!(r.strip_prefix("abc Ardent"), "abc Ardent");
        assert_eq!(report("", vec![]).strip_prefix("  Valor "), "Valor");
    }

    #[test]
    fn test_survivors_and_eliminated_partition() {
        let mut sunk = ShipBattleReport::new("ABC Zeal", SurvivalStatus::NotEliminated);
        sunk.condition = Some(0.0);
        let r = report(
            "ABC",
            vec![
                ShipBattleReport::new("ABC Ardent", SurvivalStatus::NotEliminated),
                ShipBattleReport::new("ABC Valor", SurvivalStatus::Destroyed),
                sunk,
            ],
        );

        assert_eq!(r.survivors(), BTreeSet::from(["Ardent".to_string()]));
        assert_eq!(
            r.eliminated(),
            BTreeSet::from(["Valor".to_string(), "Zeal".to_string()])
        );
        assert!(r.ship("Valor").is_some());
    }

    #[test]
    fn test_expendable_remaining_and_merge() {
        let mut tally = ExpendableTally {
            total_carried: Some(10),
            total_expended: 4,
        };
        tally.merge(ExpendableTally {
            total_carried: None,
            total_expended: 9,
        });
        assert_eq!(tally.total_carried, Some(10));
        assert_eq!(tally.remaining(), Some(0));

        let unknown = ExpendableTally {
            total_carried: None,
            total_expended: 3,
        };
        assert_eq!(unknown.remaining(), None);
    }

    #[test]
    fn test_restores_consumed() {
        let derived = RestoreTally {
            total: Some(6),
            consumed: None,
            remaining: Some(2),
        };
        assert_eq!(derived.consumed(), 4);

        let explicit = RestoreTally {
            consumed: Some(1),
            ..derived
        };
        assert_eq!(explicit.consumed(), 1);
        assert_eq!(RestoreTally::default().consumed(), 0);
    }
}
