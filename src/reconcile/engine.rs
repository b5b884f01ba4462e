//! Post-battle ammunition reconciliation.
//!
//! `reconcile` compares a fleet template with a parsed battle report and
//! works out what every surviving ship still carries, down to the quantity
//! of each `MagSaveData` entry. It never touches the template document; the
//! synthesizer applies the result.
//!
//! Per-type tallies win. The aggregate `ammo_percentage_expended` scales the
//! munition loads only when the report has no weapon groups, and the missile
//! loads that have no carried total.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::fleet::{FleetTemplate, Namespace, ShipDefinition};
use crate::report::{BattleReport, ExpendableTally, ShipBattleReport};

use super::redistribute::split_evenly;
use super::types::*;

/// Tolerance applied before flooring a percentage-scaled quantity, so that
/// e.g. `40 * 0.75` lands on 30 rather than 29.
const FLOOR_EPSILON: f64 = 1e-9;

/// Reconcile `report` against `template`.
///
/// Ships the report lists as lost are recorded in `eliminated` and skipped.
/// Surviving template ships without a report entry are left out of
/// `ships`, which keeps their loads untouched on write-back.
pub fn reconcile(template: &FleetTemplate, report: &BattleReport) -> ReconciliationResult {
    let eliminated = report.eliminated();
    let mut ships = Vec::new();

    for ship in &template.ships {
        if eliminated.contains(&ship.name) {
            debug!("Ship {:?} was lost, not reconciling its ammunition", ship.name);
            continue;
        }
        match report.ship(&ship.name) {
            Some(ship_report) => ships.push(reconcile_ship(ship, ship_report)),
            None => debug!("Ship {:?} has no report entry, keeping template loads", ship.name),
        }
    }

    ReconciliationResult { ships, eliminated }
}

fn reconcile_ship(ship: &ShipDefinition, report: &ShipBattleReport) -> ShipReconciliation {
    let pct = report.ammo_percentage_expended.map(|p| p.clamp(0.0, 1.0));
    // A reported weapon-group set is complete for the ship's guns.
    let munition_fallback = if report.munitions.is_empty() { pct } else { None };
    let mut used_percentage_fallback = false;

    let mut expendables: BTreeMap<&str, ExpendableTally> = BTreeMap::new();
    for (name, tally) in report.expendables() {
        expendables.entry(name.as_str()).or_default().merge(*tally);
    }

    let mut targets: Vec<(Namespace, String, u32, u32)> = Vec::new();

    let mut munitions = BTreeMap::new();
    for (name, current) in ship.totals(Namespace::Munition) {
        let target = match (report.munitions.get(&name), munition_fallback) {
            (Some(tally), _) => Some(current.saturating_sub(tally.shots_fired)),
            (None, Some(pct)) => {
                used_percentage_fallback = true;
                Some(scale(current, pct))
            }
            (None, None) => None,
        };
        if let Some(target) = target {
            targets.push((Namespace::Munition, name.clone(), current, target));
        }
        munitions.insert(name, target.unwrap_or(current));
    }

    let mut missiles = BTreeMap::new();
    for (name, current) in ship.totals(Namespace::Missile) {
        // A missile with no carried total is scaled like an unreported one.
        let target = match (expendables.get(name.as_str()).and_then(|t| t.remaining()), pct) {
            (Some(remaining), _) => Some(remaining),
            (None, Some(pct)) => {
                used_percentage_fallback = true;
                Some(scale(current, pct))
            }
            (None, None) => None,
        };
        if let Some(target) = target {
            targets.push((Namespace::Missile, name.clone(), current, target));
        }
        missiles.insert(name, target.unwrap_or(current));
    }

    for (name, tally) in &report.munitions {
        if !munitions.contains_key(name) {
            let remaining = tally.rounds_carried.saturating_sub(tally.shots_fired);
            warn!(
                "Ship {:?} reports munition {:?} that no magazine holds, dropping {} rounds",
                ship.name, name, remaining
            );
        }
    }
    for (name, tally) in &expendables {
        if !missiles.contains_key(*name) {
            warn!(
                "Ship {:?} reports missile {:?} that no magazine holds, dropping {} units",
                ship.name,
                name,
                tally.remaining().unwrap_or(0)
            );
        }
    }

    let mut assignments = Vec::new();
    for (namespace, name, current, target) in targets {
        if current != target {
            debug!("Ship {:?}: {} {} -> {}", ship.name, name, current, target);
        }
        let entries: Vec<_> = ship.entries_for(namespace, &name).collect();
        let shares = split_evenly(target, entries.len());
        for (r, quantity) in entries.into_iter().zip(shares) {
            assignments.push(LoadAssignment {
                socket_index: r.slot.socket_index,
                kind: r.slot.kind,
                entry_index: r.entry.index,
                namespace,
                key: name.clone(),
                previous: r.entry.quantity,
                quantity,
            });
        }
    }

    if let Some(pct) = pct.filter(|_| used_percentage_fallback) {
        debug!(
            "Ship {:?}: applied {:.1}% expenditure to loads without per-type data",
            ship.name,
            pct * 100.0
        );
    }
    if !report.part_damage.is_empty() {
        debug!("Ship {:?}: {} damaged parts", ship.name, report.part_damage.len());
    }

    ShipReconciliation {
        name: ship.name.clone(),
        munitions,
        missiles,
        assignments,
        lockers: reconcile_lockers(ship, report),
        part_damage: report.part_damage.clone(),
        used_percentage_fallback,
    }
}

fn reconcile_lockers(ship: &ShipDefinition, report: &ShipBattleReport) -> Vec<LockerAssignment> {
    let consumed = report.restores.map(|r| r.consumed()).unwrap_or(0);
    if consumed == 0 {
        return Vec::new();
    }
    if ship.lockers.is_empty() {
        warn!(
            "Ship {:?} used {} damage-control restores but has no locker to record them",
            ship.name, consumed
        );
        return Vec::new();
    }

    debug!(
        "Ship {:?}: {} restores consumed over {} lockers",
        ship.name,
        consumed,
        ship.lockers.len()
    );
    ship.lockers
        .iter()
        .zip(split_evenly(consumed, ship.lockers.len()))
        .map(|(locker, share)| LockerAssignment {
            socket_index: locker.socket_index,
            previous: locker.restores_consumed,
            restores_consumed: locker.restores_consumed.saturating_add(share),
        })
        .collect()
}

/// `floor(quantity * (1 - pct))`
fn scale(quantity: u32, pct: f64) -> u32 {
    let scaled = (f64::from(quantity) * (1.0 - pct) + FLOOR_EPSILON).floor();
    scaled.clamp(0.0, f64::from(quantity)) as u32
}
