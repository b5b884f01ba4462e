use std::collections::BTreeMap;

use tracing::debug;

use super::types::{
    BattleReport, CraftTally, ExpendableTally, PartDamage, RestoreTally, ShipBattleReport,
    SurvivalStatus, WeaponTally,
};
use crate::document::{Element, XmlDocument};
use crate::error::{ReconcileError, Result};
use crate::fleet::{normalize_group_name, normalize_key_name};

const TEAM_PATH: &str = "Teams/TeamReportOfShipBattleReportCraftBattleReport";
const PLAYER_PATH: &str = "Players/AARPlayerReportOfShipBattleReportCraftBattleReport";

/// Report counters are sparse: missing or non-numeric means zero.
fn count_of(element: &Element, field: &str) -> u32 {
    optional_count(element, field).unwrap_or(0)
}

fn optional_count(element: &Element, field: &str) -> Option<u32> {
    element.child_text(field)?.parse::<u32>().ok()
}

fn optional_float(element: &Element, field: &str) -> Option<f64> {
    element
        .child_text(field)?
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

fn is_true(text: Option<&str>) -> bool {
    text.is_some_and(|t| t.trim().eq_ignore_ascii_case("true"))
}

/// Normalize a skirmish report into a [`BattleReport`] for the local player's fleet.
///
/// The local player is the one flagged `IsLocalPlayer` within the team named
/// by `LocalPlayerTeam`, falling back to that team's first player.
pub fn parse_report(document: &XmlDocument) -> Result<BattleReport> {
    let root = document.root();
    let local_team = root
        .child_text("LocalPlayerTeam")
        .ok_or_else(|| ReconcileError::schema("report", "LocalPlayerTeam"))?;

    let mut team = None;
    for candidate in root.find_all(TEAM_PATH) {
        let team_id = candidate
            .child_text("TeamID")
            .ok_or_else(|| ReconcileError::schema("report team", "TeamID"))?;
        if team_id == local_team {
            team = Some(candidate);
            break;
        }
    }
    let team = team.ok_or_else(|| {
        ReconcileError::schema(format!("report team '{}'", local_team), "TeamReport")
    })?;

    let players = team.find_all(PLAYER_PATH);
    let player = players
        .iter()
        .find(|p| is_true(p.child_text("IsLocalPlayer").as_deref()))
        .or_else(|| players.first())
        .copied()
        .ok_or_else(|| ReconcileError::schema(format!("report team '{}'", local_team), "Players"))?;

    let fleet_prefix = player
        .find("Colors/FleetPrefix")
        .and_then(Element::text)
        .unwrap_or_default();

    let ships = player
        .find_all("Ships/ShipBattleReport")
        .into_iter()
        .enumerate()
        .map(|(index, ship)| parse_ship(ship, index))
        .collect::<Result<Vec<_>>>()?;

    let craft = player.child("Craft").map(parse_craft).unwrap_or_default();

    debug!(
        "Parsed report for team {} (prefix {:?}) with {} ships and {} craft types",
        local_team,
        fleet_prefix,
        ships.len(),
        craft.len()
    );

    Ok(BattleReport {
        local_team,
        fleet_prefix,
        ships,
        craft,
    })
}

/// Per-type craft counters from the player's `Craft` list. A craft is lost
/// when flagged `destroyed="true"` or reported destroyed/eliminated.
fn parse_craft(craft: &Element) -> BTreeMap<String, CraftTally> {
    let mut tallies: BTreeMap<String, CraftTally> = BTreeMap::new();
    for item in craft.elements() {
        let craft_name = item
            .child_text("CraftName")
            .or_else(|| item.child_text("DesignName"))
            .unwrap_or_else(|| item.name().to_string());
        let lost = is_true(item.attr("destroyed"))
            || is_true(item.child_text("Destroyed").as_deref())
            || item
                .child_text("Eliminated")
                .is_some_and(|s| SurvivalStatus::parse(&s).is_eliminated());
        let tally = tallies.entry(craft_name).or_default();
        tally.carried += 1;
        if lost {
            tally.lost += 1;
        }
    }
    tallies
}

fn parse_ship(ship: &Element, index: usize) -> Result<ShipBattleReport> {
    let name = ship
        .child_text("ShipName")
        .ok_or_else(|| ReconcileError::schema(format!("report ship #{}", index + 1), "ShipName"))?;
    let status = ship
        .child_text("Eliminated")
        .map(|text| SurvivalStatus::parse(&text))
        .ok_or_else(|| ReconcileError::schema(format!("report ship '{}'", name), "Eliminated"))?;

    let mut report = ShipBattleReport::new(name, status);
    report.condition = optional_float(ship, "Condition");
    report.ammo_percentage_expended = optional_float(ship, "AmmoPercentageExpended");

    let weapon_reports = ship
        .find_all("AntiShip/Weapons/WeaponReport")
        .into_iter()
        .chain(ship.find("Defenses/Weapons").into_iter().flat_map(|w| w.elements()));
    for weapon in weapon_reports {
        let Some(group) = weapon.child_text("GroupName").or_else(|| weapon.child_text("Name")) else {
            continue;
        };
        let tally = WeaponTally {
            rounds_carried: count_of(weapon, "RoundsCarried"),
            shots_fired: count_of(weapon, "ShotsFired"),
        };
        report
            .munitions
            .entry(normalize_group_name(&group))
            .or_default()
            .merge(tally);
    }

    if let Some(missiles) = ship.find("Strike/Missiles") {
        collect_expendables(missiles.elements(), &mut report.missiles);
    }
    collect_expendables(
        ship.find_all("Defenses/DecoyReports/DecoyReport").into_iter(),
        &mut report.decoys,
    );

    let restores = RestoreTally {
        total: optional_count(ship, "RestoresTotal"),
        consumed: optional_count(ship, "RestoresConsumed"),
        remaining: optional_count(ship, "RestoresRemaining"),
    };
    if restores != RestoreTally::default() {
        report.restores = Some(restores);
    }

    report.part_damage = ship
        .descendants_named("PartDamage")
        .into_iter()
        .filter_map(|part| {
            let key = part.child_text("Key")?;
            Some(PartDamage {
                key,
                destroyed: is_true(part.child_text("IsDestroyed").as_deref()),
                health_percent: optional_float(part, "HealthPercent").map(|h| h.clamp(0.0, 1.0)),
            })
        })
        .collect();

    Ok(report)
}

fn collect_expendables<'a>(
    reports: impl Iterator<Item = &'a Element>,
    into: &mut BTreeMap<String, ExpendableTally>,
) {
    for item in reports {
        let Some(name) = item.child_text("MissileName") else {
            continue;
        };
        let tally = ExpendableTally {
            total_carried: optional_count(item, "TotalCarried"),
            total_expended: count_of(item, "TotalExpended"),
        };
        into.entry(normalize_key_name(&name)).or_default().merge(tally);
    }
}
