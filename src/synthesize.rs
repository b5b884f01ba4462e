//! Apply a reconciliation result to a copy of the template and write it out.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::document::{write_document_new, Element};
use crate::error::{ReconcileError, Result};
use crate::fleet::{parse_template, FleetTemplate, Namespace, FLEET_EXTENSION};
use crate::reconcile::{ReconciliationResult, ShipReconciliation};
use crate::report::PartDamage;

/// Build the post-battle fleet.
///
/// Works on a clone of the template document: every reconciled entry gets
/// its new `Quantity`, lockers get their new `RestoresConsumed`, damaged
/// parts get their `Destroyed` flag and scaled `HP`, ships named
/// in `eliminated` are removed, and the root declares the schema namespaces.
/// Everything else in the document is carried over as is. The template
/// itself is not modified.
pub fn synthesize(
    template: &FleetTemplate,
    result: &ReconciliationResult,
    eliminated: &BTreeSet<String>,
) -> Result<FleetTemplate> {
    let mut document = template.document.clone();
    let context = format!("fleet '{}'", template.name);

    let ships_el = document
        .root_mut()
        .child_mut("Ships")
        .ok_or_else(|| ReconcileError::schema(&context, "Ships"))?;

    // Positions refer to the template, so apply updates before removing anything.
    for ship in &result.ships {
        let definition = template
            .ship(&ship.name)
            .ok_or_else(|| ReconcileError::schema(format!("{} ship '{}'", context, ship.name), "Name"))?;
        let ship_el = nth_named_mut(ships_el, "Ship", definition.index)
            .ok_or_else(|| ReconcileError::schema(format!("{} ship '{}'", context, ship.name), "Ship"))?;
        apply_ship(ship_el, ship)?;
    }

    let removed = ships_el.remove_elements_where(|el| {
        el.name() == "Ship"
            && el
                .child_text("Name")
                .is_some_and(|name| eliminated.contains(&name))
    });
    if removed > 0 {
        info!("Removed {} lost ships from '{}'", removed, template.name);
    }

    document.ensure_schema_namespaces();
    parse_template(document)
}

fn apply_ship(ship_el: &mut Element, ship: &ShipReconciliation) -> Result<()> {
    let context = format!("ship '{}'", ship.name);
    let socket_map = ship_el
        .child_mut("SocketMap")
        .ok_or_else(|| ReconcileError::schema(&context, "SocketMap"))?;

    for assignment in &ship.assignments {
        let list = assignment.kind.load_list();
        let entry = nth_named_mut(socket_map, "HullSocket", assignment.socket_index)
            .and_then(|socket| socket.child_mut("ComponentData"))
            .and_then(|data| data.child_mut(list))
            .and_then(|load| nth_named_mut(load, "MagSaveData", assignment.entry_index))
            .ok_or_else(|| {
                ReconcileError::schema(
                    format!("{} socket #{}", context, assignment.socket_index + 1),
                    format!("{}/MagSaveData", list),
                )
            })?;
        set_field(entry, "Quantity", assignment.quantity);
    }

    for locker in &ship.lockers {
        let data = nth_named_mut(socket_map, "HullSocket", locker.socket_index)
            .and_then(|socket| socket.child_mut("ComponentData"))
            .ok_or_else(|| {
                ReconcileError::schema(
                    format!("{} socket #{}", context, locker.socket_index + 1),
                    "ComponentData",
                )
            })?;
        set_field(data, "RestoresConsumed", locker.restores_consumed);
    }

    if !ship.part_damage.is_empty() {
        match ship_el.descendant_mut("Parts") {
            Some(parts) => apply_parts(parts, &ship.name, &ship.part_damage),
            None => warn!("Ship {:?} has part damage but no Parts list", ship.name),
        }
    }

    Ok(())
}

/// Copy the report's damage onto the matching `Parts` entries. `HP` is
/// scaled by the health fraction left; parts without a report entry keep
/// their values.
fn apply_parts(parts: &mut Element, ship: &str, damage: &[PartDamage]) {
    for part in parts.elements_mut() {
        let Some(key) = part.descendant("Key").and_then(|k| k.text()) else {
            continue;
        };
        let Some(entry) = damage.iter().find(|d| d.key == key) else {
            continue;
        };

        set_text_field(part, "Destroyed", if entry.destroyed { "true" } else { "false" });
        if let Some(health) = entry.health_percent {
            let hp = part.child_text("HP").and_then(|v| v.trim().parse::<f64>().ok());
            match hp {
                Some(hp) => set_text_field(part, "HP", &(hp * health).to_string()),
                None => debug!("Ship {:?} part {:?} has no numeric HP", ship, key),
            }
        }
    }
}

fn nth_named_mut<'a>(parent: &'a mut Element, name: &str, n: usize) -> Option<&'a mut Element> {
    parent.elements_mut().filter(|el| el.name() == name).nth(n)
}

fn set_field(parent: &mut Element, field: &str, value: u32) {
    set_text_field(parent, field, &value.to_string());
}

fn set_text_field(parent: &mut Element, field: &str, value: &str) {
    match parent.child_mut(field) {
        Some(el) => el.set_text(value),
        None => {
            let mut el = Element::new(field);
            el.set_text(value);
            parent.push_child(el);
        }
    }
}

/// `<base> battle <n>`
pub fn output_name(base: &str, n: u32) -> String {
    format!("{} battle {}", base, n)
}

/// Fleet name with path separators and characters Windows rejects in file
/// names replaced by `_`.
pub fn file_base_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match cleaned.trim() {
        "" | "." | ".." => "fleet".to_string(),
        trimmed => trimmed.to_string(),
    }
}

fn output_path(dir: &Path, base: &str, n: u32) -> PathBuf {
    dir.join(format!("{}.{}", output_name(base, n), FLEET_EXTENSION))
}

/// Smallest `n >= 1` whose output file does not exist in `dir` yet.
pub fn next_output_index(dir: &Path, base: &str) -> u32 {
    let mut n = 1;
    while output_path(dir, base, n).exists() {
        n += 1;
    }
    n
}

/// Write the synthesized fleet into `output_dir` under the next free battle
/// name, with the root `Name` set to match the file name.
///
/// The fleet name is passed through [`file_base_name`] first, so the file
/// always lands directly inside `output_dir`.
///
/// Never overwrites: if another writer takes the name between the existence
/// check and the rename, the next number is tried.
pub fn write(template: &FleetTemplate, output_dir: &Path) -> Result<PathBuf> {
    let base = file_base_name(&template.name);
    if base != template.name {
        debug!("Fleet name {:?} written as {:?}", template.name, base);
    }
    let mut n = next_output_index(output_dir, &base);
    loop {
        let name = output_name(&base, n);
        let target = output_path(output_dir, &base, n);

        let mut document = template.document.clone();
        if let Some(name_el) = document.root_mut().child_mut("Name") {
            name_el.set_text(name.as_str());
        }

        match write_document_new(&document, &target) {
            Ok(()) => {
                info!("Wrote fleet '{}' to {:?}", name, target);
                log_inventory(template);
                return Ok(target);
            }
            Err(e) if e.is_already_exists() => {
                debug!("{:?} appeared while writing, trying the next name", target);
                n += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn log_inventory(template: &FleetTemplate) {
    for ship in &template.ships {
        for (name, quantity) in ship.totals(Namespace::Missile) {
            debug!("Ship: {}, Missile: {}, Quantity: {}", ship.name, name, quantity);
        }
        for (name, quantity) in ship.totals(Namespace::Munition) {
            debug!("Ship: {}, Munition: {}, Quantity: {}", ship.name, name, quantity);
        }
    }
}
