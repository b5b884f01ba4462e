use std::collections::HashSet;

use tracing::{debug, warn};

use super::types::{AmmoEntry, DamageControlLocker, FleetTemplate, ShipDefinition, SlotKind, StorageSlot};
use crate::document::{Element, XmlDocument};
use crate::error::{ReconcileError, Result};

/// Parse a quantity field. Missing or non-numeric values count as zero.
pub(crate) fn quantity_of(element: &Element, field: &str) -> u32 {
    element
        .child_text(field)
        .and_then(|text| text.parse::<u32>().ok())
        .unwrap_or(0)
}

/// Normalize a fleet document into a [`FleetTemplate`].
///
/// The document is kept inside the template for write-back. Fails with a
/// schema violation if the fleet or one of its ships has no name, or if two
/// ships share a name (matching relies on names being unique).
pub fn parse_template(document: XmlDocument) -> Result<FleetTemplate> {
    let root = document.root();
    let name = root
        .child_text("Name")
        .ok_or_else(|| ReconcileError::schema("fleet", "Name"))?;
    let context = format!("fleet '{}'", name);

    let ships_el = root
        .child("Ships")
        .ok_or_else(|| ReconcileError::schema(&context, "Ships"))?;

    let type_attr = format!("{}:type", document.xsi_prefix());
    let mut ships = Vec::new();
    let mut seen = HashSet::new();

    for (index, ship_el) in ships_el.children_named("Ship").enumerate() {
        let ship = parse_ship(ship_el, index, &type_attr, &context)?;
        if !seen.insert(ship.name.clone()) {
            return Err(ReconcileError::schema(
                format!("{} ship '{}'", context, ship.name),
                "Name (duplicate)",
            ));
        }
        ships.push(ship);
    }

    debug!("Parsed fleet '{}' with {} ships", name, ships.len());

    let version = root.child_text("Version");
    Ok(FleetTemplate {
        name,
        version,
        ships,
        document,
        source: None,
    })
}

fn parse_ship(ship_el: &Element, index: usize, type_attr: &str, context: &str) -> Result<ShipDefinition> {
    let name = ship_el
        .child_text("Name")
        .ok_or_else(|| ReconcileError::schema(format!("{} ship #{}", context, index + 1), "Name"))?;

    let mut slots = Vec::new();
    let mut lockers = Vec::new();

    let sockets = ship_el
        .child("SocketMap")
        .into_iter()
        .flat_map(|map| map.children_named("HullSocket"));

    for (socket_index, socket) in sockets.enumerate() {
        let Some(data) = socket.child("ComponentData") else {
            continue;
        };
        let component_name = socket.child_text("ComponentName");

        if data.child("RestoresConsumed").is_some() {
            lockers.push(DamageControlLocker {
                socket_index,
                component_name: component_name.clone(),
                restores_consumed: quantity_of(data, "RestoresConsumed"),
            });
        }

        let Some(kind) = data.attr(type_attr).and_then(SlotKind::from_discriminator) else {
            continue;
        };

        let entries = data
            .child(kind.load_list())
            .into_iter()
            .flat_map(|list| list.children_named("MagSaveData"))
            .enumerate()
            .filter_map(|(entry_index, mag)| match mag.child_text("MunitionKey") {
                Some(raw) => Some(AmmoEntry {
                    key: kind.key_for(&raw),
                    quantity: quantity_of(mag, "Quantity"),
                    index: entry_index,
                }),
                None => {
                    warn!(
                        "Skipping load entry #{} without MunitionKey on ship '{}' socket #{}",
                        entry_index + 1,
                        name,
                        socket_index + 1
                    );
                    None
                }
            })
            .collect();

        slots.push(StorageSlot::new(kind, socket_index, component_name, entries));
    }

    Ok(ShipDefinition {
        name,
        index,
        slots,
        lockers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::types::Namespace;

    const FLEET: &str = r#"<?xml version="1.0"?>
<Fleet xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <Name>Picket</Name>
  <Version>3</Version>
  <Ships>
    <Ship>
      <Name>Ardent</Name>
      <SocketMap>
        <HullSocket>
          <ComponentName>Stock/Bulk Magazine</ComponentName>
          <ComponentData xsi:type="BulkMagazineData">
            <Load>
              <MagSaveData><MunitionKey>Stock/AP-5</MunitionKey><Quantity>100</Quantity></MagSaveData>
              <MagSaveData><MunitionKey>$MODMIS$/Hammer</MunitionKey><Quantity>abc</Quantity></MagSaveData>
              <MagSaveData><Quantity>5</Quantity></MagSaveData>
            </Load>
          </ComponentData>
        </HullSocket>
        <HullSocket>
          <ComponentName>Stock/FR4800 Reactor</ComponentName>
          <ComponentData xsi:type="ReactorData" />
        </HullSocket>
        <HullSocket>
          <ComponentName>Stock/VLS-2 Launcher</ComponentName>
          <ComponentData xsi:type="ResizableCellLauncherData">
            <MissileLoad>
              <MagSaveData><MunitionKey>$MODMIS$/Hammer</MunitionKey><Quantity>10</Quantity></MagSaveData>
            </MissileLoad>
          </ComponentData>
        </HullSocket>
        <HullSocket>
          <ComponentName>Stock/Small DC Locker</ComponentName>
          <ComponentData xsi:type="DCLockerData"><RestoresConsumed>1</RestoresConsumed></ComponentData>
        </HullSocket>
      </SocketMap>
    </Ship>
  </Ships>
</Fleet>"#;

    fn parse(text: &str) -> Result<FleetTemplate> {
        parse_template(XmlDocument::parse(text, "test").unwrap())
    }

    #[test]
    fn test_parses_slots_by_discriminator() {
        let fleet = parse(FLEET).unwrap();
        assert_eq!(fleet.name, "Picket");
        assert_eq!(fleet.version.as_deref(), Some("3"));

        let ship = fleet.ship("Ardent").unwrap();
        // Reactor socket skipped; bulk magazine and launcher kept in order
        assert_eq!(ship.slots.len(), 2);
        assert_eq!(ship.slots[0].kind, SlotKind::BulkMagazine);
        assert_eq!(ship.slots[0].socket_index, 0);
        assert_eq!(ship.slots[1].kind, SlotKind::CellLauncher);
        assert_eq!(ship.slots[1].socket_index, 2);
    }

    #[test]
    fn test_quantities_default_to_zero_and_keyless_entries_skipped() {
        let fleet = parse(FLEET).unwrap();
        let bulk = &fleet.ship("Ardent").unwrap().slots[0];
        assert_eq!(bulk.entries().len(), 2);
        assert_eq!(bulk.entries()[1].quantity, 0);
        assert_eq!(bulk.entries()[1].key.namespace(), Namespace::Missile);
    }

    #[test]
    fn test_detects_damage_control_lockers() {
        let fleet = parse(FLEET).unwrap();
        let ship = fleet.ship("Ardent").unwrap();
        assert_eq!(ship.lockers.len(), 1);
        assert_eq!(ship.lockers[0].socket_index, 3);
        assert_eq!(ship.lockers[0].restores_consumed, 1);
    }

    #[test]
    fn test_missing_ship_name_is_schema_violation() {
        let text = "<Fleet><Name>A</Name><Ships><Ship><SocketMap /></Ship></Ships></Fleet>";
        let err = parse(text).unwrap_err();
        assert!(matches!(err, ReconcileError::SchemaViolation { ref field, .. } if field == "Name"));
    }

    #[test]
    fn test_duplicate_ship_names_rejected() {
        let text = "<Fleet><Name>A</Name><Ships><Ship><Name>X</Name></Ship><Ship><Name>X</Name></Ship></Ships></Fleet>";
        assert!(matches!(
            parse(text).unwrap_err(),
            ReconcileError::SchemaViolation { .. }
        ));
    }
}
