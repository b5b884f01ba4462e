use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::document::XmlDocument;

/// Prefix marking a munition key as belonging to the missile namespace.
pub const MISSILE_MARKER: &str = "$MODMIS$/";

/// Which pool a munition key lives in. Missile loads are reconciled from
/// missile and decoy tallies, everything else from weapon-group fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Namespace {
    Munition,
    Missile,
}

/// A munition key as stored in a fleet file plus its normalized form.
///
/// The raw key is never rewritten; `name` is what matching and logging use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MunitionKey {
    raw: String,
    namespace: Namespace,
    name: String,
}

impl MunitionKey {
    /// Classify a key found in a bulk magazine. Only marked keys are missiles.
    pub fn parse(raw: &str) -> Self {
        let namespace = if raw.trim_start().starts_with(MISSILE_MARKER) {
            Namespace::Missile
        } else {
            Namespace::Munition
        };
        Self {
            raw: raw.to_string(),
            namespace,
            name: normalize_key_name(raw),
        }
    }

    /// Classify a key found in a cell launcher, which only ever holds missiles.
    pub fn in_launcher(raw: &str) -> Self {
        Self {
            namespace: Namespace::Missile,
            ..Self::parse(raw)
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_missile(&self) -> bool {
        self.namespace == Namespace::Missile
    }
}

/// Strip the missile marker and any leading path (`Stock/250mm AP Shell` -> `250mm AP Shell`).
pub fn normalize_key_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let unmarked = trimmed.strip_prefix(MISSILE_MARKER).unwrap_or(trimmed);
    let leaf = unmarked.rsplit_once('/').map_or(unmarked, |(_, leaf)| leaf);
    leaf.trim().to_string()
}

/// Normalize a report weapon-group name so it compares against munition keys.
///
/// Weapon reports label groups as `<weapon> - <munition>`; only the munition part matters.
pub fn normalize_group_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let munition = trimmed.rsplit_once(" - ").map_or(trimmed, |(_, m)| m);
    normalize_key_name(munition)
}

/// Storage slot variants that carry ammunition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SlotKind {
    /// Flat `Load` list of magazine entries.
    BulkMagazine,
    /// Dedicated `MissileLoad` list.
    CellLauncher,
}

impl SlotKind {
    /// Map a `ComponentData` `xsi:type` discriminator to a slot kind.
    /// Sensors, engines, hangars and the like return `None`.
    pub fn from_discriminator(discriminator: &str) -> Option<Self> {
        match discriminator {
            "BulkMagazineData" => Some(SlotKind::BulkMagazine),
            "ResizableCellLauncherData" | "CellLauncherData" => Some(SlotKind::CellLauncher),
            _ => None,
        }
    }

    /// Name of the list element holding `MagSaveData` entries for this kind.
    pub fn load_list(&self) -> &'static str {
        match self {
            SlotKind::BulkMagazine => "Load",
            SlotKind::CellLauncher => "MissileLoad",
        }
    }

    pub fn key_for(&self, raw: &str) -> MunitionKey {
        match self {
            SlotKind::BulkMagazine => MunitionKey::parse(raw),
            SlotKind::CellLauncher => MunitionKey::in_launcher(raw),
        }
    }
}

/// One `MagSaveData` entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmmoEntry {
    pub key: MunitionKey,
    pub quantity: u32,
    /// Position among the `MagSaveData` siblings of its load list.
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageSlot {
    pub kind: SlotKind,
    /// Position among the ship's `HullSocket` elements.
    pub socket_index: usize,
    pub component_name: Option<String>,
    entries: Vec<AmmoEntry>,
}

impl StorageSlot {
    pub fn new(
        kind: SlotKind,
        socket_index: usize,
        component_name: Option<String>,
        entries: Vec<AmmoEntry>,
    ) -> Self {
        Self {
            kind,
            socket_index,
            component_name,
            entries,
        }
    }

    /// Load entries in document order, whichever list layout the slot uses.
    pub fn entries(&self) -> &[AmmoEntry] {
        &self.entries
    }
}

/// A damage-control locker socket and how many restores it has already spent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DamageControlLocker {
    pub socket_index: usize,
    pub component_name: Option<String>,
    pub restores_consumed: u32,
}

/// A load entry together with the slot holding it.
#[derive(Debug, Clone, Copy)]
pub struct EntryRef<'a> {
    pub slot: &'a StorageSlot,
    pub entry: &'a AmmoEntry,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShipDefinition {
    pub name: String,
    /// Position among the fleet's `Ship` elements.
    pub index: usize,
    pub slots: Vec<StorageSlot>,
    pub lockers: Vec<DamageControlLocker>,
}

impl ShipDefinition {
    /// Every load entry of the ship in document order.
    pub fn entries(&self) -> impl Iterator<Item = EntryRef<'_>> {
        self.slots
            .iter()
            .flat_map(|slot| slot.entries().iter().map(move |entry| EntryRef { slot, entry }))
    }

    /// Entries whose key is `name` in `namespace`, document order.
    pub fn entries_for<'a>(
        &'a self,
        namespace: Namespace,
        name: &'a str,
    ) -> impl Iterator<Item = EntryRef<'a>> + 'a {
        self.entries()
            .filter(move |r| r.entry.key.namespace() == namespace && r.entry.key.name() == name)
    }

    /// Total quantity per normalized key in `namespace`, in first-seen order.
    pub fn totals(&self, namespace: Namespace) -> Vec<(String, u32)> {
        let mut totals: Vec<(String, u32)> = Vec::new();
        for r in self.entries().filter(|r| r.entry.key.namespace() == namespace) {
            match totals.iter_mut().find(|(name, _)| name == r.entry.key.name()) {
                Some((_, total)) => *total = total.saturating_add(r.entry.quantity),
                None => totals.push((r.entry.key.name().to_string(), r.entry.quantity)),
            }
        }
        totals
    }
}

/// A fleet definition parsed from a `.fleet` file.
///
/// Wraps the full source document so everything the engine does not model
/// (hull data, weapon groups, craft templates) survives write-back untouched.
#[derive(Debug, Clone)]
pub struct FleetTemplate {
    pub name: String,
    pub version: Option<String>,
    pub ships: Vec<ShipDefinition>,
    pub(crate) document: XmlDocument,
    pub(crate) source: Option<PathBuf>,
}

impl FleetTemplate {
    pub fn ship(&self, name: &str) -> Option<&ShipDefinition> {
        self.ships.iter().find(|s| s.name == name)
    }

    pub fn ship_names(&self) -> BTreeSet<&str> {
        self.ships.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn document(&self) -> &XmlDocument {
        &self.document
    }

    /// File the template was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missile_marker_selects_namespace() {
        let missile = MunitionKey::parse("$MODMIS$/Hammer");
        assert!(missile.is_missile());
        assert_eq!(missile.name(), "Hammer");
        assert_eq!(missile.raw(), "$MODMIS$/Hammer");

        let shell = MunitionKey::parse("Stock/250mm AP Shell");
        assert_eq!(shell.namespace(), Namespace::Munition);
        assert_eq!(shell.name(), "250mm AP Shell");
    }

    #[test]
    fn test_launcher_keys_are_always_missiles() {
        let key = MunitionKey::in_launcher("Stock/SGM-1 Balestra");
        assert!(key.is_missile());
        assert_eq!(key.name(), "SGM-1 Balestra");
    }

    #[test]
    fn test_group_name_normalization() {
        assert_eq!(normalize_group_name("Mk61 Cannon - 250mm AP Shell"), "250mm AP Shell");
        assert_eq!(normalize_group_name(" AP-5 "), "AP-5");
        assert_eq!(normalize_group_name("Stock/AP-5"), "AP-5");
    }

    #[test]
    fn test_slot_discriminators() {
        assert_eq!(
            SlotKind::from_discriminator("BulkMagazineData"),
            Some(SlotKind::BulkMagazine)
        );
        assert_eq!(
            SlotKind::from_discriminator("ResizableCellLauncherData"),
            Some(SlotKind::CellLauncher)
        );
        assert_eq!(SlotKind::from_discriminator("SensorData"), None);
    }

    #[test]
    fn test_totals_sum_across_slots_in_first_seen_order() {
        let entry = |raw: &str, quantity, index| AmmoEntry {
            key: MunitionKey::parse(raw),
            quantity,
            index,
        };
        let ship = ShipDefinition {
            name: "Ardent".to_string(),
            index: 0,
            slots: vec![
                StorageSlot::new(
                    SlotKind::BulkMagazine,
                    0,
                    None,
                    vec![entry("Stock/AP-5", 60, 0), entry("Stock/HE-5", 10, 1)],
                ),
                StorageSlot::new(SlotKind::BulkMagazine, 3, None, vec![entry("Stock/AP-5", 40, 0)]),
            ],
            lockers: Vec::new(),
        };

        assert_eq!(
            ship.totals(Namespace::Munition),
            vec![("AP-5".to_string(), 100), ("HE-5".to_string(), 10)]
        );
        assert!(ship.totals(Namespace::Missile).is_empty());
        assert_eq!(ship.entries_for(Namespace::Munition, "AP-5").count(), 2);
    }
}
