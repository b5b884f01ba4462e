pub mod library;
pub mod parse;
pub mod types;

pub use library::{read_template, TemplateLibrary, FLEET_EXTENSION};
pub use parse::parse_template;
pub use types::{
    normalize_group_name, normalize_key_name, AmmoEntry, DamageControlLocker, EntryRef,
    FleetTemplate, MunitionKey, Namespace, ShipDefinition, SlotKind, StorageSlot, MISSILE_MARKER,
};
