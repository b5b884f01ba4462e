pub mod parse;
pub mod types;

pub use parse::parse_report;
pub use types::{
    BattleReport, CraftTally, ExpendableTally, PartDamage, RestoreTally, ShipBattleReport,
    SurvivalStatus, WeaponTally,
};
