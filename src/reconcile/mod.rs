pub mod engine;
pub mod redistribute;
pub mod types;

pub use engine::reconcile;
pub use redistribute::split_evenly;
pub use types::{LoadAssignment, LockerAssignment, ReconciliationResult, ShipReconciliation};
