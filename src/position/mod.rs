// =============================================================================
// Position module — FIFO lot accounting, chandelier trail, durable storage
// =============================================================================

pub mod position;
pub mod store;

pub use position::{EntryLot, LotConsumption, Position, ProfitTargetMode};
pub use store::PositionStore;
