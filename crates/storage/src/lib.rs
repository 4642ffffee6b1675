//! Storage boundary for the Vantage Ledger pipeline.
//!
//! `VantageStore` is the async trait every backend implements; record types
//! are the persisted shapes of calculation output. All access is
//! tenant-scoped -- there is no cross-tenant read path at this layer.

pub mod error;
pub mod memory;
pub mod record;
pub mod traits;

pub use error::StorageError;
pub use memory::MemoryStore;
pub use record::{CalculationBatchRecord, CalculationResultRecord, ComponentResultRecord};
pub use traits::VantageStore;
