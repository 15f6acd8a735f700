//! Reconciliation engine for mirroring calendar events into a time tracker.
//!
//! The pieces, in the order a run uses them:
//! - `config` for the layered configuration
//! - `window` for the time range queried from both systems
//! - `event` and `record` for the two sides being reconciled
//! - `extract` for finding task ids in event bodies
//! - `mapping` for the durable event → time entry identity map
//! - `plan` for deciding creates, updates and deletes
//!
//! Transport (fetching, applying) is left to callers. `paging` and `token`
//! hold the pieces such callers share.

pub mod config;
pub mod error;
pub mod event;
pub mod extract;
pub mod mapping;
pub mod paging;
pub mod plan;
pub mod record;
mod serde_util;
pub mod token;
pub mod transform;
pub mod window;

pub use config::SyncConfig;
pub use error::{CalTrackError, CalTrackResult};
pub use event::SourceEvent;
pub use extract::{ExtractionResult, Extractor};
pub use mapping::{MappingFile, MappingStore};
pub use plan::{Operation, PlanOutcome, Planner};
pub use record::DestinationRecord;
pub use window::SyncWindow;
