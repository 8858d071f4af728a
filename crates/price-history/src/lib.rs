//! Price history acquisition.
//!
//! Three interchangeable [`HistorySource`](pricewatch_core::HistorySource)
//! strategies plus the ordered cascade that picks between them:
//!
//! - [`PersistedHistoryReader`]: our own `price_history` table
//! - [`ExternalHarvester`]: a third-party price-history site, best effort
//! - [`SyntheticHistory`]: anchored random walk, last resort for the forecaster

pub mod cascade;
pub mod harvester;
pub mod reader;
pub mod synthetic;
pub mod url;

pub use cascade::{HistoryCascade, ResolvedHistory, MIN_TRAINING_POINTS, PERSISTED_SUFFICIENT_POINTS};
pub use harvester::{ExternalHarvester, HarvesterConfig};
pub use reader::PersistedHistoryReader;
pub use synthetic::SyntheticHistory;
