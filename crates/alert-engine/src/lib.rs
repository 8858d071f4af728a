//! Price-drop alerting.
//!
//! [`AlertEvaluator`] re-prices every active alert once per pass and hands
//! qualifying drops to [`Notifier`], which suppresses repeats for the same
//! user and alert inside a 24 hour window.

pub mod config;
pub mod evaluator;
pub mod lookup;
pub mod notifier;

pub use config::AlertConfig;
pub use evaluator::{AlertEvaluator, EvaluationSummary};
pub use lookup::HttpPriceLookup;
pub use notifier::{DropNotice, Notifier, DEDUP_WINDOW_HOURS};
