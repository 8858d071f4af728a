//! Messaging-bot front door with ordered failover.
//!
//! Requests go to each reachable bot in registration order; the first one that
//! answers wins. When none do, the router calls the forecast engine or the
//! alert evaluator directly.

pub mod registry;
pub mod router;
pub mod telegram;

pub use registry::{BotRegistry, BotTransport};
pub use router::BotFallbackRouter;
pub use telegram::{TelegramBot, TelegramConfig, MAX_BOTS};
