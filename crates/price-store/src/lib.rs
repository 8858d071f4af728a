pub mod alerts;
pub mod db;
pub mod products;

pub use alerts::AlertManager;
pub use db::PriceDb;
pub use products::ProductTracker;
