//! In-memory caches refreshed in the background: network summary and price.

pub mod network;
pub mod price;

pub use network::{NetworkParams, NetworkSnapshot, NetworkStateCache, StateError};
pub use price::{PriceQuote, PriceResolver};
