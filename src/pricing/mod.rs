//! Offer caching, price history and the statistics derived from it.

pub mod history;
pub mod offer_cache;
pub mod stats;

pub use history::PriceHistory;
pub use offer_cache::{OfferCache, OfferCacheConfig};
