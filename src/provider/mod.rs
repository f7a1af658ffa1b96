pub mod client;
pub mod types;

pub use client::HttpOfferProvider;

use async_trait::async_trait;

use crate::models::{Offer, SearchQuery};

/// External flight-offer search. May fail; callers treat failure as "no offers".
#[async_trait]
pub trait OfferProvider: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> anyhow::Result<Vec<Offer>>;
}
