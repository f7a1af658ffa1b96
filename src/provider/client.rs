use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use thiserror::Error;

use super::types::{
    OfferRequestBody, OfferRequestEnvelope, OfferResponseEnvelope, PassengerRequest, SliceRequest,
};
use super::OfferProvider;
use crate::models::{Offer, SearchQuery};

const API_VERSION: &str = "v2";

#[derive(Debug, Error)]
pub enum ProviderClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider rejected the search ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// HTTP client for an offer-request flight search API.
#[derive(Debug, Clone)]
pub struct HttpOfferProvider {
    http: Client,
    base_url: String,
    access_token: String,
}

impl HttpOfferProvider {
    pub fn new(base_url: &str, access_token: String, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
        })
    }

    fn build_request(query: &SearchQuery) -> OfferRequestEnvelope {
        let mut slices = vec![SliceRequest {
            origin: query.origin.clone(),
            destination: query.destination.clone(),
            departure_date: query.departure_date,
        }];
        if let Some(return_date) = query.return_date {
            slices.push(SliceRequest {
                origin: query.destination.clone(),
                destination: query.origin.clone(),
                departure_date: return_date,
            });
        }

        OfferRequestEnvelope {
            data: OfferRequestBody {
                slices,
                passengers: vec![PassengerRequest { kind: "adult".into() }],
                cabin_class: query.cabin_class,
            },
        }
    }

    async fn request_offers(&self, query: &SearchQuery) -> Result<OfferResponseEnvelope, ProviderClientError> {
        let url = format!("{}/air/offer_requests?return_offers=true", self.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .header("Accept", "application/json")
            .header("Duffel-Version", API_VERSION)
            .json(&Self::build_request(query))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderClientError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl OfferProvider for HttpOfferProvider {
    async fn search(&self, query: &SearchQuery) -> anyhow::Result<Vec<Offer>> {
        let envelope = self.request_offers(query).await?;
        let now = Utc::now();

        let mut offers = Vec::with_capacity(envelope.data.offers.len());
        for api_offer in envelope.data.offers {
            let id = api_offer.id.clone();
            match api_offer.into_offer(now) {
                Ok(offer) => offers.push(offer),
                Err(e) => {
                    tracing::warn!(error = %e, offer_id = %id, "Skipping malformed provider offer");
                }
            }
        }

        tracing::debug!(
            origin = %query.origin,
            destination = %query.destination,
            departure = %query.departure_date,
            count = offers.len(),
            "Provider search completed"
        );

        Ok(offers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_round_trip_request_has_two_slices() {
        let query = SearchQuery::round_trip(
            "BRU",
            "BCN",
            NaiveDate::from_ymd_opt(2026, 11, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 11, 4).unwrap(),
        )
        .unwrap();

        let body = serde_json::to_value(HttpOfferProvider::build_request(&query)).unwrap();
        let slices = body["data"]["slices"].as_array().unwrap();
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[1]["origin"], "BCN");
        assert_eq!(slices[1]["departure_date"], "2026-11-04");
        assert!(body["data"].get("cabin_class").is_none());
    }
}
