use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{CabinClass, FareConditions, Offer};

// ---------------------------------------------------------------------------
// Offer request (outbound)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct OfferRequestEnvelope {
    pub data: OfferRequestBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct OfferRequestBody {
    pub slices: Vec<SliceRequest>,
    pub passengers: Vec<PassengerRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cabin_class: Option<CabinClass>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SliceRequest {
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct PassengerRequest {
    #[serde(rename = "type")]
    pub kind: String,
}

// ---------------------------------------------------------------------------
// Offer response (inbound)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct OfferResponseEnvelope {
    pub data: OfferResponseBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OfferResponseBody {
    #[serde(default)]
    pub offers: Vec<ApiOffer>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiOffer {
    pub id: String,
    /// Decimal string, e.g. "142.30".
    pub total_amount: String,
    pub total_currency: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub owner: Option<ApiCarrier>,
    #[serde(default)]
    pub slices: Vec<ApiSlice>,
    #[serde(default)]
    pub conditions: Option<ApiConditions>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiCarrier {
    pub iata_code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiPlace {
    pub iata_code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSlice {
    pub origin: ApiPlace,
    pub destination: ApiPlace,
    #[serde(default)]
    pub fare_brand_name: Option<String>,
    #[serde(default)]
    pub segments: Vec<ApiSegment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSegment {
    /// Local departure time, e.g. "2026-11-01T07:05:00".
    pub departing_at: String,
    #[serde(default)]
    pub passengers: Vec<ApiSegmentPassenger>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSegmentPassenger {
    #[serde(default)]
    pub cabin_class: Option<CabinClass>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConditions {
    #[serde(default)]
    pub refund_before_departure: Option<ApiCondition>,
    #[serde(default)]
    pub change_before_departure: Option<ApiCondition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiCondition {
    pub allowed: bool,
    #[serde(default)]
    pub penalty_amount: Option<String>,
}

impl ApiOffer {
    /// Convert a wire offer into a domain [`Offer`], observed at `now`.
    pub fn into_offer(self, now: DateTime<Utc>) -> anyhow::Result<Offer> {
        let outbound = self
            .slices
            .first()
            .ok_or_else(|| anyhow::anyhow!("offer {} has no slices", self.id))?;
        let first_segment = outbound
            .segments
            .first()
            .ok_or_else(|| anyhow::anyhow!("offer {} has an empty outbound slice", self.id))?;

        let departure_date = parse_local_date(&first_segment.departing_at)?;
        let return_date = match self.slices.get(1).and_then(|s| s.segments.first()) {
            Some(segment) => Some(parse_local_date(&segment.departing_at)?),
            None => None,
        };

        let cabin_class = first_segment
            .passengers
            .first()
            .and_then(|p| p.cabin_class)
            .unwrap_or_default();

        let stops = outbound.segments.len().saturating_sub(1) as u32;

        let carrier = self
            .owner
            .as_ref()
            .and_then(|o| o.iata_code.clone().or_else(|| o.name.clone()))
            .unwrap_or_default();

        let conditions = self
            .conditions
            .as_ref()
            .map(|c| FareConditions {
                refundable: c.refund_before_departure.as_ref().map_or(false, |r| r.allowed),
                changeable: c.change_before_departure.as_ref().map_or(false, |r| r.allowed),
                change_penalty: c
                    .change_before_departure
                    .as_ref()
                    .and_then(|r| r.penalty_amount.as_deref())
                    .and_then(|p| p.parse::<Decimal>().ok()),
            })
            .unwrap_or_default();

        let offer = Offer {
            id: self.id.clone(),
            origin: outbound.origin.iata_code.clone(),
            destination: outbound.destination.iata_code.clone(),
            departure_date,
            return_date,
            total_amount: self.total_amount.parse()?,
            currency: self.total_currency.to_ascii_uppercase(),
            cabin_class,
            stops,
            carrier,
            conditions,
            created_at: self.created_at.unwrap_or(now).min(now),
            expires_at: self.expires_at,
        };

        Ok(offer.validated()?)
    }
}

fn parse_local_date(stamp: &str) -> anyhow::Result<NaiveDate> {
    let date_part = stamp.get(..10).unwrap_or(stamp);
    Ok(NaiveDate::parse_from_str(date_part, "%Y-%m-%d")?)
}
