use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;

use crate::models::{Alert, Offer, PriceStatistics, Recommendation};

/// One outbound message for a user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub user_id: String,
    pub subject: String,
    pub body: String,
    pub data: serde_json::Value,
}

/// Delivery channel for user notifications. Callers log failures and move on;
/// a failed send never rolls back the state change that triggered it.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// POSTs each notification as JSON to a webhook (mail relay, chat bridge, ...).
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        let resp = self.http.post(&self.url).json(notification).send().await?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("notification webhook returned {status}");
        }
        Ok(())
    }
}

/// Writes notifications to the log only. Used when no webhook is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        tracing::info!(
            user_id = %notification.user_id,
            subject = %notification.subject,
            "{}",
            notification.body
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Alert notifications
// ---------------------------------------------------------------------------

/// Why an alert fired.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertReason {
    BelowThreshold { max_price: Decimal },
    DroppedBelowAverage { drop_percent: Decimal, average_30d: Decimal },
    GoodDeal { recommendation: Recommendation, percentile: Decimal },
}

impl AlertReason {
    pub fn describe(&self, currency: &str) -> String {
        match self {
            AlertReason::BelowThreshold { max_price } => {
                format!("Price is at or below your limit of {} {currency}", max_price.round_dp(2))
            }
            AlertReason::DroppedBelowAverage { drop_percent, average_30d } => format!(
                "Price is {}% below the 30-day average of {} {currency}",
                drop_percent.round_dp(1),
                average_30d.round_dp(2)
            ),
            AlertReason::GoodDeal { recommendation, percentile } => format!(
                "Rated {} (cheaper than {}% of recent prices)",
                recommendation.as_str(),
                (Decimal::ONE_HUNDRED - *percentile).round_dp(0)
            ),
        }
    }
}

/// Build the notification sent when `alert` fires on `offer`.
pub fn format_alert_notification(
    alert: &Alert,
    offer: &Offer,
    reason: &AlertReason,
    stats: Option<&PriceStatistics>,
) -> Notification {
    let price = offer.total_amount.round_dp(2);
    let reason_text = reason.describe(&offer.currency);

    let subject = format!(
        "Price alert: {} \u{2192} {} for {} {}",
        alert.origin, alert.destination, price, offer.currency
    );

    let mut body = format!(
        "{} to {} on {}: {} {}\n{}",
        alert.origin, alert.destination, offer.departure_date, price, offer.currency, reason_text
    );
    if let Some(stats) = stats {
        body.push_str(&format!(
            "\n30-day average: {} {}, range {} to {}",
            stats.average_30d, offer.currency, stats.min_30d, stats.max_30d
        ));
    }

    Notification {
        user_id: alert.user_id.clone(),
        subject,
        body,
        data: json!({
            "alertId": alert.id.to_string(),
            "alertType": alert.kind.as_str(),
            "routeKey": alert.route_key.as_str(),
            "offerId": offer.id,
            "price": price,
            "currency": offer.currency,
            "departureDate": offer.departure_date,
            "reason": reason_text,
        }),
    }
}
