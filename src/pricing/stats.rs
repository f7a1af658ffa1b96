use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::models::{DailyPrice, PriceHistoryEntry, PriceStatistics, Recommendation, RouteKey, Trend};

/// Points taken from each end of the 30-day sample when classifying the trend.
pub const TREND_WINDOW: usize = 7;

/// Relative change between the two trend windows that counts as movement.
const TREND_THRESHOLD_PCT: i64 = 5;

const EXCELLENT_MAX_PCT: i64 = 15;
const GOOD_MAX_PCT: i64 = 35;
const FAIR_MAX_PCT: i64 = 65;

/// Derive statistics for a route from up to 90 days of observations.
///
/// `entries` may arrive in any order. Returns `None` when there is no data.
/// If nothing was observed in the last 30 days, the 30-day figures fall back
/// to the full 90-day sample.
pub fn compute_statistics(
    route_key: &RouteKey,
    entries: &[PriceHistoryEntry],
    now: DateTime<Utc>,
    current_price: Option<Decimal>,
) -> Option<PriceStatistics> {
    if entries.is_empty() {
        return None;
    }

    let mut sorted: Vec<&PriceHistoryEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| e.observed_at);

    let all_prices: Vec<Decimal> = sorted.iter().map(|e| e.price).collect();
    let cutoff_30d = now - Duration::days(30);
    let recent: Vec<Decimal> = sorted
        .iter()
        .filter(|e| e.observed_at >= cutoff_30d)
        .map(|e| e.price)
        .collect();
    let sample_30d = if recent.is_empty() { all_prices.clone() } else { recent };

    let current = current_price.unwrap_or_else(|| all_prices[all_prices.len() - 1]);
    let trend = classify_trend(&sample_30d);
    let pct = percentile(&sample_30d, current);

    Some(PriceStatistics {
        route_key: route_key.clone(),
        current_price: current,
        average_30d: mean(&sample_30d).round_dp(2),
        average_90d: mean(&all_prices).round_dp(2),
        min_30d: sample_30d.iter().copied().min().unwrap_or(current),
        max_30d: sample_30d.iter().copied().max().unwrap_or(current),
        trend,
        percentile: pct,
        recommendation: recommend(pct, trend),
        sample_size_30d: sample_30d.len(),
        sample_size_90d: all_prices.len(),
    })
}

/// Arithmetic mean; zero for an empty slice.
pub fn mean(prices: &[Decimal]) -> Decimal {
    if prices.is_empty() {
        return Decimal::ZERO;
    }
    prices.iter().copied().sum::<Decimal>() / Decimal::from(prices.len() as i64)
}

/// Compare the mean of the earliest [`TREND_WINDOW`] points with the latest ones.
/// The windows overlap when fewer than `2 * TREND_WINDOW` points exist.
pub fn classify_trend(prices_by_time: &[Decimal]) -> Trend {
    if prices_by_time.len() < 2 {
        return Trend::Stable;
    }

    let window = TREND_WINDOW.min(prices_by_time.len());
    let older = mean(&prices_by_time[..window]);
    let recent = mean(&prices_by_time[prices_by_time.len() - window..]);

    if older.is_zero() {
        return Trend::Stable;
    }

    let change_pct = (recent - older) / older * Decimal::ONE_HUNDRED;
    let threshold = Decimal::from(TREND_THRESHOLD_PCT);

    if change_pct > threshold {
        Trend::Increasing
    } else if change_pct < -threshold {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

/// Share of `sample` at or below `price`, as 0–100 rounded to two places.
pub fn percentile(sample: &[Decimal], price: Decimal) -> Decimal {
    if sample.is_empty() {
        return Decimal::ZERO;
    }
    let at_or_below = sample.iter().filter(|p| **p <= price).count();
    (Decimal::from(at_or_below as i64) * Decimal::ONE_HUNDRED / Decimal::from(sample.len() as i64))
        .round_dp(2)
}

/// The canonical threshold table.
pub fn recommend(percentile: Decimal, trend: Trend) -> Recommendation {
    if percentile <= Decimal::from(EXCELLENT_MAX_PCT) && trend != Trend::Increasing {
        Recommendation::Excellent
    } else if percentile <= Decimal::from(GOOD_MAX_PCT) {
        Recommendation::Good
    } else if percentile <= Decimal::from(FAIR_MAX_PCT) {
        Recommendation::Fair
    } else {
        Recommendation::Poor
    }
}

/// Group observations by calendar day (UTC), ascending.
pub fn daily_aggregates(entries: &[PriceHistoryEntry]) -> Vec<DailyPrice> {
    let mut days: BTreeMap<NaiveDate, Vec<Decimal>> = BTreeMap::new();
    for entry in entries {
        days.entry(entry.observed_at.date_naive())
            .or_default()
            .push(entry.price);
    }

    days.into_iter()
        .map(|(date, prices)| DailyPrice {
            date,
            average: mean(&prices).round_dp(2),
            min: prices.iter().copied().min().unwrap_or_default(),
            max: prices.iter().copied().max().unwrap_or_default(),
            count: prices.len(),
        })
        .collect()
}
