//! CoinGecko market-chart adapter. The free tier allows roughly 50 calls a
//! minute; the limiter stays under that.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use signal_core::{ProviderError, RawSeries, SeriesPoint, SeriesProvider};

use crate::{check_status, map_transport_error, rate_limit::RateLimiter};

const BASE_URL: &str = "https://api.coingecko.com/api/v3";

pub struct CoinGeckoClient {
    client: Client,
    rate_limiter: RateLimiter,
    days: u32,
}

#[derive(Debug, Deserialize)]
struct MarketChartResponse {
    /// `[timestamp_ms, price]` pairs
    prices: Vec<(f64, f64)>,
}

impl CoinGeckoClient {
    pub fn new(timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            rate_limiter: RateLimiter::new(45, Duration::from_secs(60)),
            days: 365,
        }
    }

    pub fn with_days(mut self, days: u32) -> Self {
        self.days = days;
        self
    }
}

fn points_from_prices(prices: Vec<(f64, f64)>) -> Result<Vec<SeriesPoint>, ProviderError> {
    let mut points = Vec::with_capacity(prices.len());
    for (ts_ms, price) in prices {
        let timestamp = Utc
            .timestamp_millis_opt(ts_ms as i64)
            .single()
            .ok_or_else(|| {
                ProviderError::MalformedResponse(format!("bad timestamp {ts_ms}"))
            })?;
        points.push(SeriesPoint {
            timestamp,
            value: price,
        });
    }
    if points.is_empty() {
        return Err(ProviderError::MalformedResponse(
            "empty price series".to_string(),
        ));
    }
    Ok(points)
}

#[async_trait]
impl SeriesProvider for CoinGeckoClient {
    /// `series_id` is a CoinGecko coin id ("bitcoin", "ethereum")
    async fn fetch(&self, series_id: &str) -> Result<RawSeries, ProviderError> {
        self.rate_limiter.acquire().await;

        let url = format!("{}/coins/{}/market_chart", BASE_URL, series_id);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("vs_currency", "usd"),
                ("days", &self.days.to_string()),
                ("interval", "daily"),
            ])
            .send()
            .await
            .map_err(map_transport_error)?;
        check_status(&response, series_id)?;

        let chart: MarketChartResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        let points = points_from_prices(chart.prices)?;
        let observed_at = points.last().map(|p| p.timestamp).unwrap_or_else(Utc::now);
        tracing::debug!("CoinGecko {}: {} price points", series_id, points.len());
        Ok(RawSeries::new(points, observed_at))
    }

    fn name(&self) -> &str {
        "coingecko"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_from_prices() {
        let prices = vec![(1_700_000_000_000.0, 36000.5), (1_700_086_400_000.0, 36500.0)];
        let points = points_from_prices(prices).unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[1].value, 36500.0);
        assert!(points[0].timestamp < points[1].timestamp);
    }

    #[test]
    fn test_empty_series_is_malformed() {
        assert!(matches!(
            points_from_prices(Vec::new()),
            Err(ProviderError::MalformedResponse(_))
        ));
    }
}
