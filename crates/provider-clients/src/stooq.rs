//! Stooq daily history adapter. Stooq serves plain CSV
//! (`Date,Open,High,Low,Close,Volume`) with no API key.

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use reqwest::Client;
use std::time::Duration;

use signal_core::{ProviderError, RawSeries, SeriesPoint, SeriesProvider};

use crate::{check_status, map_transport_error, rate_limit::RateLimiter};

const BASE_URL: &str = "https://stooq.com/q/d/l";

pub struct StooqClient {
    client: Client,
    rate_limiter: RateLimiter,
}

impl StooqClient {
    pub fn new(timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            // Stooq has no published limit; stay politely under one a second
            rate_limiter: RateLimiter::new(60, Duration::from_secs(60)),
        }
    }
}

/// Parse Stooq's daily CSV into close-price points, oldest first.
pub fn parse_daily_csv(body: &str) -> Result<Vec<SeriesPoint>, ProviderError> {
    let mut points = Vec::new();

    for line in body.lines().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < 5 {
            return Err(ProviderError::MalformedResponse(format!(
                "short CSV row: {line}"
            )));
        }

        let date = NaiveDate::parse_from_str(fields[0], "%Y-%m-%d")
            .map_err(|e| ProviderError::MalformedResponse(format!("bad date {}: {e}", fields[0])))?;
        let close: f64 = fields[4]
            .parse()
            .map_err(|e| ProviderError::MalformedResponse(format!("bad close {}: {e}", fields[4])))?;

        points.push(SeriesPoint {
            timestamp: Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap()),
            value: close,
        });
    }

    if points.is_empty() {
        return Err(ProviderError::MalformedResponse(
            "no data rows in CSV".to_string(),
        ));
    }
    Ok(points)
}

#[async_trait]
impl SeriesProvider for StooqClient {
    async fn fetch(&self, series_id: &str) -> Result<RawSeries, ProviderError> {
        self.rate_limiter.acquire().await;

        let response = self
            .client
            .get(BASE_URL)
            .query(&[("s", series_id), ("i", "d")])
            .send()
            .await
            .map_err(map_transport_error)?;
        check_status(&response, series_id)?;

        let body = response.text().await.map_err(map_transport_error)?;
        // Stooq answers unknown symbols with 200 and a stub body
        if body.starts_with("No data") || body.trim() == "Exceeded the daily hits limit" {
            return Err(ProviderError::NotFound(series_id.to_string()));
        }

        let points = parse_daily_csv(&body)?;
        let observed_at = points.last().map(|p| p.timestamp).unwrap_or_else(Utc::now);
        tracing::debug!("Stooq {}: {} daily closes", series_id, points.len());
        Ok(RawSeries::new(points, observed_at))
    }

    fn name(&self) -> &str {
        "stooq"
    }
}
