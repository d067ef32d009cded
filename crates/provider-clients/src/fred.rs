//! FRED (St. Louis Fed) series observations adapter. Needs an API key;
//! missing observations arrive as "." and are skipped.

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use signal_core::{ProviderError, RawSeries, SeriesPoint, SeriesProvider};

use crate::{check_status, map_transport_error, rate_limit::RateLimiter};

const BASE_URL: &str = "https://api.stlouisfed.org/fred";

pub struct FredClient {
    api_key: String,
    client: Client,
    rate_limiter: RateLimiter,
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    date: String,
    value: String,
}

impl FredClient {
    pub fn new(api_key: String, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            client,
            // FRED allows 120 req/min per key
            rate_limiter: RateLimiter::new(100, Duration::from_secs(60)),
        }
    }
}

fn points_from_observations(
    observations: Vec<Observation>,
) -> Result<Vec<SeriesPoint>, ProviderError> {
    let mut points = Vec::with_capacity(observations.len());

    for obs in observations {
        // "." marks a gap in the series, not an error
        if obs.value == "." {
            continue;
        }
        let date = NaiveDate::parse_from_str(&obs.date, "%Y-%m-%d")
            .map_err(|e| ProviderError::MalformedResponse(format!("bad date {}: {e}", obs.date)))?;
        let value: f64 = obs
            .value
            .parse()
            .map_err(|e| ProviderError::MalformedResponse(format!("bad value {}: {e}", obs.value)))?;

        points.push(SeriesPoint {
            timestamp: Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap()),
            value,
        });
    }

    if points.is_empty() {
        return Err(ProviderError::MalformedResponse(
            "no usable observations".to_string(),
        ));
    }
    Ok(points)
}

#[async_trait]
impl SeriesProvider for FredClient {
    /// `series_id` is a FRED series id ("GDP", "WILL5000PR", "BAMLH0A0HYM2")
    async fn fetch(&self, series_id: &str) -> Result<RawSeries, ProviderError> {
        self.rate_limiter.acquire().await;

        let url = format!("{}/series/observations", BASE_URL);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("series_id", series_id),
                ("api_key", self.api_key.as_str()),
                ("file_type", "json"),
            ])
            .send()
            .await
            .map_err(map_transport_error)?;
        check_status(&response, series_id)?;

        let body: ObservationsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        let points = points_from_observations(body.observations)?;
        let observed_at = points.last().map(|p| p.timestamp).unwrap_or_else(Utc::now);
        tracing::debug!("FRED {}: {} observations", series_id, points.len());
        Ok(RawSeries::new(points, observed_at))
    }

    fn name(&self) -> &str {
        "fred"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(date: &str, value: &str) -> Observation {
        Observation {
            date: date.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_gap_observations_are_skipped() {
        let points = points_from_observations(vec![
            obs("2024-01-01", "27000.5"),
            obs("2024-04-01", "."),
            obs("2024-07-01", "27400.0"),
        ])
        .unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[1].value, 27400.0);
    }

    #[test]
    fn test_all_gaps_is_malformed() {
        let result = points_from_observations(vec![obs("2024-01-01", ".")]);
        assert!(matches!(result, Err(ProviderError::MalformedResponse(_))));
    }

    #[test]
    fn test_garbage_value_is_malformed() {
        let result = points_from_observations(vec![obs("2024-01-01", "n/a")]);
        assert!(matches!(result, Err(ProviderError::MalformedResponse(_))));
    }
}
