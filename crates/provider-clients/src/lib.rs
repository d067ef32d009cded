//! Thin HTTP adapters over the free public data sources. Each client
//! implements [`signal_core::SeriesProvider`] and maps transport problems
//! into the provider failure taxonomy; retry policy beyond a single 429
//! backoff belongs to the refresh cadence, not to the adapters.

pub mod coingecko;
pub mod demo;
pub mod fred;
pub mod stooq;

mod rate_limit;

pub use coingecko::CoinGeckoClient;
pub use demo::DemoProvider;
pub use fred::FredClient;
pub use stooq::StooqClient;

use signal_core::ProviderError;

pub(crate) fn map_transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::MalformedResponse(err.to_string())
    }
}

pub(crate) fn check_status(response: &reqwest::Response, series_id: &str) -> Result<(), ProviderError> {
    let status = response.status();
    if status.as_u16() == 429 {
        return Err(ProviderError::RateLimited);
    }
    if status.as_u16() == 404 {
        return Err(ProviderError::NotFound(series_id.to_string()));
    }
    if !status.is_success() {
        return Err(ProviderError::MalformedResponse(format!(
            "HTTP {} for {}",
            status, series_id
        )));
    }
    Ok(())
}
