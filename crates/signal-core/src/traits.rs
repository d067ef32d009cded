use async_trait::async_trait;

use crate::{ProviderError, RawSeries};

/// Trait for thin data-source adapters (Stooq, CoinGecko, FRED, ...).
/// An adapter fetches the raw series for one series identifier and reports
/// the provider's own observation time alongside it.
#[async_trait]
pub trait SeriesProvider: Send + Sync {
    async fn fetch(&self, series_id: &str) -> Result<RawSeries, ProviderError>;

    /// Short name used in cache keys and logs
    fn name(&self) -> &str;
}
