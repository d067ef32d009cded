//! Coordinates one full signal pass: fan out fetches across distinct cache
//! keys, wait for every fetch to settle, then classify and score against
//! that single consistent snapshot. Nothing is refreshed mid-pass.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use composite_scorer::{recommend_action, score};
use metric_normalizer::normalize;
use refresh_cache::{CacheEntry, RefreshCache};
use signal_core::{
    DataCategory, DataHealth, EngineConfig, Lens, MetricSample, ProviderError, SeriesProvider,
    SignalBundle, SignalError,
};
use threshold_classifier::classify;

pub struct SignalOrchestrator {
    config: EngineConfig,
    cache: Arc<RefreshCache>,
    providers: HashMap<String, Arc<dyn SeriesProvider>>,
}

impl SignalOrchestrator {
    /// Fails fast on malformed configuration; nothing degrades for a
    /// programmer error.
    pub fn new(config: EngineConfig, cache: Arc<RefreshCache>) -> Result<Self, SignalError> {
        config.validate()?;
        Ok(Self {
            config,
            cache,
            providers: HashMap::new(),
        })
    }

    pub fn register_provider(&mut self, provider: Arc<dyn SeriesProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one orchestration pass and produce the signal bundle.
    pub async fn run(&self) -> Result<SignalBundle, SignalError> {
        let plan = self.fetch_plan()?;

        tracing::info!(
            "Signal pass: {} metrics over {} distinct series",
            self.config.metrics.len(),
            plan.len()
        );

        let snapshot = self.settle_fetches(plan).await;

        // Everything below is pure and synchronous over the snapshot
        let mut valuation_metrics = Vec::new();
        let mut trend_metrics = Vec::new();
        let mut all_metrics = Vec::new();

        for metric in &self.config.metrics {
            let sample = match snapshot.get(&metric.cache_key()) {
                Some(entry) => normalize(entry, metric),
                None => MetricSample::unavailable(&metric.id, &metric.name, &metric.unit),
            };
            if sample.data_health != DataHealth::Fresh {
                tracing::warn!("Metric {} is {}", metric.id, sample.data_health.name());
            }

            let classified = classify(sample, metric.rule);
            match metric.lens {
                Lens::Valuation => valuation_metrics.push(classified.clone()),
                Lens::Trend => trend_metrics.push(classified.clone()),
            }
            all_metrics.push(classified);
        }

        let valuation = score(Lens::Valuation, valuation_metrics, &self.config.composite_rule);
        let trend = score(Lens::Trend, trend_metrics, &self.config.composite_rule);
        let action = recommend_action(&valuation, &trend, &self.config.action_matrix);

        tracing::info!(
            "Signal pass complete: valuation {:?} ({}/{} metrics), trend {:?} ({}/{} metrics), action {}",
            valuation.status,
            valuation.included,
            valuation.metrics.len(),
            trend.status,
            trend.included,
            trend.metrics.len(),
            action.name()
        );

        Ok(SignalBundle {
            generated_at: Utc::now(),
            metrics: all_metrics,
            valuation,
            trend,
            action,
        })
    }

    /// One fetch per distinct cache key. Unknown providers are fatal.
    fn fetch_plan(&self) -> Result<HashMap<String, FetchTarget>, SignalError> {
        let mut plan = HashMap::new();
        for metric in &self.config.metrics {
            let provider = self
                .providers
                .get(&metric.provider)
                .ok_or_else(|| SignalError::UnknownProvider(metric.provider.clone()))?;

            plan.entry(metric.cache_key()).or_insert_with(|| FetchTarget {
                provider: Arc::clone(provider),
                series_id: metric.series_id.clone(),
                category: metric.category,
            });
        }
        Ok(plan)
    }

    /// Fan out bounded concurrent fetches and wait for all of them to
    /// settle (success or failure): the barrier before scoring.
    async fn settle_fetches(
        &self,
        plan: HashMap<String, FetchTarget>,
    ) -> HashMap<String, CacheEntry> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_fetches));
        let timeout = std::time::Duration::from_secs(self.config.fetch_timeout_secs);

        let mut tasks = JoinSet::new();
        for (key, target) in plan {
            let cache = Arc::clone(&self.cache);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire().await.unwrap();
                let entry = cache
                    .get_or_refresh(&key, target.category, || async {
                        // An overrun is a plain fetch failure, never left pending
                        match tokio::time::timeout(timeout, target.provider.fetch(&target.series_id))
                            .await
                        {
                            Ok(result) => result,
                            Err(_) => Err(ProviderError::Timeout),
                        }
                    })
                    .await;
                (key, entry)
            });
        }

        let mut snapshot = HashMap::new();
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok((key, entry)) => {
                    snapshot.insert(key, entry);
                }
                Err(e) => tracing::error!("Fetch task failed: {}", e),
            }
        }
        snapshot
    }
}

struct FetchTarget {
    provider: Arc<dyn SeriesProvider>,
    series_id: String,
    category: DataCategory,
}
