//! dashboard: run one signal pass over the configured metric set and print
//! the traffic-light dashboard.
//!
//! Usage:
//!   cargo run -p dashboard-cli                  # demo data unless keys are set
//!   cargo run -p dashboard-cli -- --demo        # force synthetic series
//!   cargo run -p dashboard-cli -- --json        # machine-readable bundle
//!   cargo run -p dashboard-cli -- --concurrency 3 --timeout 15

use std::sync::Arc;

use provider_clients::{CoinGeckoClient, DemoProvider, FredClient, StooqClient};
use refresh_cache::{RefreshCache, TtlPolicy};
use signal_core::{
    ClassifiedMetric, CompositeScore, DataCategory, DataHealth, Direction, EngineConfig, Lens,
    MetricConfig, SignalBundle, ThresholdBasis, ThresholdRule, TrafficLight,
};
use signal_orchestrator::SignalOrchestrator;

const DEFAULT_CONCURRENCY: usize = 5;
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dashboard=info,signal_orchestrator=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let force_demo = args.iter().any(|a| a == "--demo");
    let as_json = args.iter().any(|a| a == "--json");

    let concurrency: usize = args
        .iter()
        .position(|a| a == "--concurrency")
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_CONCURRENCY);

    let timeout_secs: u64 = args
        .iter()
        .position(|a| a == "--timeout")
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_TIMEOUT_SECS);

    let fred_key = std::env::var("FRED_API_KEY").ok();
    let live = !force_demo;
    if !live {
        tracing::info!("Running with synthetic demo series");
    } else if fred_key.is_none() {
        tracing::info!("FRED_API_KEY not set; FRED-backed metrics fall back to demo data");
    }

    let mut config = EngineConfig::new(default_metrics(live, fred_key.is_some()));
    config.max_concurrent_fetches = concurrency;
    config.fetch_timeout_secs = timeout_secs;

    let cache = Arc::new(RefreshCache::new(TtlPolicy::new()));
    let mut orchestrator = SignalOrchestrator::new(config, cache)?;

    orchestrator.register_provider(Arc::new(DemoProvider::new()));
    if live {
        orchestrator.register_provider(Arc::new(StooqClient::new(timeout_secs)));
        orchestrator.register_provider(Arc::new(CoinGeckoClient::new(timeout_secs)));
        if let Some(key) = fred_key {
            orchestrator.register_provider(Arc::new(FredClient::new(key, timeout_secs)));
        }
    }

    let bundle = orchestrator.run().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&bundle)?);
    } else {
        render(&bundle);
    }
    Ok(())
}

/// Default metric set: the classic valuation gauges plus risk-appetite
/// trend gauges. Sources without a free feed stay on synthetic data, the
/// same split the original dashboard made.
fn default_metrics(live: bool, has_fred: bool) -> Vec<MetricConfig> {
    let stooq = if live { "stooq" } else { "demo" };
    let coingecko = if live { "coingecko" } else { "demo" };
    let fred = if live && has_fred { "fred" } else { "demo" };

    vec![
        // Valuation lens
        absolute_metric(
            "cape", "Shiller CAPE", "ratio", "demo", "shiller_cape",
            Lens::Valuation, DataCategory::Monthly, 20.0, 30.0,
        ),
        absolute_metric(
            "sp500_pe", "S&P 500 P/E", "ratio", "demo", "sp500_pe",
            Lens::Valuation, DataCategory::Daily, 18.0, 24.0,
        ),
        absolute_metric(
            "buffett", "Buffett Indicator", "%", fred, "DDDM01USA156NWDB",
            Lens::Valuation, DataCategory::Quarterly, 120.0, 150.0,
        ),
        absolute_metric(
            "margin_debt", "Margin Debt YoY", "%", "demo", "margin_debt_yoy",
            Lens::Valuation, DataCategory::Monthly, 0.0, 10.0,
        ),
        absolute_metric(
            "concentration", "Top-10 Concentration", "%", "demo", "sp500_top10_weight",
            Lens::Valuation, DataCategory::DailySlow, 25.0, 35.0,
        ),
        percentile_metric(
            "crypto_froth", "Crypto Froth (BTC)", "USD", coingecko, "bitcoin",
            Lens::Valuation, DataCategory::Daily, 75.0, 90.0,
        ),
        // Trend lens: risk-appetite gauges where a high reading means a
        // deteriorating tape, so lens percentiles share one orientation
        percentile_metric(
            "vix", "VIX", "index", stooq, "^vix",
            Lens::Trend, DataCategory::DailySlow, 50.0, 80.0,
        ),
        percentile_metric(
            "hy_spread", "HY Credit Spread", "bps", fred, "BAMLH0A0HYM2",
            Lens::Trend, DataCategory::Daily, 50.0, 75.0,
        ),
        percentile_metric(
            "put_call", "Put/Call Ratio", "ratio", "demo", "cboe_put_call",
            Lens::Trend, DataCategory::DailySlow, 50.0, 80.0,
        ),
    ]
}

#[allow(clippy::too_many_arguments)]
fn absolute_metric(
    id: &str, name: &str, unit: &str, provider: &str, series_id: &str,
    lens: Lens, category: DataCategory, caution: f64, danger: f64,
) -> MetricConfig {
    MetricConfig {
        id: id.to_string(),
        name: name.to_string(),
        unit: unit.to_string(),
        provider: provider.to_string(),
        series_id: series_id.to_string(),
        lens,
        category,
        rule: ThresholdRule {
            basis: ThresholdBasis::Absolute,
            direction: Direction::HighIsBad,
            caution_cut: caution,
            danger_cut: danger,
        },
        lookback: None,
        trend_window: 20,
        trend_epsilon: 0.002,
    }
}

#[allow(clippy::too_many_arguments)]
fn percentile_metric(
    id: &str, name: &str, unit: &str, provider: &str, series_id: &str,
    lens: Lens, category: DataCategory, caution: f64, danger: f64,
) -> MetricConfig {
    MetricConfig {
        rule: ThresholdRule {
            basis: ThresholdBasis::Percentile,
            direction: Direction::HighIsBad,
            caution_cut: caution,
            danger_cut: danger,
        },
        ..absolute_metric(id, name, unit, provider, series_id, lens, category, caution, danger)
    }
}

fn render(bundle: &SignalBundle) {
    println!();
    println!(
        "📊 Market Signal Dashboard (generated {})",
        bundle.generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    println!();

    render_lens("VALUATION", &bundle.valuation);
    render_lens("TREND", &bundle.trend);

    println!("Action: {}", bundle.action.name().to_uppercase());
    println!();
}

fn render_lens(title: &str, composite: &CompositeScore) {
    println!("{title}");
    for metric in &composite.metrics {
        println!("  {}", format_metric(metric));
    }
    match composite.percentile {
        Some(pct) => println!(
            "  composite: {:5.1} {}  ({} of {} metrics)",
            pct,
            status_icon(composite.status),
            composite.included,
            composite.metrics.len()
        ),
        None => println!("  composite: insufficient data"),
    }
    println!();
}

fn format_metric(metric: &ClassifiedMetric) -> String {
    let sample = &metric.sample;
    let value = sample
        .value
        .map(|v| format!("{v:10.2}"))
        .unwrap_or_else(|| format!("{:>10}", "-"));
    let pct = sample
        .percentile_rank
        .map(|p| format!("{p:5.1}"))
        .unwrap_or_else(|| format!("{:>5}", "-"));
    let trend = sample.trend.map(|t| t.name()).unwrap_or("-");
    let freshness = match sample.data_health {
        DataHealth::Fresh => String::new(),
        DataHealth::Stale => {
            let as_of = sample
                .source_as_of
                .map(|t| t.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "?".to_string());
            format!("  ⚠ stale (as of {as_of})")
        }
        DataHealth::Unavailable => "  ✗ unavailable".to_string(),
    };

    format!(
        "{} {:<24} {} {}  pct {}  {:<8}{}",
        status_icon(metric.status),
        sample.name,
        value,
        sample.unit,
        pct,
        trend,
        freshness
    )
}

fn status_icon(status: Option<TrafficLight>) -> &'static str {
    match status {
        Some(TrafficLight::Green) => "🟢",
        Some(TrafficLight::Yellow) => "🟡",
        Some(TrafficLight::Red) => "🔴",
        None => "⚪",
    }
}
