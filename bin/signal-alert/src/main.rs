use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use alerts::{AlertDefaults, AlertScheduler, CallMeBotNotifier};
use common::{ChartProvider, Config, Notifier, SymbolCatalog};
use market::{ChartCache, ChartService, OhlcPoller, TradingViewClient, TwelveDataClient};
use strategy::AnalysisOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── Logging ──────────────────────────────────────────────────────────────
    let _log_guard = init_tracing(&cfg.log_dir)?;
    info!(port = cfg.server_port, "Signal alert backend starting");

    // ── Symbol catalogue ─────────────────────────────────────────────────────
    let catalog = match cfg.symbols_config_path.as_deref() {
        Some(path) => SymbolCatalog::load(path).context("Failed to load symbol catalogue")?,
        None => SymbolCatalog::default(),
    };
    info!(pairs = catalog.len(), "Symbol catalogue ready");

    // ── Twelve Data charts ───────────────────────────────────────────────────
    let twelvedata = TwelveDataClient::new(cfg.twelvedata.clone(), catalog)
        .context("Failed to build Twelve Data client")?;
    let charts = Arc::new(ChartService::new(
        Arc::new(twelvedata),
        ChartCache::new(cfg.chart_cache_ttl),
    ));
    if !charts.enabled() {
        warn!("TWELVEDATA_API_KEY is missing. /api/charts will answer 503.");
    }
    let poller = OhlcPoller::new(charts.clone(), cfg.poll_lookback_hours, cfg.poll_interval);
    tokio::spawn(poller.run());

    // ── TradingView + WhatsApp alerts ────────────────────────────────────────
    let provider: Arc<dyn ChartProvider> = Arc::new(
        TradingViewClient::new(cfg.tradingview.clone())
            .context("Failed to build TradingView client")?,
    );

    let notifier: Option<Arc<dyn Notifier>> = if cfg.alerts.has_credentials() {
        let notifier: Arc<dyn Notifier> = Arc::new(
            CallMeBotNotifier::new(&cfg.alerts.callmebot_phone, &cfg.alerts.callmebot_api_key)
                .context("Failed to build CallMeBot notifier")?,
        );
        Some(notifier)
    } else {
        None
    };

    if let Some(scheduler) = AlertScheduler::from_config(&cfg, provider.clone(), notifier.clone()) {
        info!(symbols = ?scheduler.symbols(), "WhatsApp alert scheduler started");
        tokio::spawn(scheduler.run());
    }

    // ── Dashboard API ────────────────────────────────────────────────────────
    let state = api::AppState {
        charts,
        provider,
        notifier,
        username: cfg.app_username.clone(),
        password: cfg.app_password.clone(),
        analysis_defaults: AnalysisOptions::from_config(&cfg.tradingview),
        alert_defaults: AlertDefaults::from_config(&cfg.tradingview, &cfg.alerts),
    };

    api::serve(state, cfg.server_port, &cfg.cors_allowed_origins)
        .await
        .context("HTTP server failed")?;
    Ok(())
}

/// Console output plus plain lines appended to `<log_dir>/charts.log`.
/// The returned guard flushes the file writer on drop.
fn init_tracing(log_dir: &str) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory '{log_dir}'"))?;
    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, "charts.log"));

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();
    Ok(guard)
}
