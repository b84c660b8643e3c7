use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::RwLock;
use tracing::{info, warn};

use common::{ChartProvider, Config, Notifier, Result};

use crate::prepare::{prepare_alert, AlertDefaults, AlertOverrides};
use crate::retry::RetryPolicy;

/// What happened to one symbol during an alert round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolOutcome {
    /// No verified candle, or nothing to say about it.
    NotVerified,
    /// Verified, but this candle was already alerted.
    AlreadySent,
    Sent,
}

/// Aggregate of one round over all symbols.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundSummary {
    pub had_errors: bool,
    pub any_verified: bool,
    pub any_sent: bool,
}

/// Periodically checks every alert symbol and sends one WhatsApp message per
/// newly verified candle.
pub struct AlertScheduler {
    provider: Arc<dyn ChartProvider>,
    notifier: Arc<dyn Notifier>,
    defaults: AlertDefaults,
    symbols: Vec<String>,
    policy: RetryPolicy,
    /// Upper-cased symbol → timestamp of the last alerted candle.
    last_alerted: RwLock<HashMap<String, String>>,
}

impl AlertScheduler {
    pub fn new(
        provider: Arc<dyn ChartProvider>,
        notifier: Arc<dyn Notifier>,
        defaults: AlertDefaults,
        symbols: Vec<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            notifier,
            defaults,
            symbols,
            policy,
            last_alerted: RwLock::new(HashMap::new()),
        }
    }

    /// Build the scheduler from configuration, or `None` (with a log line)
    /// when alerts are disabled, credentials are missing or no symbol is set.
    pub fn from_config(
        config: &Config,
        provider: Arc<dyn ChartProvider>,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> Option<Self> {
        let alerts = &config.alerts;
        if !alerts.enabled {
            info!("WhatsApp alerts disabled. Set WHATSAPP_ALERT_ENABLED=1 to turn them on.");
            return None;
        }
        let Some(notifier) = notifier.filter(|_| alerts.has_credentials()) else {
            warn!("WhatsApp alerts disabled: missing CALLMEBOT_PHONE or CALLMEBOT_API_KEY");
            return None;
        };
        if alerts.symbols.is_empty() {
            warn!("WhatsApp alerts disabled: no TradingView symbols configured");
            return None;
        }

        Some(Self::new(
            provider,
            notifier,
            AlertDefaults::from_config(&config.tradingview, alerts),
            alerts.symbols.clone(),
            RetryPolicy::new(alerts.poll_interval, alerts.retry_interval, alerts.max_retries),
        ))
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Check one symbol and send its alert if the previous candle is newly
    /// verified. The candle is remembered only after a successful send.
    pub async fn poll_symbol(&self, symbol: &str) -> Result<SymbolOutcome> {
        let key = symbol.to_uppercase();
        let prepared = prepare_alert(
            self.provider.as_ref(),
            &self.defaults,
            &AlertOverrides::for_symbol(symbol),
        )
        .await?;

        let message = prepared.message.trim();
        let Some(timestamp) = prepared.previous_timestamp() else {
            return Ok(SymbolOutcome::NotVerified);
        };
        if !prepared.verified || message.is_empty() {
            return Ok(SymbolOutcome::NotVerified);
        }
        if self.last_alerted.read().await.get(&key).map(String::as_str) == Some(timestamp) {
            return Ok(SymbolOutcome::AlreadySent);
        }

        self.notifier.send(message).await?;
        self.last_alerted
            .write()
            .await
            .insert(key, timestamp.to_string());
        info!(
            symbol = %prepared.analysis.symbol,
            timeframe = %prepared.analysis.timeframe,
            candle = %timestamp,
            "WhatsApp alert sent"
        );
        Ok(SymbolOutcome::Sent)
    }

    /// Check all symbols concurrently. Per-symbol errors are logged.
    pub async fn poll_all(&self) -> RoundSummary {
        let results = join_all(self.symbols.iter().map(|symbol| async move {
            let result = self.poll_symbol(symbol).await;
            if let Err(e) = &result {
                warn!(symbol = %symbol, error = %e, "WhatsApp alert error");
            }
            result
        }))
        .await;

        results
            .into_iter()
            .fold(RoundSummary::default(), |mut summary, result| {
                match result {
                    Ok(SymbolOutcome::Sent) => {
                        summary.any_verified = true;
                        summary.any_sent = true;
                    }
                    Ok(SymbolOutcome::AlreadySent) => summary.any_verified = true,
                    Ok(SymbolOutcome::NotVerified) => {}
                    Err(_) => summary.had_errors = true,
                }
                summary
            })
    }

    /// Run rounds forever: the first immediately, then per the retry policy.
    /// Call inside a `tokio::spawn`.
    pub async fn run(mut self) {
        info!(
            symbols = ?self.symbols,
            base_interval = ?self.policy.base_interval(),
            retry_interval = ?self.policy.retry_interval(),
            max_retries = self.policy.max_retries(),
            "WhatsApp alerts armed"
        );

        let mut delay = Duration::ZERO;
        loop {
            tokio::time::sleep(delay).await;
            let summary = self.poll_all().await;
            delay = self.policy.next_delay(summary.had_errors);

            if summary.had_errors && self.policy.failures() > 0 {
                warn!(
                    retry_in = ?delay,
                    attempt = self.policy.failures(),
                    max_retries = self.policy.max_retries(),
                    "WhatsApp poll encountered errors, retrying"
                );
            } else if summary.had_errors {
                warn!(
                    next_run_in = ?delay,
                    "WhatsApp poll reached max retry attempts, back to the normal interval"
                );
            }
        }
    }
}
