use anyhow::Context;
use exwire::exchanges::{binance, huobi};
use exwire::{ExchangeConnector, ExchangeFactory, ExchangeType, RequestParams, Subscription};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Streams one trade channel for a few seconds.
///
/// Usage: `exwire [binance|huobi] [seconds]`. Credentials are picked up from
/// `{EXCHANGE}_API_KEY` / `{EXCHANGE}_SECRET_KEY` (or `.env`) when present.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let exchange: ExchangeType = args
        .next()
        .as_deref()
        .unwrap_or("binance")
        .parse()
        .context("choose binance or huobi")?;
    let seconds: u64 = match args.next() {
        Some(raw) => raw.parse().context("duration must be whole seconds")?,
        None => 10,
    };

    let mut connector = ExchangeFactory::connect_from_env(exchange)?;

    let (time_endpoint, channel): (_, Subscription) = match exchange {
        ExchangeType::Binance => (binance::endpoints::SERVER_TIME, binance::channels::trade("btcusdt")),
        ExchangeType::Huobi => (huobi::endpoints::TIMESTAMP, huobi::channels::trade_detail("btcusdt")),
    };

    match connector.rest_call(&time_endpoint, &RequestParams::new()).await {
        Ok(time) => info!(%exchange, %time, "Server time"),
        Err(e) => warn!(%exchange, error = %e, kind = ?e.kind(), "Server time request failed"),
    }

    connector.subscribe(
        channel.clone(),
        Arc::new(|channel_id: &str, payload: Value| {
            info!(channel = channel_id, %payload, "Data");
        }),
    )?;

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    if let Some(stats) = connector.stats("market") {
        info!(
            frames = stats.frames_received(),
            heartbeats = stats.heartbeats(),
            reconnects = stats.reconnects(),
            status = ?connector.subscription_status(&channel.channel_id),
            "Market socket"
        );
    }

    connector.close().await;
    Ok(())
}
