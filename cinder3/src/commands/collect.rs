use std::time::Duration;

use cinder3_collector::{Collector, MetricCollector};
use cinder3_types::{MetricNamespace, MetricValue, config::CollectorConfig};
use clap::Parser;
use observability_deps::tracing::{error, info};
use serde::Serialize;
use tokio::time::MissedTickBehavior;

use super::common::{CommonConfig, Format};

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("failed to build the HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error(transparent)]
    Collector(#[from] cinder3_collector::Error),

    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to register signal handler: {0}")]
    Signal(#[from] std::io::Error),
}

pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Parser)]
pub(crate) struct Config {
    #[clap(flatten)]
    pub(crate) common: CommonConfig,

    /// Collect again at this interval until interrupted, e.g. `30s` or `5m`
    ///
    /// Sessions and tenant limits are kept between collections.
    #[clap(
        long = "interval",
        env = "CINDER3_INTERVAL",
        value_parser = humantime::parse_duration
    )]
    interval: Option<Duration>,

    /// Metric namespaces to collect, every available namespace when none are given
    namespaces: Vec<MetricNamespace>,
}

#[derive(Debug, Serialize)]
struct CollectedMetric {
    namespace: String,
    data: i64,
    timestamp: String,
}

pub(crate) async fn command(config: Config) -> Result<()> {
    let collector = config.common.collector()?;
    let collector_config = config.common.openstack.collector_config();
    let format = config.common.format;

    let namespaces = if config.namespaces.is_empty() {
        collector.metric_types(&collector_config).await?
    } else {
        config.namespaces
    };

    let Some(interval) = config.interval else {
        return collect(&collector, &collector_config, &namespaces, format).await;
    };

    info!(
        namespaces = namespaces.len(),
        interval = %humantime::format_duration(interval),
        "collecting until interrupted"
    );
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = wait_for_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            res = &mut shutdown => {
                res?;
                info!("stopped collecting");
                return Ok(());
            }
            _ = ticker.tick() => {
                // a failed cycle is reported and the next one tried
                if let Err(e) = collect(&collector, &collector_config, &namespaces, format).await {
                    error!(%e, "collection failed");
                }
            }
        }
    }
}

async fn collect(
    collector: &Collector,
    config: &CollectorConfig,
    namespaces: &[MetricNamespace],
    format: Format,
) -> Result<()> {
    let values = collector.collect_metrics(config, namespaces).await?;
    for value in values {
        print_value(&value, format)?;
    }
    Ok(())
}

fn print_value(value: &MetricValue, format: Format) -> Result<()> {
    match format {
        Format::Line => println!("{value}"),
        Format::Json => {
            let collected = CollectedMetric {
                namespace: value.namespace.to_string(),
                data: value.data,
                timestamp: value.timestamp.to_rfc3339(),
            };
            println!("{}", serde_json::to_string(&collected)?);
        }
    }
    Ok(())
}

/// Wait for a SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = term.recv() => info!("Received SIGTERM"),
        _ = int.recv() => info!("Received SIGINT"),
    }
    Ok(())
}

/// Wait for a `ctrl+c` on Windows systems
#[cfg(windows)]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Received SIGINT");
    Ok(())
}
