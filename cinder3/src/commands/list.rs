use cinder3_collector::{MetricCollector, schema};
use clap::Parser;
use serde::Serialize;

use super::common::{CommonConfig, Format};

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("failed to build the HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error(transparent)]
    Collector(#[from] cinder3_collector::Error),

    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}

pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Parser)]
#[clap(visible_alias = "ls")]
pub(crate) struct Config {
    #[clap(flatten)]
    pub(crate) common: CommonConfig,
}

#[derive(Debug, Serialize)]
struct ListedMetric {
    namespace: String,
    unit: &'static str,
}

pub(crate) async fn command(config: Config) -> Result<()> {
    let collector = config.common.collector()?;
    let namespaces = collector
        .metric_types(&config.common.openstack.collector_config())
        .await?;

    for namespace in namespaces {
        let field = schema::field(namespace.suffix()).map_err(cinder3_collector::Error::from)?;
        let listed = ListedMetric {
            namespace: namespace.to_string(),
            unit: field.kind.unit(),
        };
        match config.common.format {
            Format::Line => println!("{} {}", listed.namespace, listed.unit),
            Format::Json => println!("{}", serde_json::to_string(&listed)?),
        }
    }

    Ok(())
}
