use std::sync::Arc;

use cinder3_clap_blocks::openstack::OpenStackConfig;
use cinder3_collector::{Collector, provider::OpenStack};
use clap::{Parser, ValueEnum};
use iox_time::SystemProvider;
use trogging::cli::LoggingConfig;

/// Options shared by every command that talks to the cloud
#[derive(Debug, Parser)]
pub(crate) struct CommonConfig {
    #[clap(flatten)]
    pub(crate) openstack: OpenStackConfig,

    #[clap(flatten)]
    pub(crate) logging_config: LoggingConfig,

    /// The format in which to print the output
    #[clap(value_enum, long = "format", default_value = "line")]
    pub(crate) format: Format,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum Format {
    /// One space separated record per line
    Line,
    /// One JSON object per line
    Json,
}

impl CommonConfig {
    /// A collector talking to the configured cloud, with fresh caches
    pub(crate) fn collector(&self) -> Result<Collector, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(self.openstack.request_timeout)
            .build()?;
        let provider = OpenStack::new(cinder3_client::Client::with_http_client(http_client));
        Ok(Collector::new(
            Arc::new(provider),
            Arc::new(SystemProvider::new()),
        ))
    }
}
