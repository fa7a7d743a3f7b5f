//! Concurrent, authentication scoped collection of Cinder utilization metrics
//!
//! The [`Collector`] is the entry point a host drives: it enumerates the metric namespaces that
//! are available for every visible tenant, and collects the values of an arbitrary batch of
//! requested namespaces. Collecting a batch works in strictly sequential phases:
//!
//! 1. plan: validate the requested namespaces and work out which tenants and which categories
//!    of data are needed
//! 2. admin phase: using the admin tenant's session, list volumes and snapshots across all
//!    tenants concurrently
//! 3. limits phase: fetch the limits of every requested tenant that is not already cached, one
//!    concurrent task per tenant, each with that tenant's own session
//! 4. projection: pick the value addressed by each requested namespace out of the collected
//!    data
//!
//! Any failure aborts the whole batch; no partial results are ever returned.
//!
//! Sessions and limits are cached for the lifetime of a [`Collector`]. Volumes and snapshots are
//! fetched fresh on every call.

use std::fmt::Debug;

use async_trait::async_trait;
use cinder3_types::{Category, MetricNamespace, MetricValue, config::CollectorConfig};

mod collector;
mod plan;
pub mod provider;
pub mod schema;
mod session;
mod task_group;
mod tenants;

#[cfg(test)]
mod test_helpers;

pub use collector::Collector;
pub use plan::CollectionPlan;
pub use provider::{BlockStorage, CloudProvider, ProviderError};
pub use schema::InvalidPathError;
pub use session::SessionCache;
pub use tenants::{TenantDirectory, TenantMap};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed metric namespace '{namespace}': {reason}")]
    MalformedNamespace {
        namespace: MetricNamespace,
        reason: String,
    },

    #[error("failed to authenticate tenant '{tenant}': {source:#}")]
    Authentication {
        tenant: String,
        #[source]
        source: ProviderError,
    },

    #[error("failed to list tenants: {0:#}")]
    Directory(#[source] ProviderError),

    #[error("failed to fetch {category}: {source:#}")]
    Fetch {
        category: Category,
        #[source]
        source: ProviderError,
    },

    #[error("no session has selected a block storage service yet")]
    NoBlockStorage,

    #[error(transparent)]
    InvalidPath(#[from] InvalidPathError),

    #[error("collection task did not run to completion: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl Error {
    fn malformed_namespace(namespace: &MetricNamespace, reason: impl Into<String>) -> Self {
        Self::MalformedNamespace {
            namespace: namespace.clone(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The two operations a plugin host drives
#[async_trait]
pub trait MetricCollector: Debug + Send + Sync + 'static {
    /// Every namespace that can be collected, for every tenant visible to the configured
    /// credentials
    async fn metric_types(&self, config: &CollectorConfig) -> Result<Vec<MetricNamespace>>;

    /// Collect the value of each of the `requested` namespaces
    ///
    /// Values are returned in the order they were requested, one per namespace.
    async fn collect_metrics(
        &self,
        config: &CollectorConfig,
        requested: &[MetricNamespace],
    ) -> Result<Vec<MetricValue>>;
}
