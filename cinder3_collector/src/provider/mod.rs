//! The seams between the collector and the cloud it collects from
//!
//! A [`CloudProvider`] exchanges credentials for sessions, lists tenants, and picks the
//! [`BlockStorage`] API that a session should be served by. The three category fetchers
//! wrap the [`BlockStorage`] calls and tag any failure with the category being fetched.

use std::{collections::HashMap, fmt::Debug, sync::Arc};

use async_trait::async_trait;
use cinder3_client::Session;
use cinder3_types::{Category, Limits, Snapshots, Tenant, Volumes, config::Credentials};

use crate::{Error, Result};

mod openstack;
pub use openstack::{CinderService, OpenStack};

/// Opaque failure of a call into the cloud
pub type ProviderError = anyhow::Error;

/// Identity side of the cloud
#[async_trait]
pub trait CloudProvider: Debug + Send + Sync + 'static {
    /// Exchange `credentials` for a session scoped to the tenant named `tenant`
    async fn authenticate(
        &self,
        credentials: &Credentials,
        tenant: &str,
    ) -> Result<Session, ProviderError>;

    /// Every tenant visible to `credentials`
    async fn list_tenants(&self, credentials: &Credentials) -> Result<Vec<Tenant>, ProviderError>;

    /// Select the block storage API version that serves `session`
    fn dispatch(&self, session: &Session) -> Result<Arc<dyn BlockStorage>, ProviderError>;
}

/// Block storage side of the cloud, for one API version
#[async_trait]
pub trait BlockStorage: Debug + Send + Sync + 'static {
    /// Volume counts and sizes, keyed by owning tenant id
    async fn volumes(&self, session: &Session) -> Result<HashMap<String, Volumes>, ProviderError>;

    /// Snapshot counts and sizes, keyed by owning tenant id
    async fn snapshots(&self, session: &Session)
    -> Result<HashMap<String, Snapshots>, ProviderError>;

    /// Limits of the tenant `session` is scoped to
    async fn limits(&self, session: &Session) -> Result<Limits, ProviderError>;
}

pub(crate) async fn fetch_volumes(
    storage: &dyn BlockStorage,
    session: &Session,
) -> Result<HashMap<String, Volumes>> {
    storage
        .volumes(session)
        .await
        .map_err(|source| Error::Fetch {
            category: Category::Volumes,
            source,
        })
}

pub(crate) async fn fetch_snapshots(
    storage: &dyn BlockStorage,
    session: &Session,
) -> Result<HashMap<String, Snapshots>> {
    storage
        .snapshots(session)
        .await
        .map_err(|source| Error::Fetch {
            category: Category::Snapshots,
            source,
        })
}

pub(crate) async fn fetch_limits(storage: &dyn BlockStorage, session: &Session) -> Result<Limits> {
    storage
        .limits(session)
        .await
        .map_err(|source| Error::Fetch {
            category: Category::Limits,
            source,
        })
}
