use std::{collections::HashMap, sync::Arc};

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use cinder3_client::{ApiVersion, Client, Session};
use cinder3_types::{Limits, Snapshots, Tenant, Volumes, config::Credentials};
use observability_deps::tracing::debug;

use super::{BlockStorage, CloudProvider, ProviderError};

/// [`CloudProvider`] backed by a Keystone v3 identity service and its Cinder endpoints
#[derive(Debug, Clone, Default)]
pub struct OpenStack {
    client: Client,
}

impl OpenStack {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CloudProvider for OpenStack {
    async fn authenticate(
        &self,
        credentials: &Credentials,
        tenant: &str,
    ) -> Result<Session, ProviderError> {
        let session = self
            .client
            .authenticate(credentials, Some(tenant))
            .await
            .with_context(|| format!("password authentication as '{}'", credentials.user))?;
        Ok(session)
    }

    async fn list_tenants(&self, credentials: &Credentials) -> Result<Vec<Tenant>, ProviderError> {
        Ok(self.client.list_tenants(credentials).await?)
    }

    fn dispatch(&self, session: &Session) -> Result<Arc<dyn BlockStorage>, ProviderError> {
        let version = session.api_version().ok_or_else(|| {
            anyhow!(
                "service catalog offers none of the supported block storage services ({})",
                ApiVersion::PREFERENCE
                    .iter()
                    .map(|v| v.service_type())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })?;
        debug!(%version, "selected block storage API");
        Ok(Arc::new(CinderService::new(self.client.clone(), version)))
    }
}

/// [`BlockStorage`] served by one version of the Cinder API
#[derive(Debug, Clone)]
pub struct CinderService {
    client: Client,
    version: ApiVersion,
}

impl CinderService {
    pub fn new(client: Client, version: ApiVersion) -> Self {
        Self { client, version }
    }

    pub fn version(&self) -> ApiVersion {
        self.version
    }
}

#[async_trait]
impl BlockStorage for CinderService {
    async fn volumes(&self, session: &Session) -> Result<HashMap<String, Volumes>, ProviderError> {
        Ok(self.client.volumes(session, self.version).await?)
    }

    async fn snapshots(
        &self,
        session: &Session,
    ) -> Result<HashMap<String, Snapshots>, ProviderError> {
        Ok(self.client.snapshots(session, self.version).await?)
    }

    async fn limits(&self, session: &Session) -> Result<Limits, ProviderError> {
        Ok(self.client.limits(session, self.version).await?)
    }
}
