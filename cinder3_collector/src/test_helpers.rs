//! In-memory [`CloudProvider`] for exercising the collector without a cloud

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use anyhow::anyhow;
use async_trait::async_trait;
use cinder3_client::Session;
use cinder3_types::{
    Limits, Snapshots, Tenant, Volumes,
    config::{CollectorConfig, Credentials},
};
use parking_lot::Mutex;
use url::Url;

use crate::{BlockStorage, CloudProvider, ProviderError};

pub(crate) fn credentials() -> Credentials {
    Credentials::new(
        Url::parse("http://keystone:5000").unwrap(),
        "admin",
        "secret",
    )
}

/// Config whose admin tenant is `admin_tenant`
pub(crate) fn config(admin_tenant: &str) -> CollectorConfig {
    CollectorConfig::new(credentials(), admin_tenant)
}

/// Canned data, call counters and failure switches shared by every clone of a [`MockCloud`]
#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub(crate) tenants: Mutex<Vec<Tenant>>,
    pub(crate) volumes: Mutex<HashMap<String, Volumes>>,
    pub(crate) snapshots: Mutex<HashMap<String, Snapshots>>,
    /// Keyed by tenant id
    pub(crate) limits: Mutex<HashMap<String, Limits>>,

    pub(crate) authentications: AtomicUsize,
    pub(crate) tenant_listings: AtomicUsize,
    pub(crate) volume_fetches: AtomicUsize,
    pub(crate) snapshot_fetches: AtomicUsize,
    /// Limits fetches per tenant name
    pub(crate) limit_fetches: Mutex<HashMap<String, usize>>,

    failing_authentications: Mutex<HashSet<String>>,
    failing_limits: Mutex<HashSet<String>>,
    fail_tenant_listing: AtomicBool,
    fail_volumes: AtomicBool,
    fail_snapshots: AtomicBool,
}

impl MockState {
    pub(crate) fn fail_authentication(&self, tenant: &str) {
        self.failing_authentications.lock().insert(tenant.to_string());
    }

    pub(crate) fn fail_limits(&self, tenant: &str) {
        self.failing_limits.lock().insert(tenant.to_string());
    }

    pub(crate) fn fail_tenant_listing(&self) {
        self.fail_tenant_listing.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_volumes(&self) {
        self.fail_volumes.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_snapshots(&self) {
        self.fail_snapshots.store(true, Ordering::SeqCst);
    }

    pub(crate) fn clear_failures(&self) {
        self.failing_authentications.lock().clear();
        self.failing_limits.lock().clear();
        self.fail_tenant_listing.store(false, Ordering::SeqCst);
        self.fail_volumes.store(false, Ordering::SeqCst);
        self.fail_snapshots.store(false, Ordering::SeqCst);
    }

    pub(crate) fn limit_fetches(&self, tenant: &str) -> usize {
        self.limit_fetches.lock().get(tenant).copied().unwrap_or_default()
    }

    pub(crate) fn total_limit_fetches(&self) -> usize {
        self.limit_fetches.lock().values().sum()
    }

    /// Number of calls made into the cloud, of any kind
    pub(crate) fn calls(&self) -> usize {
        self.authentications.load(Ordering::SeqCst)
            + self.tenant_listings.load(Ordering::SeqCst)
            + self.volume_fetches.load(Ordering::SeqCst)
            + self.snapshot_fetches.load(Ordering::SeqCst)
            + self.total_limit_fetches()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct MockCloud {
    pub(crate) state: Arc<MockState>,
}

impl MockCloud {
    /// A cloud with the given `(id, name)` tenants and no data
    pub(crate) fn new(tenants: &[(&str, &str)]) -> Self {
        let state = MockState::default();
        *state.tenants.lock() = tenants
            .iter()
            .map(|(id, name)| Tenant::new(*id, *name))
            .collect();
        Self {
            state: Arc::new(state),
        }
    }

    pub(crate) fn with_volumes(self, tenant_id: &str, volumes: Volumes) -> Self {
        self.state
            .volumes
            .lock()
            .insert(tenant_id.to_string(), volumes);
        self
    }

    pub(crate) fn with_snapshots(self, tenant_id: &str, snapshots: Snapshots) -> Self {
        self.state
            .snapshots
            .lock()
            .insert(tenant_id.to_string(), snapshots);
        self
    }

    pub(crate) fn with_limits(self, tenant_id: &str, limits: Limits) -> Self {
        self.state
            .limits
            .lock()
            .insert(tenant_id.to_string(), limits);
        self
    }
}

#[async_trait]
impl CloudProvider for MockCloud {
    async fn authenticate(
        &self,
        _credentials: &Credentials,
        tenant: &str,
    ) -> Result<Session, ProviderError> {
        self.state.authentications.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.state.failing_authentications.lock().contains(tenant) {
            return Err(anyhow!("invalid credentials for {tenant}"));
        }
        let project = self
            .state
            .tenants
            .lock()
            .iter()
            .find(|t| t.name == tenant)
            .cloned()
            .ok_or_else(|| anyhow!("no project named {tenant}"))?;
        Ok(Session::new(
            format!("token-{tenant}"),
            Some(project),
            vec![],
        ))
    }

    async fn list_tenants(&self, _credentials: &Credentials) -> Result<Vec<Tenant>, ProviderError> {
        self.state.tenant_listings.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_tenant_listing.load(Ordering::SeqCst) {
            return Err(anyhow!("identity service unavailable"));
        }
        Ok(self.state.tenants.lock().clone())
    }

    fn dispatch(&self, _session: &Session) -> Result<Arc<dyn BlockStorage>, ProviderError> {
        Ok(Arc::new(MockStorage {
            state: Arc::clone(&self.state),
        }))
    }
}

#[derive(Debug)]
struct MockStorage {
    state: Arc<MockState>,
}

#[async_trait]
impl BlockStorage for MockStorage {
    async fn volumes(&self, _session: &Session) -> Result<HashMap<String, Volumes>, ProviderError> {
        self.state.volume_fetches.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.state.fail_volumes.load(Ordering::SeqCst) {
            return Err(anyhow!("volume listing failed"));
        }
        Ok(self.state.volumes.lock().clone())
    }

    async fn snapshots(
        &self,
        _session: &Session,
    ) -> Result<HashMap<String, Snapshots>, ProviderError> {
        self.state.snapshot_fetches.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.state.fail_snapshots.load(Ordering::SeqCst) {
            return Err(anyhow!("snapshot listing failed"));
        }
        Ok(self.state.snapshots.lock().clone())
    }

    async fn limits(&self, session: &Session) -> Result<Limits, ProviderError> {
        let project = session
            .project()
            .ok_or_else(|| anyhow!("session is not scoped to a project"))?;
        *self
            .state
            .limit_fetches
            .lock()
            .entry(project.name.clone())
            .or_default() += 1;
        tokio::task::yield_now().await;
        if self.state.failing_limits.lock().contains(&project.name) {
            return Err(anyhow!("limits unavailable for {}", project.name));
        }
        Ok(self
            .state
            .limits
            .lock()
            .get(&project.id)
            .copied()
            .unwrap_or_default())
    }
}
