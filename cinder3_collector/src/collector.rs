use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use cinder3_client::Session;
use cinder3_types::{
    Limits, MetricContainer, MetricNamespace, MetricValue, Snapshots, Volumes,
    config::{CollectorConfig, Credentials},
};
use iox_time::{Time, TimeProvider};
use observability_deps::tracing::{debug, info, warn};
use parking_lot::RwLock;

use crate::{
    BlockStorage, CloudProvider, CollectionPlan, Error, MetricCollector, Result, SessionCache,
    TenantDirectory, TenantMap,
    provider::{fetch_limits, fetch_snapshots, fetch_volumes},
    schema,
    task_group::TaskGroup,
};

/// Output of one admin scoped listing task
#[derive(Debug)]
enum Listing {
    Volumes(HashMap<String, Volumes>),
    Snapshots(HashMap<String, Snapshots>),
}

/// Volumes and snapshots of one collection, keyed by tenant display name
#[derive(Debug, Default)]
struct Listings {
    volumes: HashMap<String, Volumes>,
    snapshots: HashMap<String, Snapshots>,
}

/// The collection engine
///
/// Holds the state that outlives a single collection: the tenant directory, one session per
/// tenant and the limits of every tenant fetched so far. None of it is ever invalidated; a
/// fresh `Collector` starts from nothing.
#[derive(Debug)]
pub struct Collector {
    time_provider: Arc<dyn TimeProvider>,
    sessions: Arc<SessionCache>,
    tenants: TenantDirectory,
    /// Keyed by tenant display name
    limits: RwLock<HashMap<String, Limits>>,
}

impl Collector {
    pub fn new(provider: Arc<dyn CloudProvider>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            time_provider,
            sessions: Arc::new(SessionCache::new(Arc::clone(&provider))),
            tenants: TenantDirectory::new(provider),
            limits: Default::default(),
        }
    }

    pub fn sessions(&self) -> &SessionCache {
        &self.sessions
    }

    pub fn tenants(&self) -> &TenantDirectory {
        &self.tenants
    }

    /// Limits of `tenant`, if they were fetched by an earlier collection
    pub fn cached_limits(&self, tenant: &str) -> Option<Limits> {
        self.limits.read().get(tenant).copied()
    }

    fn block_storage(&self) -> Result<Arc<dyn BlockStorage>> {
        self.sessions.service().ok_or(Error::NoBlockStorage)
    }

    /// List volumes and snapshots across all tenants, as far as `plan` needs them
    async fn fetch_listings(
        &self,
        plan: &CollectionPlan,
        admin: Arc<Session>,
        tenants: &TenantMap,
    ) -> Result<Listings> {
        let service = self.block_storage()?;
        let mut group = TaskGroup::new();
        if plan.need_volumes {
            let service = Arc::clone(&service);
            let admin = Arc::clone(&admin);
            group.spawn(async move {
                fetch_volumes(service.as_ref(), &admin)
                    .await
                    .map(Listing::Volumes)
            });
        }
        if plan.need_snapshots {
            group.spawn(async move {
                fetch_snapshots(service.as_ref(), &admin)
                    .await
                    .map(Listing::Snapshots)
            });
        }
        debug!(tasks = group.len(), "listing volumes and snapshots");

        let mut listings = Listings::default();
        for listing in group.join().await? {
            match listing {
                Listing::Volumes(by_id) => listings.volumes = by_name(by_id, tenants, "volumes"),
                Listing::Snapshots(by_id) => {
                    listings.snapshots = by_name(by_id, tenants, "snapshots")
                }
            }
        }
        Ok(listings)
    }

    /// Fetch the limits of every tenant of `plan` that has none cached, committing them only if
    /// all of them could be fetched
    async fn fetch_missing_limits(
        &self,
        plan: &CollectionPlan,
        credentials: &Credentials,
    ) -> Result<()> {
        let missing: Vec<String> = {
            let cached = self.limits.read();
            plan.limits_tenants
                .iter()
                .filter(|tenant| !cached.contains_key(*tenant))
                .cloned()
                .collect()
        };
        if missing.is_empty() {
            return Ok(());
        }

        // every session exists before the first fetch starts
        let mut sessions = Vec::with_capacity(missing.len());
        for tenant in missing {
            let session = self.sessions.get_or_create(&tenant, credentials).await?;
            sessions.push((tenant, session));
        }
        let service = self.block_storage()?;

        let mut group = TaskGroup::new();
        for (tenant, session) in sessions {
            let service = Arc::clone(&service);
            group.spawn(async move {
                let limits = fetch_limits(service.as_ref(), &session).await?;
                Ok::<_, Error>((tenant, limits))
            });
        }
        debug!(tenants = group.len(), "fetching limits");

        let fetched = group.join().await?;
        info!(tenants = fetched.len(), "cached tenant limits");
        self.limits.write().extend(fetched);
        Ok(())
    }

    fn project(
        &self,
        requested: &[MetricNamespace],
        listings: &Listings,
        now: Time,
    ) -> Result<Vec<MetricValue>> {
        let limits = self.limits.read();
        requested
            .iter()
            .map(|namespace| {
                let tenant = namespace.tenant().ok_or_else(|| {
                    Error::malformed_namespace(namespace, "missing tenant segment")
                })?;
                let container = MetricContainer {
                    limits: limits.get(tenant).copied().unwrap_or_default(),
                    volumes: listings.volumes.get(tenant).copied().unwrap_or_default(),
                    snapshots: listings.snapshots.get(tenant).copied().unwrap_or_default(),
                };
                Ok(MetricValue {
                    namespace: namespace.clone(),
                    timestamp: now,
                    data: schema::project(&container, namespace.suffix())?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl MetricCollector for Collector {
    async fn metric_types(&self, config: &CollectorConfig) -> Result<Vec<MetricNamespace>> {
        let tenants = self.tenants.resolve(&config.credentials).await?;
        let mut names: Vec<&String> = tenants.values().collect();
        names.sort();
        Ok(schema::enumerate(names))
    }

    async fn collect_metrics(
        &self,
        config: &CollectorConfig,
        requested: &[MetricNamespace],
    ) -> Result<Vec<MetricValue>> {
        if requested.is_empty() {
            return Ok(vec![]);
        }

        let plan = CollectionPlan::build(requested)?;
        debug!(
            namespaces = requested.len(),
            tenants = plan.tenants.len(),
            volumes = plan.need_volumes,
            snapshots = plan.need_snapshots,
            limits = plan.limits_tenants.len(),
            "planned collection"
        );

        let tenants = self.tenants.resolve_if_empty(&config.credentials).await?;
        let admin = self
            .sessions
            .get_or_create(&config.admin_tenant, &config.credentials)
            .await?;

        let listings = if plan.need_listings() {
            self.fetch_listings(&plan, admin, &tenants).await?
        } else {
            Listings::default()
        };

        if plan.need_limits() {
            self.fetch_missing_limits(&plan, &config.credentials).await?;
        }

        self.project(requested, &listings, self.time_provider.now())
    }
}

/// Re-key a per tenant id listing by display name, dropping tenants the directory does not know
fn by_name<V>(
    by_id: HashMap<String, V>,
    tenants: &TenantMap,
    kind: &'static str,
) -> HashMap<String, V> {
    by_id
        .into_iter()
        .filter_map(|(id, value)| match tenants.get(&id) {
            Some(name) => Some((name.clone(), value)),
            None => {
                warn!(
                    tenant_id = %id,
                    kind,
                    "dropping data of a tenant missing from the directory"
                );
                None
            }
        })
        .collect()
}
