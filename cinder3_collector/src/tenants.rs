use std::{collections::HashMap, sync::Arc};

use cinder3_types::config::Credentials;
use observability_deps::tracing::{info, warn};
use parking_lot::RwLock;

use crate::{CloudProvider, Error, Result};

/// Mapping of tenant id to display name, as last listed by the identity service
pub type TenantMap = HashMap<String, String>;

/// The tenants visible to the configured credentials
///
/// A resolved map is replaced as a whole, readers always see one consistent listing.
#[derive(Debug)]
pub struct TenantDirectory {
    provider: Arc<dyn CloudProvider>,
    tenants: RwLock<Arc<TenantMap>>,
}

impl TenantDirectory {
    pub fn new(provider: Arc<dyn CloudProvider>) -> Self {
        Self {
            provider,
            tenants: Default::default(),
        }
    }

    /// List the tenants again and replace the cached map
    pub async fn resolve(&self, credentials: &Credentials) -> Result<Arc<TenantMap>> {
        let listed = self
            .provider
            .list_tenants(credentials)
            .await
            .map_err(Error::Directory)?;

        let mut tenants = TenantMap::with_capacity(listed.len());
        let mut names: HashMap<&str, &str> = HashMap::with_capacity(listed.len());
        for tenant in &listed {
            if let Some(previous) = names.insert(&tenant.name, &tenant.id) {
                warn!(
                    name = %tenant.name,
                    previous_id = previous,
                    id = %tenant.id,
                    "tenant display name is not unique, using the last listed tenant"
                );
                tenants.remove(previous);
            }
            tenants.insert(tenant.id.clone(), tenant.name.clone());
        }

        let tenants = Arc::new(tenants);
        *self.tenants.write() = Arc::clone(&tenants);
        info!(tenants = tenants.len(), "refreshed tenant directory");
        Ok(tenants)
    }

    /// The cached map, resolving it first only if it is empty
    pub async fn resolve_if_empty(&self, credentials: &Credentials) -> Result<Arc<TenantMap>> {
        let current = self.snapshot();
        if current.is_empty() {
            self.resolve(credentials).await
        } else {
            Ok(current)
        }
    }

    pub fn snapshot(&self) -> Arc<TenantMap> {
        Arc::clone(&self.tenants.read())
    }
}
