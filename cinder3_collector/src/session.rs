use std::{collections::HashMap, sync::Arc};

use cinder3_client::Session;
use cinder3_types::config::Credentials;
use observability_deps::tracing::info;
use parking_lot::{Mutex, RwLock};
use tokio::sync::OnceCell;

use crate::{BlockStorage, CloudProvider, Error, Result};

type SessionSlot = Arc<OnceCell<Arc<Session>>>;

/// At most one authenticated session per tenant, for the lifetime of the cache
///
/// Concurrent requests for a tenant that has no session yet share a single credential exchange.
/// A failed exchange leaves the tenant without a session, so a later request tries again.
#[derive(Debug)]
pub struct SessionCache {
    provider: Arc<dyn CloudProvider>,
    sessions: Mutex<HashMap<String, SessionSlot>>,
    /// Block storage API picked for the most recently created session
    service: RwLock<Option<Arc<dyn BlockStorage>>>,
}

impl SessionCache {
    pub fn new(provider: Arc<dyn CloudProvider>) -> Self {
        Self {
            provider,
            sessions: Default::default(),
            service: Default::default(),
        }
    }

    /// The session of `tenant`, authenticating with `credentials` if there is none yet
    pub async fn get_or_create(
        &self,
        tenant: &str,
        credentials: &Credentials,
    ) -> Result<Arc<Session>> {
        let slot = Arc::clone(self.sessions.lock().entry(tenant.to_string()).or_default());

        let session = slot
            .get_or_try_init(|| async {
                let session = self
                    .provider
                    .authenticate(credentials, tenant)
                    .await
                    .map_err(|source| Error::Authentication {
                        tenant: tenant.to_string(),
                        source,
                    })?;
                let service = self
                    .provider
                    .dispatch(&session)
                    .map_err(|source| Error::Authentication {
                        tenant: tenant.to_string(),
                        source,
                    })?;
                *self.service.write() = Some(service);
                info!(tenant, "created session");
                Ok::<_, Error>(Arc::new(session))
            })
            .await?;

        Ok(Arc::clone(session))
    }

    /// Block storage API to fetch with, once any session was created
    pub fn service(&self) -> Option<Arc<dyn BlockStorage>> {
        self.service.read().as_ref().map(Arc::clone)
    }

    /// Whether `tenant` already has a session
    pub fn contains(&self, tenant: &str) -> bool {
        self.sessions
            .lock()
            .get(tenant)
            .is_some_and(|slot| slot.initialized())
    }

    /// Number of tenants with a session
    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
