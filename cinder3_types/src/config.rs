//! Collector configuration as supplied by the host
//!
//! The host hands the collector a flat key/value map. The required keys are `endpoint`, `user`,
//! `password` and `tenant`; `domain_name` and `domain_id` are optional and default to an empty
//! string.

use std::collections::HashMap;

use secrecy::Secret;
use url::Url;

pub const ENDPOINT_KEY: &str = "endpoint";
pub const USER_KEY: &str = "user";
pub const PASSWORD_KEY: &str = "password";
pub const TENANT_KEY: &str = "tenant";
pub const DOMAIN_NAME_KEY: &str = "domain_name";
pub const DOMAIN_ID_KEY: &str = "domain_id";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("required configuration key '{key}' is missing")]
    MissingKey { key: &'static str },

    #[error("invalid identity endpoint '{endpoint}': {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },
}

/// What is needed to obtain a token from the identity service
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Base URL of the identity service, e.g. `http://keystone:5000`
    pub endpoint: Url,
    pub user: String,
    pub password: Secret<String>,
    pub domain_name: String,
    pub domain_id: String,
}

impl Credentials {
    pub fn new(endpoint: Url, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            endpoint,
            user: user.into(),
            password: Secret::new(password.into()),
            domain_name: String::new(),
            domain_id: String::new(),
        }
    }

    pub fn with_domain_name(mut self, domain_name: impl Into<String>) -> Self {
        self.domain_name = domain_name.into();
        self
    }

    pub fn with_domain_id(mut self, domain_id: impl Into<String>) -> Self {
        self.domain_id = domain_id.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub credentials: Credentials,
    /// Tenant whose session is used for the cross-tenant volume and snapshot listings
    pub admin_tenant: String,
}

impl CollectorConfig {
    pub fn new(credentials: Credentials, admin_tenant: impl Into<String>) -> Self {
        Self {
            credentials,
            admin_tenant: admin_tenant.into(),
        }
    }

    pub fn from_config_map(map: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            map.get(key)
                .cloned()
                .ok_or(ConfigError::MissingKey { key })
        };
        let optional = |key: &'static str| map.get(key).cloned().unwrap_or_default();

        let endpoint = required(ENDPOINT_KEY)?;
        let endpoint =
            Url::parse(&endpoint).map_err(|source| ConfigError::InvalidEndpoint {
                endpoint,
                source,
            })?;

        let credentials = Credentials::new(endpoint, required(USER_KEY)?, required(PASSWORD_KEY)?)
            .with_domain_name(optional(DOMAIN_NAME_KEY))
            .with_domain_id(optional(DOMAIN_ID_KEY));

        Ok(Self::new(credentials, required(TENANT_KEY)?))
    }
}
