//! CLI config for the OpenStack credentials the collector authenticates with.

use std::time::Duration;

use cinder3_types::config::{CollectorConfig, Credentials};
use secrecy::{ExposeSecret, Secret};
use url::Url;

/// Credentials for the identity service, and the tenant the cross-tenant listings are made as
#[derive(Debug, Clone, clap::Parser)]
pub struct OpenStackConfig {
    /// Base URL of the Keystone identity service, e.g. http://keystone:5000
    #[clap(long = "endpoint", env = "CINDER3_ENDPOINT", action)]
    pub endpoint: Url,

    /// Name of the user to authenticate as
    #[clap(long = "user", env = "CINDER3_USER", action)]
    pub user: String,

    /// Password of the user
    #[clap(long = "password", env = "CINDER3_PASSWORD", hide_env_values = true)]
    pub password: Secret<String>,

    /// Tenant whose session lists volumes and snapshots of every tenant. It must hold the
    /// admin role.
    #[clap(long = "tenant", env = "CINDER3_TENANT", action)]
    pub tenant: String,

    /// Name of the domain the user belongs to
    #[clap(
        long = "domain-name",
        env = "CINDER3_DOMAIN_NAME",
        default_value = "",
        action
    )]
    pub domain_name: String,

    /// Id of the domain the user belongs to, takes precedence over the domain name.
    ///
    /// The `default` domain is used when neither is given.
    #[clap(long = "domain-id", env = "CINDER3_DOMAIN_ID", default_value = "", action)]
    pub domain_id: String,

    /// Timeout of every request made to the identity and block storage services
    #[clap(
        long = "request-timeout",
        env = "CINDER3_REQUEST_TIMEOUT",
        default_value = "30s",
        value_parser = humantime::parse_duration,
    )]
    pub request_timeout: Duration,
}

impl OpenStackConfig {
    pub fn collector_config(&self) -> CollectorConfig {
        let credentials = Credentials::new(
            self.endpoint.clone(),
            self.user.clone(),
            self.password.expose_secret().clone(),
        )
        .with_domain_name(self.domain_name.clone())
        .with_domain_id(self.domain_id.clone());
        CollectorConfig::new(credentials, self.tenant.clone())
    }
}
