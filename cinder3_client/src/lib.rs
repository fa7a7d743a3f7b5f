//! HTTP client for the OpenStack identity (Keystone v3) and block storage (Cinder) APIs
//!
//! Only the handful of calls the utilization collector needs are implemented:
//!
//! - password authentication, optionally scoped to a project, producing a [`Session`]
//! - listing the projects the credentials can scope to
//! - cross-tenant volume and snapshot listings, aggregated per owning project
//! - the absolute limits of the project a session is scoped to

use std::{fmt::Display, string::FromUtf8Error};

use reqwest::{Method, RequestBuilder, StatusCode, header::HeaderMap};
use secrecy::{ExposeSecret, Secret};
use serde::de::DeserializeOwned;
use url::Url;

use cinder3_types::Tenant;

mod block_storage;
mod identity;

pub use block_storage::{API_VERSION_HEADER, DEFAULT_PAGE_SIZE};
pub use identity::{CatalogEndpoint, CatalogService, SUBJECT_TOKEN_HEADER};

/// Header carrying the token on every authenticated request
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Primary error type for the [`Client`]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("request URL error: {0}")]
    RequestUrl(#[from] url::ParseError),

    #[error("failed to read the API response bytes: {0}")]
    Bytes(#[source] reqwest::Error),

    #[error("invalid UTF8 in response: {0}")]
    InvalidUtf8(#[from] FromUtf8Error),

    #[error("failed to parse JSON response from {url}: {source}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("server responded with error [{code}]: {message}")]
    ApiError { code: StatusCode, message: String },

    #[error("failed to send {method} {url} request: {source}")]
    RequestSend {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("identity service did not return an X-Subject-Token header")]
    MissingToken,

    #[error("service catalog has no public endpoint for service type '{service_type}'")]
    MissingEndpoint { service_type: &'static str },

    #[error("listing links back to the already fetched page {url}")]
    PaginationLoop { url: String },
}

impl Error {
    fn request_send(method: Method, url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::RequestSend {
            method,
            url: url.into(),
            source,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Version of the block storage API a session talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiVersion {
    V2,
    V3,
}

impl ApiVersion {
    /// Versions in the order they are preferred when more than one is in the catalog
    pub const PREFERENCE: [Self; 2] = [Self::V3, Self::V2];

    /// Service type of the API in the Keystone service catalog
    pub fn service_type(&self) -> &'static str {
        match self {
            Self::V2 => "volumev2",
            Self::V3 => "volumev3",
        }
    }
}

impl Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V2 => write!(f, "v2"),
            Self::V3 => write!(f, "v3"),
        }
    }
}

/// An authenticated handle, scoped to one project unless obtained unscoped
#[derive(Debug)]
pub struct Session {
    token: Secret<String>,
    project: Option<Tenant>,
    catalog: Vec<CatalogService>,
}

impl Session {
    pub fn new(
        token: impl Into<String>,
        project: Option<Tenant>,
        catalog: Vec<CatalogService>,
    ) -> Self {
        Self {
            token: Secret::new(token.into()),
            project,
            catalog,
        }
    }

    pub fn token(&self) -> &Secret<String> {
        &self.token
    }

    /// The project the token is scoped to
    pub fn project(&self) -> Option<&Tenant> {
        self.project.as_ref()
    }

    pub fn catalog(&self) -> &[CatalogService] {
        &self.catalog
    }

    /// The public endpoint registered for `service_type`
    pub fn public_endpoint(&self, service_type: &str) -> Option<&Url> {
        self.catalog
            .iter()
            .filter(|service| service.service_type == service_type)
            .flat_map(|service| service.endpoints.iter())
            .find(|endpoint| endpoint.interface == "public")
            .map(|endpoint| &endpoint.url)
    }

    /// Most preferred block storage API version this session's catalog offers
    pub fn api_version(&self) -> Option<ApiVersion> {
        ApiVersion::PREFERENCE
            .into_iter()
            .find(|version| self.public_endpoint(version.service_type()).is_some())
    }
}

/// Client for the identity and block storage APIs
///
/// The client itself is not bound to an endpoint or to credentials, those are supplied per
/// call so that one client can serve every tenant's session.
#[derive(Debug, Clone, Default)]
pub struct Client {
    http_client: reqwest::Client,
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the given [`reqwest::Client`], e.g. one configured with timeouts
    pub fn with_http_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    fn request(&self, method: Method, url: &Url, token: Option<&Secret<String>>) -> RequestBuilder {
        let req = self.http_client.request(method, url.clone());
        match token {
            Some(token) => req.header(AUTH_TOKEN_HEADER, token.expose_secret()),
            None => req,
        }
    }

    /// Send a request and decode a JSON body from a successful response
    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &Url,
        req: RequestBuilder,
    ) -> Result<(HeaderMap, T)> {
        let resp = req
            .send()
            .await
            .map_err(|src| Error::request_send(method, url.as_str(), src))?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let content = resp.bytes().await.map_err(Error::Bytes)?;

        if !status.is_success() {
            return Err(Error::ApiError {
                code: status,
                message: String::from_utf8(content.to_vec())?,
            });
        }

        let body = serde_json::from_slice(&content).map_err(|source| Error::Json {
            url: url.to_string(),
            source,
        })?;
        Ok((headers, body))
    }
}

/// Join `path` onto `base`, treating `base` as a directory even without a trailing slash
///
/// Catalog endpoints look like `http://cinder:8776/v3/<project_id>`, and a plain
/// [`Url::join`] would drop the project id.
fn join_path(base: &Url, path: &str) -> Result<Url> {
    if base.path().ends_with('/') {
        Ok(base.join(path)?)
    } else {
        let mut base = base.clone();
        base.set_path(&format!("{}/", base.path()));
        Ok(base.join(path)?)
    }
}
