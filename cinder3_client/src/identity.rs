use reqwest::Method;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use cinder3_types::{Tenant, config::Credentials};
use observability_deps::tracing::debug;

use crate::{Client, Error, Result, Session};

/// Header Keystone returns the issued token in
pub const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

/// Domain used when the credentials name neither a domain nor a domain id
const DEFAULT_DOMAIN_ID: &str = "default";

/// One service in the catalog returned with a scoped token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogService {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEndpoint {
    pub interface: String,
    pub url: Url,
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: TokenBody,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    #[serde(default)]
    project: Option<ProjectRef>,
    #[serde(default)]
    catalog: Vec<CatalogService>,
}

#[derive(Debug, Deserialize)]
struct ProjectRef {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ProjectsResponse {
    projects: Vec<ProjectRef>,
}

impl Client {
    /// Obtain a token with password credentials
    ///
    /// When `project` is given the token is scoped to the project with that name, in the
    /// credentials' domain, and the returned [`Session`] carries the service catalog.
    pub async fn authenticate(
        &self,
        credentials: &Credentials,
        project: Option<&str>,
    ) -> Result<Session> {
        let url = identity_url(&credentials.endpoint, "auth/tokens")?;
        debug!(endpoint = %url, user = %credentials.user, project = ?project, "requesting token");

        let body = auth_request_body(credentials, project);
        let req = self.request(Method::POST, &url, None).json(&body);
        let (headers, resp): (_, TokenResponse) = self.send_json(Method::POST, &url, req).await?;

        let token = headers
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(Error::MissingToken)?;

        let project = resp.token.project.map(|p| Tenant::new(p.id, p.name));
        Ok(Session::new(token, project, resp.token.catalog))
    }

    /// List the projects the credentials can scope a token to
    ///
    /// Uses an unscoped token, which `auth/projects` accepts without any role.
    pub async fn list_tenants(&self, credentials: &Credentials) -> Result<Vec<Tenant>> {
        let session = self.authenticate(credentials, None).await?;
        let url = identity_url(&credentials.endpoint, "auth/projects")?;
        let req = self.request(Method::GET, &url, Some(session.token()));
        let (_, resp): (_, ProjectsResponse) = self.send_json(Method::GET, &url, req).await?;

        Ok(resp
            .projects
            .into_iter()
            .map(|p| Tenant::new(p.id, p.name))
            .collect())
    }
}

/// Build a URL under the identity v3 API, whether or not the configured endpoint already
/// includes the `/v3` path.
fn identity_url(endpoint: &Url, path: &str) -> Result<Url> {
    let mut base = endpoint.clone();
    let trimmed = base.path().trim_end_matches('/').to_string();
    if trimmed.ends_with("/v3") {
        base.set_path(&format!("{trimmed}/"));
    } else {
        base.set_path(&format!("{trimmed}/v3/"));
    }
    Ok(base.join(path)?)
}

fn domain(credentials: &Credentials) -> Value {
    if !credentials.domain_id.is_empty() {
        json!({ "id": credentials.domain_id })
    } else if !credentials.domain_name.is_empty() {
        json!({ "name": credentials.domain_name })
    } else {
        json!({ "id": DEFAULT_DOMAIN_ID })
    }
}

fn auth_request_body(credentials: &Credentials, project: Option<&str>) -> Value {
    let mut auth = json!({
        "identity": {
            "methods": ["password"],
            "password": {
                "user": {
                    "name": credentials.user,
                    "domain": domain(credentials),
                    "password": credentials.password.expose_secret(),
                }
            }
        }
    });
    if let Some(project) = project {
        auth["scope"] = json!({
            "project": {
                "name": project,
                "domain": domain(credentials),
            }
        });
    }
    json!({ "auth": auth })
}
