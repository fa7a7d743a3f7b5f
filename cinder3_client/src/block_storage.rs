use std::collections::{HashMap, HashSet};

use reqwest::Method;
use serde::{Deserialize, de::DeserializeOwned};
use url::Url;

use cinder3_types::{Limits, Snapshots, Volumes};
use observability_deps::tracing::debug;

use crate::{ApiVersion, Client, Error, Result, Session, join_path};

/// Microversion header understood by the v3 API
pub const API_VERSION_HEADER: &str = "OpenStack-API-Version";

/// Page size requested from listing calls
pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Deserialize)]
struct Link {
    rel: String,
    href: Url,
}

#[derive(Debug, Deserialize)]
struct VolumePage {
    volumes: Vec<VolumeDetail>,
    #[serde(default)]
    volumes_links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct VolumeDetail {
    #[serde(default)]
    size: i64,
    #[serde(rename = "os-vol-tenant-attr:tenant_id")]
    tenant_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SnapshotPage {
    snapshots: Vec<SnapshotDetail>,
    #[serde(default)]
    snapshots_links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct SnapshotDetail {
    #[serde(default)]
    size: i64,
    #[serde(rename = "os-extended-snapshot-attributes:project_id")]
    project_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LimitsResponse {
    limits: LimitsBody,
}

#[derive(Debug, Deserialize)]
struct LimitsBody {
    absolute: AbsoluteLimits,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AbsoluteLimits {
    max_total_volume_gigabytes: i64,
    max_total_volumes: i64,
}

/// A page of a listing, and where to find the next one
trait Page: DeserializeOwned {
    fn links(&self) -> &[Link];

    fn next(&self) -> Option<&Url> {
        self.links()
            .iter()
            .find(|link| link.rel == "next")
            .map(|link| &link.href)
    }
}

impl Page for VolumePage {
    fn links(&self) -> &[Link] {
        &self.volumes_links
    }
}

impl Page for SnapshotPage {
    fn links(&self) -> &[Link] {
        &self.snapshots_links
    }
}

impl Client {
    /// Count and size of the volumes of every tenant, keyed by tenant id
    ///
    /// Lists volumes across all tenants, so the session must hold the admin role.
    pub async fn volumes(
        &self,
        session: &Session,
        version: ApiVersion,
    ) -> Result<HashMap<String, Volumes>> {
        let mut volumes: HashMap<String, Volumes> = HashMap::new();
        let first = listing_url(session, version, "volumes/detail")?;
        self.list_all(session, version, first, |page: VolumePage| {
            for volume in page.volumes {
                let Some(tenant_id) = volume.tenant_id else {
                    continue;
                };
                volumes.entry(tenant_id).or_default().add(volume.size);
            }
        })
        .await?;
        Ok(volumes)
    }

    /// Count and size of the snapshots of every tenant, keyed by tenant id
    ///
    /// Lists snapshots across all tenants, so the session must hold the admin role.
    pub async fn snapshots(
        &self,
        session: &Session,
        version: ApiVersion,
    ) -> Result<HashMap<String, Snapshots>> {
        let mut snapshots: HashMap<String, Snapshots> = HashMap::new();
        let first = listing_url(session, version, "snapshots/detail")?;
        self.list_all(session, version, first, |page: SnapshotPage| {
            for snapshot in page.snapshots {
                let Some(project_id) = snapshot.project_id else {
                    continue;
                };
                snapshots.entry(project_id).or_default().add(snapshot.size);
            }
        })
        .await?;
        Ok(snapshots)
    }

    /// Absolute limits of the project the session is scoped to
    pub async fn limits(&self, session: &Session, version: ApiVersion) -> Result<Limits> {
        let url = join_path(endpoint(session, version)?, "limits")?;
        let req = self.block_storage_request(&url, session, version);
        let (_, resp): (_, LimitsResponse) = self.send_json(Method::GET, &url, req).await?;
        let absolute = resp.limits.absolute;
        Ok(Limits {
            max_total_volume_gigabytes: absolute.max_total_volume_gigabytes,
            max_total_volumes: absolute.max_total_volumes,
        })
    }

    /// Fetch `first` and every page linked from it, handing each page to `fold` as it arrives
    ///
    /// A `next` link back to a page already fetched is an error.
    async fn list_all<P, F>(
        &self,
        session: &Session,
        version: ApiVersion,
        first: Url,
        mut fold: F,
    ) -> Result<()>
    where
        P: Page + Send,
        F: FnMut(P) + Send,
    {
        let mut visited = HashSet::new();
        let mut next = Some(first);
        while let Some(url) = next.take() {
            if !visited.insert(url.clone()) {
                return Err(Error::PaginationLoop {
                    url: url.to_string(),
                });
            }
            let req = self.block_storage_request(&url, session, version);
            let (_, page): (_, P) = self.send_json(Method::GET, &url, req).await?;
            next = page.next().cloned();
            fold(page);
        }
        debug!(pages = visited.len(), version = %version, "listed block storage resources");
        Ok(())
    }

    fn block_storage_request(
        &self,
        url: &Url,
        session: &Session,
        version: ApiVersion,
    ) -> reqwest::RequestBuilder {
        let req = self.request(Method::GET, url, Some(session.token()));
        match version {
            ApiVersion::V3 => req.header(API_VERSION_HEADER, "volume 3.0"),
            ApiVersion::V2 => req,
        }
    }
}

fn endpoint(session: &Session, version: ApiVersion) -> Result<&Url> {
    session
        .public_endpoint(version.service_type())
        .ok_or(Error::MissingEndpoint {
            service_type: version.service_type(),
        })
}

fn listing_url(session: &Session, version: ApiVersion, path: &str) -> Result<Url> {
    let mut url = join_path(endpoint(session, version)?, path)?;
    url.query_pairs_mut()
        .append_pair("all_tenants", "1")
        .append_pair("limit", &DEFAULT_PAGE_SIZE.to_string());
    Ok(url)
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use cinder3_types::BYTES_PER_GIB;

    use super::*;
    use crate::{CatalogEndpoint, CatalogService};

    fn session(server_url: &str, version: ApiVersion) -> Session {
        Session::new(
            "token-admin",
            None,
            vec![CatalogService {
                service_type: version.service_type().to_string(),
                endpoints: vec![CatalogEndpoint {
                    interface: "public".to_string(),
                    url: Url::parse(&format!("{server_url}/{version}/p-admin")).unwrap(),
                    region: None,
                }],
            }],
        )
    }

    #[tokio::test]
    async fn volumes_follow_next_links() {
        let mut mock_server = Server::new_async().await;
        let url = mock_server.url();
        let first = mock_server
            .mock("GET", "/v3/p-admin/volumes/detail")
            .match_header("X-Auth-Token", "token-admin")
            .match_header(API_VERSION_HEADER, "volume 3.0")
            .match_query(Matcher::Exact("all_tenants=1&limit=1000".into()))
            .with_status(200)
            .with_body(
                json!({
                    "volumes": [
                        {"id": "v1", "size": 1, "os-vol-tenant-attr:tenant_id": "p-alpha"},
                        {"id": "v2", "size": 2, "os-vol-tenant-attr:tenant_id": "p-alpha"}
                    ],
                    "volumes_links": [{
                        "rel": "next",
                        "href": format!("{url}/v3/p-admin/volumes/detail?all_tenants=1&limit=1000&marker=v2")
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;
        let second = mock_server
            .mock("GET", "/v3/p-admin/volumes/detail")
            .match_query(Matcher::Exact("all_tenants=1&limit=1000&marker=v2".into()))
            .with_status(200)
            .with_body(
                json!({
                    "volumes": [
                        {"id": "v3", "size": 5, "os-vol-tenant-attr:tenant_id": "p-beta"},
                        {"id": "v4", "size": 5}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let volumes = Client::new()
            .volumes(&session(&url, ApiVersion::V3), ApiVersion::V3)
            .await
            .expect("list volumes");

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(volumes.len(), 2);
        assert_eq!(
            volumes["p-alpha"],
            Volumes {
                count: 2,
                bytes: 3 * BYTES_PER_GIB
            }
        );
        assert_eq!(
            volumes["p-beta"],
            Volumes {
                count: 1,
                bytes: 5 * BYTES_PER_GIB
            }
        );
    }

    #[tokio::test]
    async fn next_link_back_to_a_listed_page() {
        let mut mock_server = Server::new_async().await;
        let url = mock_server.url();
        let page = mock_server
            .mock("GET", "/v3/p-admin/volumes/detail")
            .match_query(Matcher::Exact("all_tenants=1&limit=1000".into()))
            .with_status(200)
            .with_body(
                json!({
                    "volumes": [
                        {"id": "v1", "size": 1, "os-vol-tenant-attr:tenant_id": "p-alpha"}
                    ],
                    "volumes_links": [{
                        "rel": "next",
                        "href": format!("{url}/v3/p-admin/volumes/detail?all_tenants=1&limit=1000")
                    }]
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let err = Client::new()
            .volumes(&session(&url, ApiVersion::V3), ApiVersion::V3)
            .await
            .unwrap_err();

        page.assert_async().await;
        let Error::PaginationLoop { url: looped } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(
            looped,
            &format!("{url}/v3/p-admin/volumes/detail?all_tenants=1&limit=1000")
        );
    }

    #[tokio::test]
    async fn snapshots_v2() {
        let mut mock_server = Server::new_async().await;
        let url = mock_server.url();
        let mock = mock_server
            .mock("GET", "/v2/p-admin/snapshots/detail")
            .match_query(Matcher::UrlEncoded("all_tenants".into(), "1".into()))
            .with_status(200)
            .with_body(
                json!({
                    "snapshots": [
                        {"id": "s1", "size": 3, "os-extended-snapshot-attributes:project_id": "p-beta"}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let snapshots = Client::new()
            .snapshots(&session(&url, ApiVersion::V2), ApiVersion::V2)
            .await
            .expect("list snapshots");

        mock.assert_async().await;
        assert_eq!(
            snapshots["p-beta"],
            Snapshots {
                count: 1,
                bytes: 3 * BYTES_PER_GIB
            }
        );
    }

    #[tokio::test]
    async fn limits() {
        let mut mock_server = Server::new_async().await;
        let url = mock_server.url();
        let mock = mock_server
            .mock("GET", "/v3/p-admin/limits")
            .with_status(200)
            .with_body(
                json!({
                    "limits": {
                        "rate": [],
                        "absolute": {
                            "totalSnapshotsUsed": 0,
                            "maxTotalVolumeGigabytes": 1000,
                            "maxTotalVolumes": 50,
                            "totalVolumesUsed": 2
                        }
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let limits = Client::new()
            .limits(&session(&url, ApiVersion::V3), ApiVersion::V3)
            .await
            .expect("get limits");

        mock.assert_async().await;
        assert_eq!(
            limits,
            Limits {
                max_total_volume_gigabytes: 1000,
                max_total_volumes: 50
            }
        );
    }

    #[tokio::test]
    async fn missing_endpoint() {
        let session = session("http://cinder:8776", ApiVersion::V2);
        let err = Client::new()
            .limits(&session, ApiVersion::V3)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::MissingEndpoint {
                service_type: "volumev3"
            }
        ));
    }

    #[tokio::test]
    async fn server_error_is_surfaced() {
        let mut mock_server = Server::new_async().await;
        let url = mock_server.url();
        let _mock = mock_server
            .mock("GET", "/v3/p-admin/limits")
            .with_status(503)
            .with_body("unavailable")
            .create_async()
            .await;

        let err = Client::new()
            .limits(&session(&url, ApiVersion::V3), ApiVersion::V3)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "server responded with error [503 Service Unavailable]: unavailable"
        );
    }
}
