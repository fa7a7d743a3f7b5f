use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

pub const PLUGIN_VENDOR: &str = "intel";
pub const PLUGIN_FILESYSTEM: &str = "openstack";
pub const PLUGIN_NAME: &str = "cinder";

/// Fixed leading segments of every namespace this collector produces
pub const NAMESPACE_PREFIX: [&str; 3] = [PLUGIN_VENDOR, PLUGIN_FILESYSTEM, PLUGIN_NAME];

/// `vendor/filesystem/plugin/tenant/category/leaf`
pub const NAMESPACE_MIN_SEGMENTS: usize = 6;

const TENANT_SEGMENT: usize = 3;
const CATEGORY_SEGMENT: usize = 4;

/// The kind of data a namespace addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Limits,
    Volumes,
    Snapshots,
}

impl Category {
    pub const ALL: [Self; 3] = [Self::Snapshots, Self::Volumes, Self::Limits];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Limits => "limits",
            Self::Volumes => "volumes",
            Self::Snapshots => "snapshots",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("{0} is not a valid metric category, values are limits, volumes, and snapshots")]
pub struct ParseCategoryError(String);

impl FromStr for Category {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "limits" => Ok(Self::Limits),
            "volumes" => Ok(Self::Volumes),
            "snapshots" => Ok(Self::Snapshots),
            _ => Err(ParseCategoryError(s.into())),
        }
    }
}

/// Slash delimited, hierarchical name of a single metric
///
/// A namespace produced by this collector has the shape
/// `intel/openstack/cinder/<tenant>/<category>/<leaf>`. Requests coming from a host are not
/// trusted to have that shape, so the accessors here return `None` rather than panicking when a
/// segment is missing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct MetricNamespace(Vec<String>);

impl MetricNamespace {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Build the full namespace for `leaf_path` under `tenant`
    pub fn for_tenant<'a>(tenant: &str, leaf_path: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(
            NAMESPACE_PREFIX
                .into_iter()
                .chain(std::iter::once(tenant))
                .chain(leaf_path),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Display name of the tenant this namespace belongs to
    pub fn tenant(&self) -> Option<&str> {
        self.0.get(TENANT_SEGMENT).map(String::as_str)
    }

    /// The raw category segment
    pub fn category_segment(&self) -> Option<&str> {
        self.0.get(CATEGORY_SEGMENT).map(String::as_str)
    }

    /// Segments following the tenant, i.e. `category/leaf...`
    pub fn suffix(&self) -> &[String] {
        self.0.get(CATEGORY_SEGMENT..).unwrap_or_default()
    }
}

impl Display for MetricNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

impl FromStr for MetricNamespace {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self(vec![]));
        }
        Ok(Self::new(trimmed.split('/')))
    }
}

impl From<MetricNamespace> for String {
    fn from(ns: MetricNamespace) -> Self {
        ns.to_string()
    }
}

impl TryFrom<String> for MetricNamespace {
    type Error = std::convert::Infallible;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parse_and_display() {
        let ns: MetricNamespace = "/intel/openstack/cinder/alpha/limits/MaxTotalVolumes"
            .parse()
            .unwrap();
        assert_eq!(ns.len(), 6);
        assert_eq!(ns.tenant(), Some("alpha"));
        assert_eq!(ns.category_segment(), Some("limits"));
        assert_eq!(ns.suffix(), &["limits", "MaxTotalVolumes"]);
        assert_eq!(
            ns.to_string(),
            "intel/openstack/cinder/alpha/limits/MaxTotalVolumes"
        );
    }

    #[test]
    fn short_namespace_has_no_tenant_or_category() {
        let ns: MetricNamespace = "intel/openstack/cinder".parse().unwrap();
        assert_eq!(ns.tenant(), None);
        assert_eq!(ns.category_segment(), None);
        assert!(ns.suffix().is_empty());

        let empty: MetricNamespace = "".parse().unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn for_tenant_prepends_prefix() {
        let ns = MetricNamespace::for_tenant("beta", ["volumes", "bytes"]);
        assert_eq!(ns.to_string(), "intel/openstack/cinder/beta/volumes/bytes");
    }

    #[test]
    fn category_round_trip_and_error() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
        }
        let err = "backups".parse::<Category>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "backups is not a valid metric category, values are limits, volumes, and snapshots"
        );
    }

    #[test]
    fn serde_as_string() {
        let ns = MetricNamespace::for_tenant("alpha", ["snapshots", "count"]);
        let json = serde_json::to_string(&ns).unwrap();
        assert_eq!(json, r#""intel/openstack/cinder/alpha/snapshots/count""#);
        let back: MetricNamespace = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ns);
    }
}
