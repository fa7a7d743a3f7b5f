use std::collections::BTreeSet;

use cinder3_types::{Category, MetricNamespace, NAMESPACE_MIN_SEGMENTS};

use crate::{Error, Result};

/// What one batch of requested namespaces needs to have collected
///
/// Built by a single pass over the request, before anything is fetched.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectionPlan {
    /// Every tenant named by the request
    pub tenants: BTreeSet<String>,
    /// Tenants for which at least one limits namespace was requested
    pub limits_tenants: BTreeSet<String>,
    pub need_volumes: bool,
    pub need_snapshots: bool,
}

impl CollectionPlan {
    pub fn build(requested: &[MetricNamespace]) -> Result<Self> {
        let mut plan = Self::default();
        for namespace in requested {
            let (tenant, category) = parse(namespace)?;
            plan.tenants.insert(tenant.to_string());
            match category {
                Category::Limits => {
                    plan.limits_tenants.insert(tenant.to_string());
                }
                Category::Volumes => plan.need_volumes = true,
                Category::Snapshots => plan.need_snapshots = true,
            }
        }
        Ok(plan)
    }

    pub fn need_limits(&self) -> bool {
        !self.limits_tenants.is_empty()
    }

    /// Whether the admin scoped, cross-tenant listings are needed
    pub fn need_listings(&self) -> bool {
        self.need_volumes || self.need_snapshots
    }
}

fn parse(namespace: &MetricNamespace) -> Result<(&str, Category)> {
    if namespace.len() < NAMESPACE_MIN_SEGMENTS {
        return Err(Error::malformed_namespace(
            namespace,
            format!(
                "expected at least {NAMESPACE_MIN_SEGMENTS} segments, got {}",
                namespace.len()
            ),
        ));
    }
    // both present once the length is checked
    let (Some(tenant), Some(category)) = (namespace.tenant(), namespace.category_segment()) else {
        return Err(Error::malformed_namespace(namespace, "missing tenant or category"));
    };
    if tenant.is_empty() {
        return Err(Error::malformed_namespace(namespace, "empty tenant segment"));
    }
    if category.is_empty() {
        return Err(Error::malformed_namespace(namespace, "empty category segment"));
    }
    let category = category
        .parse::<Category>()
        .map_err(|e| Error::malformed_namespace(namespace, e.to_string()))?;
    Ok((tenant, category))
}
