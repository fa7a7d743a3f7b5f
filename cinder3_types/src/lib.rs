//! Shared data types for the Cinder utilization collector
//!
//! The per-tenant category values ([`Volumes`], [`Snapshots`] and [`Limits`]) are what the block
//! storage service reports; a [`MetricContainer`] groups the three for a single tenant so that a
//! [`MetricNamespace`] can be projected onto it.

use std::fmt::Display;

use iox_time::Time;
use serde::{Deserialize, Serialize};

pub mod config;
mod namespace;

pub use namespace::{
    Category, MetricNamespace, NAMESPACE_MIN_SEGMENTS, NAMESPACE_PREFIX, ParseCategoryError,
    PLUGIN_FILESYSTEM, PLUGIN_NAME, PLUGIN_VENDOR,
};

/// Number of bytes in one GiB, the unit Cinder reports volume and snapshot sizes in
pub const BYTES_PER_GIB: i64 = 1 << 30;

/// A tenant (project) of the cloud as listed by the identity service
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tenant {
    /// Stable identifier used by the cloud API
    pub id: String,
    /// Human facing name, used as the tenant segment of a namespace
    pub name: String,
}

impl Tenant {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl Display for Tenant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Aggregated volumes owned by one tenant
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volumes {
    pub count: i64,
    pub bytes: i64,
}

impl Volumes {
    /// Account for one more volume of `size_gib` GiB
    pub fn add(&mut self, size_gib: i64) {
        self.count += 1;
        self.bytes = self
            .bytes
            .saturating_add(size_gib.saturating_mul(BYTES_PER_GIB));
    }
}

/// Aggregated snapshots owned by one tenant
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshots {
    pub count: i64,
    pub bytes: i64,
}

impl Snapshots {
    /// Account for one more snapshot of `size_gib` GiB
    pub fn add(&mut self, size_gib: i64) {
        self.count += 1;
        self.bytes = self
            .bytes
            .saturating_add(size_gib.saturating_mul(BYTES_PER_GIB));
    }
}

/// Block storage quota of one tenant
///
/// A negative value means the quota is unlimited.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub max_total_volume_gigabytes: i64,
    pub max_total_volumes: i64,
}

/// Everything collected for a single tenant in one collection cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MetricContainer {
    pub limits: Limits,
    pub volumes: Volumes,
    pub snapshots: Snapshots,
}

/// A single collected value, produced once per requested namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricValue {
    pub namespace: MetricNamespace,
    pub timestamp: Time,
    pub data: i64,
}

impl Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.namespace,
            self.data,
            self.timestamp.to_rfc3339()
        )
    }
}
