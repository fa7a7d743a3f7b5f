//! Conversion between the structured per-tenant metrics and flat metric namespaces
//!
//! [`METRIC_SCHEMA`] lists every leaf field of a [`MetricContainer`]. [`enumerate`] walks it to
//! produce the namespaces a host can request, and [`project`] walks it to resolve a requested
//! namespace back to a value, so that every enumerated namespace can always be projected.

use cinder3_types::{Category, MetricContainer, MetricNamespace};

/// Unit of a metric field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Count,
    Bytes,
    Gigabytes,
}

impl FieldKind {
    pub fn unit(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Bytes => "B",
            Self::Gigabytes => "GB",
        }
    }
}

/// A single scalar field of a [`MetricContainer`]
#[derive(Debug, Clone, Copy)]
pub struct MetricField {
    pub category: Category,
    pub name: &'static str,
    pub kind: FieldKind,
    read: fn(&MetricContainer) -> i64,
}

impl MetricField {
    /// Path of the field below the tenant segment of a namespace
    pub fn path(&self) -> [&'static str; 2] {
        [self.category.as_str(), self.name]
    }

    pub fn read(&self, container: &MetricContainer) -> i64 {
        (self.read)(container)
    }
}

pub static METRIC_SCHEMA: [MetricField; 6] = [
    MetricField {
        category: Category::Snapshots,
        name: "count",
        kind: FieldKind::Count,
        read: |c| c.snapshots.count,
    },
    MetricField {
        category: Category::Snapshots,
        name: "bytes",
        kind: FieldKind::Bytes,
        read: |c| c.snapshots.bytes,
    },
    MetricField {
        category: Category::Volumes,
        name: "count",
        kind: FieldKind::Count,
        read: |c| c.volumes.count,
    },
    MetricField {
        category: Category::Volumes,
        name: "bytes",
        kind: FieldKind::Bytes,
        read: |c| c.volumes.bytes,
    },
    MetricField {
        category: Category::Limits,
        name: "MaxTotalVolumeGigabytes",
        kind: FieldKind::Gigabytes,
        read: |c| c.limits.max_total_volume_gigabytes,
    },
    MetricField {
        category: Category::Limits,
        name: "MaxTotalVolumes",
        kind: FieldKind::Count,
        read: |c| c.limits.max_total_volumes,
    },
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidPathError {
    #[error("namespace path is empty")]
    Empty,

    #[error("no field named '{segment}' at depth {depth} of '{path}'")]
    UnknownSegment {
        path: String,
        segment: String,
        depth: usize,
    },

    #[error("'{path}' does not address a single value")]
    NotScalar { path: String },
}

/// Every namespace of every field, for each of `tenants`
pub fn enumerate<I, S>(tenants: I) -> Vec<MetricNamespace>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tenants
        .into_iter()
        .flat_map(|tenant| {
            METRIC_SCHEMA
                .iter()
                .map(move |field| MetricNamespace::for_tenant(tenant.as_ref(), field.path()))
        })
        .collect()
}

/// Look up the field addressed by `path`, the part of a namespace following the tenant
pub fn field<S: AsRef<str>>(path: &[S]) -> Result<&'static MetricField, InvalidPathError> {
    if path.is_empty() {
        return Err(InvalidPathError::Empty);
    }

    let mut candidates: Vec<&'static MetricField> = METRIC_SCHEMA.iter().collect();
    for (depth, segment) in path.iter().enumerate() {
        let segment = segment.as_ref();
        candidates.retain(|field| field.path().get(depth) == Some(&segment));
        if candidates.is_empty() {
            return Err(InvalidPathError::UnknownSegment {
                path: join(path),
                segment: segment.to_string(),
                depth,
            });
        }
    }

    candidates
        .into_iter()
        .find(|field| field.path().len() == path.len())
        .ok_or_else(|| InvalidPathError::NotScalar { path: join(path) })
}

/// Resolve `path` against `container`
pub fn project<S: AsRef<str>>(
    container: &MetricContainer,
    path: &[S],
) -> Result<i64, InvalidPathError> {
    field(path).map(|field| field.read(container))
}

fn join<S: AsRef<str>>(path: &[S]) -> String {
    path.iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("/")
}
