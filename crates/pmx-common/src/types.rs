use crate::resource::ResourceType;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lookback applied to every collection cycle. Wide enough that one missed
/// scrape still finds the previous sample.
pub const LOOKBACK_SECS: i64 = 600;

/// Type-specific identity fields of a monitored instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstanceKey {
    Array,
    CachePartition { id: String },
    FrontEndPort { director: String, port: String },
    BackEndPort { director: String, port: String },
    StorageGroup { id: String },
}

/// One concrete monitored entity on an array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceInstance {
    pub symm_id: String,
    pub key: InstanceKey,
}

impl ResourceInstance {
    pub fn array(symm_id: &str) -> Self {
        Self {
            symm_id: symm_id.to_string(),
            key: InstanceKey::Array,
        }
    }

    pub fn cache_partition(symm_id: &str, id: &str) -> Self {
        Self {
            symm_id: symm_id.to_string(),
            key: InstanceKey::CachePartition { id: id.to_string() },
        }
    }

    pub fn storage_group(symm_id: &str, id: &str) -> Self {
        Self {
            symm_id: symm_id.to_string(),
            key: InstanceKey::StorageGroup { id: id.to_string() },
        }
    }

    /// Builds a front-end or back-end port instance. Returns `None` for the
    /// non-port resource types.
    pub fn port(
        resource_type: ResourceType,
        symm_id: &str,
        director: &str,
        port: &str,
    ) -> Option<Self> {
        let (director, port) = (director.to_string(), port.to_string());
        let key = match resource_type {
            ResourceType::FrontEndPort => InstanceKey::FrontEndPort { director, port },
            ResourceType::BackEndPort => InstanceKey::BackEndPort { director, port },
            _ => return None,
        };
        Some(Self {
            symm_id: symm_id.to_string(),
            key,
        })
    }

    pub fn resource_type(&self) -> ResourceType {
        match self.key {
            InstanceKey::Array => ResourceType::Array,
            InstanceKey::CachePartition { .. } => ResourceType::CachePartition,
            InstanceKey::FrontEndPort { .. } => ResourceType::FrontEndPort,
            InstanceKey::BackEndPort { .. } => ResourceType::BackEndPort,
            InstanceKey::StorageGroup { .. } => ResourceType::StorageGroup,
        }
    }

    /// Label values in the order of [`ResourceType::label_schema`].
    pub fn label_values(&self) -> Vec<&str> {
        let mut values = vec![self.symm_id.as_str(), self.resource_type().as_str()];
        match &self.key {
            InstanceKey::Array => {}
            InstanceKey::CachePartition { id } | InstanceKey::StorageGroup { id } => {
                values.push(id);
            }
            InstanceKey::FrontEndPort { director, port }
            | InstanceKey::BackEndPort { director, port } => {
                values.push(director);
                values.push(port);
            }
        }
        values
    }
}

impl std::fmt::Display for ResourceInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label_values().join(":"))
    }
}

/// Queried time window in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl TimeRange {
    /// Window of `lookback` ending at `now`, aligned to whole seconds.
    pub fn ending_at(now: DateTime<Utc>, lookback: Duration) -> Self {
        let start = now - lookback;
        Self {
            start_ms: start.timestamp() * 1000,
            end_ms: now.timestamp() * 1000,
        }
    }

    /// Window of [`LOOKBACK_SECS`] ending now.
    pub fn current() -> Self {
        Self::ending_at(Utc::now(), Duration::seconds(LOOKBACK_SECS))
    }
}

/// Latest value of every numeric metric in one time-series record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub values: BTreeMap<String, f64>,
}

impl MetricSample {
    pub fn get(&self, metric: &str) -> Option<f64> {
        self.values.get(metric).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, f64)> for MetricSample {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// One value emitted for a (metric, instance) pair during a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub metric: String,
    /// Label values ordered as the resource type's label schema.
    pub labels: Vec<String>,
    pub value: f64,
}
