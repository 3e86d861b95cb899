//! Unisphere for PowerMax performance collection.
//!
//! The [`ApiClient`] trait is the request/response boundary to Unisphere.
//! [`throttle::ThrottledClient`] gates any client behind the process-wide
//! [`throttle::RequestThrottle`], [`catalog::ResourceCatalog`] discovers the
//! monitored instances, [`extract::extract_latest`] turns one metrics reply
//! into the latest sample and [`engine::CollectionEngine`] runs a whole
//! collection cycle.

pub mod catalog;
pub mod engine;
pub mod error;
pub mod extract;
pub mod throttle;
pub mod unisphere;


use error::{Result, UnisphereError};
use pmx_common::{InstanceKey, ResourceInstance, TimeRange};
use serde::Serialize;

/// Averaging mode requested for every metrics query.
pub const DATA_FORMAT: &str = "Average";

/// Raw reply of one Unisphere call: status code plus body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turns a non-2xx reply into [`UnisphereError::HttpStatus`].
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(UnisphereError::http_status(self.status, &self.body))
        }
    }
}

/// Filter sent with a key listing. An empty filter is issued as a GET.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symmetrix_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub director_id: Option<String>,
}

impl KeyFilter {
    pub fn array(symm_id: &str) -> Self {
        Self {
            symmetrix_id: Some(symm_id.to_string()),
            director_id: None,
        }
    }

    pub fn director(symm_id: &str, director_id: &str) -> Self {
        Self {
            symmetrix_id: Some(symm_id.to_string()),
            director_id: Some(director_id.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.symmetrix_id.is_none() && self.director_id.is_none()
    }
}

/// Body of a metrics query for one resource instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsPayload {
    pub symmetrix_id: String,
    pub data_format: &'static str,
    pub metrics: &'static [&'static str],
    pub start_date: i64,
    pub end_date: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_partition_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub director_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_group_id: Option<String>,
}

impl MetricsPayload {
    pub fn for_instance(instance: &ResourceInstance, range: TimeRange) -> Self {
        let mut payload = Self {
            symmetrix_id: instance.symm_id.clone(),
            data_format: DATA_FORMAT,
            metrics: instance.resource_type().metrics(),
            start_date: range.start_ms,
            end_date: range.end_ms,
            cache_partition_id: None,
            director_id: None,
            port_id: None,
            storage_group_id: None,
        };
        match &instance.key {
            InstanceKey::Array => {}
            InstanceKey::CachePartition { id } => payload.cache_partition_id = Some(id.clone()),
            InstanceKey::FrontEndPort { director, port }
            | InstanceKey::BackEndPort { director, port } => {
                payload.director_id = Some(director.clone());
                payload.port_id = Some(port.clone());
            }
            InstanceKey::StorageGroup { id } => payload.storage_group_id = Some(id.clone()),
        }
        payload
    }
}

/// Request/response boundary to the Unisphere REST API.
///
/// Transport failures are returned as [`UnisphereError::Transport`]; any HTTP
/// status, including non-2xx, comes back as an [`ApiResponse`] so callers can
/// decide how to treat it.
#[async_trait::async_trait]
pub trait ApiClient: Send + Sync {
    /// List the keys (identifiers) available at `endpoint`.
    async fn fetch_keys(&self, endpoint: &str, filter: &KeyFilter) -> Result<ApiResponse>;

    /// Query the performance metrics at `endpoint`.
    async fn fetch_metrics(&self, endpoint: &str, payload: &MetricsPayload)
        -> Result<ApiResponse>;
}
