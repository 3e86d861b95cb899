use crate::error::{Result, UnisphereError};
use crate::extract::{FieldValue, Record};
use crate::{ApiClient, KeyFilter};
use pmx_common::resource::ARRAY_KEYS_ENDPOINT;
use pmx_common::{KeyListing, ResourceInstance, ResourceType};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArrayKeys {
    #[serde(default)]
    array_info: Vec<ArrayInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArrayInfo {
    symmetrix_id: String,
}

/// Discovers the monitored instances of each resource type on one array.
#[derive(Clone)]
pub struct ResourceCatalog {
    client: Arc<dyn ApiClient>,
    symm_id: String,
}

impl ResourceCatalog {
    pub fn new(client: Arc<dyn ApiClient>, symm_id: &str) -> Self {
        Self {
            client,
            symm_id: symm_id.to_string(),
        }
    }

    /// List the array ids managed by the Unisphere instance.
    pub async fn list_arrays(&self) -> Result<Vec<String>> {
        tracing::info!("List PowerMax arrays managed by Unisphere");
        let response = self
            .client
            .fetch_keys(ARRAY_KEYS_ENDPOINT, &KeyFilter::default())
            .await?
            .error_for_status()?;
        let keys: ArrayKeys =
            serde_json::from_slice(&response.body).map_err(|source| UnisphereError::Decode {
                what: "array listing",
                source,
            })?;
        let arrays: Vec<String> = keys.array_info.into_iter().map(|a| a.symmetrix_id).collect();
        tracing::debug!(arrays = ?arrays, "PowerMax arrays found");
        Ok(arrays)
    }

    /// Check that the configured array is managed by this Unisphere.
    ///
    /// # Errors
    ///
    /// [`UnisphereError::NoArraysManaged`] or [`UnisphereError::ArrayNotManaged`]
    /// when the array is unknown, or the underlying listing error.
    pub async fn verify_array(&self) -> Result<()> {
        let arrays = self.list_arrays().await?;
        if arrays.is_empty() {
            return Err(UnisphereError::NoArraysManaged);
        }
        if !arrays.iter().any(|a| *a == self.symm_id) {
            return Err(UnisphereError::ArrayNotManaged {
                symm_id: self.symm_id.clone(),
            });
        }
        Ok(())
    }

    /// List the instances of `resource_type`, or nothing if discovery fails.
    pub async fn list_instances(&self, resource_type: ResourceType) -> Vec<ResourceInstance> {
        match self.try_list_instances(resource_type).await {
            Ok(instances) => {
                tracing::info!(
                    resource_type = %resource_type,
                    count = instances.len(),
                    "Resources discovered"
                );
                instances
            }
            Err(e) => {
                tracing::error!(
                    resource_type = %resource_type,
                    error = %e,
                    "Failed to list resources"
                );
                Vec::new()
            }
        }
    }

    pub async fn try_list_instances(
        &self,
        resource_type: ResourceType,
    ) -> Result<Vec<ResourceInstance>> {
        let symm_id = self.symm_id.as_str();
        match resource_type.key_listing() {
            KeyListing::ConfiguredArray => Ok(vec![ResourceInstance::array(symm_id)]),
            KeyListing::Single(endpoint) => {
                let ids = self.list_keys(endpoint, &KeyFilter::array(symm_id)).await?;
                Ok(ids
                    .iter()
                    .map(|id| match resource_type {
                        ResourceType::CachePartition => {
                            ResourceInstance::cache_partition(symm_id, id)
                        }
                        _ => ResourceInstance::storage_group(symm_id, id),
                    })
                    .collect())
            }
            KeyListing::DirectorPorts { directors, ports } => {
                let director_ids = self.list_keys(directors, &KeyFilter::array(symm_id)).await?;
                let mut instances = Vec::new();
                for director in &director_ids {
                    let port_ids = match self
                        .list_keys(ports, &KeyFilter::director(symm_id, director))
                        .await
                    {
                        Ok(ids) => ids,
                        Err(e) => {
                            tracing::warn!(
                                director = %director,
                                error = %e,
                                "Failed to list director ports"
                            );
                            continue;
                        }
                    };
                    instances.extend(port_ids.iter().filter_map(|port| {
                        ResourceInstance::port(resource_type, symm_id, director, port)
                    }));
                }
                Ok(instances)
            }
        }
    }

    async fn list_keys(&self, endpoint: &str, filter: &KeyFilter) -> Result<Vec<String>> {
        tracing::debug!(endpoint, "List resources");
        let response = self
            .client
            .fetch_keys(endpoint, filter)
            .await?
            .error_for_status()?;
        flatten_key_listing(&response.body)
    }
}

/// Collect every string field of a key listing.
///
/// Unisphere answers key listings with one top-level key holding an array of
/// flat objects, e.g. `{"storageGroupInfo":[{"storageGroupId":"sg1", ...}]}`.
/// Every string-valued field of every object is taken as an identifier,
/// objects in array order and fields in name order.
pub fn flatten_key_listing(body: &[u8]) -> Result<Vec<String>> {
    let listing: BTreeMap<String, Vec<Record>> =
        serde_json::from_slice(body).map_err(|source| UnisphereError::Decode {
            what: "key listing",
            source,
        })?;
    if listing.len() != 1 {
        return Err(UnisphereError::UnexpectedShape(format!(
            "expected exactly one top-level key in key listing, found {}",
            listing.len()
        )));
    }

    let ids = listing
        .into_values()
        .flatten()
        .flat_map(Record::into_values)
        .filter_map(|value| match value {
            FieldValue::Text(id) => Some(id),
            FieldValue::Number(_) | FieldValue::Other(_) => None,
        })
        .collect::<Vec<_>>();
    tracing::trace!(ids = ?ids, "Key listing flattened");
    Ok(ids)
}
