use crate::config::ExporterConfig;
use crate::descriptors::MetricDescriptorSet;
use anyhow::Context;
use pmx_unisphere::catalog::ResourceCatalog;
use pmx_unisphere::engine::CollectionEngine;
use pmx_unisphere::ApiClient;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<CollectionEngine>,
    pub descriptors: Arc<MetricDescriptorSet>,
}

impl AppState {
    pub fn new(engine: CollectionEngine) -> Self {
        let descriptors = MetricDescriptorSet::new(engine.resource_type());
        Self {
            engine: Arc::new(engine),
            descriptors: Arc::new(descriptors),
        }
    }

    /// Verify the configured array and discover the instances to collect.
    ///
    /// Fails when Unisphere cannot list its arrays, when the array is not
    /// managed by it, or when no instance of the target type exists.
    pub async fn bootstrap(config: &ExporterConfig, client: Arc<dyn ApiClient>) -> anyhow::Result<Self> {
        let symm_id = config.unisphere.symm_id.as_str();
        let target = config.exporter.target;

        if let Err(e) = ResourceCatalog::new(Arc::clone(&client), symm_id)
            .verify_array()
            .await
        {
            let address = &config.unisphere.address;
            let context = if e.is_startup_fatal() {
                format!("PowerMax {symm_id} is not usable through Unisphere at {address}")
            } else {
                format!("Could not list PowerMax arrays from Unisphere at {address}")
            };
            return Err(anyhow::Error::new(e).context(context));
        }

        let engine = CollectionEngine::new(target, client, symm_id, config.exporter.refresh)
            .await
            .with_context(|| format!("Failed to discover {target} resources on {symm_id}"))?;

        tracing::info!(
            symm_id,
            target_type = %target,
            instances = engine.instances().len(),
            refresh = engine.refresh_enabled(),
            "Exporter ready"
        );
        Ok(Self::new(engine))
    }
}
