use crate::catalog::ResourceCatalog;
use crate::error::{Result, UnisphereError};
use crate::extract::extract_latest;
use crate::{ApiClient, MetricsPayload};
use pmx_common::{DataPoint, MetricSample, ResourceInstance, ResourceType, TimeRange};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Result of one collection unit.
#[derive(Debug)]
enum UnitOutcome {
    Sample(Vec<DataPoint>),
    NoSample,
    Failed,
}

/// Summary of one collection cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub resource_type: ResourceType,
    /// Units launched, one per instance.
    pub launched: usize,
    /// Units that emitted at least one data point.
    pub succeeded: usize,
    /// Units for which Unisphere had no sample.
    pub empty: usize,
    /// Units that failed (transport, status, decode or panic).
    pub failed: usize,
    pub points: Vec<DataPoint>,
    pub elapsed: Duration,
}

/// Runs collection cycles for one resource type.
///
/// The tracked instance list is read once per cycle; with refresh enabled the
/// storage-group list is replaced between cycles, never during one.
pub struct CollectionEngine {
    resource_type: ResourceType,
    client: Arc<dyn ApiClient>,
    catalog: ResourceCatalog,
    refresh: bool,
    instances: RwLock<Arc<[ResourceInstance]>>,
}

impl CollectionEngine {
    /// Discover the instances of `resource_type` and build the engine.
    ///
    /// # Errors
    ///
    /// Returns [`UnisphereError::NoInstances`] when discovery finds nothing.
    pub async fn new(
        resource_type: ResourceType,
        client: Arc<dyn ApiClient>,
        symm_id: &str,
        refresh: bool,
    ) -> Result<Self> {
        tracing::info!(resource_type = %resource_type, "Init resources dynamically");
        let catalog = ResourceCatalog::new(Arc::clone(&client), symm_id);
        let instances = catalog.list_instances(resource_type).await;
        if instances.is_empty() {
            return Err(UnisphereError::NoInstances(resource_type));
        }
        Ok(Self::with_instances(
            resource_type,
            client,
            catalog,
            refresh,
            instances,
        ))
    }

    /// Build an engine over an already known instance list.
    pub fn with_instances(
        resource_type: ResourceType,
        client: Arc<dyn ApiClient>,
        catalog: ResourceCatalog,
        refresh: bool,
        instances: Vec<ResourceInstance>,
    ) -> Self {
        Self {
            resource_type,
            client,
            catalog,
            refresh,
            instances: RwLock::new(instances.into()),
        }
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn refresh_enabled(&self) -> bool {
        self.refresh
    }

    /// Snapshot of the tracked instances.
    pub fn instances(&self) -> Arc<[ResourceInstance]> {
        Arc::clone(&self.instances.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Run one collection cycle.
    ///
    /// Every instance gets its own task; the cycle returns once all of them
    /// have finished, whatever their outcome. Failures are logged and counted,
    /// never propagated.
    pub async fn collect(&self) -> CycleReport {
        let started = Instant::now();
        let instances = self.instances();
        let range = TimeRange::current();

        tracing::info!(
            resource_type = %self.resource_type,
            instances = instances.len(),
            "Start collecting metrics"
        );

        let mut units = JoinSet::new();
        for instance in instances.iter().cloned() {
            let client = Arc::clone(&self.client);
            units.spawn(collect_instance(client, instance, range));
        }

        let mut report = CycleReport {
            resource_type: self.resource_type,
            launched: instances.len(),
            succeeded: 0,
            empty: 0,
            failed: 0,
            points: Vec::new(),
            elapsed: Duration::ZERO,
        };
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok(UnitOutcome::Sample(points)) => {
                    report.succeeded += 1;
                    report.points.extend(points);
                }
                Ok(UnitOutcome::NoSample) => report.empty += 1,
                Ok(UnitOutcome::Failed) => report.failed += 1,
                Err(e) => {
                    tracing::error!(error = %e, "Collection task panicked");
                    report.failed += 1;
                }
            }
        }

        if self.resource_type == ResourceType::StorageGroup && self.refresh {
            self.refresh_instances().await;
        }

        report.elapsed = started.elapsed();
        tracing::info!(
            resource_type = %self.resource_type,
            launched = report.launched,
            succeeded = report.succeeded,
            empty = report.empty,
            failed = report.failed,
            points = report.points.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Complete collecting metrics"
        );
        report
    }

    /// Re-list the instances and replace the tracked list if the listing is
    /// non-empty. Returns whether the list was replaced.
    pub async fn refresh_instances(&self) -> bool {
        tracing::info!(
            resource_type = %self.resource_type,
            "Update resource list in case there are newly created ones"
        );
        let fresh = self.catalog.list_instances(self.resource_type).await;
        if fresh.is_empty() {
            tracing::warn!(
                resource_type = %self.resource_type,
                "Resource listing came back empty, keeping the previous list"
            );
            return false;
        }
        *self.instances.write().unwrap_or_else(PoisonError::into_inner) = fresh.into();
        true
    }
}

async fn collect_instance(
    client: Arc<dyn ApiClient>,
    instance: ResourceInstance,
    range: TimeRange,
) -> UnitOutcome {
    let resource_type = instance.resource_type();
    let endpoint = resource_type.metrics_endpoint();
    let payload = MetricsPayload::for_instance(&instance, range);
    tracing::debug!(
        instance = %instance,
        start = range.start_ms,
        end = range.end_ms,
        "Get latest metrics"
    );

    let response = match client.fetch_metrics(endpoint, &payload).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(instance = %instance, error = %e, "Failed to fetch metrics");
            return UnitOutcome::Failed;
        }
    };

    match extract_latest(&response) {
        Ok(Some(sample)) if !sample.is_empty() => UnitOutcome::Sample(data_points(&instance, &sample)),
        Ok(_) => {
            tracing::debug!(instance = %instance, "No metric is available");
            UnitOutcome::NoSample
        }
        Err(e) => {
            tracing::warn!(instance = %instance, error = %e, "Failed to extract metrics");
            UnitOutcome::Failed
        }
    }
}

/// One data point per declared metric present in `sample`, labelled in the
/// resource type's schema order.
pub fn data_points(instance: &ResourceInstance, sample: &MetricSample) -> Vec<DataPoint> {
    let labels: Vec<String> = instance
        .label_values()
        .into_iter()
        .map(str::to_string)
        .collect();
    let declared = instance.resource_type().metrics();

    for (name, _) in sample.iter().filter(|(name, _)| !declared.contains(name)) {
        tracing::debug!(instance = %instance, metric = name, "Skipping undeclared metric");
    }

    declared
        .iter()
        .filter_map(|metric| {
            sample.get(metric).map(|value| DataPoint {
                metric: (*metric).to_string(),
                labels: labels.clone(),
                value,
            })
        })
        .collect()
}
