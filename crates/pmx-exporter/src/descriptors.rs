use pmx_common::{DataPoint, ResourceType};
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::HashMap;

/// Exported gauge family for one metric name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDescriptor {
    pub name: &'static str,
    pub help: String,
    pub labels: &'static [&'static str],
}

/// Gauge families exported for the served resource type.
///
/// Built once at startup. Every scrape renders the cycle's data points into a
/// fresh registry so series from instances that have disappeared never linger.
#[derive(Debug, Clone)]
pub struct MetricDescriptorSet {
    descriptors: Vec<MetricDescriptor>,
}

impl MetricDescriptorSet {
    pub fn new(resource_type: ResourceType) -> Self {
        let labels = resource_type.label_schema();
        let descriptors = resource_type
            .metrics()
            .iter()
            .map(|&name| MetricDescriptor {
                name,
                help: format!("PowerMax {resource_type} metric {name}"),
                labels,
            })
            .collect();
        Self { descriptors }
    }

    pub fn descriptors(&self) -> &[MetricDescriptor] {
        &self.descriptors
    }

    pub fn get(&self, name: &str) -> Option<&MetricDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    /// Encode `points` in the Prometheus text exposition format.
    ///
    /// Points naming an unknown metric or carrying the wrong number of label
    /// values are logged and left out.
    pub fn render(&self, points: &[DataPoint]) -> prometheus::Result<String> {
        let registry = Registry::new();
        let mut gauges = HashMap::with_capacity(self.descriptors.len());
        for descriptor in &self.descriptors {
            let gauge = GaugeVec::new(
                Opts::new(descriptor.name, descriptor.help.clone()),
                descriptor.labels,
            )?;
            registry.register(Box::new(gauge.clone()))?;
            gauges.insert(descriptor.name, gauge);
        }

        for point in points {
            let Some(gauge) = gauges.get(point.metric.as_str()) else {
                tracing::debug!(metric = %point.metric, "No descriptor for metric, skipping");
                continue;
            };
            let labels: Vec<&str> = point.labels.iter().map(String::as_str).collect();
            match gauge.get_metric_with_label_values(&labels) {
                Ok(series) => series.set(point.value),
                Err(e) => {
                    tracing::warn!(metric = %point.metric, error = %e, "Dropping data point");
                }
            }
        }

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
