//! Prometheus exporter serving one PowerMax resource type per process.

pub mod app;
pub mod config;
pub mod descriptors;
pub mod logging;
pub mod state;
