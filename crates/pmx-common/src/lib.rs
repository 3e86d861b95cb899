pub mod resource;
pub mod types;

pub use resource::{KeyListing, ResourceType};
pub use types::{DataPoint, InstanceKey, MetricSample, ResourceInstance, TimeRange};
