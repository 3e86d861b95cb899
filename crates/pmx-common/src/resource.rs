use serde::{Deserialize, Serialize};

/// Endpoint listing the arrays managed by a Unisphere instance.
pub const ARRAY_KEYS_ENDPOINT: &str = "/performance/Array/keys";

const ARRAY_METRICS: &[&str] = &[
    "HostIOs",
    "HostMBs",
    "HostReads",
    "HostWrites",
    "HostMBReads",
    "HostMBWritten",
    "ReadResponseTime",
    "WriteResponseTime",
    "PercentCacheWP",
    "PercentHit",
    "PercentReads",
    "PercentWrites",
    "FEReqs",
    "BEIOs",
    "OverallHealthScore",
];

const CACHE_PARTITION_METRICS: &[&str] = &[
    "CacheHitPercent",
    "PercentWPUtilization",
    "WPCount",
    "CacheSlotsUsed",
    "HostIOs",
    "HostMBs",
    "ReadResponseTime",
    "WriteResponseTime",
];

const FE_PORT_METRICS: &[&str] = &[
    "IOs",
    "MBs",
    "Reads",
    "Writes",
    "MBRead",
    "MBWritten",
    "ReadResponseTime",
    "WriteResponseTime",
    "ResponseTime",
    "PercentBusy",
    "AvgIOSize",
];

const BE_PORT_METRICS: &[&str] = &[
    "IOs",
    "MBs",
    "Reads",
    "Writes",
    "MBRead",
    "MBWritten",
    "PercentBusy",
    "AvgIOSize",
];

const STORAGE_GROUP_METRICS: &[&str] = &[
    "HostIOs",
    "HostMBs",
    "HostReads",
    "HostWrites",
    "HostMBReads",
    "HostMBWritten",
    "ResponseTime",
    "ReadResponseTime",
    "WriteResponseTime",
    "PercentHit",
    "PercentRead",
    "PercentWrite",
    "AvgIOSize",
    "AllocatedCapacity",
];

const ARRAY_LABELS: &[&str] = &["symmid", "type"];
const NAMED_LABELS: &[&str] = &["symmid", "type", "name"];
const PORT_LABELS: &[&str] = &["symmid", "type", "director", "port"];

/// How the instances of a resource type are discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyListing {
    /// The configured array itself is the only instance.
    ConfiguredArray,
    /// One key listing; every string field of every entry is an instance id.
    Single(&'static str),
    /// Directors are listed first, then the ports of each director.
    DirectorPorts {
        directors: &'static str,
        ports: &'static str,
    },
}

/// Category of monitored PowerMax entity.
///
/// Every variant carries a fixed metric list, an ordered label schema and the
/// Unisphere endpoints used to discover and query it. The serialized name is
/// both the configuration value and the value of the `type` label.
///
/// # Examples
///
/// ```
/// use pmx_common::ResourceType;
///
/// let rt: ResourceType = "feport".parse().unwrap();
/// assert_eq!(rt, ResourceType::FrontEndPort);
/// assert_eq!(rt.label_schema(), &["symmid", "type", "director", "port"]);
/// assert_eq!(rt.metrics_endpoint(), "/performance/FEPort/metrics");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    #[serde(rename = "array")]
    Array,
    #[serde(rename = "cache")]
    CachePartition,
    #[serde(rename = "feport")]
    FrontEndPort,
    #[serde(rename = "beport")]
    BackEndPort,
    #[serde(rename = "storagegroup")]
    StorageGroup,
}

impl ResourceType {
    pub const ALL: [ResourceType; 5] = [
        ResourceType::Array,
        ResourceType::CachePartition,
        ResourceType::FrontEndPort,
        ResourceType::BackEndPort,
        ResourceType::StorageGroup,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Array => "array",
            ResourceType::CachePartition => "cache",
            ResourceType::FrontEndPort => "feport",
            ResourceType::BackEndPort => "beport",
            ResourceType::StorageGroup => "storagegroup",
        }
    }

    /// Unisphere metric names requested for this type.
    pub fn metrics(self) -> &'static [&'static str] {
        match self {
            ResourceType::Array => ARRAY_METRICS,
            ResourceType::CachePartition => CACHE_PARTITION_METRICS,
            ResourceType::FrontEndPort => FE_PORT_METRICS,
            ResourceType::BackEndPort => BE_PORT_METRICS,
            ResourceType::StorageGroup => STORAGE_GROUP_METRICS,
        }
    }

    /// Ordered label names attached to every exported series of this type.
    pub fn label_schema(self) -> &'static [&'static str] {
        match self {
            ResourceType::Array => ARRAY_LABELS,
            ResourceType::CachePartition | ResourceType::StorageGroup => NAMED_LABELS,
            ResourceType::FrontEndPort | ResourceType::BackEndPort => PORT_LABELS,
        }
    }

    pub fn key_listing(self) -> KeyListing {
        match self {
            ResourceType::Array => KeyListing::ConfiguredArray,
            ResourceType::CachePartition => {
                KeyListing::Single("/performance/CachePartition/keys")
            }
            ResourceType::FrontEndPort => KeyListing::DirectorPorts {
                directors: "/performance/FEDirector/keys",
                ports: "/performance/FEPort/keys",
            },
            ResourceType::BackEndPort => KeyListing::DirectorPorts {
                directors: "/performance/BEDirector/keys",
                ports: "/performance/BEPort/keys",
            },
            ResourceType::StorageGroup => KeyListing::Single("/performance/StorageGroup/keys"),
        }
    }

    pub fn metrics_endpoint(self) -> &'static str {
        match self {
            ResourceType::Array => "/performance/Array/metrics",
            ResourceType::CachePartition => "/performance/CachePartition/metrics",
            ResourceType::FrontEndPort => "/performance/FEPort/metrics",
            ResourceType::BackEndPort => "/performance/BEPort/metrics",
            ResourceType::StorageGroup => "/performance/StorageGroup/metrics",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.to_lowercase();
        ResourceType::ALL
            .into_iter()
            .find(|rt| rt.as_str() == name)
            .ok_or_else(|| {
                format!("unknown resource type: {s} (expected array, cache, feport, beport or storagegroup)")
            })
    }
}
