use serde::Serialize;

/// Memory bandwidth counters of one L3 monitoring domain, in bytes since group creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MemoryBandwidthStats {
    pub total_bytes: u64,
    pub local_bytes: u64,
}

/// Last level cache occupancy of one L3 monitoring domain, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    pub llc_occupancy: u64,
}

/// Samples of one monitoring group, one entry per `mon_L3_<NN>` domain in domain order.
///
/// A list stays empty when the host does not support the matching feature.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ResctrlStats {
    pub memory_bandwidth: Vec<MemoryBandwidthStats>,
    pub cache: Vec<CacheStats>,
}

/// Per-container record that collectors merge their samples into.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ContainerStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resctrl: Option<ResctrlStats>,
}
