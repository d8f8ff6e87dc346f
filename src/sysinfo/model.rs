//! Value types produced by hardware discovery.
//!
//! All types serialize with the field names consumers of the host-metrics JSON expect
//! (`node_id`, `thread_ids`, `page_size`, ...).

use std::collections::HashMap;

use serde::Serialize;

/// One NUMA node, or one physical package when the host exposes no NUMA information.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Node {
    #[serde(rename = "node_id")]
    pub id: u32,
    /// Total memory of the node in bytes.
    #[serde(rename = "memory")]
    pub memory_bytes: u64,
    #[serde(rename = "hugepages")]
    pub huge_pages: Vec<HugePageStat>,
    pub cores: Vec<Core>,
    /// Caches shared by the whole node (level 3 and above).
    pub caches: Vec<CacheInfo>,
}

/// A physical core and its hardware threads.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Core {
    /// Kernel core id. Only unique within one package.
    #[serde(rename = "core_id")]
    pub id: u32,
    /// Sorted logical CPU numbers of the online hardware threads.
    pub thread_ids: Vec<u32>,
    /// Caches private to the core (levels 1 and 2).
    pub caches: Vec<CacheInfo>,
    pub socket_id: u32,
}

/// Kind of data a cache holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CacheType {
    Data,
    Instruction,
    Unified,
}

impl CacheType {
    /// Parses the content of a sysfs `cache/index<N>/type` file.
    pub fn from_sysfs(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "data" => Some(CacheType::Data),
            "instruction" => Some(CacheType::Instruction),
            "unified" => Some(CacheType::Unified),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CacheInfo {
    #[serde(rename = "size")]
    pub size_bytes: u64,
    #[serde(rename = "type")]
    pub cache_type: CacheType,
    pub level: u32,
}

impl CacheInfo {
    /// Level from which a cache is treated as shared by the node rather than private to a core.
    pub const SHARED_LEVEL: u32 = 3;

    pub fn is_shared(&self) -> bool {
        self.level >= Self::SHARED_LEVEL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct HugePageStat {
    #[serde(rename = "page_size")]
    pub page_size_kb: u64,
    pub num_pages: u64,
}

/// Virtual memory counters of a single NUMA node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct VmStatNuma {
    /// Node id as it appears in the path, e.g. `"0"` for `node0/vmstat`.
    #[serde(rename = "node")]
    pub node_id: String,
    pub stats: HashMap<String, u64>,
}

/// Result of a topology discovery.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Topology {
    pub nodes: Vec<Node>,
    /// Number of online logical CPUs with readable topology, whether or not they could be placed
    /// in a node.
    pub num_cores: usize,
}

/// A block device, keyed by `major:minor` in [`super::block_devices`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiskInfo {
    pub name: String,
    pub major: u64,
    pub minor: u64,
    /// Size in bytes.
    pub size: u64,
    pub scheduler: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetInfo {
    pub name: String,
    pub mac_address: String,
    /// Link speed in Mbps, `0` if the interface does not report one.
    pub speed: u64,
    pub mtu: u64,
}

/// Raw counters from `/sys/class/net/<iface>/statistics`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct InterfaceStats {
    pub name: String,
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub rx_errors: u64,
    pub rx_dropped: u64,
    pub tx_bytes: u64,
    pub tx_packets: u64,
    pub tx_errors: u64,
    pub tx_dropped: u64,
}
