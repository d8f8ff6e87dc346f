//! Hardware inventory of the host: NUMA/CPU topology, caches, huge pages, memory, block and
//! network devices.
//!
//! Every function takes a [`SysFs`](crate::sysfs::SysFs) and re-reads the kernel state on each
//! call. Missing optional information degrades to empty values; only malformed data surfaces as
//! an [`Error`].

mod block;
mod cache;
mod error;
mod hugepages;
mod memory;
mod model;
mod net;
mod topology;

pub use block::block_devices;
pub use cache::cpu_caches;
pub use error::{Error, Result};
pub use hugepages::huge_pages;
pub use memory::node_memory;
pub use model::{
    CacheInfo, CacheType, Core, DiskInfo, HugePageStat, InterfaceStats, NetInfo, Node, Topology,
    VmStatNuma,
};
pub use net::{IGNORED_INTERFACES, interface_stats, network_devices};
pub use topology::{discover_topology, locate_socket};
