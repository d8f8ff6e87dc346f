//! Point-in-time view of the host, as printed by the agent.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::{SystemTime, SystemTimeError, UNIX_EPOCH};

use serde::Serialize;

use crate::config::Config;
use crate::error::ResultOkLogExt;
use crate::resctrl::{Collector, ContainerStats};
use crate::sysfs::{self, SysFs};
use crate::sysinfo::{self, DiskInfo, InterfaceStats, NetInfo, Topology, VmStatNuma};
use crate::vmstat;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to discover topology: {0}")]
    Topology(#[from] sysinfo::Error),

    #[error(transparent)]
    VmStat(#[from] vmstat::Error),

    #[error("system clock is before the UNIX epoch: {0}")]
    Clock(#[from] SystemTimeError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Hardware inventory and memory counters of the host.
///
/// Topology and counters are required. Devices are best effort and stay empty when their sysfs
/// trees cannot be read.
#[derive(Debug, Clone, Serialize)]
pub struct HostInfo {
    pub topology: Topology,
    pub vmstat: HashMap<String, u64>,
    pub numa_vmstat: Vec<VmStatNuma>,
    pub disks: BTreeMap<String, DiskInfo>,
    pub network_devices: Vec<NetInfo>,
    pub interfaces: Vec<InterfaceStats>,
}

impl HostInfo {
    /// Reads the current host state through `fs`.
    ///
    /// # Errors
    ///
    /// Fails if topology discovery or a counter file fails.
    pub fn collect(fs: &(impl SysFs + ?Sized), config: &Config) -> Result<Self> {
        let topology = sysinfo::discover_topology(fs)?;
        let vmstat = vmstat::parse_counters(
            fs,
            &config.vmstat_filter,
            Path::new(sysfs::VMSTAT_FILE),
        )?;
        let numa_vmstat =
            vmstat::parse_counters_per_node(fs, &config.numa_vmstat, &config.vmstat_filter)?;

        let disks = sysinfo::block_devices(fs)
            .ok_log("failed to enumerate block devices")
            .unwrap_or_default();
        let network_devices = sysinfo::network_devices(fs)
            .ok_log("failed to enumerate network devices")
            .unwrap_or_default();
        let interfaces = network_devices
            .iter()
            .filter_map(|device| {
                sysinfo::interface_stats(fs, &device.name)
                    .ok_log("failed to read interface counters")
            })
            .collect();

        Ok(Self {
            topology,
            vmstat,
            numa_vmstat,
            disks,
            network_devices,
            interfaces,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    /// Collection time in UNIX epoch seconds.
    pub timestamp: u64,
    pub host: HostInfo,
    /// Monitoring samples of the host's default resctrl group.
    pub resctrl: ContainerStats,
}

impl Snapshot {
    /// Collects the host state and samples `collector`.
    ///
    /// A failed resctrl sample is logged and leaves `resctrl` empty.
    ///
    /// # Errors
    ///
    /// Fails if [`HostInfo::collect`] fails.
    pub fn collect(
        fs: &(impl SysFs + ?Sized),
        config: &Config,
        collector: &mut Collector,
    ) -> Result<Self> {
        let timestamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        let host = HostInfo::collect(fs, config)?;

        let mut resctrl = ContainerStats::default();
        collector
            .collect(&mut resctrl)
            .ok_log("failed to sample resctrl counters");

        Ok(Self {
            timestamp,
            host,
            resctrl,
        })
    }
}
