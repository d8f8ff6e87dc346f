use std::path::{Path, PathBuf};

use crate::sysfs::{self, SysFs};

use super::model::{InterfaceStats, NetInfo};
use super::{Error, Result};

/// Interface name prefixes of virtual devices that are not reported.
pub const IGNORED_INTERFACES: [&str; 4] = ["lo", "veth", "docker", "nerdctl"];

fn is_ignored(name: &str) -> bool {
    IGNORED_INTERFACES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

fn interface_dir(name: &str) -> PathBuf {
    Path::new(sysfs::NET_DIR).join(name)
}

/// Enumerates the physical network interfaces of the host.
///
/// # Errors
///
/// Fails if `/sys/class/net` cannot be listed or an interface lacks a readable `address` or
/// `mtu`. A missing or negative `speed` is reported as `0`. Plain files such as
/// `bonding_masters` are not interfaces and are skipped.
pub fn network_devices(fs: &(impl SysFs + ?Sized)) -> Result<Vec<NetInfo>> {
    let dir = Path::new(sysfs::NET_DIR);
    let entries = fs.list_entries(dir).map_err(|source| Error::ListDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut devices = Vec::new();
    for entry in entries
        .iter()
        .filter(|entry| entry.is_dir() && !is_ignored(entry.name()))
    {
        let mac_address = read_attribute(fs, &entry.path().join("address"))?;
        let mtu = read_counter(fs, &entry.path().join("mtu"))?;
        // Interfaces without a link (or virtual ones) fail the read or report -1.
        let speed = fs
            .read_file(&entry.path().join("speed"))
            .ok()
            .and_then(|speed| speed.trim().parse::<u64>().ok())
            .unwrap_or(0);

        devices.push(NetInfo {
            name: entry.name().to_owned(),
            mac_address,
            speed,
            mtu,
        });
    }

    Ok(devices)
}

/// Reads the raw traffic counters of interface `name`.
///
/// # Errors
///
/// Fails if any counter below `statistics/` is unreadable or not a number.
pub fn interface_stats(fs: &(impl SysFs + ?Sized), name: &str) -> Result<InterfaceStats> {
    let stats = interface_dir(name).join("statistics");
    let counter = |file: &str| read_counter(fs, &stats.join(file));

    Ok(InterfaceStats {
        name: name.to_owned(),
        rx_bytes: counter("rx_bytes")?,
        rx_packets: counter("rx_packets")?,
        rx_errors: counter("rx_errors")?,
        rx_dropped: counter("rx_dropped")?,
        tx_bytes: counter("tx_bytes")?,
        tx_packets: counter("tx_packets")?,
        tx_errors: counter("tx_errors")?,
        tx_dropped: counter("tx_dropped")?,
    })
}

fn read_attribute(fs: &(impl SysFs + ?Sized), path: &Path) -> Result<String> {
    fs.read_file(path)
        .map(|content| content.trim().to_owned())
        .map_err(|source| Error::ReadAttribute {
            path: path.to_path_buf(),
            source,
        })
}

fn read_counter(fs: &(impl SysFs + ?Sized), path: &Path) -> Result<u64> {
    let value = read_attribute(fs, path)?;
    value.parse().map_err(|_| Error::InvalidAttribute {
        path: path.to_path_buf(),
        value,
    })
}
