//! Read-only access to the kernel pseudo-filesystems (`/sys`, `/proc`).
//!
//! Everything that inspects host hardware goes through the [`SysFs`] trait instead of touching
//! real paths, so the same discovery code runs against the live host ([`HostSysFs`]) and against
//! a fabricated tree in tests ([`FakeSysFs`]).
//!
//! Paths handed to a [`SysFs`] are always absolute host paths such as
//! `/sys/devices/system/node/node0`. An implementation decides where they really live.

mod fake;
mod host;

use std::path::{Path, PathBuf};

pub use fake::FakeSysFs;
pub use host::HostSysFs;

/// Directory holding one `node<N>` directory per NUMA node.
pub const NODE_DIR: &str = "/sys/devices/system/node";
/// Directory holding one `cpu<N>` directory per logical CPU.
pub const CPU_DIR: &str = "/sys/devices/system/cpu";
/// Directory holding one entry per block device.
pub const BLOCK_DIR: &str = "/sys/block";
/// Directory holding one entry per network interface.
pub const NET_DIR: &str = "/sys/class/net";
/// Machine-wide virtual memory counters.
pub const VMSTAT_FILE: &str = "/proc/vmstat";
/// Default pattern matching the per-node virtual memory counter files.
pub const NUMA_VMSTAT_GLOB: &str = "/sys/devices/system/node/node[0-9]*/vmstat";

/// A single directory entry returned by [`SysFs::list_entries`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    name: String,
    path: PathBuf,
    is_dir: bool,
}

impl Entry {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, is_dir: bool) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            is_dir,
        }
    }

    /// File name of the entry, e.g. `cpu3`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute host path of the entry.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }
}

/// Read capability over the kernel pseudo-filesystems.
///
/// Implementations only read, so sharing one accessor between threads is fine as long as the
/// implementation is [`Sync`].
pub trait SysFs {
    /// Lists the entries of the directory at `path`, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if `path` does not exist or is not a directory.
    fn list_entries(&self, path: &Path) -> std::io::Result<Vec<Entry>>;

    /// Reads the whole text content of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file is missing or unreadable.
    fn read_file(&self, path: &Path) -> std::io::Result<String>;

    /// Reports whether the CPU whose sysfs directory is `cpu_path` is online.
    ///
    /// The kernel omits the `online` file for CPUs that cannot be taken offline (usually `cpu0`),
    /// so a missing or unreadable flag counts as online. Only an explicit `0` means offline.
    fn is_online(&self, cpu_path: &Path) -> bool {
        match self.read_file(&cpu_path.join("online")) {
            Ok(content) => content.trim() != "0",
            Err(_) => true,
        }
    }
}

impl<T: SysFs + ?Sized> SysFs for &T {
    fn list_entries(&self, path: &Path) -> std::io::Result<Vec<Entry>> {
        (**self).list_entries(path)
    }

    fn read_file(&self, path: &Path) -> std::io::Result<String> {
        (**self).read_file(path)
    }

    fn is_online(&self, cpu_path: &Path) -> bool {
        (**self).is_online(cpu_path)
    }
}

impl<T: SysFs + ?Sized> SysFs for std::sync::Arc<T> {
    fn list_entries(&self, path: &Path) -> std::io::Result<Vec<Entry>> {
        (**self).list_entries(path)
    }

    fn read_file(&self, path: &Path) -> std::io::Result<String> {
        (**self).read_file(path)
    }

    fn is_online(&self, cpu_path: &Path) -> bool {
        (**self).is_online(cpu_path)
    }
}

/// Parses the numeric suffix of a sysfs entry name such as `cpu12` or `node3`.
///
/// Returns `None` if `name` does not start with `prefix` or the remainder is not a decimal number.
pub(crate) fn parse_indexed_name(name: &str, prefix: &str) -> Option<u32> {
    let digits = name.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_indexed_name() {
        assert_eq!(parse_indexed_name("cpu12", "cpu"), Some(12));
        assert_eq!(parse_indexed_name("node0", "node"), Some(0));
        assert_eq!(parse_indexed_name("cpufreq", "cpu"), None);
        assert_eq!(parse_indexed_name("cpu", "cpu"), None);
        assert_eq!(parse_indexed_name("cpu+1", "cpu"), None);
        assert_eq!(parse_indexed_name("node1", "cpu"), None);
    }

    #[test]
    fn test_is_online_flag() {
        let fs = FakeSysFs::default()
            .with_file("/sys/devices/system/cpu/cpu1/online", "0\n")
            .with_file("/sys/devices/system/cpu/cpu2/online", "1\n")
            .with_dir("/sys/devices/system/cpu/cpu0");

        assert!(fs.is_online(Path::new("/sys/devices/system/cpu/cpu0")));
        assert!(!fs.is_online(Path::new("/sys/devices/system/cpu/cpu1")));
        assert!(fs.is_online(Path::new("/sys/devices/system/cpu/cpu2")));
    }
}
