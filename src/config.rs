//! Agent configuration read from environment variables.
//!
//! | Variable                | Default                                         |
//! |-------------------------|-------------------------------------------------|
//! | `ROOTFS_MOUNT_PATH`     | `/`                                             |
//! | `NUMA_VMSTAT_GLOB`      | `/sys/devices/system/node/node[0-9]*/vmstat`    |
//! | `VMSTAT_FILTER`         | `.*`                                            |
//! | `RESCTRL_INTERVAL_SECS` | `10`                                            |
//! | `COLLECT_INTERVAL_SECS` | unset: print a single snapshot                  |

use std::num::ParseIntError;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::vmstat::{self, CounterFilter, NumaVmStatPattern};

pub const ROOTFS_MOUNT_PATH: &str = "ROOTFS_MOUNT_PATH";
pub const NUMA_VMSTAT_GLOB: &str = "NUMA_VMSTAT_GLOB";
pub const VMSTAT_FILTER: &str = "VMSTAT_FILTER";
pub const RESCTRL_INTERVAL_SECS: &str = "RESCTRL_INTERVAL_SECS";
pub const COLLECT_INTERVAL_SECS: &str = "COLLECT_INTERVAL_SECS";

const DEFAULT_RESCTRL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("host root mount `{path}` set by `ROOTFS_MOUNT_PATH` is not a directory")]
    MissingRootfs { path: PathBuf },

    #[error("invalid `{var}`: {source}")]
    VmStat {
        var: &'static str,
        #[source]
        source: vmstat::Error,
    },

    #[error("invalid `{var}` value '{value}': {source}")]
    InvalidInterval {
        var: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("`{var}` must be greater than zero")]
    ZeroInterval { var: &'static str },
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone)]
pub struct Config {
    /// Path at which the host root filesystem is visible.
    pub rootfs: PathBuf,
    pub numa_vmstat: NumaVmStatPattern,
    pub vmstat_filter: CounterFilter,
    /// How often monitoring groups re-read the process list of their container.
    pub resctrl_interval: Duration,
    /// Poll period of the agent. `None` collects a single snapshot.
    pub collect_interval: Option<Duration>,
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] naming the first variable with an unusable value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of a variable if set.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] naming the first variable with an unusable value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let rootfs = lookup(ROOTFS_MOUNT_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/"));
        if !rootfs.is_dir() {
            return Err(Error::MissingRootfs { path: rootfs });
        }

        let numa_vmstat = match lookup(NUMA_VMSTAT_GLOB) {
            Some(pattern) => NumaVmStatPattern::new(pattern).map_err(|source| Error::VmStat {
                var: NUMA_VMSTAT_GLOB,
                source,
            })?,
            None => NumaVmStatPattern::default(),
        };

        let vmstat_filter = match lookup(VMSTAT_FILTER) {
            Some(filter) => CounterFilter::new(&filter).map_err(|source| Error::VmStat {
                var: VMSTAT_FILTER,
                source,
            })?,
            None => CounterFilter::all(),
        };

        let resctrl_interval = parse_interval(RESCTRL_INTERVAL_SECS, lookup(RESCTRL_INTERVAL_SECS))?
            .unwrap_or(DEFAULT_RESCTRL_INTERVAL);
        let collect_interval = parse_interval(COLLECT_INTERVAL_SECS, lookup(COLLECT_INTERVAL_SECS))?;

        log::debug!("Host root filesystem: {}", rootfs.display());
        Ok(Self {
            rootfs,
            numa_vmstat,
            vmstat_filter,
            resctrl_interval,
            collect_interval,
        })
    }

    /// Mount table of the host's init process, which sees the host mounts even from inside a
    /// container.
    pub fn mountinfo_path(&self) -> PathBuf {
        self.rootfs.join("proc/1/mountinfo")
    }

    pub fn rootfs(&self) -> &Path {
        &self.rootfs
    }
}

fn parse_interval(var: &'static str, value: Option<String>) -> Result<Option<Duration>> {
    let Some(value) = value else {
        return Ok(None);
    };
    let secs = value
        .trim()
        .parse::<u64>()
        .map_err(|source| Error::InvalidInterval {
            var,
            value: value.clone(),
            source,
        })?;
    if secs == 0 {
        return Err(Error::ZeroInterval { var });
    }
    Ok(Some(Duration::from_secs(secs)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.rootfs, PathBuf::from("/"));
        assert_eq!(config.numa_vmstat, NumaVmStatPattern::default());
        assert!(config.vmstat_filter.is_match("anything"));
        assert_eq!(config.resctrl_interval, Duration::from_secs(10));
        assert_eq!(config.collect_interval, None);
        assert_eq!(config.mountinfo_path(), PathBuf::from("/proc/1/mountinfo"));
    }

    #[test]
    fn test_overrides() {
        let rootfs = tempfile::tempdir().unwrap();
        let root = rootfs.path().to_str().unwrap();
        let config = Config::from_lookup(lookup(&[
            (ROOTFS_MOUNT_PATH, root),
            (NUMA_VMSTAT_GLOB, "/fake/node*/vmstat"),
            (VMSTAT_FILTER, "^workingset"),
            (RESCTRL_INTERVAL_SECS, "3"),
            (COLLECT_INTERVAL_SECS, " 5 "),
        ]))
        .unwrap();

        assert_eq!(config.rootfs(), rootfs.path());
        assert_eq!(config.numa_vmstat.as_str(), "/fake/node*/vmstat");
        assert!(config.vmstat_filter.is_match("workingset_nodes"));
        assert!(!config.vmstat_filter.is_match("nr_workingset"));
        assert_eq!(config.resctrl_interval, Duration::from_secs(3));
        assert_eq!(config.collect_interval, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_missing_rootfs() {
        let err = Config::from_lookup(lookup(&[(ROOTFS_MOUNT_PATH, "/definitely/not/here")]))
            .unwrap_err();
        assert!(matches!(err, Error::MissingRootfs { .. }));
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        let err = Config::from_lookup(lookup(&[(VMSTAT_FILTER, "(")])).unwrap_err();
        assert!(matches!(err, Error::VmStat { var: VMSTAT_FILTER, .. }));

        let err = Config::from_lookup(lookup(&[(NUMA_VMSTAT_GLOB, "relative/*")])).unwrap_err();
        assert!(matches!(err, Error::VmStat { var: NUMA_VMSTAT_GLOB, .. }));

        let err = Config::from_lookup(lookup(&[(RESCTRL_INTERVAL_SECS, "ten")])).unwrap_err();
        assert!(err.to_string().contains(RESCTRL_INTERVAL_SECS));

        let err = Config::from_lookup(lookup(&[(COLLECT_INTERVAL_SECS, "0")])).unwrap_err();
        assert!(matches!(err, Error::ZeroInterval { var: COLLECT_INTERVAL_SECS }));
    }
}
