//! Filesystem operations on resctrl monitoring groups.
//!
//! Layout of a group below a control group `<ctrl>`:
//!
//! ```text
//! <ctrl>/mon_groups/<name>/tasks
//! <ctrl>/mon_groups/<name>/mon_data/mon_L3_<NN>/{llc_occupancy,mbm_total_bytes,mbm_local_bytes}
//! ```

use std::collections::HashSet;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use crate::fsutil;

use super::stats::{CacheStats, MemoryBandwidthStats, ResctrlStats};
use super::support::ResctrlSupport;
use super::{Error, Result};

/// Container id of the host itself, which is monitored through the default group.
pub const ROOT_CONTAINER: &str = "/";

const GROUP_PREFIX: &str = "creo-";
const MON_GROUPS: &str = "mon_groups";
const MON_DATA: &str = "mon_data";
const DOMAIN_PREFIX: &str = "mon_L3_";
const TASKS: &str = "tasks";
/// Directories of the resctrl root that are not control groups.
const RESERVED_DIRS: [&str; 3] = ["info", MON_GROUPS, MON_DATA];
/// The kernel's answer for a counter it cannot read right now.
const UNAVAILABLE: &str = "Unavailable";
/// `ESRCH`: the process exited before it could be moved.
const NO_SUCH_PROCESS: i32 = 3;

/// Name of the monitoring group of `container`, e.g. `creo--docker-0123abcd` for
/// `/docker/0123abcd`.
///
/// `/` becomes `-`. Literal `-` and `_` are escaped as `_-` and `__`, so distinct container
/// ids never share a group.
pub fn group_name(container: &str) -> String {
    let mut name = String::with_capacity(GROUP_PREFIX.len() + container.len());
    name.push_str(GROUP_PREFIX);
    for c in container.chars() {
        match c {
            '/' => name.push('-'),
            '-' | '_' => {
                name.push('_');
                name.push(c);
            }
            c => name.push(c),
        }
    }
    name
}

/// A monitoring group on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoringGroup {
    path: PathBuf,
    /// Only groups created by us are removed again.
    owned: bool,
}

impl MonitoringGroup {
    /// Creates the monitoring group of `container` and moves `pids` into it.
    ///
    /// The group is placed below the control group that already holds the first pid, so
    /// monitoring does not move processes between allocation classes. [`ROOT_CONTAINER`] maps
    /// to the default group at the resctrl root. A leftover group of the same name is reused.
    pub fn create(support: &ResctrlSupport, container: &str, pids: &[u32]) -> Result<Self> {
        if container == ROOT_CONTAINER {
            return Ok(Self {
                path: support.root().to_path_buf(),
                owned: false,
            });
        }

        let control_group = match pids.first() {
            Some(&pid) => find_control_group(support.root(), pid)?,
            None => support.root().to_path_buf(),
        };
        let path = control_group.join(MON_GROUPS).join(group_name(container));

        match std::fs::create_dir(&path) {
            Ok(()) => log::debug!("Created monitoring group `{}`", path.display()),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                log::debug!("Reusing monitoring group `{}`", path.display());
            }
            Err(source) => return Err(Error::CreateGroup { path, source }),
        }

        let group = Self { path, owned: true };
        group.add_pids(pids)?;
        Ok(group)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Moves every pid not yet listed in the group's `tasks` file into the group.
    ///
    /// Processes that exited in the meantime are skipped. The default group is left alone, it
    /// implicitly holds every unassigned process.
    pub fn add_pids(&self, pids: &[u32]) -> Result<()> {
        if !self.owned {
            return Ok(());
        }

        let tasks = self.path.join(TASKS);
        let present = if tasks.exists() {
            read_tasks(&tasks)?
        } else {
            HashSet::new()
        };

        for &pid in pids {
            if present.contains(&pid) {
                continue;
            }
            match fsutil::append_line(&tasks, pid) {
                Ok(()) => {}
                Err(err) if err.raw_os_error() == Some(NO_SUCH_PROCESS) => {
                    log::debug!("Process {pid} exited before joining `{}`", self.path.display());
                }
                Err(source) => {
                    return Err(Error::AddPid {
                        path: tasks.clone(),
                        pid,
                        source,
                    });
                }
            }
        }
        Ok(())
    }

    /// Reads the counters of every L3 monitoring domain of the group.
    pub fn read_stats(&self, support: &ResctrlSupport) -> Result<ResctrlStats> {
        let mon_data = self.path.join(MON_DATA);
        let mut domains = std::fs::read_dir(&mon_data)
            .and_then(|entries| {
                entries
                    .map(|entry| entry.map(|entry| entry.path()))
                    .collect::<io::Result<Vec<_>>>()
            })
            .map_err(|source| Error::ListDomains {
                path: mon_data.clone(),
                source,
            })?;
        domains.retain(|domain| {
            domain
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(DOMAIN_PREFIX))
        });
        domains.sort();

        let mut stats = ResctrlStats::default();
        for domain in &domains {
            if support.cache_monitoring() {
                stats.cache.push(CacheStats {
                    llc_occupancy: read_counter(&domain.join("llc_occupancy"))?,
                });
            }
            if support.bandwidth_monitoring() {
                let counter = |enabled: bool, file: &str| {
                    if enabled {
                        read_counter(&domain.join(file))
                    } else {
                        Ok(0)
                    }
                };
                stats.memory_bandwidth.push(MemoryBandwidthStats {
                    total_bytes: counter(support.mbm_total(), "mbm_total_bytes")?,
                    local_bytes: counter(support.mbm_local(), "mbm_local_bytes")?,
                });
            }
        }
        Ok(stats)
    }

    /// Removes the group. Removing a group that is already gone succeeds.
    ///
    /// resctrl accepts `rmdir` on a populated group and moves its processes back to the parent.
    pub fn remove(&self) -> Result<()> {
        if !self.owned {
            return Ok(());
        }

        match std::fs::remove_dir(&self.path) {
            Ok(()) => {
                log::debug!("Removed monitoring group `{}`", self.path.display());
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(Error::RemoveGroup {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// Returns the control group whose `tasks` file lists `pid`, or the root.
fn find_control_group(root: &Path, pid: u32) -> Result<PathBuf> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) => {
            log::debug!("Failed to list control groups in `{}`: {err}", root.display());
            return Ok(root.to_path_buf());
        }
    };

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|ty| ty.is_dir()))
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| !RESERVED_DIRS.contains(&name))
        })
        .map(|entry| entry.path())
        .collect();
    candidates.sort();

    for candidate in candidates {
        let tasks = candidate.join(TASKS);
        if tasks.is_file() && read_tasks(&tasks)?.contains(&pid) {
            return Ok(candidate);
        }
    }
    Ok(root.to_path_buf())
}

fn read_tasks(path: &Path) -> Result<HashSet<u32>> {
    let reader = fsutil::open_file_reader(path)?;
    let mut pids = HashSet::new();
    for line in reader.lines() {
        let line = line.map_err(|source| Error::ReadTasks {
            path: path.to_path_buf(),
            source,
        })?;
        if let Ok(pid) = line.trim().parse() {
            pids.insert(pid);
        }
    }
    Ok(pids)
}

/// Deletes the files a kernel-backed group would drop on `rmdir`, so a group in a plain
/// directory can be removed.
#[cfg(test)]
pub(super) fn clear_group(group: &Path) {
    let _ = std::fs::remove_file(group.join(TASKS));
    let _ = std::fs::remove_dir_all(group.join(MON_DATA));
}

fn read_counter(path: &Path) -> Result<u64> {
    let content = std::fs::read_to_string(path).map_err(|source| Error::ReadCounter {
        path: path.to_path_buf(),
        source,
    })?;
    let value = content.trim();
    if value == UNAVAILABLE {
        log::debug!("Counter `{}` is unavailable", path.display());
    }
    value.parse().map_err(|_| Error::InvalidCounter {
        path: path.to_path_buf(),
        value: value.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn resctrl_root(features: &str) -> (tempfile::TempDir, ResctrlSupport) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("info/L3_MON")).unwrap();
        fs::create_dir_all(dir.path().join(MON_GROUPS)).unwrap();
        fs::write(dir.path().join(TASKS), "1\n2\n").unwrap();
        let support = ResctrlSupport::new(dir.path(), features);
        (dir, support)
    }

    fn write_domain(group: &Path, domain: &str, llc: &str, total: &str, local: &str) {
        let dir = group.join(MON_DATA).join(domain);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("llc_occupancy"), llc).unwrap();
        fs::write(dir.join("mbm_total_bytes"), total).unwrap();
        fs::write(dir.join("mbm_local_bytes"), local).unwrap();
    }

    #[test]
    fn test_group_name() {
        assert_eq!(group_name("/docker/abc"), "creo--docker-abc");
        assert_eq!(group_name("abc"), "creo-abc");
        assert_eq!(group_name("/docker-abc"), "creo--docker_-abc");
        assert_eq!(group_name("a_b"), "creo-a__b");
    }

    #[test]
    fn test_group_names_are_distinct() {
        let containers = [
            "/docker/abc",
            "/docker-abc",
            "docker/abc",
            "/web",
            "web",
            "-web",
            "a-/b",
            "a/-b",
            "a_-b",
            "a-_b",
            "a__b",
            "a_/b",
        ];
        let names: HashSet<String> = containers.iter().map(|c| group_name(c)).collect();
        assert_eq!(names.len(), containers.len());
    }

    #[test]
    fn test_create_group_and_add_pids() {
        let (dir, support) = resctrl_root("llc_occupancy\n");

        let group = MonitoringGroup::create(&support, "/docker/abc", &[10, 11]).unwrap();
        assert_eq!(group.path(), dir.path().join("mon_groups/creo--docker-abc"));
        assert_eq!(
            fs::read_to_string(group.path().join(TASKS)).unwrap(),
            "10\n11\n"
        );

        group.add_pids(&[11, 12]).unwrap();
        assert_eq!(
            fs::read_to_string(group.path().join(TASKS)).unwrap(),
            "10\n11\n12\n"
        );
    }

    #[test]
    fn test_create_group_in_owning_control_group() {
        let (dir, support) = resctrl_root("llc_occupancy\n");
        let ctrl = dir.path().join("gold");
        fs::create_dir_all(ctrl.join(MON_GROUPS)).unwrap();
        fs::write(ctrl.join(TASKS), "42\n43\n").unwrap();

        let group = MonitoringGroup::create(&support, "web", &[42]).unwrap();
        assert_eq!(group.path(), ctrl.join("mon_groups/creo-web"));
    }

    #[test]
    fn test_create_group_without_mon_groups_fails() {
        let dir = tempfile::tempdir().unwrap();
        let support = ResctrlSupport::new(dir.path(), "llc_occupancy\n");

        let err = MonitoringGroup::create(&support, "web", &[]).unwrap_err();
        assert!(matches!(err, Error::CreateGroup { .. }));
    }

    #[test]
    fn test_remove_populated_directory_fails() {
        let (_dir, support) = resctrl_root("llc_occupancy\n");
        let group = MonitoringGroup::create(&support, "web", &[1]).unwrap();

        // Only a kernel-backed group can be removed while it still lists tasks.
        let err = group.remove().unwrap_err();
        assert!(matches!(err, Error::RemoveGroup { .. }));
        assert!(group.path().join(TASKS).exists());
    }

    #[test]
    fn test_root_group_is_never_removed() {
        let (dir, support) = resctrl_root("llc_occupancy\n");

        let group = MonitoringGroup::create(&support, ROOT_CONTAINER, &[5]).unwrap();
        assert_eq!(group.path(), dir.path());
        group.remove().unwrap();

        assert!(dir.path().is_dir());
        assert_eq!(fs::read_to_string(dir.path().join(TASKS)).unwrap(), "1\n2\n");
    }

    #[test]
    fn test_read_stats() {
        let (_dir, support) =
            resctrl_root("llc_occupancy\nmbm_total_bytes\nmbm_local_bytes\n");
        let group = MonitoringGroup::create(&support, "web", &[]).unwrap();
        write_domain(group.path(), "mon_L3_01", "300\n", "400\n", "500\n");
        write_domain(group.path(), "mon_L3_00", "100\n", "200\n", "150\n");

        let stats = group.read_stats(&support).unwrap();
        assert_eq!(
            stats,
            ResctrlStats {
                memory_bandwidth: vec![
                    MemoryBandwidthStats {
                        total_bytes: 200,
                        local_bytes: 150
                    },
                    MemoryBandwidthStats {
                        total_bytes: 400,
                        local_bytes: 500
                    },
                ],
                cache: vec![
                    CacheStats { llc_occupancy: 100 },
                    CacheStats { llc_occupancy: 300 },
                ],
            }
        );
    }

    #[test]
    fn test_read_stats_only_supported_features() {
        let (_dir, support) = resctrl_root("mbm_total_bytes\n");
        let group = MonitoringGroup::create(&support, "web", &[]).unwrap();
        write_domain(group.path(), "mon_L3_00", "Unavailable", "200", "Unavailable");

        let stats = group.read_stats(&support).unwrap();
        assert!(stats.cache.is_empty());
        assert_eq!(
            stats.memory_bandwidth,
            vec![MemoryBandwidthStats {
                total_bytes: 200,
                local_bytes: 0
            }]
        );
    }

    #[test]
    fn test_read_stats_unavailable_counter() {
        let (_dir, support) = resctrl_root("llc_occupancy\n");
        let group = MonitoringGroup::create(&support, "web", &[]).unwrap();
        write_domain(group.path(), "mon_L3_00", "Unavailable", "0", "0");

        match group.read_stats(&support).unwrap_err() {
            Error::InvalidCounter { value, .. } => assert_eq!(value, UNAVAILABLE),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_remove_group_twice() {
        let (_dir, support) = resctrl_root("llc_occupancy\n");
        let group = MonitoringGroup::create(&support, "web", &[1]).unwrap();
        write_domain(group.path(), "mon_L3_00", "1", "1", "1");
        clear_group(group.path());

        group.remove().unwrap();
        assert!(!group.path().exists());
        group.remove().unwrap();
    }
}
