use std::path::Path;

use crate::sysfs::SysFs;

use super::{Error, Result};

const MEM_TOTAL_FIELD: &str = "MemTotal:";

/// Returns the total memory of a NUMA node in bytes, read from `<node_dir>/meminfo`.
///
/// The per-node file prefixes every line with `Node <N>`, e.g.
/// `Node 0 MemTotal:       32817192 kB`. An unreadable `meminfo` yields `0`.
///
/// # Errors
///
/// - [`Error::MissingMemTotal`] if the file has no `MemTotal:` line.
/// - [`Error::ParseMemTotal`] if the value is not a number of kB.
pub fn node_memory(fs: &(impl SysFs + ?Sized), node_dir: &Path) -> Result<u64> {
    let path = node_dir.join("meminfo");
    let content = match fs.read_file(&path) {
        Ok(content) => content,
        Err(err) => {
            log::debug!("No memory information in `{}`: {err}", path.display());
            return Ok(0);
        }
    };

    let value = content
        .lines()
        .find_map(|line| {
            let (_, rest) = line.split_once(MEM_TOTAL_FIELD)?;
            Some(rest.split_whitespace().next().unwrap_or(""))
        })
        .ok_or_else(|| Error::MissingMemTotal { path: path.clone() })?;

    let kb = value.parse::<u64>().map_err(|source| Error::ParseMemTotal {
        path: path.clone(),
        value: value.to_owned(),
        source,
    })?;

    Ok(kb.saturating_mul(1024))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sysfs::FakeSysFs;

    const NODE: &str = "/sys/devices/system/node/node0";

    #[test]
    fn test_node_memory() {
        let fs = FakeSysFs::default().with_file(
            format!("{NODE}/meminfo"),
            "Node 0 MemTotal:       32817192 kB\nNode 0 MemFree:        1000 kB\n",
        );
        assert_eq!(
            node_memory(&fs, Path::new(NODE)).unwrap(),
            32817192 * 1024
        );
    }

    #[test]
    fn test_node_memory_without_node_prefix() {
        let fs = FakeSysFs::default().with_file(format!("{NODE}/meminfo"), "MemTotal:       32817192 kB");
        assert_eq!(node_memory(&fs, Path::new(NODE)).unwrap(), 33604804608);
    }

    #[test]
    fn test_node_memory_missing_mem_total() {
        let fs = FakeSysFs::default().with_file(format!("{NODE}/meminfo"), "MemXXX:       32817192 kB");
        let err = node_memory(&fs, Path::new(NODE)).unwrap_err();
        assert!(matches!(err, Error::MissingMemTotal { .. }));
    }

    #[test]
    fn test_node_memory_invalid_mem_total() {
        let fs = FakeSysFs::default().with_file(format!("{NODE}/meminfo"), "Node 0 MemTotal: lots kB");
        let err = node_memory(&fs, Path::new(NODE)).unwrap_err();
        match err {
            Error::ParseMemTotal { value, .. } => assert_eq!(value, "lots"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_node_memory_unreadable_file() {
        let fs = FakeSysFs::default().with_unreadable(
            format!("{NODE}/meminfo"),
            std::io::ErrorKind::PermissionDenied,
        );
        assert_eq!(node_memory(&fs, Path::new(NODE)).unwrap(), 0);

        let fs = FakeSysFs::default().with_dir(NODE);
        assert_eq!(node_memory(&fs, Path::new(NODE)).unwrap(), 0);
    }
}
