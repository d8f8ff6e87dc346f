use std::collections::BTreeMap;
use std::path::Path;

use crate::sysfs::{self, SysFs};

use super::model::DiskInfo;
use super::{Error, Result};

/// Device name prefixes that never describe a physical disk.
const IGNORED_DEVICES: [&str; 3] = ["loop", "ram", "sr"];
const SECTOR_SIZE: u64 = 512;
const NO_SCHEDULER: &str = "none";

/// Enumerates the block devices of the host, keyed by `major:minor`.
///
/// Loop, ram and optical devices are skipped.
///
/// # Errors
///
/// Fails if `/sys/block` cannot be listed or a device lacks a readable `dev` or `size`.
pub fn block_devices(fs: &(impl SysFs + ?Sized)) -> Result<BTreeMap<String, DiskInfo>> {
    let dir = Path::new(sysfs::BLOCK_DIR);
    let entries = fs.list_entries(dir).map_err(|source| Error::ListDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut disks = BTreeMap::new();
    for entry in entries {
        let name = entry.name();
        if IGNORED_DEVICES.iter().any(|prefix| name.starts_with(prefix)) {
            continue;
        }

        let dev_path = entry.path().join("dev");
        let dev = read_attribute(fs, &dev_path)?;
        let (major, minor) = parse_device_number(&dev).ok_or_else(|| Error::InvalidAttribute {
            path: dev_path.clone(),
            value: dev.clone(),
        })?;

        let size_path = entry.path().join("size");
        let sectors = read_attribute(fs, &size_path)?;
        let sectors = sectors
            .parse::<u64>()
            .map_err(|_| Error::InvalidAttribute {
                path: size_path.clone(),
                value: sectors.clone(),
            })?;

        let scheduler = fs
            .read_file(&entry.path().join("queue/scheduler"))
            .ok()
            .and_then(|content| active_scheduler(&content).map(str::to_owned))
            .unwrap_or_else(|| NO_SCHEDULER.to_owned());

        disks.insert(
            format!("{major}:{minor}"),
            DiskInfo {
                name: name.to_owned(),
                major,
                minor,
                size: sectors.saturating_mul(SECTOR_SIZE),
                scheduler,
            },
        );
    }

    Ok(disks)
}

fn read_attribute(fs: &(impl SysFs + ?Sized), path: &Path) -> Result<String> {
    fs.read_file(path)
        .map(|content| content.trim().to_owned())
        .map_err(|source| Error::ReadAttribute {
            path: path.to_path_buf(),
            source,
        })
}

fn parse_device_number(value: &str) -> Option<(u64, u64)> {
    let (major, minor) = value.split_once(':')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

/// Picks the active entry of a `queue/scheduler` file, e.g. `mq-deadline` from
/// `[mq-deadline] kyber bfq none`.
fn active_scheduler(content: &str) -> Option<&str> {
    let start = content.find('[')?;
    let rest = &content[start + 1..];
    let end = rest.find(']')?;
    Some(&rest[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sysfs::FakeSysFs;

    #[test]
    fn test_block_devices() {
        let fs = FakeSysFs::default()
            .with_file("/sys/block/sda/dev", "8:0\n")
            .with_file("/sys/block/sda/size", "1000\n")
            .with_file(
                "/sys/block/sda/queue/scheduler",
                "[mq-deadline] kyber bfq none\n",
            )
            .with_file("/sys/block/nvme0n1/dev", "259:0\n")
            .with_file("/sys/block/nvme0n1/size", "2\n")
            .with_file("/sys/block/nvme0n1/queue/scheduler", "none\n")
            .with_file("/sys/block/loop0/dev", "7:0\n")
            .with_file("/sys/block/ram0/dev", "1:0\n")
            .with_file("/sys/block/sr0/dev", "11:0\n");

        let disks = block_devices(&fs).unwrap();
        assert_eq!(disks.len(), 2);
        assert_eq!(
            disks["8:0"],
            DiskInfo {
                name: "sda".to_owned(),
                major: 8,
                minor: 0,
                size: 512_000,
                scheduler: "mq-deadline".to_owned(),
            }
        );
        assert_eq!(disks["259:0"].size, 1024);
        assert_eq!(disks["259:0"].scheduler, "none");
    }

    #[test]
    fn test_block_device_without_scheduler() {
        let fs = FakeSysFs::default()
            .with_file("/sys/block/vda/dev", "252:0")
            .with_file("/sys/block/vda/size", "8");

        let disks = block_devices(&fs).unwrap();
        assert_eq!(disks["252:0"].scheduler, "none");
    }

    #[test]
    fn test_block_device_invalid_dev() {
        let fs = FakeSysFs::default()
            .with_file("/sys/block/sda/dev", "eight")
            .with_file("/sys/block/sda/size", "8");

        let err = block_devices(&fs).unwrap_err();
        match err {
            Error::InvalidAttribute { value, .. } => assert_eq!(value, "eight"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_block_device_missing_size() {
        let fs = FakeSysFs::default().with_file("/sys/block/sda/dev", "8:0");
        assert!(matches!(
            block_devices(&fs).unwrap_err(),
            Error::ReadAttribute { .. }
        ));
    }

    #[test]
    fn test_block_devices_missing_dir() {
        let fs = FakeSysFs::default();
        assert!(matches!(
            block_devices(&fs).unwrap_err(),
            Error::ListDir { .. }
        ));
    }

    #[test]
    fn test_active_scheduler() {
        assert_eq!(active_scheduler("noop [deadline] cfq"), Some("deadline"));
        assert_eq!(active_scheduler("none"), None);
        assert_eq!(active_scheduler("[broken"), None);
    }
}
