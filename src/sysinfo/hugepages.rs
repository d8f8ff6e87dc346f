use std::path::Path;

use crate::sysfs::SysFs;

use super::model::HugePageStat;
use super::{Error, Result};

const DIR_PREFIX: &str = "hugepages-";
const DIR_SUFFIX: &str = "kB";

/// Reads the huge page pools below `dir` (e.g. `/sys/devices/system/node/node0/hugepages`).
///
/// Each pool is a `hugepages-<size>kB` directory containing an `nr_hugepages` file. A missing
/// `dir` means huge pages are unsupported and yields an empty list.
///
/// # Errors
///
/// - [`Error::HugePageSize`] if a pool directory name is malformed.
/// - [`Error::ReadHugePages`] if a `nr_hugepages` file cannot be read.
/// - [`Error::ParseHugePages`] if a `nr_hugepages` file does not hold a number.
pub fn huge_pages(fs: &(impl SysFs + ?Sized), dir: &Path) -> Result<Vec<HugePageStat>> {
    let entries = match fs.list_entries(dir) {
        Ok(entries) => entries,
        Err(err) => {
            log::debug!("No huge page information in `{}`: {err}", dir.display());
            return Ok(Vec::new());
        }
    };

    let mut stats = Vec::with_capacity(entries.len());
    for entry in &entries {
        let page_size_kb = parse_page_size(entry.name()).ok_or_else(|| Error::HugePageSize {
            path: dir.to_path_buf(),
            name: entry.name().to_owned(),
        })?;

        let nr_path = entry.path().join("nr_hugepages");
        let raw = fs
            .read_file(&nr_path)
            .map_err(|source| Error::ReadHugePages {
                path: nr_path.clone(),
                source,
            })?;
        let value = raw.trim();
        let num_pages = value
            .parse::<u64>()
            .map_err(|source| Error::ParseHugePages {
                path: nr_path.clone(),
                value: value.to_owned(),
                source,
            })?;

        stats.push(HugePageStat {
            page_size_kb,
            num_pages,
        });
    }

    Ok(stats)
}

/// Extracts the page size from a `hugepages-<size>kB` directory name.
fn parse_page_size(name: &str) -> Option<u64> {
    name.strip_prefix(DIR_PREFIX)?
        .strip_suffix(DIR_SUFFIX)?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sysfs::FakeSysFs;

    const DIR: &str = "/sys/devices/system/node/node0/hugepages";

    #[test]
    fn test_huge_pages() {
        let fs = FakeSysFs::default()
            .with_file(format!("{DIR}/hugepages-2048kB/nr_hugepages"), "1\n")
            .with_file(format!("{DIR}/hugepages-1048576kB/nr_hugepages"), "2\n");

        let stats = huge_pages(&fs, Path::new(DIR)).unwrap();
        assert_eq!(
            stats,
            vec![
                HugePageStat {
                    page_size_kb: 1048576,
                    num_pages: 2
                },
                HugePageStat {
                    page_size_kb: 2048,
                    num_pages: 1
                },
            ]
        );
    }

    #[test]
    fn test_huge_pages_missing_dir() {
        let fs = FakeSysFs::default();
        assert!(huge_pages(&fs, Path::new(DIR)).unwrap().is_empty());
    }

    #[test]
    fn test_huge_pages_wrong_dir_name() {
        let fs = FakeSysFs::default().with_file(format!("{DIR}/hugepages-abckB/nr_hugepages"), "1");

        let err = huge_pages(&fs, Path::new(DIR)).unwrap_err();
        match err {
            Error::HugePageSize { name, .. } => assert_eq!(name, "hugepages-abckB"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_huge_pages_unreadable_count() {
        let fs = FakeSysFs::default()
            .with_file(format!("{DIR}/hugepages-2048kB/nr_hugepages"), "1")
            .with_unreadable(
                format!("{DIR}/hugepages-1048576kB/nr_hugepages"),
                std::io::ErrorKind::PermissionDenied,
            );

        let err = huge_pages(&fs, Path::new(DIR)).unwrap_err();
        assert!(matches!(err, Error::ReadHugePages { .. }));
    }

    #[test]
    fn test_huge_pages_wrong_count() {
        let fs = FakeSysFs::default()
            .with_file(format!("{DIR}/hugepages-2048kB/nr_hugepages"), "*****")
            .with_file(format!("{DIR}/hugepages-1048576kB/nr_hugepages"), "1");

        let err = huge_pages(&fs, Path::new(DIR)).unwrap_err();
        match err {
            Error::ParseHugePages { value, .. } => assert_eq!(value, "*****"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
