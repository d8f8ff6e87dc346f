//! Virtual memory counters from `/proc/vmstat` and the per-node `node<N>/vmstat` files.
//!
//! Both files are lists of `name value` lines. Callers choose which counters they want with a
//! [`CounterFilter`], a regular expression matched anywhere in the counter name.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use creo_hostinfo::sysfs::{self, HostSysFs};
//! use creo_hostinfo::vmstat::{self, CounterFilter, NumaVmStatPattern};
//!
//! let fs = HostSysFs::default();
//! let filter = CounterFilter::new("workingset.*").unwrap();
//! let host = vmstat::parse_counters(&fs, &filter, Path::new(sysfs::VMSTAT_FILE)).unwrap();
//! let nodes =
//!     vmstat::parse_counters_per_node(&fs, &NumaVmStatPattern::default(), &filter).unwrap();
//! ```

mod error;
mod parser;

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use regex::Regex;

use crate::sysfs::{self, SysFs};
use crate::sysinfo::VmStatNuma;

pub use error::{Error, Result, StatParseError};
pub use parser::parse_counters_from_reader;

/// Selects counters by name.
///
/// The expression is not anchored: `workingset` accepts `workingset_refault_anon`, use `^...$`
/// for exact names.
#[derive(Debug, Clone, Default)]
pub struct CounterFilter {
    /// `None` accepts every name.
    regex: Option<Regex>,
}

impl CounterFilter {
    /// Compiles `filter` into a counter filter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Filter`] if `filter` is not a valid regular expression.
    pub fn new(filter: &str) -> Result<Self> {
        let regex = Regex::new(filter).map_err(|source| Error::Filter {
            filter: filter.to_owned(),
            source,
        })?;
        Ok(Self { regex: Some(regex) })
    }

    /// A filter accepting every counter.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.regex.as_ref().is_none_or(|regex| regex.is_match(name))
    }
}

/// Glob describing where the per-node counter files live, e.g.
/// `/sys/devices/system/node/node[0-9]*/vmstat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumaVmStatPattern {
    pattern: String,
}

impl Default for NumaVmStatPattern {
    fn default() -> Self {
        Self {
            pattern: sysfs::NUMA_VMSTAT_GLOB.to_owned(),
        }
    }
}

impl NumaVmStatPattern {
    /// Validates `pattern`, which must be an absolute path glob.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RelativePattern`] or [`Error::Pattern`] for an unusable glob.
    pub fn new(pattern: impl Into<String>) -> Result<Self> {
        let pattern = Self {
            pattern: pattern.into(),
        };
        pattern.components()?;
        Ok(pattern)
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Compiles every path component into a glob pattern.
    fn components(&self) -> Result<Vec<glob::Pattern>> {
        let path = Path::new(&self.pattern);
        if !path.is_absolute() {
            return Err(Error::RelativePattern {
                pattern: self.pattern.clone(),
            });
        }

        path.components()
            .filter_map(|component| match component {
                Component::Normal(name) => Some(name.to_string_lossy()),
                _ => None,
            })
            .map(|name| {
                glob::Pattern::new(&name).map_err(|source| Error::Pattern {
                    pattern: self.pattern.clone(),
                    source,
                })
            })
            .collect()
    }

    /// Resolves the glob through `fs`, in lexicographic order.
    fn matching_paths(&self, fs: &(impl SysFs + ?Sized)) -> Result<Vec<PathBuf>> {
        let mut candidates = vec![PathBuf::from("/")];
        for component in self.components()? {
            let mut next = Vec::new();
            for dir in &candidates {
                let Ok(entries) = fs.list_entries(dir) else {
                    continue;
                };
                next.extend(
                    entries
                        .iter()
                        .filter(|entry| component.matches(entry.name()))
                        .map(|entry| entry.path().to_path_buf()),
                );
            }
            candidates = next;
        }
        Ok(candidates)
    }
}

/// Reads the counters of the file at `path` whose names pass `filter`.
///
/// # Errors
///
/// Returns [`Error::Read`] if the file cannot be read and [`Error::Parse`] if an accepted
/// counter has a non-numeric value.
pub fn parse_counters(
    fs: &(impl SysFs + ?Sized),
    filter: &CounterFilter,
    path: &Path,
) -> Result<HashMap<String, u64>> {
    let content = fs.read_file(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_counters_from_reader(&mut content.as_bytes(), filter).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads the filtered counters of every NUMA node whose file matches `pattern`.
///
/// Entries come back in lexicographic path order, so `node11` precedes `node2`. A host without
/// per-node files yields an empty list.
///
/// # Errors
///
/// Fails on the first unreadable or malformed node file, or if a matched path carries no
/// `node<N>` component.
pub fn parse_counters_per_node(
    fs: &(impl SysFs + ?Sized),
    pattern: &NumaVmStatPattern,
    filter: &CounterFilter,
) -> Result<Vec<VmStatNuma>> {
    pattern
        .matching_paths(fs)?
        .into_iter()
        .map(|path| {
            let node_id = node_id(&path).ok_or_else(|| Error::MissingNodeId { path: path.clone() })?;
            let stats = parse_counters(fs, filter, &path)?;
            Ok(VmStatNuma { node_id, stats })
        })
        .collect()
}

/// Extracts `N` from the innermost `node<N>` component of `path`.
fn node_id(path: &Path) -> Option<String> {
    path.components().rev().find_map(|component| {
        let digits = component.as_os_str().to_str()?.strip_prefix("node")?;
        (!digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())).then(|| digits.to_owned())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sysfs::FakeSysFs;

    const VMSTAT: &str = "nr_free_pages 1000\n\
                          workingset_refault_anon 5\n\
                          workingset_refault_file 6\n\
                          pgfault 100\n\
                          pgmajfault 10\n\
                          thp_fault_alloc 3\n\
                          thp_collapse_alloc_failed 2\n";

    fn host() -> FakeSysFs {
        FakeSysFs::default().with_file("/proc/vmstat", VMSTAT)
    }

    #[test]
    fn test_parse_counters_all() {
        let counters =
            parse_counters(&host(), &CounterFilter::all(), Path::new("/proc/vmstat")).unwrap();
        assert_eq!(counters.len(), 7);
        assert_eq!(counters["nr_free_pages"], 1000);
        assert_eq!(counters["thp_collapse_alloc_failed"], 2);
    }

    #[test]
    fn test_parse_counters_prefix_filter() {
        let filter = CounterFilter::new("workingset.*").unwrap();
        let counters = parse_counters(&host(), &filter, Path::new("/proc/vmstat")).unwrap();
        assert_eq!(
            counters,
            HashMap::from([
                ("workingset_refault_anon".to_owned(), 5),
                ("workingset_refault_file".to_owned(), 6),
            ])
        );
    }

    #[test]
    fn test_parse_counters_unanchored_filter() {
        let filter = CounterFilter::new(".*(faults|failed).*").unwrap();
        let counters = parse_counters(&host(), &filter, Path::new("/proc/vmstat")).unwrap();
        assert_eq!(
            counters,
            HashMap::from([("thp_collapse_alloc_failed".to_owned(), 2)])
        );

        let filter = CounterFilter::new("fault").unwrap();
        let counters = parse_counters(&host(), &filter, Path::new("/proc/vmstat")).unwrap();
        assert_eq!(counters.len(), 3);
    }

    #[test]
    fn test_parse_counters_no_match() {
        let filter = CounterFilter::new("^does_not_exist$").unwrap();
        let counters = parse_counters(&host(), &filter, Path::new("/proc/vmstat")).unwrap();
        assert!(counters.is_empty());
    }

    #[test]
    fn test_parse_counters_missing_file() {
        let err = parse_counters(
            &FakeSysFs::default(),
            &CounterFilter::all(),
            Path::new("/proc/vmstat"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
    }

    #[test]
    fn test_parse_counters_invalid_value() {
        let fs = FakeSysFs::default().with_file("/proc/vmstat", "pgfault x\n");
        let err = parse_counters(&fs, &CounterFilter::all(), Path::new("/proc/vmstat")).unwrap_err();
        assert!(matches!(
            err,
            Error::Parse {
                source: StatParseError::InvalidKeyValue { line: 1, .. },
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_filter() {
        assert!(matches!(
            CounterFilter::new("(unclosed").unwrap_err(),
            Error::Filter { .. }
        ));
    }

    #[test]
    fn test_per_node_counters_in_lexicographic_order() {
        let fs = FakeSysFs::default()
            .with_file("/sys/devices/system/node/node0/vmstat", "nr_free_pages 1\npgfault 9\n")
            .with_file("/sys/devices/system/node/node11/vmstat", "nr_free_pages 11\n")
            .with_file("/sys/devices/system/node/node2/vmstat", "nr_free_pages 2\n")
            .with_file("/sys/devices/system/node/node3/meminfo", "")
            .with_file("/sys/devices/system/node/online", "0-11\n");

        let filter = CounterFilter::new("nr_free").unwrap();
        let nodes = parse_counters_per_node(&fs, &NumaVmStatPattern::default(), &filter).unwrap();

        let ids: Vec<_> = nodes.iter().map(|node| node.node_id.as_str()).collect();
        assert_eq!(ids, vec!["0", "11", "2"]);
        assert_eq!(
            nodes[0].stats,
            HashMap::from([("nr_free_pages".to_owned(), 1)])
        );
        assert_eq!(nodes[1].stats["nr_free_pages"], 11);
    }

    #[test]
    fn test_per_node_counters_without_numa() {
        let fs = host();
        let nodes =
            parse_counters_per_node(&fs, &NumaVmStatPattern::default(), &CounterFilter::all())
                .unwrap();
        assert!(nodes.is_empty());
    }

    #[test]
    fn test_per_node_counters_custom_pattern() {
        let fs = FakeSysFs::default().with_file("/fake/node5/vmstat", "pgfault 1\n");
        let pattern = NumaVmStatPattern::new("/fake/node*/vmstat").unwrap();
        let nodes = parse_counters_per_node(&fs, &pattern, &CounterFilter::all()).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].node_id, "5");
    }

    #[test]
    fn test_per_node_pattern_without_node_component() {
        let fs = FakeSysFs::default().with_file("/fake/zone1/vmstat", "pgfault 1\n");
        let pattern = NumaVmStatPattern::new("/fake/*/vmstat").unwrap();
        let err = parse_counters_per_node(&fs, &pattern, &CounterFilter::all()).unwrap_err();
        assert!(matches!(err, Error::MissingNodeId { .. }));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            NumaVmStatPattern::new("node*/vmstat").unwrap_err(),
            Error::RelativePattern { .. }
        ));
        assert!(matches!(
            NumaVmStatPattern::new("/sys/node[/vmstat").unwrap_err(),
            Error::Pattern { .. }
        ));
    }

    #[test]
    fn test_node_id() {
        assert_eq!(
            node_id(Path::new("/sys/devices/system/node/node12/vmstat")),
            Some("12".to_owned())
        );
        assert_eq!(node_id(Path::new("/sys/devices/system/node/vmstat")), None);
    }
}
