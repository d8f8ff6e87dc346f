use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use super::{Entry, SysFs};

#[derive(Debug, Clone)]
enum FakeNode {
    File(String),
    Dir,
    Unreadable(io::ErrorKind),
}

/// In-memory [`SysFs`] used to describe a fabricated host in tests.
///
/// Directories do not need to be declared: every ancestor of an inserted file exists implicitly.
/// Empty directories can be added with [`FakeSysFs::with_dir`].
///
/// # Example
///
/// ```
/// # use std::path::Path;
/// # use creo_hostinfo::sysfs::{FakeSysFs, SysFs};
/// let fs = FakeSysFs::default()
///     .with_file("/sys/devices/system/cpu/cpu0/topology/core_id", "0\n");
///
/// let entries = fs.list_entries(Path::new("/sys/devices/system/cpu")).unwrap();
/// assert_eq!(entries[0].name(), "cpu0");
/// assert!(entries[0].is_dir());
/// ```
#[derive(Debug, Clone, Default)]
pub struct FakeSysFs {
    nodes: BTreeMap<PathBuf, FakeNode>,
}

impl FakeSysFs {
    /// Adds a readable file with the given content.
    pub fn with_file(mut self, path: impl AsRef<Path>, content: impl Into<String>) -> Self {
        self.insert_file(path, content);
        self
    }

    /// Adds an (initially empty) directory.
    pub fn with_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.nodes.insert(path.as_ref().to_path_buf(), FakeNode::Dir);
        self
    }

    /// Adds a file that exists in listings but fails with `kind` when read.
    pub fn with_unreadable(mut self, path: impl AsRef<Path>, kind: io::ErrorKind) -> Self {
        self.nodes
            .insert(path.as_ref().to_path_buf(), FakeNode::Unreadable(kind));
        self
    }

    /// Adds or replaces a readable file in place.
    pub fn insert_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        self.nodes.insert(
            path.as_ref().to_path_buf(),
            FakeNode::File(content.into()),
        );
    }

    /// Removes a file or directory and everything below it.
    pub fn remove(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.nodes.retain(|p, _| !p.starts_with(path));
    }

    fn is_implicit_dir(&self, path: &Path) -> bool {
        self.nodes
            .keys()
            .any(|p| p != path && p.starts_with(path))
    }
}

impl SysFs for FakeSysFs {
    fn list_entries(&self, path: &Path) -> io::Result<Vec<Entry>> {
        match self.nodes.get(path) {
            Some(FakeNode::File(_)) | Some(FakeNode::Unreadable(_)) => {
                return Err(io::Error::new(
                    io::ErrorKind::NotADirectory,
                    format!("`{}` is not a directory", path.display()),
                ));
            }
            Some(FakeNode::Dir) => {}
            None if self.is_implicit_dir(path) => {}
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("`{}` does not exist", path.display()),
                ));
            }
        }

        let mut children: BTreeMap<String, Entry> = BTreeMap::new();
        for (p, node) in &self.nodes {
            let Ok(rest) = p.strip_prefix(path) else {
                continue;
            };
            let mut components = rest.components();
            let Some(first) = components.next() else {
                continue;
            };
            let name = first.as_os_str().to_string_lossy().into_owned();
            let is_dir = components.next().is_some() || matches!(node, FakeNode::Dir);
            let child = path.join(&name);
            children
                .entry(name.clone())
                .and_modify(|entry| entry.is_dir |= is_dir)
                .or_insert_with(|| Entry::new(name, child, is_dir));
        }

        Ok(children.into_values().collect())
    }

    fn read_file(&self, path: &Path) -> io::Result<String> {
        match self.nodes.get(path) {
            Some(FakeNode::File(content)) => Ok(content.clone()),
            Some(FakeNode::Unreadable(kind)) => Err(io::Error::new(
                *kind,
                format!("failed to read `{}`", path.display()),
            )),
            Some(FakeNode::Dir) => Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("`{}` is a directory", path.display()),
            )),
            None if self.is_implicit_dir(path) => Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("`{}` is a directory", path.display()),
            )),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("`{}` does not exist", path.display()),
            )),
        }
    }
}
