use std::io;
use std::path::{Path, PathBuf};

use super::{Entry, SysFs};

/// [`SysFs`] backed by the real filesystem of the host.
///
/// All paths are resolved below `rootfs`. On a bare host this is `/`; inside a container the
/// host root is usually bind-mounted somewhere like `/rootfs`.
#[derive(Debug, Clone)]
pub struct HostSysFs {
    rootfs: PathBuf,
}

impl Default for HostSysFs {
    fn default() -> Self {
        Self::new("/")
    }
}

impl HostSysFs {
    pub fn new(rootfs: impl Into<PathBuf>) -> Self {
        Self {
            rootfs: rootfs.into(),
        }
    }

    pub fn rootfs(&self) -> &Path {
        &self.rootfs
    }

    /// Maps an absolute host path to its location below the configured root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match path.strip_prefix("/") {
            Ok(relative) => self.rootfs.join(relative),
            Err(_) => self.rootfs.join(path),
        }
    }
}

impl SysFs for HostSysFs {
    fn list_entries(&self, path: &Path) -> io::Result<Vec<Entry>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(self.resolve(path))? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            // sysfs links CPUs and devices via symlinks, so follow them.
            let is_dir = std::fs::metadata(entry.path())
                .map(|m| m.is_dir())
                .unwrap_or(false);
            let host_path = path.join(&name);
            entries.push(Entry::new(name, host_path, is_dir));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn read_file(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(self.resolve(path))
    }
}
