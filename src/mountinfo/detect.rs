use crate::fsutil;

use super::parser::parse_mount_entry;
use super::{Error, Result};
use std::io::BufRead;
use std::path::{Path, PathBuf};

/// Detects the mount point of a filesystem of type `fs_type` by parsing a Linux `mountinfo`
/// file (e.g., `/proc/self/mountinfo`).
///
/// If the filesystem is mounted more than once, the first mount is returned.
///
/// # Errors
///
/// - [`Error::FileOpen`] if the file can't be opened.
/// - [`Error::ReadLine`] if reading from the file fails.
/// - [`Error::Parse`] if parsing any line fails.
/// - [`Error::MissingMount`] if no mount of `fs_type` is found.
///
/// # Example
///
/// ```no_run
/// use creo_hostinfo::mountinfo::detect_mount_point;
///
/// let resctrl = detect_mount_point("/proc/self/mountinfo", "resctrl").unwrap();
/// println!("resctrl root: {}", resctrl.display());
/// ```
pub fn detect_mount_point(path: impl AsRef<Path>, fs_type: &str) -> Result<PathBuf> {
    let path = path.as_ref();
    let buf = fsutil::open_file_reader(path)?;

    detect_mount_point_from_reader(buf, path, fs_type)
}

/// Scans `reader` for the first mount of `fs_type`. `origin` names the data in errors.
fn detect_mount_point_from_reader<R: BufRead>(
    mut reader: R,
    origin: &Path,
    fs_type: &str,
) -> Result<PathBuf> {
    let mut line = String::with_capacity(256);

    while reader
        .read_line(&mut line)
        .map_err(|source| Error::ReadLine {
            path: origin.to_path_buf(),
            source,
        })?
        != 0
    {
        let entry = parse_mount_entry(line.as_str()).map_err(|source| Error::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        if entry.fs_type == fs_type {
            log::debug!(
                "Found `{fs_type}` mount point with root `{}`: {}",
                entry.root,
                entry.mount_point
            );
            return Ok(PathBuf::from(entry.mount_point.as_ref()));
        }

        line.clear();
    }

    Err(Error::MissingMount {
        fs_type: fs_type.to_owned(),
        path: origin.to_path_buf(),
    })
}
