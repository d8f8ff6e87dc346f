//! Mountinfo line parser for Linux systems.
//!
//! Parses lines in `/proc/[pid]/mountinfo` format. See
//! [`proc_pid_mountinfo(5)`](https://man7.org/linux/man-pages/man5/proc_pid_mountinfo.5.html)
//! for details on the structure.

use std::borrow::Cow;

/// The parts of a mountinfo line needed to locate a filesystem.
#[derive(Debug, PartialEq, Eq)]
pub struct MountEntry<'a> {
    /// Root of the mount within the filesystem.
    pub root: Cow<'a, str>,
    /// Mount point relative to the process's root, with octal escapes (`\040`) decoded.
    pub mount_point: Cow<'a, str>,
    /// Filesystem type (e.g., `resctrl`, `cgroup2`).
    pub fs_type: &'a str,
}

/// Named fields in a mountinfo line.
#[derive(Debug)]
pub enum MountInfoField {
    Root,
    MountPoint,
    FsType,
}

impl std::fmt::Display for MountInfoField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MountInfoField::Root => "root",
            MountInfoField::MountPoint => "mount_point",
            MountInfoField::FsType => "fs_type",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("missing separator ` - ` in line: `{0}`")]
    MissingSeparator(String),

    #[error("missing `{field}` in line: `{line}`")]
    MissingField { field: MountInfoField, line: String },
}

/// Parses a single line of mountinfo data.
///
/// # Errors
///
/// Returns [`ParseError`] if the ` - ` separator or a required field is missing.
pub fn parse_mount_entry(line: &str) -> Result<MountEntry<'_>, ParseError> {
    let (pre, post) = line
        .split_once(" - ")
        .ok_or_else(|| ParseError::MissingSeparator(line.trim_end().to_owned()))?;
    let missing = |field| ParseError::MissingField {
        field,
        line: line.trim_end().to_owned(),
    };

    // mount id, parent id and major:minor precede the root
    let mut pre_fields = pre.split_whitespace().skip(3);
    let root = pre_fields.next().ok_or_else(|| missing(MountInfoField::Root))?;
    let mount_point = pre_fields
        .next()
        .ok_or_else(|| missing(MountInfoField::MountPoint))?;
    let fs_type = post
        .split_whitespace()
        .next()
        .ok_or_else(|| missing(MountInfoField::FsType))?;

    Ok(MountEntry {
        root: unescape(root),
        mount_point: unescape(mount_point),
        fs_type,
    })
}

/// Decodes the `\ooo` octal escapes the kernel uses for whitespace and backslashes in paths.
fn unescape(field: &str) -> Cow<'_, str> {
    if !field.contains('\\') {
        return Cow::Borrowed(field);
    }

    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escaped = bytes
            .get(i + 1..i + 4)
            .filter(|_| bytes[i] == b'\\')
            .and_then(|digits| std::str::from_utf8(digits).ok())
            .and_then(|digits| u8::from_str_radix(digits, 8).ok());
        match escaped {
            Some(byte) => {
                out.push(byte);
                i += 4;
            }
            None => {
                out.push(bytes[i]);
                i += 1;
            }
        }
    }
    Cow::Owned(String::from_utf8_lossy(&out).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_resctrl_line() {
        let line = "33 24 0:28 / /sys/fs/resctrl rw,relatime shared:14 - resctrl resctrl rw";
        let entry = parse_mount_entry(line).unwrap();
        assert_eq!(entry.root, "/");
        assert_eq!(entry.mount_point, "/sys/fs/resctrl");
        assert_eq!(entry.fs_type, "resctrl");
    }

    #[test]
    fn parses_line_without_optional_fields() {
        let line = "36 25 0:32 / /sys - sysfs sysfs rw";
        let entry = parse_mount_entry(line).unwrap();
        assert_eq!(entry.fs_type, "sysfs");
        assert_eq!(entry.mount_point, "/sys");
    }

    #[test]
    fn decodes_escaped_mount_point() {
        let line = r"90 35 0:50 / /mnt/my\040disk rw - ext4 /dev/sdc1 rw";
        let entry = parse_mount_entry(line).unwrap();
        assert_eq!(entry.mount_point, "/mnt/my disk");
        assert_eq!(unescape(r"a\134b"), r"a\b");
        assert_eq!(unescape(r"trailing\04"), r"trailing\04");
    }

    #[test]
    fn error_on_missing_separator() {
        let line = "42 35 0:22 / /mnt rw,nosuid ext4 /dev/sda1 rw";
        let err = parse_mount_entry(line).unwrap_err();
        assert!(matches!(err, ParseError::MissingSeparator(_)));
    }

    #[test]
    fn error_on_missing_mount_point() {
        let line = "42 35 0:22 / - ext4 /dev/sda1 rw";
        match parse_mount_entry(line).unwrap_err() {
            ParseError::MissingField { field, .. } => {
                assert_eq!(field.to_string(), "mount_point");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn error_on_missing_fs_type() {
        let line = "42 35 0:22 / /mnt rw - ";
        match parse_mount_entry(line).unwrap_err() {
            ParseError::MissingField { field, .. } => assert_eq!(field.to_string(), "fs_type"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn error_on_empty_line() {
        let err = parse_mount_entry("").unwrap_err();
        assert!(matches!(err, ParseError::MissingSeparator(_)));
    }
}
