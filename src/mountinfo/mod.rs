//! Locating pseudo-filesystem mounts (`resctrl`, `cgroup2`, ...) from `/proc/self/mountinfo`.

mod detect;
mod error;
mod parser;

pub use detect::detect_mount_point;
pub use error::{Error, Result};
pub use parser::{MountEntry, ParseError, parse_mount_entry};
