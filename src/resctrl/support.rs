use std::path::{Path, PathBuf};

use crate::mountinfo;

use super::{Error, Result};

const FS_TYPE: &str = "resctrl";
const MON_FEATURES: &str = "info/L3_MON/mon_features";

/// What the resctrl filesystem of the host can monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResctrlSupport {
    root: PathBuf,
    llc_occupancy: bool,
    mbm_total: bool,
    mbm_local: bool,
}

impl ResctrlSupport {
    /// Builds the support description of the resctrl filesystem at `root` from the content of
    /// its `info/L3_MON/mon_features` file.
    pub fn new(root: impl Into<PathBuf>, mon_features: &str) -> Self {
        let has = |feature: &str| mon_features.lines().any(|line| line.trim() == feature);
        Self {
            root: root.into(),
            llc_occupancy: has("llc_occupancy"),
            mbm_total: has("mbm_total_bytes"),
            mbm_local: has("mbm_local_bytes"),
        }
    }

    /// Root of the resctrl filesystem as seen by this process.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Cache monitoring technology (`llc_occupancy`).
    pub fn cache_monitoring(&self) -> bool {
        self.llc_occupancy
    }

    /// Memory bandwidth monitoring (`mbm_total_bytes` or `mbm_local_bytes`).
    pub fn bandwidth_monitoring(&self) -> bool {
        self.mbm_total || self.mbm_local
    }

    pub fn has_monitoring(&self) -> bool {
        self.cache_monitoring() || self.bandwidth_monitoring()
    }

    pub(crate) fn mbm_total(&self) -> bool {
        self.mbm_total
    }

    pub(crate) fn mbm_local(&self) -> bool {
        self.mbm_local
    }

    /// A mounted resctrl filesystem always exposes the `tasks` file of its default group.
    pub fn is_initialized(&self) -> bool {
        self.root.join("tasks").is_file()
    }
}

/// Locates the resctrl mount in `mountinfo` and probes its monitoring features.
///
/// The mount point is resolved below `rootfs`, the path at which the host root is visible to
/// this process. A mount without `info/L3_MON` reports no features.
///
/// # Errors
///
/// Returns [`Error::Mount`] if resctrl is not mounted and [`Error::ReadFeatures`] if the feature
/// list exists but cannot be read.
pub fn detect_support(mountinfo: impl AsRef<Path>, rootfs: &Path) -> Result<ResctrlSupport> {
    let mount_point = mountinfo::detect_mount_point(mountinfo, FS_TYPE)?;
    let root = rootfs.join(mount_point.strip_prefix("/").unwrap_or(&mount_point));

    let features_path = root.join(MON_FEATURES);
    let features = match std::fs::read_to_string(&features_path) {
        Ok(features) => features,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("resctrl at `{}` offers no L3 monitoring", root.display());
            String::new()
        }
        Err(source) => {
            return Err(Error::ReadFeatures {
                path: features_path,
                source,
            });
        }
    };

    let support = ResctrlSupport::new(root, &features);
    log::debug!(
        "resctrl at `{}`: cache monitoring={}, bandwidth monitoring={}",
        support.root().display(),
        support.cache_monitoring(),
        support.bandwidth_monitoring()
    );
    Ok(support)
}
