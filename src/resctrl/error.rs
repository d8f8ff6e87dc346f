use std::path::PathBuf;

use crate::{fsutil, mountinfo};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to locate the resctrl filesystem: {0}")]
    Mount(#[from] mountinfo::Error),

    #[error("failed to read resctrl monitoring features `{path}`: {source}")]
    ReadFeatures {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("the resctrl filesystem at `{root}` isn't initialized")]
    NotInitialized { root: PathBuf },

    #[error("there are no monitoring features available in `{root}`")]
    NoMonitoringFeatures { root: PathBuf },

    #[error("container `{container}` already has a monitoring group")]
    GroupExists { container: String },

    #[error("monitoring of container `{container}` was stopped during setup")]
    SetupCancelled { container: String },

    #[error("failed to list processes of container `{container}`: {source}")]
    ListPids {
        container: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create monitoring group `{path}`: {source}")]
    CreateGroup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove monitoring group `{path}`: {source}")]
    RemoveGroup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    OpenTasks(#[from] fsutil::FileOpenError),

    #[error("failed to read tasks file `{path}`: {source}")]
    ReadTasks {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to add process {pid} to `{path}`: {source}")]
    AddPid {
        path: PathBuf,
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to list monitoring domains in `{path}`: {source}")]
    ListDomains {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read counter `{path}`: {source}")]
    ReadCounter {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid counter value in `{path}`: '{value}'")]
    InvalidCounter { path: PathBuf, value: String },
}

pub type Result<T> = std::result::Result<T, Error>;
