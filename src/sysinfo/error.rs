use std::num::ParseIntError;
use std::path::PathBuf;

/// Errors that abort hardware discovery.
///
/// Only malformed data is reported here. Missing optional information (caches, huge pages,
/// offline CPUs, ...) never produces an error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid huge page directory `{name}` in `{path}`")]
    HugePageSize { path: PathBuf, name: String },

    #[error("failed to read huge page count `{path}`: {source}")]
    ReadHugePages {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid huge page count in `{path}`: '{value}': {source}")]
    ParseHugePages {
        path: PathBuf,
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("missing `MemTotal` in `{path}`")]
    MissingMemTotal { path: PathBuf },

    #[error("invalid `MemTotal` value in `{path}`: '{value}': {source}")]
    ParseMemTotal {
        path: PathBuf,
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("failed to list `{path}`: {source}")]
    ListDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read `{path}`: {source}")]
    ReadAttribute {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value in `{path}`: '{value}'")]
    InvalidAttribute { path: PathBuf, value: String },
}

pub type Result<T> = std::result::Result<T, Error>;
