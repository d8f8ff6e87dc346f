use std::num::ParseIntError;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to interpret one line of a `name value` counter file.
#[derive(Debug, Error)]
pub enum StatParseError {
    #[error("invalid value for '{key}' at line {line}: '{value}': {source}")]
    InvalidKeyValue {
        key: String,
        value: String,
        line: usize,
        #[source]
        source: ParseIntError,
    },

    #[error("error during I/O: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read counters from `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse counters in `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: StatParseError,
    },

    #[error("invalid counter filter '{filter}': {source}")]
    Filter {
        filter: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid per-node counter pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("per-node counter pattern '{pattern}' is not an absolute path")]
    RelativePattern { pattern: String },

    #[error("no `node<N>` component in `{path}`")]
    MissingNodeId { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, Error>;
