use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building or searching an index.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt segment {path}, line {line}: {reason}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("keys written out of order to {path}: {previous} then {next}")]
    UnsortedKeys {
        path: PathBuf,
        previous: String,
        next: String,
    },

    #[error("document id {got} does not follow {last}")]
    NonMonotonicDocument { last: u32, got: u32 },

    #[error("index variant {0} cannot be searched")]
    UnsupportedVariant(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        Error::Corrupt { path: path.into(), line, reason: reason.into() }
    }

    /// True for errors caused by the caller's arguments rather than by the data on disk.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_file() {
        let err = Error::corrupt("/tmp/index-00001.seg", 3, "missing ';'");
        assert_eq!(err.to_string(), "corrupt segment /tmp/index-00001.seg, line 3: missing ';'");
        assert!(!err.is_config());
        assert!(Error::Config("load factor".into()).is_config());
    }
}
