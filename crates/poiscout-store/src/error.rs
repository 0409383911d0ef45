use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("document {namespace}/{key} is not valid JSON: {source}")]
    Decode {
        namespace: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode document {namespace}/{key}: {source}")]
    Encode {
        namespace: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("store lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn decode(namespace: &str, key: &str, source: serde_json::Error) -> Self {
        Self::Decode {
            namespace: namespace.to_string(),
            key: key.to_string(),
            source,
        }
    }

    pub(crate) fn encode(namespace: &str, key: &str, source: serde_json::Error) -> Self {
        Self::Encode {
            namespace: namespace.to_string(),
            key: key.to_string(),
            source,
        }
    }
}
