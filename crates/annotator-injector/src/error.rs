use std::path::PathBuf;

use annotator_core::edit::EditError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InjectError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid edit for {path}: {source}")]
    Edit {
        path: PathBuf,
        #[source]
        source: EditError,
    },
}

pub type Result<T, E = InjectError> = std::result::Result<T, E>;
