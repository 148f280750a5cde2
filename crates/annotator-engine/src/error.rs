use std::path::PathBuf;

use annotator_build::BuildError;
use annotator_config::ConfigError;
use annotator_index::IndexError;
use annotator_injector::InjectError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Inject(#[from] InjectError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize reports: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// Writes `contents` to `path`, creating parent directories.
pub(crate) fn write_file(path: &std::path::Path, contents: &str) -> Result<()> {
    let io = |source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io)?;
    }
    std::fs::write(path, contents).map_err(io)
}
