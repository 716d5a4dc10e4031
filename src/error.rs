// Failure taxonomy for build-graph augmentation.
//
// Only runtime absence (introspection finding no Kotlin runtime) recovers
// locally, and it is modeled as `Ok(None)` rather than an error. Everything
// below halts the owning task and its dependents; none of these conditions
// is retried.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WeaveError {
    /// An unsupported combination of host-build state was requested.
    /// Fails the setup phase before any task runs.
    #[error("unsupported build configuration: {0}")]
    Configuration(String),

    /// One of the two compilers in a joint compile step reported errors.
    /// `diagnostics` carries the compiler's own output, unmodified.
    #[error("{compiler} compilation failed:\n{diagnostics}")]
    SubCompiler {
        compiler: String,
        diagnostics: String,
    },

    /// Archive pruning or the dedicated test shrink pass could not complete
    /// cleanly. The original archive is left untouched; a half-pruned
    /// archive is never reported as success.
    #[error("archive integrity failure in {}: {detail}", .archive.display())]
    ArchiveIntegrity { archive: PathBuf, detail: String },

    /// Task graph misuse: unknown task, duplicate name, or a dependency cycle.
    #[error("task graph error: {0}")]
    Graph(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WeaveError>;

impl WeaveError {
    /// Wrap a zip or I/O failure against a specific archive.
    pub fn archive(archive: &std::path::Path, err: impl std::fmt::Display) -> Self {
        WeaveError::ArchiveIntegrity {
            archive: archive.to_path_buf(),
            detail: err.to_string(),
        }
    }
}
