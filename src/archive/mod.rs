// Archive entry bookkeeping for test-only class exclusion.
//
// `ArchiveEntryKey` is the join key between "paths produced by test
// compilation" and "paths present in a shrunk archive". Keys are canonical
// root-relative paths and are compared only by exact string equality,
// never by content.

mod pruner;

pub use pruner::{ArchivePruner, PruneReport};

use crate::error::{Result, WeaveError};
use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Canonicalized path of an archive entry, relative to a compile output root.
/// Always `/`-separated, never containing `.` or `..` components.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArchiveEntryKey(String);

impl ArchiveEntryKey {
    /// Build a key from a path relative to an output root.
    ///
    /// Rejects absolute paths and any `.`/`..` components: recorded keys
    /// must match archive entry names exactly, and archive names are plain
    /// relative paths.
    pub fn from_relative(path: &Path) -> Result<Self> {
        use std::path::Component;

        let mut parts: Vec<&str> = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => {
                    let part = part.to_str().ok_or_else(|| {
                        WeaveError::Configuration(format!(
                            "non-UTF-8 path cannot be recorded: {}",
                            path.display()
                        ))
                    })?;
                    parts.push(part);
                }
                _ => {
                    return Err(WeaveError::Configuration(format!(
                        "entry key must be a plain relative path: {}",
                        path.display()
                    )))
                }
            }
        }
        if parts.is_empty() {
            return Err(WeaveError::Configuration(
                "entry key must not be empty".to_string(),
            ));
        }
        Ok(Self(parts.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArchiveEntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Lets a `BTreeSet<ArchiveEntryKey>` answer lookups for raw entry names.
impl Borrow<str> for ArchiveEntryKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Walk a compile output directory once and record every class file's
/// canonical, root-relative path.
///
/// This runs before the augmented shrink step executes; the resulting set
/// is consumed within the same build run and never persisted.
pub fn record_class_entries(root: &Path) -> Result<BTreeSet<ArchiveEntryKey>> {
    let mut recorded = BTreeSet::new();

    if !root.exists() {
        debug!("Class output directory does not exist yet: {}", root.display());
        return Ok(recorded);
    }

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            WeaveError::Configuration(format!(
                "failed to walk class output {}: {}",
                root.display(),
                e
            ))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("class") {
            continue;
        }
        let relative = path.strip_prefix(root).map_err(|_| {
            WeaveError::Configuration(format!(
                "walked path escaped its root: {}",
                path.display()
            ))
        })?;
        recorded.insert(ArchiveEntryKey::from_relative(relative)?);
    }

    debug!(
        "Recorded {} class entries under {}",
        recorded.len(),
        root.display()
    );
    Ok(recorded)
}
