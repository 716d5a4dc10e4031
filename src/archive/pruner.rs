// Set-difference surgery on shrunk archives.
//
// The shrinker legitimately retains test-only classes to satisfy the
// combined reachability closure; the shipped artifact must not contain
// them. Matching is exact-path against the recorded key set, never
// reachability- or content-based.

use crate::archive::ArchiveEntryKey;
use crate::error::{Result, WeaveError};
use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::{ZipArchive, ZipWriter};

/// Outcome of a prune pass across one or more archives.
#[derive(Debug, Default)]
pub struct PruneReport {
    /// (archive, entries removed) per processed archive.
    pub removed: Vec<(PathBuf, usize)>,
}

impl PruneReport {
    pub fn total_removed(&self) -> usize {
        self.removed.iter().map(|(_, n)| n).sum()
    }
}

/// Removes recorded test-only entries from shrink output archives.
pub struct ArchivePruner;

impl ArchivePruner {
    pub fn new() -> Self {
        Self
    }

    /// Remove every entry whose path exactly matches a recorded key, from
    /// each archive in turn.
    ///
    /// Per archive the operation is atomic: surviving entries are raw-copied
    /// (no recompression) into a sibling temporary file which replaces the
    /// original only after a complete, synced write. Any failure leaves the
    /// original untouched and is fatal for the owning step; partial removal
    /// is never reported as success. A recorded key absent from an archive
    /// is not an error, so re-running with the same set is a no-op.
    pub fn prune(
        &self,
        archives: &[PathBuf],
        recorded: &BTreeSet<ArchiveEntryKey>,
    ) -> Result<PruneReport> {
        let mut report = PruneReport::default();

        for archive in archives {
            let removed = self.prune_one(archive, recorded)?;
            report.removed.push((archive.clone(), removed));
        }

        info!(
            "Pruned {} entries across {} archive(s)",
            report.total_removed(),
            archives.len()
        );
        Ok(report)
    }

    fn prune_one(&self, archive: &Path, recorded: &BTreeSet<ArchiveEntryKey>) -> Result<usize> {
        let reader = File::open(archive).map_err(|e| WeaveError::archive(archive, e))?;
        let mut source =
            ZipArchive::new(reader).map_err(|e| WeaveError::archive(archive, e))?;

        let parent = archive.parent().unwrap_or_else(|| Path::new("."));
        let temp = tempfile::Builder::new()
            .prefix(".prune-")
            .suffix(".jar")
            .tempfile_in(parent)
            .map_err(|e| WeaveError::archive(archive, e))?;
        let temp_file = temp
            .as_file()
            .try_clone()
            .map_err(|e| WeaveError::archive(archive, e))?;

        let mut writer = ZipWriter::new(temp_file);
        let mut removed = 0usize;

        for index in 0..source.len() {
            let entry = source
                .by_index_raw(index)
                .map_err(|e| WeaveError::archive(archive, e))?;

            if recorded.contains(entry.name()) {
                debug!("Removing {} from {}", entry.name(), archive.display());
                removed += 1;
                continue;
            }

            writer
                .raw_copy_file(entry)
                .map_err(|e| WeaveError::archive(archive, e))?;
        }

        let finished = writer
            .finish()
            .map_err(|e| WeaveError::archive(archive, e))?;
        finished
            .sync_all()
            .map_err(|e| WeaveError::archive(archive, e))?;

        // Atomic replacement; on any earlier failure the temp file is
        // dropped and the original archive stays as it was.
        temp.persist(archive)
            .map_err(|e| WeaveError::archive(archive, e.error))?;

        debug!("Removed {} entries from {}", removed, archive.display());
        Ok(removed)
    }
}

impl Default for ArchivePruner {
    fn default() -> Self {
        Self::new()
    }
}
