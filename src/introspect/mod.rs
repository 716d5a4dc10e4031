// Kotlin runtime detection from a classpath.
//
// Detection is pure metadata parsing: the marker entry and the version
// attribute are read straight out of the packaged artifact, no classes are
// ever loaded or executed. Every file handle opened here is scoped to the
// single `detect` call and closed on all exit paths.

use crate::classpath::Classpath;
use crate::error::{Result, WeaveError};
use regex::Regex;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, trace};
use zip::result::ZipError;
use zip::ZipArchive;

/// Archive entry only the Kotlin standard library provides.
pub const RUNTIME_MARKER: &str = "kotlin/KotlinVersion.class";

/// Manifest resource carrying the runtime's version attribute.
const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

const VERSION_ATTRIBUTE: &str = "Implementation-Version";

/// Detects whether and which Kotlin runtime a classpath carries.
///
/// Results are valid for exactly one compile step's classpath. Different
/// variants may carry different runtime versions, so callers must invoke
/// this once per distinct classpath and never share a cached answer across
/// variants.
pub struct RuntimeIntrospector;

impl RuntimeIntrospector {
    pub fn new() -> Self {
        Self
    }

    /// Scan classpath entries in order and return the version of the first
    /// Kotlin runtime found, or `None` if no entry carries the marker.
    ///
    /// Absence is a valid terminal outcome, not an error: it is the signal
    /// to leave the owning compile step untouched.
    pub fn detect(&self, classpath: &Classpath) -> Result<Option<String>> {
        for entry in classpath {
            if entry.is_dir() {
                if let Some(version) = self.detect_in_directory(entry)? {
                    return Ok(Some(version));
                }
            } else if entry.is_file() {
                if let Some(version) = self.detect_in_archive(entry)? {
                    return Ok(Some(version));
                }
            } else {
                trace!("Skipping nonexistent classpath entry: {}", entry.display());
            }
        }
        debug!("No Kotlin runtime on classpath ({} entries)", classpath.len());
        Ok(None)
    }

    fn detect_in_directory(&self, root: &Path) -> Result<Option<String>> {
        if !root.join(RUNTIME_MARKER).is_file() {
            return Ok(None);
        }
        debug!("Runtime marker found under {}", root.display());

        let manifest = root.join(MANIFEST_PATH);
        let contents = std::fs::read_to_string(&manifest).map_err(|_| {
            WeaveError::Configuration(format!(
                "Kotlin runtime at {} has no readable {}",
                root.display(),
                MANIFEST_PATH
            ))
        })?;
        self.version_from_manifest(&contents, root).map(Some)
    }

    fn detect_in_archive(&self, archive: &Path) -> Result<Option<String>> {
        let file = match File::open(archive) {
            Ok(f) => f,
            Err(e) => {
                trace!("Skipping unreadable classpath entry {}: {}", archive.display(), e);
                return Ok(None);
            }
        };
        let mut zip = match ZipArchive::new(file) {
            Ok(z) => z,
            Err(e) => {
                // Non-archive files on a classpath are ignored, as a
                // compiler would ignore them.
                trace!("Skipping non-archive classpath entry {}: {}", archive.display(), e);
                return Ok(None);
            }
        };

        match zip.by_name(RUNTIME_MARKER) {
            Ok(_) => {}
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => {
                trace!("Skipping unreadable entry in {}: {}", archive.display(), e);
                return Ok(None);
            }
        }
        debug!("Runtime marker found in {}", archive.display());

        let mut contents = String::new();
        zip.by_name(MANIFEST_PATH)
            .map_err(|_| {
                WeaveError::Configuration(format!(
                    "Kotlin runtime {} has no {}",
                    archive.display(),
                    MANIFEST_PATH
                ))
            })?
            .read_to_string(&mut contents)
            .map_err(|e| WeaveError::archive(archive, e))?;

        self.version_from_manifest(&contents, archive).map(Some)
    }

    fn version_from_manifest(&self, manifest: &str, container: &Path) -> Result<String> {
        let version = manifest_attribute(manifest, VERSION_ATTRIBUTE).ok_or_else(|| {
            WeaveError::Configuration(format!(
                "Kotlin runtime {} carries no {} attribute",
                container.display(),
                VERSION_ATTRIBUTE
            ))
        })?;

        let dotted_numeric = Regex::new(r"^\d+(\.\d+)*$").expect("static pattern");
        if !dotted_numeric.is_match(&version) {
            return Err(WeaveError::Configuration(format!(
                "Kotlin runtime {} reports a malformed version: {:?}",
                container.display(),
                version
            )));
        }

        debug!("Detected Kotlin runtime version {}", version);
        Ok(version)
    }
}

impl Default for RuntimeIntrospector {
    fn default() -> Self {
        Self::new()
    }
}

/// Read one main-section attribute from jar manifest text.
///
/// Handles the manifest format's 72-byte line wrapping: a line starting
/// with a single space continues the previous attribute's value.
fn manifest_attribute(manifest: &str, name: &str) -> Option<String> {
    let prefix = format!("{}:", name);
    let mut lines = manifest.lines().peekable();

    while let Some(line) = lines.next() {
        let line = line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix(&prefix) {
            let mut value = rest.trim_start().to_string();
            while let Some(next) = lines.peek() {
                match next.trim_end_matches('\r').strip_prefix(' ') {
                    Some(continuation) => {
                        value.push_str(continuation);
                        lines.next();
                    }
                    None => break,
                }
            }
            return Some(value);
        }
    }
    None
}
