// Shrinker invocation seam.
//
// The reachability analysis itself is an external tool's job; this crate
// only assembles its configuration and consumes its output archive. Tests
// substitute an in-process fake.

use crate::error::{Result, WeaveError};
use crate::shrink::ShrinkConfiguration;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

/// Runs one shrink invocation described by a `ShrinkConfiguration`.
pub trait ShrinkExecutor {
    fn shrink(&self, config: &ShrinkConfiguration) -> Result<()>;
}

/// Drives an external ProGuard-compatible shrinker via a generated
/// configuration file.
pub struct CommandShrinkExecutor {
    program: PathBuf,
}

impl CommandShrinkExecutor {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    fn render_config(config: &ShrinkConfiguration) -> String {
        let mut text = String::new();
        for input in config.inputs() {
            text.push_str(&format!("-injars {}\n", input.display()));
        }
        for library in config.libraries() {
            text.push_str(&format!("-libraryjars {}\n", library.display()));
        }
        text.push_str(&format!("-outjars {}\n\n", config.output().display()));
        text.push_str(&config.rules_text());
        text
    }
}

impl ShrinkExecutor for CommandShrinkExecutor {
    fn shrink(&self, config: &ShrinkConfiguration) -> Result<()> {
        let mut file = tempfile::Builder::new()
            .prefix("shrink-")
            .suffix(".pro")
            .tempfile()
            .map_err(|e| WeaveError::archive(config.output(), e))?;
        file.write_all(Self::render_config(config).as_bytes())
            .map_err(|e| WeaveError::archive(config.output(), e))?;

        debug!(
            "Invoking shrinker {} with {} input(s), {} librarie(s)",
            self.program.display(),
            config.inputs().len(),
            config.libraries().len()
        );
        let output = Command::new(&self.program)
            .arg(format!("@{}", file.path().display()))
            .output()
            .map_err(|e| {
                WeaveError::Configuration(format!(
                    "failed to launch shrinker {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let mut detail = String::from_utf8_lossy(&output.stderr).into_owned();
            let stdout = String::from_utf8_lossy(&output.stdout);
            if !stdout.trim().is_empty() {
                if !detail.is_empty() {
                    detail.push('\n');
                }
                detail.push_str(&stdout);
            }
            return Err(WeaveError::ArchiveIntegrity {
                archive: config.output().to_path_buf(),
                detail,
            });
        }
        Ok(())
    }
}
