// Compiler invocation seam.
//
// Production implementations shell out to the real toolchain; tests
// substitute stubs. Diagnostics from a failed compiler pass through
// verbatim, never wrapped or summarized.

use crate::classpath::Classpath;
use crate::error::{Result, WeaveError};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// One language compiler within a joint compile step.
pub trait Compiler {
    /// Tool name used in diagnostics, e.g. `kotlinc`.
    fn name(&self) -> &str;

    /// Compile `sources` against `classpath` into `dest`. An empty source
    /// list is a no-op. Compilation runs to completion or fails; there is
    /// no partial success.
    fn compile(&self, sources: &[PathBuf], classpath: &Classpath, dest: &Path) -> Result<()>;
}

/// The Kotlin command-line compiler.
pub struct KotlincCompiler {
    program: PathBuf,
}

impl KotlincCompiler {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }
}

impl Compiler for KotlincCompiler {
    fn name(&self) -> &str {
        "kotlinc"
    }

    fn compile(&self, sources: &[PathBuf], classpath: &Classpath, dest: &Path) -> Result<()> {
        run_compiler(&self.program, self.name(), sources, classpath, dest)
    }
}

/// The Java command-line compiler.
pub struct JavacCompiler {
    program: PathBuf,
}

impl JavacCompiler {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }
}

impl Compiler for JavacCompiler {
    fn name(&self) -> &str {
        "javac"
    }

    fn compile(&self, sources: &[PathBuf], classpath: &Classpath, dest: &Path) -> Result<()> {
        run_compiler(&self.program, self.name(), sources, classpath, dest)
    }
}

// kotlinc and javac share the flags this step needs.
fn run_compiler(
    program: &Path,
    name: &str,
    sources: &[PathBuf],
    classpath: &Classpath,
    dest: &Path,
) -> Result<()> {
    if sources.is_empty() {
        debug!("{}: no sources in partition, skipping", name);
        return Ok(());
    }
    std::fs::create_dir_all(dest)?;

    let mut command = Command::new(program);
    if !classpath.is_empty() {
        command.arg("-classpath").arg(classpath.join());
    }
    command.arg("-d").arg(dest);
    command.args(sources);

    debug!("Invoking {} on {} source file(s)", name, sources.len());
    let output = command.output().map_err(|e| {
        WeaveError::Configuration(format!(
            "failed to launch {} ({}): {}",
            name,
            program.display(),
            e
        ))
    })?;

    if !output.status.success() {
        let mut diagnostics = String::from_utf8_lossy(&output.stderr).into_owned();
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            if !diagnostics.is_empty() {
                diagnostics.push('\n');
            }
            diagnostics.push_str(&stdout);
        }
        return Err(WeaveError::SubCompiler {
            compiler: name.to_string(),
            diagnostics,
        });
    }
    Ok(())
}
