// Per-invocation shrink configuration.

use crate::classpath::canonical;
use crate::error::Result;
use std::path::{Path, PathBuf};

/// Inputs, libraries, rules and the single output archive of one shrink
/// invocation.
///
/// The library set is resolution-only: its classes must be reachable for
/// analysis but are never emitted. It is kept disjoint from the input set
/// by canonical path.
#[derive(Debug, Clone)]
pub struct ShrinkConfiguration {
    rules: Vec<String>,
    inputs: Vec<PathBuf>,
    libraries: Vec<PathBuf>,
    output: PathBuf,
}

impl ShrinkConfiguration {
    pub fn new(output: PathBuf) -> Self {
        Self {
            rules: Vec::new(),
            inputs: Vec::new(),
            libraries: Vec::new(),
            output,
        }
    }

    /// Append a rule block. Order is preserved; rule text is never
    /// reordered or merged.
    pub fn add_rules(&mut self, block: impl Into<String>) {
        self.rules.push(block.into());
    }

    /// Add an archive or class directory to the input set.
    pub fn add_input(&mut self, input: PathBuf) {
        if !contains(&self.inputs, &input) {
            // An input wins over a previously added library entry.
            self.libraries.retain(|l| canonical(l) != canonical(&input));
            self.inputs.push(input);
        }
    }

    /// Add a resolution-only library. Anything already in the input set is
    /// skipped, keeping the two sets disjoint.
    pub fn add_library(&mut self, library: PathBuf) {
        if !contains(&self.inputs, &library) && !contains(&self.libraries, &library) {
            self.libraries.push(library);
        }
    }

    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    pub fn libraries(&self) -> &[PathBuf] {
        &self.libraries
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// The full rule text, blocks in insertion order.
    pub fn rules_text(&self) -> String {
        self.rules.join("\n")
    }

    /// Write the rule text to a file for an external shrinker.
    pub fn write_rules_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.rules_text())?;
        Ok(())
    }
}

fn contains(set: &[PathBuf], candidate: &Path) -> bool {
    let target = canonical(candidate);
    set.iter().any(|p| canonical(p) == target)
}
