// Tool configuration loader

use crate::error::WeaveError;
use crate::shrink::RewriteOptions;
use miette::{IntoDiagnostic, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Configuration for dexweave augmentation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Toolchain programs
    pub toolchain: ToolchainConfig,

    /// Platform boot classpath entries (resolution-only)
    pub boot_classpath: Vec<PathBuf>,

    /// Directory produced archives are written into
    pub build_dir: PathBuf,

    /// Per-variant shrink rule override files; a present entry fully
    /// replaces the default rule block for that variant
    pub rule_overrides: HashMap<String, PathBuf>,

    /// Packaging configuration
    pub packaging: PackagingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Kotlin compiler program
    pub kotlinc: PathBuf,

    /// Java compiler program
    pub javac: PathBuf,

    /// External shrinker program
    pub shrinker: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackagingConfig {
    /// Legacy multidex packaging keeps its own class lists and cannot be
    /// combined with test-scoped shrink rewiring
    pub legacy_multidex: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            toolchain: ToolchainConfig::default(),
            boot_classpath: vec![],
            build_dir: PathBuf::from("build/dexweave"),
            rule_overrides: HashMap::new(),
            packaging: PackagingConfig::default(),
        }
    }
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            kotlinc: PathBuf::from("kotlinc"),
            javac: PathBuf::from("javac"),
            shrinker: PathBuf::from("r8"),
        }
    }
}

impl Default for PackagingConfig {
    fn default() -> Self {
        Self {
            legacy_multidex: false,
        }
    }
}

impl Config {
    /// Load configuration from a file (YAML or TOML)
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match extension {
            "yml" | "yaml" => serde_yaml::from_str(&contents)
                .into_diagnostic()
                .wrap_err("Failed to parse YAML config"),
            "toml" => toml::from_str(&contents)
                .into_diagnostic()
                .wrap_err("Failed to parse TOML config"),
            _ => {
                // Try YAML first, then TOML
                if let Ok(config) = serde_yaml::from_str(&contents) {
                    Ok(config)
                } else {
                    toml::from_str(&contents)
                        .into_diagnostic()
                        .wrap_err("Failed to parse config file")
                }
            }
        }
    }

    /// Try to load configuration from default locations
    pub fn from_default_locations(project_root: &Path) -> Result<Self> {
        let default_names = [
            ".dexweave.yml",
            ".dexweave.yaml",
            ".dexweave.toml",
            "dexweave.yml",
            "dexweave.yaml",
            "dexweave.toml",
        ];

        for name in &default_names {
            let path = project_root.join(name);
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        // No config file found, use defaults
        Ok(Self::default())
    }

    /// Reject host-build states this augmentation cannot support. Runs
    /// during setup, before any task body fires.
    pub fn validate(&self) -> std::result::Result<(), WeaveError> {
        if self.packaging.legacy_multidex {
            return Err(WeaveError::Configuration(
                "legacy multidex packaging cannot be combined with test-scoped shrink rewiring"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Rule override for a variant, when configured.
    pub fn rule_override_for(&self, variant: &str) -> Option<&Path> {
        self.rule_overrides.get(variant).map(|p| p.as_path())
    }

    /// Rewrite settings for a variant's packaging step.
    pub fn rewrite_options_for(&self, variant: &str) -> RewriteOptions {
        RewriteOptions {
            rule_override: self.rule_overrides.get(variant).cloned(),
            boot_classpath: self.boot_classpath.clone(),
            build_dir: self.build_dir.clone(),
        }
    }
}
