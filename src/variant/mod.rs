// Host build-variant model.
//
// A `BuildVariant` is created by the embedder after project configuration
// is evaluated; augmentation only reads it.

mod manifest;

pub use manifest::package_from_manifest;

use crate::classpath::Classpath;
use crate::host::TaskId;
use std::path::PathBuf;

/// One configured build output: a flavor of the app, or a test variant
/// exercising one.
#[derive(Debug, Clone)]
pub struct BuildVariant {
    /// Variant name, e.g. `debug` or `debugAndroidTest`.
    pub name: String,

    /// Package identifier, explicit or parsed from the variant's manifest.
    pub package_id: String,

    /// Name of the variant this one tests, when this is a test variant.
    pub tested: Option<String>,

    /// Compile step handle.
    pub compile_task: TaskId,

    /// Shrink step handle; absent when the variant performs no shrinking.
    pub shrink_task: Option<TaskId>,

    /// Dex/package step handle.
    pub package_task: TaskId,

    /// Directory the variant's compiled classes land in.
    pub class_output: PathBuf,

    /// Full compile classpath of the variant.
    pub compile_classpath: Classpath,
}

impl BuildVariant {
    pub fn is_test(&self) -> bool {
        self.tested.is_some()
    }

    pub fn shrinks(&self) -> bool {
        self.shrink_task.is_some()
    }
}
