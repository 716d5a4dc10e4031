//! dexweave - build-graph augmentation for Android-style builds
//!
//! This library teaches a host build's task graph two tricks: compiling
//! Kotlin alongside Java inside one compile step, and keeping test-only
//! classes out of shipped artifacts.
//!
//! # Architecture
//!
//! Augmentation runs in pipeline order:
//! 1. **Introspection** - detect the Kotlin runtime version on a compile
//!    step's classpath, from packaged metadata alone
//! 2. **Joint compilation** - decorate the compile step so kotlinc runs
//!    before javac into a shared output directory
//! 3. **Shrink coordination** - feed the test variant's classes and
//!    classpath into the tested variant's shrink step
//! 4. **Archive pruning** - remove recorded test-only classes from the
//!    shrunk app archive
//! 5. **Packaging rewrite** - run a test-scoped shrink pass and point the
//!    packaging step at its single output archive

pub mod archive;
pub mod classpath;
pub mod compile;
pub mod config;
pub mod error;
pub mod host;
pub mod introspect;
pub mod shrink;
pub mod variant;

pub use archive::{record_class_entries, ArchiveEntryKey, ArchivePruner, PruneReport};
pub use classpath::Classpath;
pub use compile::{Compiler, JointCompileOrchestrator};
pub use config::Config;
pub use error::{Result, WeaveError};
pub use host::{TaskAction, TaskGraph, TaskId, TaskKind};
pub use introspect::RuntimeIntrospector;
pub use shrink::{
    extend_tested_shrink, ShrinkConfiguration, ShrinkExecutor, TestShrinkRewriter,
};
pub use variant::BuildVariant;
