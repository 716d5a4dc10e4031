// Dedicated shrink pass for a test variant's packaging step.
//
// Without this, downstream packaging would double-count classes already
// folded into the shrunk archive and risk the per-artifact reference
// limit. The pass runs as a pre-action on the packaging step; afterwards
// the step consumes exactly one archive and no staged libraries.

use crate::classpath::canonical;
use crate::error::{Result, WeaveError};
use crate::host::{TaskAction, TaskGraph, TaskId};
use crate::shrink::{effective_rules, ShrinkConfiguration, ShrinkExecutor};
use crate::variant::BuildVariant;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Settings for one packaging rewrite.
#[derive(Debug, Clone, Default)]
pub struct RewriteOptions {
    /// Rule file replacing the default block, when supplied.
    pub rule_override: Option<PathBuf>,

    /// Platform boot classpath, resolution-only.
    pub boot_classpath: Vec<PathBuf>,

    /// Directory the freshly named output archive is created in.
    pub build_dir: PathBuf,
}

/// Marker capability on a rewritten packaging task; carries the produced
/// archive path and makes repeated rewrites idempotent.
#[derive(Debug, Clone)]
pub struct RewriteDecoration {
    pub output: PathBuf,
}

/// Builds the test-scoped shrink pass and rewires the packaging step.
pub struct TestShrinkRewriter {
    executor: Arc<dyn ShrinkExecutor>,
}

impl TestShrinkRewriter {
    pub fn new(executor: Arc<dyn ShrinkExecutor>) -> Self {
        Self { executor }
    }

    /// Construct the test variant's own shrink configuration and register
    /// the pre-packaging action that runs it and replaces the step's
    /// inputs with the single produced archive.
    ///
    /// Returns the output archive path. A second call for the same
    /// packaging step is a no-op returning the path chosen first.
    pub fn rewrite(
        &self,
        graph: &mut TaskGraph,
        test_variant: &BuildVariant,
        tested: &BuildVariant,
        options: &RewriteOptions,
    ) -> Result<PathBuf> {
        let package_task = &test_variant.package_task;

        if let Some(existing) = graph
            .task(package_task)?
            .extensions()
            .get::<RewriteDecoration>()
        {
            debug!("Packaging step {} already rewritten", package_task);
            return Ok(existing.output.clone());
        }

        let staged: Vec<PathBuf> = graph.task(package_task)?.inputs().to_vec();
        let output = options
            .build_dir
            .join(format!("{}-shrunk.jar", test_variant.name));
        if staged.iter().any(|p| canonical(p) == canonical(&output)) {
            return Err(WeaveError::Configuration(format!(
                "shrink output {} collides with an archive already staged for {}",
                output.display(),
                package_task
            )));
        }

        // Inputs: the test variant's own classes plus whatever is already
        // staged. Libraries: the compile classpath minus staged archives
        // (a set difference, never a duplication), plus the boot classpath.
        let mut config = ShrinkConfiguration::new(output.clone());
        config.add_input(test_variant.class_output.clone());
        for archive in &staged {
            config.add_input(archive.clone());
        }
        for entry in test_variant.compile_classpath.minus(&staged).entries() {
            config.add_library(entry.clone());
        }
        for entry in &options.boot_classpath {
            config.add_library(entry.clone());
        }
        config.add_rules(effective_rules(
            options.rule_override.as_deref(),
            &test_variant.package_id,
            &tested.package_id,
        )?);

        let step = graph.task_mut(package_task)?;
        step.extensions_mut().register(RewriteDecoration {
            output: output.clone(),
        });
        step.add_pre_action(Box::new(TestShrinkAction {
            package_task: package_task.clone(),
            config,
            executor: self.executor.clone(),
        }));

        info!(
            "Packaging step {} rewired to shrink into {}",
            package_task,
            output.display()
        );
        Ok(output)
    }
}

/// Pre-packaging: run the scoped shrink pass, then replace the step's
/// input list with the one produced archive and clear its staged-library
/// list.
struct TestShrinkAction {
    package_task: TaskId,
    config: ShrinkConfiguration,
    executor: Arc<dyn ShrinkExecutor>,
}

impl TaskAction for TestShrinkAction {
    fn describe(&self) -> String {
        format!("test-scoped shrink into {}", self.config.output().display())
    }

    fn execute(&self, graph: &mut TaskGraph) -> Result<()> {
        self.executor.shrink(&self.config)?;

        let step = graph.task_mut(&self.package_task)?;
        step.set_inputs(vec![self.config.output().to_path_buf()]);
        step.clear_staged_libraries();
        debug!(
            "Packaging step {} now consumes {}",
            self.package_task,
            self.config.output().display()
        );
        Ok(())
    }
}
