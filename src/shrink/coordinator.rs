// Extends a tested variant's shrink step for its test variant.
//
// Test sources may reference app classes not reachable from the app's own
// entry points; the shrinker's reachability closure must see them or it
// will discard classes the tests require. The classes kept only for that
// closure are recorded before shrinking and pruned from the app's output
// archive afterwards.

use crate::archive::{record_class_entries, ArchiveEntryKey, ArchivePruner};
use crate::error::{Result, WeaveError};
use crate::host::{TaskAction, TaskGraph, TaskId};
use crate::shrink::ShrinkConfiguration;
use crate::variant::BuildVariant;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{debug, info};

/// Marker capability recorded on an extended shrink task; makes repeated
/// extension requests from multiple collaborators idempotent.
struct ShrinkExtension;

/// Recorded test-output paths, produced by the pre-shrink walk and
/// consumed by the post-shrink prune within the same run.
struct RecordedTestPaths(BTreeSet<ArchiveEntryKey>);

/// Wire a test variant's compiled output and classpath into its tested
/// variant's shrink step, and register the record/prune pair around it.
///
/// No-op returning `false` when the tested variant performs no shrinking,
/// or when the step was already extended. Must run during graph
/// construction, before the host finalizes the task graph.
pub fn extend_tested_shrink(
    graph: &mut TaskGraph,
    test_variant: &BuildVariant,
    tested: &BuildVariant,
) -> Result<bool> {
    let Some(shrink_task) = tested.shrink_task.as_ref() else {
        debug!(
            "Variant {} performs no shrinking; nothing to extend for {}",
            tested.name, test_variant.name
        );
        return Ok(false);
    };

    if graph.task(shrink_task)?.extensions().contains::<ShrinkExtension>() {
        debug!("Shrink step {} already extended", shrink_task);
        return Ok(false);
    }

    // The shrink step now consumes the test variant's classes, so it must
    // run after they are compiled.
    graph.add_dependency(shrink_task, &test_variant.compile_task)?;

    let step = graph.task_mut(shrink_task)?;
    let config = step
        .extensions_mut()
        .get_mut::<ShrinkConfiguration>()
        .ok_or_else(|| {
            WeaveError::Configuration(format!(
                "shrink step {} carries no shrink configuration",
                shrink_task
            ))
        })?;

    // Test classes join the input set; the test classpath is
    // resolution-only and must never be emitted.
    config.add_input(test_variant.class_output.clone());
    for entry in &test_variant.compile_classpath {
        config.add_library(entry.clone());
    }

    step.extensions_mut().register(ShrinkExtension);
    step.add_pre_action(Box::new(RecordTestClassesAction {
        shrink_task: shrink_task.clone(),
        class_output: test_variant.class_output.clone(),
    }));
    step.add_post_action(Box::new(PruneShrinkOutputAction {
        shrink_task: shrink_task.clone(),
    }));

    info!(
        "Extended shrink step {} with test classes of {}",
        shrink_task, test_variant.name
    );
    Ok(true)
}

/// Pre-shrink: walk the test variant's compiled output once and record
/// every class file's canonical root-relative path on the shrink task.
struct RecordTestClassesAction {
    shrink_task: TaskId,
    class_output: PathBuf,
}

impl TaskAction for RecordTestClassesAction {
    fn describe(&self) -> String {
        format!("record test classes under {}", self.class_output.display())
    }

    fn execute(&self, graph: &mut TaskGraph) -> Result<()> {
        let recorded = record_class_entries(&self.class_output)?;
        debug!("Recorded {} test-only candidate paths", recorded.len());
        graph
            .task_mut(&self.shrink_task)?
            .extensions_mut()
            .register(RecordedTestPaths(recorded));
        Ok(())
    }
}

/// Post-shrink: remove every recorded path from the shrink output archive.
struct PruneShrinkOutputAction {
    shrink_task: TaskId,
}

impl TaskAction for PruneShrinkOutputAction {
    fn describe(&self) -> String {
        format!("prune test classes from output of {}", self.shrink_task)
    }

    fn execute(&self, graph: &mut TaskGraph) -> Result<()> {
        let step = graph.task_mut(&self.shrink_task)?;
        let recorded = step
            .extensions_mut()
            .take::<RecordedTestPaths>()
            .ok_or_else(|| {
                WeaveError::Graph(format!(
                    "no recorded test paths on {}; record step did not run",
                    self.shrink_task
                ))
            })?
            .0;
        let output = step
            .extensions()
            .get::<ShrinkConfiguration>()
            .ok_or_else(|| {
                WeaveError::Configuration(format!(
                    "shrink step {} carries no shrink configuration",
                    self.shrink_task
                ))
            })?
            .output()
            .to_path_buf();

        ArchivePruner::new().prune(&[output], &recorded)?;
        Ok(())
    }
}
