// Joint Kotlin/Java compilation.
//
// When introspection finds a Kotlin runtime on a compile step's classpath,
// the step's action is replaced with a decorator running both compilers in
// a fixed order: Kotlin first over its partition with the full classpath,
// then Java with the classpath extended by the shared destination
// directory, so Java code may resolve symbols Kotlin just produced. The
// reverse direction is deliberately impossible within one pass.

mod compiler;

pub use compiler::{Compiler, JavacCompiler, KotlincCompiler};

use crate::classpath::Classpath;
use crate::error::Result;
use crate::host::{TaskAction, TaskGraph, TaskId};
use crate::introspect::RuntimeIntrospector;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Marker capability recorded on a wrapped compile task. Its presence
/// makes re-wrapping a no-op.
#[derive(Debug, Clone)]
pub struct CompileDecoration {
    pub version: String,
}

/// Wraps compile steps for joint compilation.
pub struct JointCompileOrchestrator {
    introspector: RuntimeIntrospector,
    secondary: Arc<dyn Compiler>,
    primary: Arc<dyn Compiler>,
}

impl JointCompileOrchestrator {
    pub fn new(secondary: Arc<dyn Compiler>, primary: Arc<dyn Compiler>) -> Self {
        Self {
            introspector: RuntimeIntrospector::new(),
            secondary,
            primary,
        }
    }

    /// Standard toolchain: `kotlinc` and `javac` resolved from the given
    /// program paths.
    pub fn with_toolchain(kotlinc: PathBuf, javac: PathBuf) -> Self {
        Self::new(
            Arc::new(KotlincCompiler::new(kotlinc)),
            Arc::new(JavacCompiler::new(javac)),
        )
    }

    /// Inspect the step's classpath and, when a Kotlin runtime is present,
    /// pin the matching compiler dependency and decorate the step's action.
    ///
    /// Returns the detected version, or `None` when the task was left
    /// untouched. Wrapping an already-wrapped task is a no-op returning the
    /// previously detected version. Introspection runs per call: distinct
    /// compile steps may carry distinct runtime versions and never share a
    /// cached result.
    pub fn wrap(
        &self,
        graph: &mut TaskGraph,
        task: &TaskId,
        sources: Vec<PathBuf>,
        classpath: Classpath,
        dest: PathBuf,
    ) -> Result<Option<String>> {
        if let Some(decoration) = graph.task(task)?.extensions().get::<CompileDecoration>() {
            debug!("Task {} already wrapped for Kotlin {}", task, decoration.version);
            return Ok(Some(decoration.version.clone()));
        }

        let Some(version) = self.introspector.detect(&classpath)? else {
            debug!("No Kotlin runtime on classpath of {}, leaving untouched", task);
            return Ok(None);
        };

        info!("Wrapping {} for joint compilation (Kotlin {})", task, version);
        graph
            .dependency_bucket(task)
            .add(format!("kotlin-compiler:{}", version));

        let step = graph.task_mut(task)?;
        step.extensions_mut().register(CompileDecoration {
            version: version.clone(),
        });
        step.set_body(Box::new(JointCompileAction {
            sources,
            classpath,
            dest,
            secondary: self.secondary.clone(),
            primary: self.primary.clone(),
        }));

        Ok(Some(version))
    }
}

/// The decorated compile action. All inputs are carried explicitly; the
/// invocation sequence is fixed and one-directional.
struct JointCompileAction {
    sources: Vec<PathBuf>,
    classpath: Classpath,
    dest: PathBuf,
    secondary: Arc<dyn Compiler>,
    primary: Arc<dyn Compiler>,
}

impl TaskAction for JointCompileAction {
    fn describe(&self) -> String {
        format!(
            "joint {}/{} compile into {}",
            self.secondary.name(),
            self.primary.name(),
            self.dest.display()
        )
    }

    fn execute(&self, _graph: &mut TaskGraph) -> Result<()> {
        let (kotlin, java) = partition_sources(&self.sources);
        debug!(
            "Partitioned sources: {} Kotlin, {} Java",
            kotlin.len(),
            java.len()
        );

        // Kotlin first, into the shared destination. A failure here aborts
        // the whole task; diagnostics surface unmodified.
        self.secondary.compile(&kotlin, &self.classpath, &self.dest)?;

        // Java second, with the destination on its classpath so it can
        // resolve the symbols the Kotlin pass just emitted.
        let extended = self.classpath.extended(&self.dest);
        self.primary.compile(&java, &extended, &self.dest)?;

        Ok(())
    }
}

/// Split a compile step's sources by language.
pub fn partition_sources(sources: &[PathBuf]) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut kotlin = Vec::new();
    let mut java = Vec::new();
    for source in sources {
        match extension(source) {
            Some("kt") | Some("kts") => kotlin.push(source.clone()),
            Some("java") => java.push(source.clone()),
            _ => {}
        }
    }
    (kotlin, java)
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}
