//! Integration tests for task-graph augmentation
//!
//! These drive the full wiring: introspection-gated compile wrapping,
//! shrink-step extension with record/prune, and the packaging rewrite.
//! Compilers and the shrinker are substituted with in-process fakes; the
//! archives are real.

use dexweave::archive::record_class_entries;
use dexweave::classpath::Classpath;
use dexweave::compile::{Compiler, JointCompileOrchestrator};
use dexweave::error::{Result as WeaveResult, WeaveError};
use dexweave::host::{TaskAction, TaskGraph, TaskId, TaskKind};
use dexweave::shrink::{
    extend_tested_shrink, RewriteOptions, ShrinkConfiguration, ShrinkExecutor, TestShrinkRewriter,
};
use dexweave::variant::BuildVariant;
use std::cell::RefCell;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

// ============================================================================
// Fixtures
// ============================================================================

/// Write a jar that looks like the Kotlin standard library.
fn write_runtime_jar(path: &Path, version: &str) {
    let file = File::create(path).unwrap();
    let mut writer = ZipWriter::new(file);
    writer
        .start_file("kotlin/KotlinVersion.class", FileOptions::default())
        .unwrap();
    writer.write_all(b"\xca\xfe\xba\xbe").unwrap();
    writer
        .start_file("META-INF/MANIFEST.MF", FileOptions::default())
        .unwrap();
    write!(writer, "Implementation-Version: {}\r\n", version).unwrap();
    writer.finish().unwrap();
}

fn entry_names(path: &Path) -> Vec<String> {
    let archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(|n| n.to_string()).collect();
    names.sort();
    names
}

/// Records every invocation: (compiler name, joined classpath, sources).
type CompileLog = Rc<RefCell<Vec<(String, String, Vec<PathBuf>)>>>;

struct StubCompiler {
    name: &'static str,
    log: CompileLog,
    fail_with: Option<&'static str>,
}

impl Compiler for StubCompiler {
    fn name(&self) -> &str {
        self.name
    }

    fn compile(&self, sources: &[PathBuf], classpath: &Classpath, _dest: &Path) -> WeaveResult<()> {
        self.log
            .borrow_mut()
            .push((self.name.to_string(), classpath.join(), sources.to_vec()));
        if let Some(diagnostics) = self.fail_with {
            return Err(WeaveError::SubCompiler {
                compiler: self.name.to_string(),
                diagnostics: diagnostics.to_string(),
            });
        }
        Ok(())
    }
}

/// A shrinker that keeps everything reachable from the input set: class
/// files from input directories and entries from input archives all land
/// in the output jar. Libraries are resolution-only and never emitted.
fn fake_shrink(config: &ShrinkConfiguration) -> WeaveResult<()> {
    if let Some(parent) = config.output().parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(config.output())?;
    let mut writer = ZipWriter::new(file);

    for input in config.inputs() {
        if input.is_dir() {
            for key in record_class_entries(input)? {
                writer
                    .start_file(key.as_str(), FileOptions::default())
                    .map_err(|e| WeaveError::archive(config.output(), e))?;
                let contents = fs::read(input.join(key.as_str()))?;
                writer.write_all(&contents)?;
            }
        } else if input.is_file() {
            let mut source = ZipArchive::new(File::open(input)?)
                .map_err(|e| WeaveError::archive(input, e))?;
            for index in 0..source.len() {
                let mut entry = source
                    .by_index(index)
                    .map_err(|e| WeaveError::archive(input, e))?;
                let mut contents = Vec::new();
                entry.read_to_end(&mut contents)?;
                writer
                    .start_file(entry.name(), FileOptions::default())
                    .map_err(|e| WeaveError::archive(config.output(), e))?;
                writer.write_all(&contents)?;
            }
        }
    }

    writer
        .finish()
        .map_err(|e| WeaveError::archive(config.output(), e))?;
    Ok(())
}

struct FakeShrinkExecutor;

impl ShrinkExecutor for FakeShrinkExecutor {
    fn shrink(&self, config: &ShrinkConfiguration) -> WeaveResult<()> {
        fake_shrink(config)
    }
}

/// Shrink task body: reads its own task's configuration and runs the fake
/// shrinker over it.
struct FakeShrinkBody {
    task: TaskId,
}

impl TaskAction for FakeShrinkBody {
    fn describe(&self) -> String {
        format!("fake shrink for {}", self.task)
    }

    fn execute(&self, graph: &mut TaskGraph) -> WeaveResult<()> {
        let config = graph
            .task(&self.task)?
            .extensions()
            .get::<ShrinkConfiguration>()
            .expect("shrink body without configuration")
            .clone();
        fake_shrink(&config)
    }
}

// ============================================================================
// Compile wrapping
// ============================================================================

#[test]
fn test_wrap_without_runtime_leaves_task_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let plain = dir.path().join("plain.jar");
    let file = File::create(&plain).unwrap();
    let mut writer = ZipWriter::new(file);
    writer
        .start_file("com/other/Lib.class", FileOptions::default())
        .unwrap();
    writer.write_all(b"\xca\xfe\xba\xbe").unwrap();
    writer.finish().unwrap();

    let log: CompileLog = Rc::new(RefCell::new(Vec::new()));
    let orchestrator = JointCompileOrchestrator::new(
        Arc::new(StubCompiler { name: "kotlinc", log: log.clone(), fail_with: None }),
        Arc::new(StubCompiler { name: "javac", log: log.clone(), fail_with: None }),
    );

    let mut graph = TaskGraph::new();
    let task = graph.add_task("compileDebug", TaskKind::Compile).unwrap();
    let detected = orchestrator
        .wrap(
            &mut graph,
            &task,
            vec![PathBuf::from("src/Main.java")],
            Classpath::new(vec![plain]),
            dir.path().join("classes"),
        )
        .unwrap();

    assert_eq!(detected, None);
    assert!(!graph.task(&task).unwrap().has_body());
    assert!(graph.requested_dependencies(&task).is_empty());

    graph.run().unwrap();
    assert!(log.borrow().is_empty());
}

#[test]
fn test_wrap_pins_compiler_and_orders_invocations() {
    let dir = tempfile::tempdir().unwrap();
    let stdlib = dir.path().join("kotlin-stdlib.jar");
    write_runtime_jar(&stdlib, "1.9.22");
    let dest = dir.path().join("classes");

    let log: CompileLog = Rc::new(RefCell::new(Vec::new()));
    let orchestrator = JointCompileOrchestrator::new(
        Arc::new(StubCompiler { name: "kotlinc", log: log.clone(), fail_with: None }),
        Arc::new(StubCompiler { name: "javac", log: log.clone(), fail_with: None }),
    );

    let mut graph = TaskGraph::new();
    let task = graph.add_task("compileDebug", TaskKind::Compile).unwrap();
    let detected = orchestrator
        .wrap(
            &mut graph,
            &task,
            vec![PathBuf::from("src/Util.kt"), PathBuf::from("src/Main.java")],
            Classpath::new(vec![stdlib.clone()]),
            dest.clone(),
        )
        .unwrap();

    assert_eq!(detected.as_deref(), Some("1.9.22"));
    assert_eq!(
        graph.requested_dependencies(&task),
        &["kotlin-compiler:1.9.22".to_string()]
    );

    graph.run().unwrap();

    let log = log.borrow();
    assert_eq!(log.len(), 2);
    // Kotlin strictly first, over its own partition.
    assert_eq!(log[0].0, "kotlinc");
    assert_eq!(log[0].2, vec![PathBuf::from("src/Util.kt")]);
    assert!(!log[0].1.contains(&dest.to_string_lossy().into_owned()));
    // Java second, with the shared destination appended to its classpath.
    assert_eq!(log[1].0, "javac");
    assert_eq!(log[1].2, vec![PathBuf::from("src/Main.java")]);
    assert!(log[1].1.contains(&dest.to_string_lossy().into_owned()));
}

#[test]
fn test_wrap_is_idempotent_per_task() {
    let dir = tempfile::tempdir().unwrap();
    let stdlib = dir.path().join("kotlin-stdlib.jar");
    write_runtime_jar(&stdlib, "1.9.22");

    let log: CompileLog = Rc::new(RefCell::new(Vec::new()));
    let orchestrator = JointCompileOrchestrator::new(
        Arc::new(StubCompiler { name: "kotlinc", log: log.clone(), fail_with: None }),
        Arc::new(StubCompiler { name: "javac", log: log.clone(), fail_with: None }),
    );

    let mut graph = TaskGraph::new();
    let task = graph.add_task("compileDebug", TaskKind::Compile).unwrap();
    let classpath = Classpath::new(vec![stdlib]);
    let dest = dir.path().join("classes");

    let first = orchestrator
        .wrap(&mut graph, &task, vec![], classpath.clone(), dest.clone())
        .unwrap();
    let second = orchestrator
        .wrap(&mut graph, &task, vec![], classpath, dest)
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(graph.requested_dependencies(&task).len(), 1);
}

#[test]
fn test_secondary_failure_aborts_task_with_verbatim_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let stdlib = dir.path().join("kotlin-stdlib.jar");
    write_runtime_jar(&stdlib, "1.9.22");

    let log: CompileLog = Rc::new(RefCell::new(Vec::new()));
    let diagnostics = "e: Util.kt:7:13 unresolved reference: JavaOnlyHelper";
    let orchestrator = JointCompileOrchestrator::new(
        Arc::new(StubCompiler {
            name: "kotlinc",
            log: log.clone(),
            fail_with: Some(diagnostics),
        }),
        Arc::new(StubCompiler { name: "javac", log: log.clone(), fail_with: None }),
    );

    let mut graph = TaskGraph::new();
    let task = graph.add_task("compileDebug", TaskKind::Compile).unwrap();
    orchestrator
        .wrap(
            &mut graph,
            &task,
            vec![PathBuf::from("src/Util.kt"), PathBuf::from("src/Main.java")],
            Classpath::new(vec![stdlib]),
            dir.path().join("classes"),
        )
        .unwrap();

    let err = graph.run().unwrap_err();
    assert!(err.to_string().contains(diagnostics));
    // The primary compiler never ran.
    assert_eq!(log.borrow().len(), 1);
}

// ============================================================================
// End-to-end: shrink extension, prune, packaging rewrite
// ============================================================================

/// Variant "app" defines class A; test variant "appTest" defines B
/// (referencing A) and C (reached only through the combined seed closure).
#[test]
fn test_end_to_end_test_classes_stay_out_of_app_archive() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    let app_classes = root.join("classes/app");
    fs::create_dir_all(app_classes.join("com/example/app")).unwrap();
    fs::write(app_classes.join("com/example/app/A.class"), b"A").unwrap();

    let test_classes = root.join("classes/appTest");
    fs::create_dir_all(test_classes.join("com/example/app/test")).unwrap();
    fs::write(test_classes.join("com/example/app/test/B.class"), b"B").unwrap();
    fs::write(test_classes.join("com/example/app/test/C.class"), b"C").unwrap();

    let app_shrunk = root.join("outputs/app-shrunk.jar");

    let mut graph = TaskGraph::new();
    let app_compile = graph.add_task("compileApp", TaskKind::Compile).unwrap();
    let app_shrink = graph.add_task("shrinkApp", TaskKind::Shrink).unwrap();
    let app_package = graph.add_task("packageApp", TaskKind::Package).unwrap();
    let test_compile = graph.add_task("compileAppTest", TaskKind::Compile).unwrap();
    let test_package = graph.add_task("packageAppTest", TaskKind::Package).unwrap();
    graph.add_dependency(&app_shrink, &app_compile).unwrap();
    graph.add_dependency(&app_package, &app_shrink).unwrap();
    graph.add_dependency(&test_compile, &app_compile).unwrap();
    graph.add_dependency(&test_package, &test_compile).unwrap();

    // The host's shrink step for "app": its own classes as input.
    let mut app_config = ShrinkConfiguration::new(app_shrunk.clone());
    app_config.add_input(app_classes.clone());
    app_config.add_rules("-keep class com.example.app.** { *; }");
    {
        let step = graph.task_mut(&app_shrink).unwrap();
        step.extensions_mut().register(app_config);
        step.set_body(Box::new(FakeShrinkBody { task: app_shrink.clone() }));
    }

    let app = BuildVariant {
        name: "app".to_string(),
        package_id: "com.example.app".to_string(),
        tested: None,
        compile_task: app_compile,
        shrink_task: Some(app_shrink.clone()),
        package_task: app_package,
        class_output: app_classes.clone(),
        compile_classpath: Classpath::default(),
    };
    let app_test = BuildVariant {
        name: "appTest".to_string(),
        package_id: "com.example.app.test".to_string(),
        tested: Some("app".to_string()),
        compile_task: test_compile,
        shrink_task: None,
        package_task: test_package.clone(),
        class_output: test_classes.clone(),
        compile_classpath: Classpath::new(vec![app_classes.clone()]),
    };

    // Graph-construction phase: extend the tested shrink step and rewire
    // the test variant's packaging.
    assert!(extend_tested_shrink(&mut graph, &app_test, &app).unwrap());
    let rewriter = TestShrinkRewriter::new(Arc::new(FakeShrinkExecutor));
    let options = RewriteOptions {
        rule_override: None,
        boot_classpath: vec![],
        build_dir: root.join("outputs"),
    };
    let test_shrunk = rewriter
        .rewrite(&mut graph, &app_test, &app, &options)
        .unwrap();

    graph.run().unwrap();

    // The shrinker saw the combined closure (A, B, C), and the prune
    // pass removed the recorded test classes again: only A ships.
    assert_eq!(entry_names(&app_shrunk), vec!["com/example/app/A.class"]);

    // The test artifact keeps harness and under-test classes, but not the
    // app classes it only resolved against.
    assert_eq!(
        entry_names(&test_shrunk),
        vec![
            "com/example/app/test/B.class",
            "com/example/app/test/C.class"
        ]
    );

    // Packaging now consumes exactly the one produced archive.
    let step = graph.task(&test_package).unwrap();
    assert_eq!(step.inputs(), &[test_shrunk]);
    assert!(step.staged_libraries().is_empty());
}

#[test]
fn test_unshrunk_tested_variant_needs_no_wiring() {
    let dir = tempfile::tempdir().unwrap();
    let mut graph = TaskGraph::new();
    let app_compile = graph.add_task("compileApp", TaskKind::Compile).unwrap();
    let app_package = graph.add_task("packageApp", TaskKind::Package).unwrap();
    let test_compile = graph.add_task("compileAppTest", TaskKind::Compile).unwrap();
    let test_package = graph.add_task("packageAppTest", TaskKind::Package).unwrap();

    let app = BuildVariant {
        name: "app".to_string(),
        package_id: "com.example.app".to_string(),
        tested: None,
        compile_task: app_compile,
        shrink_task: None,
        package_task: app_package,
        class_output: dir.path().join("classes/app"),
        compile_classpath: Classpath::default(),
    };
    let app_test = BuildVariant {
        name: "appTest".to_string(),
        package_id: "com.example.app.test".to_string(),
        tested: Some("app".to_string()),
        compile_task: test_compile,
        shrink_task: None,
        package_task: test_package,
        class_output: dir.path().join("classes/appTest"),
        compile_classpath: Classpath::default(),
    };

    assert!(!extend_tested_shrink(&mut graph, &app_test, &app).unwrap());
    graph.run().unwrap();
}
