//! Minimal host task graph.
//!
//! This models just enough of a host build scheduler for augmentation to
//! register against: named tasks with dependency edges, explicit pre/post
//! action hook lists, a typed extension slot per task, and per-task
//! dependency buckets. It is deliberately not a general scheduler: the
//! embedder constructs it after project configuration is evaluated and
//! drives `run` once, single-threaded.
//!
//! Augmentation happens in two phases. Graph wiring (adding inputs, edges,
//! bucket entries, replacing a task body) must finish before `run` is
//! called; actions registered on the hook lists fire around their owning
//! task's body during `run`.

use crate::error::{Result, WeaveError};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::algo::toposort;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

/// Identity of a task within one graph. Keys dependency buckets and
/// extension lookups; never reused across build invocations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(String);

impl TaskId {
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role a task plays in a variant's build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Compile,
    Shrink,
    Package,
    Other,
}

/// A callback attached to a task. All state an action needs is carried
/// explicitly in the implementing struct; nothing is implicitly captured.
pub trait TaskAction {
    /// Short description for build logs.
    fn describe(&self) -> String;

    /// Run the action. Actions may mutate other tasks (e.g. rewrite a
    /// packaging step's inputs) through the graph.
    fn execute(&self, graph: &mut TaskGraph) -> Result<()>;
}

/// One schedulable unit of work.
pub struct Task {
    name: String,
    kind: TaskKind,
    body: Option<Box<dyn TaskAction>>,
    pre_actions: Vec<Box<dyn TaskAction>>,
    post_actions: Vec<Box<dyn TaskAction>>,
    extensions: ExtensionRegistry,
    /// Input files consumed by the task body (for a package step: the
    /// archives staged for packaging).
    inputs: Vec<PathBuf>,
    /// Libraries staged alongside the inputs; resolution-only, consumed by
    /// a package step's merge.
    staged_libraries: Vec<PathBuf>,
}

impl Task {
    fn new(name: &str, kind: TaskKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            body: None,
            pre_actions: Vec::new(),
            post_actions: Vec::new(),
            extensions: ExtensionRegistry::default(),
            inputs: Vec::new(),
            staged_libraries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Replace the task's body. Returns the previous body, if any.
    pub fn set_body(&mut self, body: Box<dyn TaskAction>) -> Option<Box<dyn TaskAction>> {
        self.body.replace(body)
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    pub fn add_pre_action(&mut self, action: Box<dyn TaskAction>) {
        self.pre_actions.push(action);
    }

    pub fn add_post_action(&mut self, action: Box<dyn TaskAction>) {
        self.post_actions.push(action);
    }

    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    pub fn add_input(&mut self, input: PathBuf) {
        self.inputs.push(input);
    }

    /// Replace the input list wholesale (packaging rewrite).
    pub fn set_inputs(&mut self, inputs: Vec<PathBuf>) {
        self.inputs = inputs;
    }

    pub fn staged_libraries(&self) -> &[PathBuf] {
        &self.staged_libraries
    }

    pub fn add_staged_library(&mut self, library: PathBuf) {
        self.staged_libraries.push(library);
    }

    pub fn clear_staged_libraries(&mut self) {
        self.staged_libraries.clear();
    }

    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut ExtensionRegistry {
        &mut self.extensions
    }
}

/// Typed capability storage on a task.
///
/// Capabilities are registered once against their type and looked up by a
/// typed accessor; at most one value per type.
#[derive(Default)]
pub struct ExtensionRegistry {
    slots: HashMap<TypeId, Box<dyn Any>>,
}

impl ExtensionRegistry {
    /// Register a capability. Returns `false` (and keeps the existing
    /// value) if one of this type is already registered.
    pub fn register<T: Any>(&mut self, value: T) -> bool {
        use std::collections::hash_map::Entry;
        match self.slots.entry(TypeId::of::<T>()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Box::new(value));
                true
            }
        }
    }

    pub fn get<T: Any>(&self) -> Option<&T> {
        self.slots
            .get(&TypeId::of::<T>())
            .and_then(|b| b.downcast_ref())
    }

    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.slots
            .get_mut(&TypeId::of::<T>())
            .and_then(|b| b.downcast_mut())
    }

    pub fn contains<T: Any>(&self) -> bool {
        self.slots.contains_key(&TypeId::of::<T>())
    }

    pub fn take<T: Any>(&mut self) -> Option<T> {
        self.slots
            .remove(&TypeId::of::<T>())
            .and_then(|b| b.downcast().ok())
            .map(|b| *b)
    }
}

/// External dependency coordinates requested for one task.
#[derive(Debug, Default, Clone)]
pub struct DependencyBucket {
    coordinates: Vec<String>,
}

impl DependencyBucket {
    /// Add a coordinate; exact duplicates collapse so repeated wiring
    /// within one run stays idempotent.
    pub fn add(&mut self, coordinate: impl Into<String>) {
        let coordinate = coordinate.into();
        if !self.coordinates.contains(&coordinate) {
            self.coordinates.push(coordinate);
        }
    }

    pub fn coordinates(&self) -> &[String] {
        &self.coordinates
    }
}

/// The task graph supplied by the host.
pub struct TaskGraph {
    graph: DiGraph<Task, ()>,
    index: HashMap<String, NodeIndex>,
    buckets: HashMap<TaskId, DependencyBucket>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
            buckets: HashMap::new(),
        }
    }

    pub fn add_task(&mut self, name: &str, kind: TaskKind) -> Result<TaskId> {
        if self.index.contains_key(name) {
            return Err(WeaveError::Graph(format!("duplicate task name: {}", name)));
        }
        let node = self.graph.add_node(Task::new(name, kind));
        self.index.insert(name.to_string(), node);
        Ok(TaskId(name.to_string()))
    }

    /// Declare that `task` runs after `depends_on`.
    pub fn add_dependency(&mut self, task: &TaskId, depends_on: &TaskId) -> Result<()> {
        let from = self.node(depends_on)?;
        let to = self.node(task)?;
        self.graph.update_edge(from, to, ());
        Ok(())
    }

    pub fn task(&self, id: &TaskId) -> Result<&Task> {
        let node = self.node(id)?;
        Ok(&self.graph[node])
    }

    pub fn task_mut(&mut self, id: &TaskId) -> Result<&mut Task> {
        let node = self.node(id)?;
        Ok(&mut self.graph[node])
    }

    /// Per-task dependency bucket, created on first access.
    pub fn dependency_bucket(&mut self, id: &TaskId) -> &mut DependencyBucket {
        self.buckets.entry(id.clone()).or_default()
    }

    /// Bucket contents for inspection; empty slice when never created.
    pub fn requested_dependencies(&self, id: &TaskId) -> &[String] {
        self.buckets
            .get(id)
            .map(|b| b.coordinates())
            .unwrap_or(&[])
    }

    /// Execute every task once, dependencies first, one task body at a
    /// time. For each task the order is fixed: pre-actions, body,
    /// post-actions. The first failure halts the run.
    pub fn run(&mut self) -> Result<()> {
        let order = self.execution_order()?;

        for node in order {
            let (name, pre, body, post) = {
                let task = &mut self.graph[node];
                (
                    task.name.clone(),
                    std::mem::take(&mut task.pre_actions),
                    task.body.take(),
                    std::mem::take(&mut task.post_actions),
                )
            };
            debug!("Running task {}", name);

            let outcome = self.run_actions(&pre, &body, &post);

            // Hand the hooks back before surfacing any failure, so the
            // graph is inspectable afterwards.
            let task = &mut self.graph[node];
            task.pre_actions = pre;
            task.body = body;
            task.post_actions = post;

            outcome?;
        }
        Ok(())
    }

    fn run_actions(
        &mut self,
        pre: &[Box<dyn TaskAction>],
        body: &Option<Box<dyn TaskAction>>,
        post: &[Box<dyn TaskAction>],
    ) -> Result<()> {
        for action in pre {
            debug!("  pre: {}", action.describe());
            action.execute(self)?;
        }
        if let Some(action) = body {
            action.execute(self)?;
        }
        for action in post {
            debug!("  post: {}", action.describe());
            action.execute(self)?;
        }
        Ok(())
    }

    fn execution_order(&self) -> Result<Vec<NodeIndex>> {
        toposort(&self.graph, None).map_err(|cycle| {
            let task = &self.graph[cycle.node_id()];
            WeaveError::Graph(format!("dependency cycle involving task {}", task.name))
        })
    }

    fn node(&self, id: &TaskId) -> Result<NodeIndex> {
        self.index
            .get(&id.0)
            .copied()
            .ok_or_else(|| WeaveError::Graph(format!("unknown task: {}", id.0)))
    }
}

impl Default for TaskGraph {
    fn default() -> Self {
        Self::new()
    }
}
