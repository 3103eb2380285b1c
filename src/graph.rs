//! The immutable side of the task graph.
//!
//! A [`Graph`] is produced by [`Blueprint::create_instance`](crate::Blueprint::create_instance).
//! It holds an ordered list of tasks, an ordered list of links and the
//! graph-level input and output maps. These are copied out of the blueprint
//! once and never change afterwards, so a graph is cheap to clone and can be
//! shared by any number of readers.
//!
//! The *tasks* behind the handles are still mutable: running a graph changes
//! their internal state, and two runners stepping the same tasks concurrently
//! would interleave their effects.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::GraphError;
use crate::link::{Link, LinkKind};
use crate::port::{PortId, Value, downcast, value};
use crate::task::TaskHandle;

/// A `(task, port)` pair a graph-level input or output resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    task: TaskHandle,
    port: PortId,
}

impl Endpoint {
    pub fn new(task: &TaskHandle, port: impl Into<PortId>) -> Self {
        Self {
            task: task.clone(),
            port: port.into(),
        }
    }

    pub fn task(&self) -> &TaskHandle {
        &self.task
    }

    pub fn port(&self) -> &PortId {
        &self.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.task, self.port)
    }
}

/// Graph-level port names mapped to endpoints, in insertion order.
///
/// Re-inserting a name replaces its endpoint and keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortMap {
    entries: Vec<(PortId, Endpoint)>,
}

impl PortMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `id` to `endpoint` and returns the endpoint it replaced.
    pub fn insert(&mut self, id: PortId, endpoint: Endpoint) -> Option<Endpoint> {
        match self.entries.iter_mut().find(|(item, _)| *item == id) {
            Some((_, slot)) => Some(std::mem::replace(slot, endpoint)),
            None => {
                self.entries.push((id, endpoint));
                None
            }
        }
    }

    pub fn get(&self, id: &PortId) -> Option<&Endpoint> {
        self.entries
            .iter()
            .find(|(item, _)| item == id)
            .map(|(_, endpoint)| endpoint)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&PortId, &Endpoint) -> bool) {
        self.entries.retain(|(id, endpoint)| keep(id, endpoint));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PortId, &Endpoint)> {
        self.entries.iter().map(|(id, endpoint)| (id, endpoint))
    }

    pub fn keys(&self) -> impl Iterator<Item = &PortId> {
        self.entries.iter().map(|(id, _)| id)
    }

    pub fn values(&self) -> impl Iterator<Item = &Endpoint> {
        self.entries.iter().map(|(_, endpoint)| endpoint)
    }
}

/// An immutable snapshot of a task graph.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    tasks: Arc<[TaskHandle]>,
    links: Arc<[Link]>,
    inputs: Arc<PortMap>,
    outputs: Arc<PortMap>,
}

impl Graph {
    pub(crate) fn new(
        tasks: Vec<TaskHandle>,
        links: Vec<Link>,
        inputs: PortMap,
        outputs: PortMap,
    ) -> Self {
        Self {
            tasks: tasks.into(),
            links: links.into(),
            inputs: Arc::new(inputs),
            outputs: Arc::new(outputs),
        }
    }

    /// Tasks, in the order they were added to the blueprint.
    pub fn tasks(&self) -> &[TaskHandle] {
        &self.tasks
    }

    /// Links, in the order they were made in the blueprint.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Links leaving `task`, in link order.
    pub fn outgoing<'a>(&'a self, task: &'a TaskHandle) -> impl Iterator<Item = &'a Link> + 'a {
        self.links.iter().filter(move |link| link.source() == task)
    }

    pub fn input_ids(&self) -> impl Iterator<Item = &PortId> {
        self.inputs.keys()
    }

    pub fn output_ids(&self) -> impl Iterator<Item = &PortId> {
        self.outputs.keys()
    }

    pub fn input(&self, id: &PortId) -> Option<&Endpoint> {
        self.inputs.get(id)
    }

    pub fn output(&self, id: &PortId) -> Option<&Endpoint> {
        self.outputs.get(id)
    }

    /// Writes `item` to the task input behind the graph input `id`.
    ///
    /// # Errors
    ///
    /// [`GraphError::UnknownInput`] if `id` is not a graph input, or the port
    /// error of the underlying write.
    pub fn set_input<T>(&self, id: impl Into<PortId>, item: T) -> Result<(), GraphError>
    where
        T: Any + Send + Sync,
    {
        self.set_input_value(id, value(item))
    }

    pub fn set_input_value(&self, id: impl Into<PortId>, value: Value) -> Result<(), GraphError> {
        let id = id.into();
        let endpoint = self.inputs.get(&id).ok_or(GraphError::UnknownInput(id))?;
        endpoint.task.write(&endpoint.port, value)?;
        Ok(())
    }

    /// Reads the task output behind the graph output `id`.
    ///
    /// # Errors
    ///
    /// [`GraphError::UnknownOutput`] if `id` is not a graph output, or the
    /// port error of the underlying read, `Unset` included.
    pub fn get_output<T>(&self, id: impl Into<PortId>) -> Result<T, GraphError>
    where
        T: Any + Clone,
    {
        let id = id.into();
        let endpoint = self.outputs.get(&id).ok_or(GraphError::UnknownOutput(id))?;
        let value = self.get_output_value(endpoint)?;
        Ok(downcast(&endpoint.port, &value)?)
    }

    fn get_output_value(&self, endpoint: &Endpoint) -> Result<Value, GraphError> {
        Ok(endpoint.task.read(&endpoint.port)?)
    }

    /// Returns a `petgraph` view of this graph: one node per task and one edge
    /// per link, both in graph order.
    ///
    /// The engine itself never orders or validates the structure; this view is
    /// the way to run such analyses (cycle detection, topological order, ...).
    pub fn to_petgraph(&self) -> petgraph::Graph<TaskHandle, Link> {
        let mut graph = petgraph::Graph::with_capacity(self.tasks.len(), self.links.len());

        let nodes: Vec<_> = self
            .tasks
            .iter()
            .map(|task| graph.add_node(task.clone()))
            .collect();

        let index_of = |task: &TaskHandle| {
            self.tasks
                .iter()
                .position(|item| item == task)
                .map(|position| nodes[position])
        };

        for link in self.links.iter() {
            if let (Some(source), Some(target)) = (index_of(link.source()), index_of(link.target()))
            {
                graph.add_edge(source, target, link.clone());
            }
        }

        graph
    }

    pub(crate) fn position(&self, task: &TaskHandle) -> Option<usize> {
        self.tasks.iter().position(|item| item == task)
    }
}

/// Renders the graph as a Mermaid flowchart.
impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "graph LR")?;

        for (index, task) in self.tasks.iter().enumerate() {
            let name = task.to_string().replace('"', "\\\"");
            writeln!(f, "    {index}[\"{name}\"]")?;
        }

        for (id, endpoint) in self.inputs.iter() {
            if let Some(index) = self.position(&endpoint.task) {
                writeln!(f, "    in_{id}((\"{id}\")) --> |{}| {index}", endpoint.port)?;
            }
        }

        for (id, endpoint) in self.outputs.iter() {
            if let Some(index) = self.position(&endpoint.task) {
                writeln!(f, "    {index} --> |{}| out_{id}((\"{id}\"))", endpoint.port)?;
            }
        }

        for link in self.links.iter() {
            let (Some(source), Some(target)) =
                (self.position(link.source()), self.position(link.target()))
            else {
                continue;
            };

            let label = match link.kind() {
                LinkKind::Pull { output } => format!("{output} → {}", link.input()),
                LinkKind::Force { type_name, .. } => format!(
                    "{} → {}",
                    type_name.replace('<', "&lt;").replace('>', "&gt;"),
                    link.input()
                ),
            };

            let arrow = if link.is_forced() { "-.->" } else { "-->" };
            writeln!(f, "    {source} {arrow} |\"{label}\"| {target}")?;
        }

        Ok(())
    }
}
