use std::any::Any;
use std::collections::HashSet;

use crate::error::{BlueprintError, Reference};
use crate::graph::{Endpoint, Graph, PortMap};
use crate::link::Link;
use crate::port::PortId;
use crate::task::TaskHandle;

/// Which tasks survive [`Blueprint::clean`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanPolicy {
    /// Only tasks touched by a link survive. Graph inputs and outputs mapped
    /// onto a dropped task are forgotten.
    #[default]
    Links,
    /// Tasks touched by a link or used as a graph input or output survive.
    LinksAndGraphPorts,
}

/// The blueprint of a task graph.
///
/// `Blueprint` is the mutable side of the graph: you add tasks, wire them
/// together with links and expose some of their ports as graph-level inputs
/// and outputs. Every edit keeps the structure consistent, a link or a graph
/// port can only reference a task that was added, and a task cannot be
/// removed while something still references it.
///
/// Once configured, [`create_instance`](Blueprint::create_instance) freezes
/// the current state into an immutable [`Graph`] to hand to a
/// [`Runner`](crate::Runner). The blueprint can keep being edited afterwards
/// without affecting graphs already created.
///
/// # Example
///
/// ```rust,ignore
/// let mut blueprint = Blueprint::new();
/// blueprint.add_all([&source, &sink]);
/// blueprint.link(&source, "out", &sink, "in")?;
/// blueprint.set_graph_input("seed", &source, "in")?;
///
/// let graph = blueprint.create_instance();
/// ```
#[derive(Debug, Default, Clone)]
pub struct Blueprint {
    tasks: Vec<TaskHandle>,
    links: Vec<Link>,
    inputs: PortMap,
    outputs: PortMap,
    clean_policy: CleanPolicy,
}

impl Blueprint {
    /// Creates a new, empty blueprint.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clean_policy(mut self, policy: CleanPolicy) -> Self {
        self.clean_policy = policy;
        self
    }

    pub fn clean_policy(&self) -> CleanPolicy {
        self.clean_policy
    }

    pub fn tasks(&self) -> &[TaskHandle] {
        &self.tasks
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn graph_inputs(&self) -> &PortMap {
        &self.inputs
    }

    pub fn graph_outputs(&self) -> &PortMap {
        &self.outputs
    }

    pub fn contains(&self, task: &TaskHandle) -> bool {
        self.tasks.contains(task)
    }

    /// Forgets every task, link and graph port.
    pub fn clear(&mut self) -> &mut Self {
        self.tasks.clear();
        self.links.clear();
        self.inputs.clear();
        self.outputs.clear();
        self
    }

    /// Adds a task. Adding a task twice keeps a single entry.
    pub fn add(&mut self, task: &TaskHandle) -> &mut Self {
        if !self.contains(task) {
            self.tasks.push(task.clone());
        }
        self
    }

    pub fn add_all<'a>(&mut self, tasks: impl IntoIterator<Item = &'a TaskHandle>) -> &mut Self {
        for task in tasks {
            self.add(task);
        }
        self
    }

    /// Removes a task. Removing an absent task does nothing.
    ///
    /// # Errors
    ///
    /// [`BlueprintError::StillReferenced`] while a link, a graph input or a
    /// graph output references the task. See [`unlink_all`](Self::unlink_all).
    pub fn remove(&mut self, task: &TaskHandle) -> Result<&mut Self, BlueprintError> {
        if !self.contains(task) {
            return Ok(self);
        }

        if let Some(by) = self.reference_to(task) {
            return Err(BlueprintError::StillReferenced {
                task: task.to_string(),
                by,
            });
        }

        self.tasks.retain(|item| item != task);
        Ok(self)
    }

    /// Removes several tasks, stopping at the first one still referenced.
    pub fn remove_all<'a>(
        &mut self,
        tasks: impl IntoIterator<Item = &'a TaskHandle>,
    ) -> Result<&mut Self, BlueprintError> {
        for task in tasks {
            self.remove(task)?;
        }
        Ok(self)
    }

    fn reference_to(&self, task: &TaskHandle) -> Option<Reference> {
        if self.links.iter().any(|link| link.touches(task)) {
            return Some(Reference::Link);
        }
        if let Some(id) = find_endpoint(&self.inputs, task) {
            return Some(Reference::GraphInput(id));
        }
        find_endpoint(&self.outputs, task).map(Reference::GraphOutput)
    }

    fn check_added(&self, task: &TaskHandle) -> Result<(), BlueprintError> {
        if self.contains(task) {
            Ok(())
        } else {
            Err(BlueprintError::UnknownTask(task.to_string()))
        }
    }

    fn insert_link(&mut self, link: Link) {
        if !self.links.contains(&link) {
            self.links.push(link);
        }
    }

    /// Links the output `output` of `from` to the input `input` of `to` with a
    /// pulling link. Linking the same ports twice keeps a single link.
    ///
    /// # Errors
    ///
    /// [`BlueprintError::UnknownTask`] if either task was not added.
    pub fn link(
        &mut self,
        from: &TaskHandle,
        output: impl Into<PortId>,
        to: &TaskHandle,
        input: impl Into<PortId>,
    ) -> Result<&mut Self, BlueprintError> {
        self.check_added(from)?;
        self.check_added(to)?;
        self.insert_link(Link::pull(from, output, to, input));
        Ok(self)
    }

    /// Links `from` to the input `input` of `to` with a forcing link, which
    /// writes `value` each time `from` executes.
    ///
    /// When a forcing link into the same input already exists, the existing
    /// one, and its value, is kept.
    ///
    /// # Errors
    ///
    /// [`BlueprintError::UnknownTask`] if either task was not added.
    pub fn link_value<T>(
        &mut self,
        from: &TaskHandle,
        value: T,
        to: &TaskHandle,
        input: impl Into<PortId>,
    ) -> Result<&mut Self, BlueprintError>
    where
        T: Any + Send + Sync,
    {
        self.check_added(from)?;
        self.check_added(to)?;
        self.insert_link(Link::force(from, value, to, input));
        Ok(self)
    }

    /// Removes a pulling link, if present.
    pub fn unlink(
        &mut self,
        from: &TaskHandle,
        output: impl Into<PortId>,
        to: &TaskHandle,
        input: impl Into<PortId>,
    ) -> &mut Self {
        let link = Link::pull(from, output, to, input);
        self.links.retain(|item| *item != link);
        self
    }

    /// Removes the forcing link from `from` into the input `input` of `to`,
    /// whatever value it carries.
    pub fn unlink_value(
        &mut self,
        from: &TaskHandle,
        to: &TaskHandle,
        input: impl Into<PortId>,
    ) -> &mut Self {
        let link = Link::force(from, (), to, input);
        self.links.retain(|item| *item != link);
        self
    }

    /// Removes every link touching `task` and every graph input or output
    /// mapped onto it. The task itself stays in the blueprint.
    pub fn unlink_all(&mut self, task: &TaskHandle) -> &mut Self {
        self.links.retain(|link| !link.touches(task));
        self.inputs.retain(|_, endpoint| endpoint.task() != task);
        self.outputs.retain(|_, endpoint| endpoint.task() != task);
        self
    }

    /// Drops the tasks that are not linked anymore, according to the
    /// [`CleanPolicy`] of this blueprint.
    pub fn clean(&mut self) -> &mut Self {
        let mut retained: HashSet<TaskHandle> = self
            .links
            .iter()
            .flat_map(|link| [link.source().clone(), link.target().clone()])
            .collect();

        if self.clean_policy == CleanPolicy::LinksAndGraphPorts {
            retained.extend(
                self.inputs
                    .values()
                    .chain(self.outputs.values())
                    .map(|endpoint| endpoint.task().clone()),
            );
        }

        let removed: Vec<TaskHandle> = self
            .tasks
            .iter()
            .filter(|task| !retained.contains(*task))
            .cloned()
            .collect();

        for task in &removed {
            self.unlink_all(task);
        }

        self.tasks.retain(|task| retained.contains(task));
        self
    }

    /// Exposes the input `task_input` of `task` as the graph input `id`,
    /// replacing any previous mapping of `id`.
    ///
    /// # Errors
    ///
    /// [`BlueprintError::UnknownTask`] if `task` was not added.
    pub fn set_graph_input(
        &mut self,
        id: impl Into<PortId>,
        task: &TaskHandle,
        task_input: impl Into<PortId>,
    ) -> Result<&mut Self, BlueprintError> {
        self.check_added(task)?;
        self.inputs
            .insert(id.into(), Endpoint::new(task, task_input.into()));
        Ok(self)
    }

    /// Exposes the output `task_output` of `task` as the graph output `id`,
    /// replacing any previous mapping of `id`.
    ///
    /// # Errors
    ///
    /// [`BlueprintError::UnknownTask`] if `task` was not added.
    pub fn set_graph_output(
        &mut self,
        id: impl Into<PortId>,
        task: &TaskHandle,
        task_output: impl Into<PortId>,
    ) -> Result<&mut Self, BlueprintError> {
        self.check_added(task)?;
        self.outputs
            .insert(id.into(), Endpoint::new(task, task_output.into()));
        Ok(self)
    }

    /// Freezes the current state into a new, independent [`Graph`].
    pub fn create_instance(&self) -> Graph {
        Graph::new(
            self.tasks.clone(),
            self.links.clone(),
            self.inputs.clone(),
            self.outputs.clone(),
        )
    }
}

fn find_endpoint(map: &PortMap, task: &TaskHandle) -> Option<PortId> {
    map.iter()
        .find(|(_, endpoint)| endpoint.task() == task)
        .map(|(id, _)| id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Linear;

    const V: PortId = Linear::VALUE;

    fn tasks<const N: usize>() -> [TaskHandle; N] {
        std::array::from_fn(|i| TaskHandle::named(format!("t{}", i + 1), Linear::default()))
    }

    #[test]
    fn test_clear() {
        let [t1, t2] = tasks();
        let mut blueprint = Blueprint::new();
        blueprint.add_all([&t1, &t2]);
        blueprint.link(&t1, V, &t2, V).unwrap();
        blueprint.set_graph_input("in", &t1, V).unwrap();

        let graph = blueprint.clear().create_instance();
        assert!(graph.tasks().is_empty());
        assert!(graph.links().is_empty());
        assert_eq!(graph.input_ids().count(), 0);
    }

    #[test]
    fn test_add_remove() {
        let [t1, t2] = tasks();
        let mut blueprint = Blueprint::new();

        blueprint.add(&t1).add(&t1).add(&t2);
        assert_eq!(blueprint.create_instance().tasks(), &[t1.clone(), t2.clone()]);

        blueprint.remove(&t1).unwrap();
        let graph = blueprint.create_instance();
        assert_eq!(graph.tasks(), &[t2.clone()]);

        // absent task: no-op
        blueprint.remove(&t1).unwrap();
        assert_eq!(blueprint.tasks(), &[t2]);
    }

    #[test]
    fn test_link_unregistered() {
        let [t1, t2] = tasks();
        let mut blueprint = Blueprint::new();

        assert!(matches!(
            blueprint.link(&t1, V, &t2, V),
            Err(BlueprintError::UnknownTask(_))
        ));
        blueprint.add(&t1);
        assert!(matches!(
            blueprint.link(&t1, V, &t2, V),
            Err(BlueprintError::UnknownTask(name)) if name == t2.to_string()
        ));
        assert!(matches!(
            blueprint.link_value(&t2, 1_i32, &t1, V),
            Err(BlueprintError::UnknownTask(_))
        ));
        assert!(blueprint.links().is_empty());
    }

    #[test]
    fn test_link_idempotent() {
        let [t1, t2] = tasks();
        let mut blueprint = Blueprint::new();
        blueprint.add_all([&t1, &t2]);

        blueprint.link(&t1, V, &t2, V).unwrap();
        blueprint.link(&t1, V, &t2, V).unwrap();
        assert_eq!(blueprint.links().len(), 1);

        blueprint.link_value(&t1, 1_i32, &t2, V).unwrap();
        blueprint.link_value(&t1, 2_i32, &t2, V).unwrap();
        assert_eq!(blueprint.links().len(), 2);
    }

    #[test]
    fn test_unlink() {
        let [t1, t2, t3] = tasks();
        let mut blueprint = Blueprint::new();
        blueprint.add_all([&t1, &t2, &t3]);
        blueprint.link(&t1, V, &t2, V).unwrap();
        blueprint.link(&t2, V, &t3, V).unwrap();
        blueprint.link_value(&t1, 0_u8, &t3, V).unwrap();

        blueprint.unlink(&t1, V, &t2, V);
        assert_eq!(blueprint.links().len(), 2);

        // absent link: no-op
        blueprint.unlink(&t1, V, &t2, V);
        blueprint.unlink(&t3, V, &t1, V);
        assert_eq!(blueprint.links().len(), 2);

        blueprint.unlink_value(&t1, &t3, V);
        assert_eq!(blueprint.links(), &[Link::pull(&t2, V, &t3, V)]);
    }

    #[test]
    fn test_remove_still_referenced() {
        let [t1, t2, t3] = tasks();
        let mut blueprint = Blueprint::new();
        blueprint.add_all([&t1, &t2, &t3]);
        blueprint.link(&t1, V, &t2, V).unwrap();
        blueprint.set_graph_output("out", &t3, V).unwrap();

        assert!(matches!(
            blueprint.remove(&t1),
            Err(BlueprintError::StillReferenced { by: Reference::Link, .. })
        ));
        assert!(matches!(
            blueprint.remove(&t2),
            Err(BlueprintError::StillReferenced { by: Reference::Link, .. })
        ));
        assert!(matches!(
            blueprint.remove(&t3),
            Err(BlueprintError::StillReferenced { by: Reference::GraphOutput(_), .. })
        ));
        assert_eq!(blueprint.tasks().len(), 3);

        blueprint.unlink(&t1, V, &t2, V);
        blueprint.remove_all([&t1, &t2]).unwrap();
        assert_eq!(blueprint.tasks(), &[t3]);
    }

    #[test]
    fn test_unlink_all() {
        let [t1, t2, t3] = tasks();
        let mut blueprint = Blueprint::new();
        blueprint.add_all([&t1, &t2, &t3]);
        blueprint.link(&t1, V, &t2, V).unwrap();
        blueprint.link(&t2, V, &t3, V).unwrap();
        blueprint.link_value(&t3, 1_i32, &t2, V).unwrap();
        blueprint.link(&t1, V, &t3, V).unwrap();
        blueprint.set_graph_input("in", &t2, V).unwrap();
        blueprint.set_graph_output("out", &t2, V).unwrap();
        blueprint.set_graph_output("last", &t3, V).unwrap();

        blueprint.unlink_all(&t2);

        assert_eq!(blueprint.links(), &[Link::pull(&t1, V, &t3, V)]);
        assert!(blueprint.graph_inputs().is_empty());
        assert_eq!(blueprint.graph_outputs().len(), 1);
        assert!(blueprint.contains(&t2));

        blueprint.remove(&t2).unwrap();
        assert!(!blueprint.contains(&t2));
    }

    #[test]
    fn test_clean_links() {
        let [t1, t2, t3, t4] = tasks();
        let mut blueprint = Blueprint::new();
        blueprint.add_all([&t1, &t2, &t3, &t4]);
        blueprint.link(&t1, V, &t2, V).unwrap();
        blueprint.set_graph_output("out", &t3, V).unwrap();

        blueprint.clean();
        assert_eq!(blueprint.tasks(), &[t1.clone(), t2.clone()]);
        assert!(blueprint.graph_outputs().is_empty());

        blueprint.clean();
        assert_eq!(blueprint.tasks(), &[t1.clone(), t2.clone()]);

        blueprint.unlink(&t1, V, &t2, V).clean();
        assert!(blueprint.tasks().is_empty());
    }

    #[test]
    fn test_clean_links_and_graph_ports() {
        let [t1, t2, t3, t4] = tasks();
        let mut blueprint = Blueprint::new().with_clean_policy(CleanPolicy::LinksAndGraphPorts);
        blueprint.add_all([&t1, &t2, &t3, &t4]);
        blueprint.link(&t1, V, &t2, V).unwrap();
        blueprint.set_graph_input("in", &t3, V).unwrap();

        blueprint.clean();
        assert_eq!(blueprint.tasks(), &[t1.clone(), t2.clone(), t3.clone()]);
        assert_eq!(blueprint.graph_inputs().len(), 1);

        blueprint.clean();
        assert_eq!(blueprint.tasks(), &[t1, t2, t3]);
    }

    #[test]
    fn test_graph_port_unregistered() {
        let [t1] = tasks();
        let mut blueprint = Blueprint::new();

        assert!(blueprint.set_graph_input("in", &t1, V).is_err());
        assert!(blueprint.set_graph_output("out", &t1, V).is_err());
    }

    #[test]
    fn test_graph_port_overwrite() {
        let [t1, t2] = tasks();
        let mut blueprint = Blueprint::new();
        blueprint.add_all([&t1, &t2]);

        blueprint.set_graph_input("in", &t1, V).unwrap();
        blueprint.set_graph_input("in", &t2, V).unwrap();

        assert_eq!(blueprint.graph_inputs().len(), 1);
        let input = blueprint.graph_inputs().get(&PortId::name("in")).unwrap();
        assert_eq!(input.task(), &t2);
    }

    #[test]
    fn test_instances_are_independent() {
        let [t1, t2] = tasks();
        let mut blueprint = Blueprint::new();
        blueprint.add(&t1);

        let first = blueprint.create_instance();
        blueprint.add(&t2).link(&t1, V, &t2, V).unwrap();
        let second = blueprint.create_instance();

        assert_eq!(first.tasks().len(), 1);
        assert!(first.links().is_empty());
        assert_eq!(second.tasks().len(), 2);
        assert_eq!(second.links().len(), 1);
    }
}
