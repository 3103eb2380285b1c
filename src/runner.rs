mod diagnostics;

use std::sync::Arc;
use std::time::Instant;

use tracing::Level;

use crate::error::RunError;
use crate::event::{Event, Listener, ListenerId};
use crate::graph::Graph;
use crate::task::TaskHandle;

pub use diagnostics::{Diagnostics, TaskExecution};

/// Settings of a [`Runner`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RunnerConfig {
    /// Upper bound on the steps [`Runner::run_until_idle`] performs. `None`
    /// runs until no task is ready, which never happens for a graph that keeps
    /// re-arming itself.
    pub max_steps: Option<usize>,
}

/// Executes a [`Graph`] one task at a time.
///
/// Each call to [`run`](Runner::run) is a single step:
///
/// 1. select the first task, in graph order, that is executable and wants to
///    run;
/// 2. execute it;
/// 3. transfer every transferable link leaving it, in link order.
///
/// Listeners registered on the runner observe every step as a sequence of
/// [`Event`]s. A runner never orders tasks topologically, the order of the
/// tasks in the graph is the only priority.
pub struct Runner {
    graph: Graph,
    listeners: Vec<(ListenerId, Box<dyn Listener>)>,
    next_listener: u64,
    config: RunnerConfig,
}

impl Runner {
    pub fn new(graph: Graph) -> Self {
        Self::with_config(graph, RunnerConfig::default())
    }

    pub fn with_config(graph: Graph, config: RunnerConfig) -> Self {
        Self {
            graph,
            listeners: Vec::new(),
            next_listener: 0,
            config,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Swaps the graph this runner steps through. Listeners are kept.
    pub fn set_graph(&mut self, graph: Graph) {
        self.graph = graph;
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Adds a listener, notified after the ones already registered.
    pub fn register(&mut self, listener: impl Listener + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn unregister(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(item, _)| *item != id);
        self.listeners.len() != before
    }

    /// Performs a single step and returns the task that was executed.
    ///
    /// # Errors
    ///
    /// * [`RunError::NoTaskReady`] when no task can run. Nothing happens and
    ///   no event is emitted.
    /// * [`RunError::TaskFailed`] when the selected task returned an error.
    ///   Its outgoing links are not transferred.
    /// * [`RunError::Transfer`] when a link could not write to its target.
    ///   Links after it are not transferred.
    pub fn run(&mut self) -> Result<TaskHandle, RunError> {
        let Some(task) = self.select() else {
            tracing::trace!("No task ready");
            return Err(RunError::NoTaskReady);
        };

        let span = tracing::span!(Level::DEBUG, "step", task = %task);
        let _enter = span.enter();

        tracing::debug!("Task selected");
        self.emit(&Event::TaskSelected(task.clone()));

        let start = Instant::now();
        if let Err(cause) = task.execute() {
            let cause = Arc::new(cause);
            tracing::warn!(elapsed = ?start.elapsed(), "Task failed: {cause:#}");
            self.emit(&Event::TaskFailed {
                task: task.clone(),
                cause: cause.clone(),
            });
            return Err(RunError::TaskFailed { task, cause });
        }
        tracing::debug!(elapsed = ?start.elapsed(), "Task executed");
        self.emit(&Event::TaskExecuted(task.clone()));

        let graph = self.graph.clone();
        for link in graph.outgoing(&task) {
            let transferable = link.is_transferable().map_err(|source| RunError::Transfer {
                link: link.clone(),
                source,
            })?;

            if !transferable {
                tracing::trace!(link = %link, "Nothing to transfer");
                continue;
            }

            link.transfer().map_err(|source| RunError::Transfer {
                link: link.clone(),
                source,
            })?;
            tracing::debug!(link = %link, "Link transferred");
            self.emit(&Event::LinkTransferred(link.clone()));
        }

        Ok(task)
    }

    /// Calls [`run`](Runner::run) until no task is ready and returns the
    /// number of steps performed.
    ///
    /// # Errors
    ///
    /// The first failing step's error, or [`RunError::StepLimit`] if tasks are
    /// still ready after [`RunnerConfig::max_steps`] steps.
    pub fn run_until_idle(&mut self) -> Result<usize, RunError> {
        let mut steps = 0;

        loop {
            if let Some(limit) = self.config.max_steps.filter(|limit| steps >= *limit) {
                return match self.select() {
                    Some(_) => Err(RunError::StepLimit(limit)),
                    None => Ok(steps),
                };
            }

            match self.run() {
                Ok(_) => steps += 1,
                Err(RunError::NoTaskReady) => break,
                Err(error) => return Err(error),
            }
        }

        tracing::debug!(steps, "Graph idle");
        Ok(steps)
    }

    fn select(&self) -> Option<TaskHandle> {
        for task in self.graph.tasks() {
            if task.is_executable() && task.wants_execution() {
                return Some(task.clone());
            }
            tracing::trace!(task = %task, "Task not ready");
        }
        None
    }

    fn emit(&mut self, event: &Event) {
        for (_, listener) in self.listeners.iter_mut() {
            listener.on_event(event);
        }
    }
}
