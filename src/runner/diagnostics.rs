use std::collections::HashMap;
use std::fmt::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::event::{Event, Listener};
use crate::graph::Graph;
use crate::link::LinkKind;
use crate::task::TaskId;

/// Timings collected for a single task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskExecution {
    /// Start of the first execution.
    pub start: Instant,
    /// Total time spent executing, over all runs.
    pub duration: Duration,
    pub runs: usize,
    pub failures: usize,
}

#[derive(Debug, Default)]
struct State {
    execution_times: HashMap<TaskId, TaskExecution>,
    running: Option<(TaskId, Instant)>,
}

/// Listener measuring how long each task takes to execute.
///
/// The handle is cheap to clone: register one clone on a runner and keep
/// another one to read the measurements.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    state: Arc<Mutex<State>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn execution_times(&self) -> HashMap<TaskId, TaskExecution> {
        self.lock().execution_times.clone()
    }

    pub fn execution(&self, task: TaskId) -> Option<TaskExecution> {
        self.lock().execution_times.get(&task).cloned()
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.execution_times.clear();
        state.running = None;
    }

    /// Renders `graph` as a Mermaid flowchart, each executed task colored from
    /// green to red by the time it took, relative to the others.
    pub fn render_mermaid(&self, graph: &Graph) -> String {
        let mut f = String::new();
        let _ = self.write_mermaid(graph, &mut f);
        f
    }

    fn write_mermaid(&self, graph: &Graph, f: &mut String) -> fmt::Result {
        writeln!(f, "graph LR")?;

        let times = self.execution_times();
        let mut min_time = f64::MAX;
        let mut max_time = f64::MIN;

        for t in times.values() {
            let secs = t.duration.as_secs_f64();
            min_time = min_time.min(secs);
            max_time = max_time.max(secs);
        }

        if min_time > max_time {
            min_time = 0.0;
            max_time = 0.0;
        }

        if (max_time - min_time).abs() < f64::EPSILON {
            max_time = min_time + 1.0;
        }

        for (index, task) in graph.tasks().iter().enumerate() {
            let name = task.to_string().replace('"', "\\\"");

            let (label_extra, color_code) = match times.get(&task.id()) {
                Some(exec) => {
                    let t = (exec.duration.as_secs_f64() - min_time) / (max_time - min_time);
                    let label = format!("{}× {:.2?}", exec.runs, exec.duration);
                    (label, gradient(t))
                }
                None => ("Idle".to_string(), "#ADD8E6".to_string()),
            };

            writeln!(f, "    {index}[\"{name}\\n{label_extra}\"]")?;
            writeln!(f, "    style {index} fill:{color_code}")?;

            if times.get(&task.id()).is_some_and(|exec| exec.failures > 0) {
                writeln!(f, "    style {index} stroke:#B00020,stroke-width:3px")?;
            }
        }

        for link in graph.links() {
            let (Some(source), Some(target)) =
                (graph.position(link.source()), graph.position(link.target()))
            else {
                continue;
            };

            let label = match link.kind() {
                LinkKind::Pull { output } => output.to_string(),
                LinkKind::Force { type_name, .. } => {
                    type_name.replace('<', "&lt;").replace('>', "&gt;")
                }
            };
            writeln!(f, "    {source} -- \"{label}\" --> {target}")?;
        }

        Ok(())
    }
}

/// Green at 0.0, yellow at 0.5, red at 1.0.
fn gradient(t: f64) -> String {
    let (r, g, b) = if t < 0.5 {
        ((255.0 * t * 2.0) as u8, 255, 0)
    } else {
        (255, (255.0 * (1.0 - (t - 0.5) * 2.0)) as u8, 0)
    };
    format!("#{r:02X}{g:02X}{b:02X}")
}

impl Listener for Diagnostics {
    fn on_event(&mut self, event: &Event) {
        let mut state = self.lock();

        let failed = match event {
            Event::TaskSelected(task) => {
                state.running = Some((task.id(), Instant::now()));
                return;
            }
            Event::TaskExecuted(_) => false,
            Event::TaskFailed { .. } => true,
            Event::LinkTransferred(_) => return,
        };

        let Some((id, start)) = state.running.take() else {
            return;
        };
        if id != event.task().id() {
            return;
        }

        let duration = start.elapsed();
        let entry = state
            .execution_times
            .entry(id)
            .or_insert_with(|| TaskExecution {
                start,
                duration: Duration::ZERO,
                runs: 0,
                failures: 0,
            });
        entry.duration += duration;
        entry.runs += 1;
        if failed {
            entry.failures += 1;
        }
    }
}
