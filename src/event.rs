//! Events emitted by the [`Runner`](crate::Runner) and the listeners that
//! observe them.
//!
//! Every step of a run produces a short, fully ordered sequence of events:
//!
//! ```text
//! success: TaskSelected, TaskExecuted, LinkTransferred*
//! failure: TaskSelected, TaskFailed
//! ```
//!
//! Listeners are called synchronously, in registration order, from inside
//! [`Runner::run`](crate::Runner::run).

use std::sync::Arc;

use tracing::Level;

use crate::link::Link;
use crate::task::TaskHandle;

#[derive(Debug, Clone)]
pub enum Event {
    TaskSelected(TaskHandle),
    TaskExecuted(TaskHandle),
    TaskFailed {
        task: TaskHandle,
        cause: Arc<anyhow::Error>,
    },
    LinkTransferred(Link),
}

impl Event {
    /// The task this event is about; the source task for a transfer.
    pub fn task(&self) -> &TaskHandle {
        match self {
            Event::TaskSelected(task) | Event::TaskExecuted(task) => task,
            Event::TaskFailed { task, .. } => task,
            Event::LinkTransferred(link) => link.source(),
        }
    }
}

/// Receives the events of a runner.
///
/// Implemented for any `FnMut(&Event) + Send` closure. A listener must not
/// touch the graph it is observing.
pub trait Listener: Send {
    fn on_event(&mut self, event: &Event);
}

impl<F> Listener for F
where
    F: FnMut(&Event) + Send,
{
    fn on_event(&mut self, event: &Event) {
        self(event)
    }
}

/// Token returned on registration, used to unregister a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// Reports every event through `tracing`.
///
/// Failures are always reported at `WARN`, other events at the level given on
/// construction.
#[derive(Debug, Clone)]
pub struct LogListener {
    level: Level,
}

impl LogListener {
    pub fn new(level: Level) -> Self {
        Self { level }
    }
}

impl Default for LogListener {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

macro_rules! log_at {
    ($level:expr, $($arg:tt)+) => {
        match $level {
            Level::ERROR => tracing::error!($($arg)+),
            Level::WARN => tracing::warn!($($arg)+),
            Level::INFO => tracing::info!($($arg)+),
            Level::DEBUG => tracing::debug!($($arg)+),
            _ => tracing::trace!($($arg)+),
        }
    };
}

impl Listener for LogListener {
    fn on_event(&mut self, event: &Event) {
        match event {
            Event::TaskSelected(task) => log_at!(self.level, task = %task, "Task selected"),
            Event::TaskExecuted(task) => log_at!(self.level, task = %task, "Task executed"),
            Event::TaskFailed { task, cause } => {
                tracing::warn!(task = %task, "Task executed but failed: {cause:#}")
            }
            Event::LinkTransferred(link) => log_at!(self.level, link = %link, "Link activated"),
        }
    }
}
