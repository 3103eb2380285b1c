use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::link::Link;
use crate::port::PortId;
use crate::task::TaskHandle;

/// Failure to access a task port.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PortError {
    #[error("No such input: {0}")]
    NoSuchInput(PortId),

    #[error("No such output: {0}")]
    NoSuchOutput(PortId),

    #[error("No value available on output {0}")]
    Unset(PortId),

    #[error("Port {port} holds a value of another type, expected {expected}")]
    TypeMismatch { port: PortId, expected: &'static str },

    #[error("Port id {0} is reserved")]
    Reserved(PortId),
}

/// What keeps a task from being removed from a [`Blueprint`](crate::Blueprint).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Link,
    GraphInput(PortId),
    GraphOutput(PortId),
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Link => write!(f, "it is still linked to others"),
            Reference::GraphInput(id) => write!(f, "it is still used as graph input {id}"),
            Reference::GraphOutput(id) => write!(f, "it is still used as graph output {id}"),
        }
    }
}

/// Structural errors raised while editing a [`Blueprint`](crate::Blueprint).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlueprintError {
    #[error("Task {0} has not been added")]
    UnknownTask(String),

    #[error("Task {task} cannot be removed: {by}")]
    StillReferenced { task: String, by: Reference },
}

/// Errors of the graph-level input/output surface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Unknown graph input: {0}")]
    UnknownInput(PortId),

    #[error("Unknown graph output: {0}")]
    UnknownOutput(PortId),

    #[error(transparent)]
    Port(#[from] PortError),
}

/// Errors returned by [`Runner::run`](crate::Runner::run).
#[derive(Debug, Error)]
pub enum RunError {
    /// No task is both executable and wanting to run. This is the normal end
    /// of a run, not a fault.
    #[error("No task ready to run")]
    NoTaskReady,

    #[error("Task {task} failed:\n{cause}")]
    TaskFailed {
        task: TaskHandle,
        #[source]
        cause: Arc<anyhow::Error>,
    },

    #[error("Link {link} could not transfer:\n{source}")]
    Transfer {
        link: Link,
        #[source]
        source: PortError,
    },

    #[error("Step limit of {0} reached before the graph went idle")]
    StepLimit(usize),
}

impl RunError {
    /// Returns `true` for the end-of-run signal.
    pub fn is_idle(&self) -> bool {
        matches!(self, RunError::NoTaskReady)
    }
}
