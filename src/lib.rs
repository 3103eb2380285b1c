#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod blueprint;
mod error;
mod event;
mod graph;
mod link;
mod port;
mod runner;
mod simple;
mod task;
pub mod tasks;
#[cfg(feature = "logging")]
mod utils;

#[cfg(test)]
mod testing;

pub use crate::blueprint::{Blueprint, CleanPolicy};
pub use crate::error::*;
pub use crate::event::{Event, Listener, ListenerId, LogListener};
pub use crate::graph::{Endpoint, Graph, PortMap};
pub use crate::link::{Link, LinkKind};
pub use crate::port::{InputSetter, OutputGetter, PortId, Value, downcast, value};
pub use crate::runner::{Diagnostics, Runner, RunnerConfig, TaskExecution};
pub use crate::simple::{Procedure, ResetSet, Simple};
pub use crate::task::{Task, TaskHandle, TaskId};
#[cfg(feature = "logging")]
pub use crate::utils::init_logging;
