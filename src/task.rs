//! The task contract and the shared handle the graph stores tasks behind.
//!
//! A [`Task`] is the atomic unit of computation. It advertises named input and
//! output ports, tells the runner whether it *can* run ([`Task::is_executable`])
//! and whether it *wants* to run ([`Task::wants_execution`]), and does its work
//! in [`Task::execute`].
//!
//! Tasks carry mutable state, and the same task is referenced from the
//! blueprint, from every graph snapshot taken from it, and from the links
//! touching it. The graph therefore never owns a task directly: it holds a
//! [`TaskHandle`], a cheap clonable reference whose equality is the identity
//! of the task, never its contents.

use std::any::{Any, type_name};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::PortError;
use crate::port::{InputSetter, OutputGetter, PortId, Value};

/// The contract every unit of work implements.
///
/// Most tasks do not implement this trait by hand: [`Simple`](crate::Simple)
/// provides the usual "all inputs received, run once, re-arm on reset" policy
/// on top of a [`Procedure`](crate::Procedure).
pub trait Task: Send + 'static {
    /// Ids of the inputs of this task.
    fn input_ids(&self) -> Vec<PortId>;

    /// Ids of the outputs of this task.
    fn output_ids(&self) -> Vec<PortId>;

    /// Writes `value` to the input `id`.
    fn write_input(&mut self, id: &PortId, value: Value) -> Result<(), PortError>;

    /// Reads the output `id`, `Ok(None)` while no value is available.
    fn read_output(&self, id: &PortId) -> Result<Option<Value>, PortError>;

    /// Whether [`execute`](Task::execute) can be called safely right now.
    fn is_executable(&self) -> bool;

    /// Whether this task has pending demand. Expected to turn `false` once
    /// [`execute`](Task::execute) returns successfully.
    fn wants_execution(&self) -> bool;

    fn execute(&mut self) -> anyhow::Result<()>;
}

/// Process-unique identity of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        TaskId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

struct TaskCell {
    id: TaskId,
    name: Cow<'static, str>,
    task: Mutex<Box<dyn Task>>,
}

/// A shared reference to a task.
///
/// Two handles are equal iff they were cloned from the same
/// [`TaskHandle::new`] call, even when the wrapped tasks look alike.
#[derive(Clone)]
pub struct TaskHandle {
    inner: Arc<TaskCell>,
}

impl TaskHandle {
    /// Wraps a task, naming it after its type.
    pub fn new<T: Task>(task: T) -> Self {
        Self::named(short_type_name::<T>(), task)
    }

    /// Wraps a task under a human readable name, used in logs and diagrams.
    pub fn named<T: Task>(name: impl Into<Cow<'static, str>>, task: T) -> Self {
        Self {
            inner: Arc::new(TaskCell {
                id: TaskId::next(),
                name: name.into(),
                task: Mutex::new(Box::new(task)),
            }),
        }
    }

    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn Task>> {
        // A task that panicked mid-execution keeps whatever state it had.
        self.inner.task.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn input_ids(&self) -> Vec<PortId> {
        self.lock().input_ids()
    }

    pub fn output_ids(&self) -> Vec<PortId> {
        self.lock().output_ids()
    }

    pub fn is_executable(&self) -> bool {
        self.lock().is_executable()
    }

    pub fn wants_execution(&self) -> bool {
        self.lock().wants_execution()
    }

    pub fn execute(&self) -> anyhow::Result<()> {
        self.lock().execute()
    }

    /// Typed write accessor for the input `id`.
    ///
    /// # Errors
    ///
    /// [`PortError::NoSuchInput`] if `id` is not one of [`input_ids`](Self::input_ids).
    pub fn input<T>(&self, id: impl Into<PortId>) -> Result<InputSetter<T>, PortError>
    where
        T: Any + Send + Sync,
    {
        let id = id.into();
        if self.input_ids().contains(&id) {
            Ok(InputSetter::new(self.clone(), id))
        } else {
            Err(PortError::NoSuchInput(id))
        }
    }

    /// Typed read accessor for the output `id`.
    ///
    /// # Errors
    ///
    /// [`PortError::NoSuchOutput`] if `id` is not one of [`output_ids`](Self::output_ids).
    pub fn output<T>(&self, id: impl Into<PortId>) -> Result<OutputGetter<T>, PortError>
    where
        T: Any + Clone,
    {
        let id = id.into();
        if self.output_ids().contains(&id) {
            Ok(OutputGetter::new(self.clone(), id))
        } else {
            Err(PortError::NoSuchOutput(id))
        }
    }

    /// Untyped write, as performed by links.
    pub fn write(&self, id: &PortId, value: Value) -> Result<(), PortError> {
        self.lock().write_input(id, value)
    }

    /// Untyped read, failing with [`PortError::Unset`] when no value is available.
    pub fn read(&self, id: &PortId) -> Result<Value, PortError> {
        self.lock()
            .read_output(id)?
            .ok_or_else(|| PortError::Unset(id.clone()))
    }

    pub fn is_set(&self, id: &PortId) -> Result<bool, PortError> {
        Ok(self.lock().read_output(id)?.is_some())
    }
}

impl PartialEq for TaskHandle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for TaskHandle {}

impl Hash for TaskHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.inner.id.0)
            .field("name", &self.inner.name)
            .finish()
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.inner.name, self.inner.id.0)
    }
}

fn short_type_name<T>() -> String {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}
