//! Port identifiers, type-erased values and the typed accessors handed out by
//! a [`TaskHandle`].
//!
//! ## Values
//!
//! Everything that travels through a port is stored as a [`Value`], which is
//! an `Arc<dyn Any + Send + Sync>`. The graph never needs to know the concrete
//! type: a pulling link copies the `Arc` from one task to another, and only
//! the receiving task downcasts it. The typed accessors ([`InputSetter<T>`]
//! and [`OutputGetter<T>`]) do the erasure and the downcast at the edge of the
//! library, so user code works with plain `T`s.

use std::any::{Any, type_name};
use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::PortError;
use crate::task::TaskHandle;

/// A type-erased, thread-safe port value.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Wraps a concrete value into a [`Value`].
pub fn value<T>(item: T) -> Value
where
    T: Any + Send + Sync,
{
    Arc::new(item)
}

/// Downcasts a [`Value`] received on `port` into an owned `T`.
pub fn downcast<T>(port: &PortId, value: &Value) -> Result<T, PortError>
where
    T: Any + Clone,
{
    value
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| PortError::TypeMismatch {
            port: port.clone(),
            expected: type_name::<T>(),
        })
}

/// Identifier of a port.
///
/// Ids are unique among the inputs of a task and, separately, among its
/// outputs, so the same id can name both an input and an output. Graph-level
/// inputs and outputs are named with the same type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PortId {
    Name(Cow<'static, str>),
    Index(usize),
}

impl PortId {
    pub const fn name(name: &'static str) -> Self {
        PortId::Name(Cow::Borrowed(name))
    }

    pub const fn index(index: usize) -> Self {
        PortId::Index(index)
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortId::Name(name) => f.write_str(name),
            PortId::Index(index) => write!(f, "#{index}"),
        }
    }
}

impl From<&'static str> for PortId {
    fn from(value: &'static str) -> Self {
        PortId::Name(Cow::Borrowed(value))
    }
}

impl From<String> for PortId {
    fn from(value: String) -> Self {
        PortId::Name(Cow::Owned(value))
    }
}

impl From<usize> for PortId {
    fn from(value: usize) -> Self {
        PortId::Index(value)
    }
}

impl From<&PortId> for PortId {
    fn from(value: &PortId) -> Self {
        value.clone()
    }
}

/// Write side of a task input.
///
/// Obtained through [`TaskHandle::input`], which checks that the id is one of
/// the task's advertised inputs. Every call to [`set`](InputSetter::set)
/// overwrites the previous value.
pub struct InputSetter<T> {
    task: TaskHandle,
    port: PortId,
    _phantom: PhantomData<fn(T)>,
}

impl<T> InputSetter<T>
where
    T: Any + Send + Sync,
{
    pub(crate) fn new(task: TaskHandle, port: PortId) -> Self {
        Self {
            task,
            port,
            _phantom: PhantomData,
        }
    }

    pub fn port(&self) -> &PortId {
        &self.port
    }

    pub fn set(&self, item: T) -> Result<(), PortError> {
        self.task.write(&self.port, value(item))
    }
}

impl<T> fmt::Debug for InputSetter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InputSetter({}({}))", self.task, self.port)
    }
}

/// Read side of a task output.
///
/// Obtained through [`TaskHandle::output`]. The getter does not cache
/// anything, each call reads the live state of the task.
pub struct OutputGetter<T> {
    task: TaskHandle,
    port: PortId,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> OutputGetter<T>
where
    T: Any + Clone,
{
    pub(crate) fn new(task: TaskHandle, port: PortId) -> Self {
        Self {
            task,
            port,
            _phantom: PhantomData,
        }
    }

    pub fn port(&self) -> &PortId {
        &self.port
    }

    /// Reads the current value.
    ///
    /// # Errors
    ///
    /// [`PortError::Unset`] if the task has not produced a value on this port,
    /// [`PortError::TypeMismatch`] if the stored value is not a `T`.
    pub fn get(&self) -> Result<T, PortError> {
        let value = self.task.read(&self.port)?;
        downcast(&self.port, &value)
    }

    /// Returns `true` iff [`get`](OutputGetter::get) would find a value.
    pub fn is_set(&self) -> bool {
        self.task.is_set(&self.port).unwrap_or(false)
    }
}

impl<T> fmt::Debug for OutputGetter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OutputGetter({}({}))", self.task, self.port)
    }
}
