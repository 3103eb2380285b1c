use std::any::{Any, type_name};
use std::marker::PhantomData;

use crate::error::PortError;
use crate::port::{PortId, Value, downcast};
use crate::simple::{Procedure, Simple};

use super::{CONTENT, RESET};

/// Forwards its [`CONTENT`] input to its [`CONTENT`] output.
///
/// A graph input maps onto a single task input. Routing it through an
/// identity task lets any number of links fan out from it.
#[derive(Debug)]
pub struct Identity<T> {
    content: Option<Value>,
    _type: PhantomData<fn() -> T>,
}

impl<T> Identity<T>
where
    T: Any + Clone + Send + Sync,
{
    pub fn task() -> Simple<Self> {
        Simple::new(Self {
            content: None,
            _type: PhantomData,
        })
        .with_reset(RESET)
    }

    /// The received content, if any.
    pub fn content(&self) -> Option<T> {
        let value = self.content.as_ref()?;
        downcast(&CONTENT, value).ok()
    }
}

impl<T> Procedure for Identity<T>
where
    T: Any + Clone + Send + Sync,
{
    fn inputs(&self) -> Vec<PortId> {
        vec![CONTENT]
    }

    fn outputs(&self) -> Vec<PortId> {
        vec![CONTENT]
    }

    fn write(&mut self, id: &PortId, value: Value) -> Result<(), PortError> {
        if !value.is::<T>() {
            return Err(PortError::TypeMismatch {
                port: id.clone(),
                expected: type_name::<T>(),
            });
        }
        self.content = Some(value);
        Ok(())
    }

    fn read(&self, _: &PortId) -> Result<Option<Value>, PortError> {
        Ok(self.content.clone())
    }

    fn run(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}
