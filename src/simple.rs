//! The reusable readiness policy most tasks are built on.
//!
//! A [`Simple`] task wraps a [`Procedure`], which only declares its ports and
//! its work function. The wrapper decides when the procedure runs:
//!
//! * it is executable once every declared input received a value at least
//!   once, whatever the value;
//! * it wants to run from the start, and not anymore once executed;
//! * an optional reset input re-arms it. The value written to the reset input
//!   is a [`ResetSet`] of input ids to forget. An empty set allows an
//!   immediate re-run with unchanged inputs, a non-empty one makes the task
//!   wait until the forgotten inputs are supplied again.
//!
//! A reset written *during* the procedure's own execution is overridden when
//! the execution ends. To re-run a task after it finished, wire a forcing link
//! into its reset input.

use std::collections::HashSet;

use crate::error::PortError;
use crate::port::{PortId, Value, downcast};
use crate::task::Task;

/// The value of a reset input: ids of the inputs to forget.
pub type ResetSet = HashSet<PortId>;

/// Ports and work of a task whose scheduling is left to [`Simple`].
pub trait Procedure: Send + 'static {
    fn inputs(&self) -> Vec<PortId>;

    fn outputs(&self) -> Vec<PortId>;

    /// Stores the value written to the declared input `id`.
    fn write(&mut self, id: &PortId, value: Value) -> Result<(), PortError>;

    /// Current value of the declared output `id`, `None` while unset.
    fn read(&self, id: &PortId) -> Result<Option<Value>, PortError>;

    fn run(&mut self) -> anyhow::Result<()>;

    /// Called after a reset was written, with the ids that were forgotten.
    #[inline]
    fn on_reset(&mut self, _forgotten: &ResetSet) {}
}

/// Task template: runs its procedure once all inputs were received, then
/// waits for a reset.
#[derive(Debug)]
pub struct Simple<P> {
    procedure: P,
    reset: Option<PortId>,
    received: HashSet<PortId>,
    pending: bool,
}

impl<P: Procedure> Simple<P> {
    pub fn new(procedure: P) -> Self {
        Self {
            procedure,
            reset: None,
            received: HashSet::new(),
            pending: true,
        }
    }

    /// Declares a reset input. It shadows a procedure input of the same id.
    pub fn with_reset(mut self, id: impl Into<PortId>) -> Self {
        self.reset = Some(id.into());
        self
    }

    pub fn reset_id(&self) -> Option<&PortId> {
        self.reset.as_ref()
    }

    pub fn procedure(&self) -> &P {
        &self.procedure
    }

    pub fn procedure_mut(&mut self) -> &mut P {
        &mut self.procedure
    }

    fn reset(&mut self, forget: &ResetSet) {
        self.received.retain(|id| !forget.contains(id));
        self.pending = true;
        self.procedure.on_reset(forget);
    }
}

impl<P: Procedure> Task for Simple<P> {
    fn input_ids(&self) -> Vec<PortId> {
        let mut ids = self.procedure.inputs();
        if let Some(reset) = &self.reset {
            ids.retain(|id| id != reset);
            ids.push(reset.clone());
        }
        ids
    }

    fn output_ids(&self) -> Vec<PortId> {
        self.procedure.outputs()
    }

    fn write_input(&mut self, id: &PortId, value: Value) -> Result<(), PortError> {
        if self.reset.as_ref() == Some(id) {
            let forget: ResetSet = downcast(id, &value)?;
            self.reset(&forget);
            return Ok(());
        }

        if !self.procedure.inputs().contains(id) {
            return Err(PortError::NoSuchInput(id.clone()));
        }

        self.procedure.write(id, value)?;
        self.received.insert(id.clone());
        Ok(())
    }

    fn read_output(&self, id: &PortId) -> Result<Option<Value>, PortError> {
        if !self.procedure.outputs().contains(id) {
            return Err(PortError::NoSuchOutput(id.clone()));
        }
        self.procedure.read(id)
    }

    fn is_executable(&self) -> bool {
        self.procedure
            .inputs()
            .iter()
            .filter(|id| self.reset.as_ref() != Some(*id))
            .all(|id| self.received.contains(id))
    }

    fn wants_execution(&self) -> bool {
        self.pending
    }

    fn execute(&mut self) -> anyhow::Result<()> {
        self.procedure.run()?;
        self.pending = false;
        Ok(())
    }
}
