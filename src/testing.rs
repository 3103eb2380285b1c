//! Test fixtures shared by the unit tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use anyhow::bail;

use crate::error::PortError;
use crate::event::{Event, Listener};
use crate::port::{PortId, Value, downcast, value};
use crate::simple::Procedure;
use crate::task::Task;

/// Pass-through task with a single `value` input and output. It wants to run
/// whenever its input holds a value its output does not.
#[derive(Default)]
pub(crate) struct Linear {
    input: Option<Value>,
    output: Option<Value>,
    fail: bool,
}

impl Linear {
    pub const VALUE: PortId = PortId::name("value");

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

impl Task for Linear {
    fn input_ids(&self) -> Vec<PortId> {
        vec![Self::VALUE]
    }

    fn output_ids(&self) -> Vec<PortId> {
        vec![Self::VALUE]
    }

    fn write_input(&mut self, id: &PortId, value: Value) -> Result<(), PortError> {
        if *id != Self::VALUE {
            return Err(PortError::NoSuchInput(id.clone()));
        }
        self.input = Some(value);
        Ok(())
    }

    fn read_output(&self, id: &PortId) -> Result<Option<Value>, PortError> {
        if *id != Self::VALUE {
            return Err(PortError::NoSuchOutput(id.clone()));
        }
        Ok(self.output.clone())
    }

    fn is_executable(&self) -> bool {
        true
    }

    fn wants_execution(&self) -> bool {
        match (&self.input, &self.output) {
            (Some(input), Some(output)) => !Arc::ptr_eq(input, output),
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    fn execute(&mut self) -> anyhow::Result<()> {
        if self.fail {
            bail!("linear task asked to fail");
        }
        self.output = self.input.clone();
        Ok(())
    }
}

/// Copies `left` and `right` to the outputs of the same names. An output stays
/// unset until its input was written, and the task wants to run after any
/// write.
#[derive(Default)]
pub(crate) struct Mirror {
    inputs: [Option<Value>; 2],
    outputs: [Option<Value>; 2],
    changed: bool,
}

impl Mirror {
    pub const LEFT: PortId = PortId::name("left");
    pub const RIGHT: PortId = PortId::name("right");

    fn slot(id: &PortId) -> Option<usize> {
        [Self::LEFT, Self::RIGHT].iter().position(|item| item == id)
    }
}

impl Task for Mirror {
    fn input_ids(&self) -> Vec<PortId> {
        vec![Self::LEFT, Self::RIGHT]
    }

    fn output_ids(&self) -> Vec<PortId> {
        vec![Self::LEFT, Self::RIGHT]
    }

    fn write_input(&mut self, id: &PortId, value: Value) -> Result<(), PortError> {
        let slot = Self::slot(id).ok_or_else(|| PortError::NoSuchInput(id.clone()))?;
        self.inputs[slot] = Some(value);
        self.changed = true;
        Ok(())
    }

    fn read_output(&self, id: &PortId) -> Result<Option<Value>, PortError> {
        let slot = Self::slot(id).ok_or_else(|| PortError::NoSuchOutput(id.clone()))?;
        Ok(self.outputs[slot].clone())
    }

    fn is_executable(&self) -> bool {
        true
    }

    fn wants_execution(&self) -> bool {
        self.changed
    }

    fn execute(&mut self) -> anyhow::Result<()> {
        self.outputs = self.inputs.clone();
        self.changed = false;
        Ok(())
    }
}

/// Sums integer inputs into a `result` output. Executable once every declared
/// input holds a value, wants to run when an input changed since the last run.
pub(crate) struct Addition {
    inputs: BTreeMap<PortId, Option<i64>>,
    output: Option<i64>,
    changed: bool,
}

impl Addition {
    pub const RESULT: PortId = PortId::name("result");

    pub fn new(inputs: impl IntoIterator<Item = usize>) -> Self {
        Self {
            inputs: inputs
                .into_iter()
                .map(|index| (PortId::index(index), None))
                .collect(),
            output: None,
            changed: false,
        }
    }
}

impl Task for Addition {
    fn input_ids(&self) -> Vec<PortId> {
        self.inputs.keys().cloned().collect()
    }

    fn output_ids(&self) -> Vec<PortId> {
        vec![Self::RESULT]
    }

    fn write_input(&mut self, id: &PortId, value: Value) -> Result<(), PortError> {
        let slot = self
            .inputs
            .get_mut(id)
            .ok_or_else(|| PortError::NoSuchInput(id.clone()))?;
        let item = downcast::<i64>(id, &value)?;

        self.changed |= *slot != Some(item);
        *slot = Some(item);
        Ok(())
    }

    fn read_output(&self, id: &PortId) -> Result<Option<Value>, PortError> {
        if *id != Self::RESULT {
            return Err(PortError::NoSuchOutput(id.clone()));
        }
        Ok(self.output.map(value))
    }

    fn is_executable(&self) -> bool {
        self.inputs.values().all(Option::is_some)
    }

    fn wants_execution(&self) -> bool {
        self.changed
    }

    fn execute(&mut self) -> anyhow::Result<()> {
        self.output = Some(self.inputs.values().flatten().sum());
        self.changed = false;
        Ok(())
    }
}

/// Procedure with three integer inputs, producing `sum` = i1 + i2 and
/// `product` = i2 * i3.
#[derive(Debug, Default)]
pub(crate) struct Triple {
    values: [i64; 3],
    sum: Option<i64>,
    product: Option<i64>,
    fail: bool,
}

impl Triple {
    pub const INPUTS: [PortId; 3] = [
        PortId::name("input1"),
        PortId::name("input2"),
        PortId::name("input3"),
    ];

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

impl Procedure for Triple {
    fn inputs(&self) -> Vec<PortId> {
        Self::INPUTS.to_vec()
    }

    fn outputs(&self) -> Vec<PortId> {
        vec![PortId::name("sum"), PortId::name("product")]
    }

    fn write(&mut self, id: &PortId, value: Value) -> Result<(), PortError> {
        let position = Self::INPUTS
            .iter()
            .position(|input| input == id)
            .ok_or_else(|| PortError::NoSuchInput(id.clone()))?;
        self.values[position] = downcast(id, &value)?;
        Ok(())
    }

    fn read(&self, id: &PortId) -> Result<Option<Value>, PortError> {
        match id {
            PortId::Name(name) if name == "sum" => Ok(self.sum.map(value)),
            PortId::Name(name) if name == "product" => Ok(self.product.map(value)),
            _ => Err(PortError::NoSuchOutput(id.clone())),
        }
    }

    fn run(&mut self) -> anyhow::Result<()> {
        if self.fail {
            bail!("triple asked to fail");
        }
        let [a, b, c] = self.values;
        self.sum = Some(a + b);
        self.product = Some(b * c);
        Ok(())
    }
}

/// Listener keeping every event it receives.
#[derive(Clone, Default)]
pub(crate) struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

impl Listener for Recorder {
    fn on_event(&mut self, event: &Event) {
        self.events.lock().unwrap().push(event.clone());
    }
}
