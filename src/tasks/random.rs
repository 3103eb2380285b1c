use std::any::Any;

use anyhow::{anyhow, bail};

use crate::error::PortError;
use crate::port::{PortId, Value, downcast, value};
use crate::simple::{Procedure, ResetSet, Simple};

use super::{COLLECTION, RESET, SELECTION};

/// Selects one item of its [`COLLECTION`] input (a `Vec<T>`) at random.
///
/// The [`SELECTION`] output is set once the task executed and until it is
/// reset. Executing on an empty collection fails.
#[derive(Debug)]
pub struct RandomPick<T> {
    rng: fastrand::Rng,
    items: Option<Vec<T>>,
    selection: Option<T>,
}

impl<T> RandomPick<T>
where
    T: Any + Clone + Send + Sync,
{
    pub fn task() -> Simple<Self> {
        Self::with_rng(fastrand::Rng::new())
    }

    /// Same as [`task`](Self::task), drawing from a generator seeded with
    /// `seed` so the picks are reproducible.
    pub fn seeded(seed: u64) -> Simple<Self> {
        Self::with_rng(fastrand::Rng::with_seed(seed))
    }

    fn with_rng(rng: fastrand::Rng) -> Simple<Self> {
        Simple::new(Self {
            rng,
            items: None,
            selection: None,
        })
        .with_reset(RESET)
    }
}

impl<T> Procedure for RandomPick<T>
where
    T: Any + Clone + Send + Sync,
{
    fn inputs(&self) -> Vec<PortId> {
        vec![COLLECTION]
    }

    fn outputs(&self) -> Vec<PortId> {
        vec![SELECTION]
    }

    fn write(&mut self, id: &PortId, value: Value) -> Result<(), PortError> {
        self.items = Some(downcast(id, &value)?);
        Ok(())
    }

    fn read(&self, _: &PortId) -> Result<Option<Value>, PortError> {
        Ok(self.selection.clone().map(value))
    }

    fn run(&mut self) -> anyhow::Result<()> {
        let items = self
            .items
            .as_ref()
            .ok_or_else(|| anyhow!("No collection received"))?;
        if items.is_empty() {
            bail!("Cannot pick an item from an empty collection");
        }
        let index = self.rng.usize(..items.len());
        self.selection = Some(items[index].clone());
        Ok(())
    }

    fn on_reset(&mut self, _: &ResetSet) {
        self.selection = None;
    }
}
