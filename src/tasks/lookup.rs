use std::any::Any;
use std::collections::HashMap;
use std::hash::Hash;

use anyhow::anyhow;

use crate::error::PortError;
use crate::port::{PortId, Value, downcast, value};
use crate::simple::{Procedure, ResetSet, Simple};

use super::{INDEX, MAP, RESET, SELECTION};

/// Picks the entry of the [`MAP`] input found under the [`INDEX`] input.
///
/// The [`SELECTION`] output is an `Option<V>`, `None` when the index is not in
/// the map. It is set once the task executed and until it is reset.
#[derive(Debug)]
pub struct MapLookup<K, V> {
    map: Option<HashMap<K, V>>,
    index: Option<K>,
    selection: Option<Option<V>>,
}

impl<K, V> MapLookup<K, V>
where
    K: Any + Clone + Eq + Hash + Send + Sync,
    V: Any + Clone + Send + Sync,
{
    pub fn task() -> Simple<Self> {
        Simple::new(Self {
            map: None,
            index: None,
            selection: None,
        })
        .with_reset(RESET)
    }
}

impl<K, V> Procedure for MapLookup<K, V>
where
    K: Any + Clone + Eq + Hash + Send + Sync,
    V: Any + Clone + Send + Sync,
{
    fn inputs(&self) -> Vec<PortId> {
        vec![MAP, INDEX]
    }

    fn outputs(&self) -> Vec<PortId> {
        vec![SELECTION]
    }

    fn write(&mut self, id: &PortId, value: Value) -> Result<(), PortError> {
        if *id == MAP {
            self.map = Some(downcast(id, &value)?);
        } else {
            self.index = Some(downcast(id, &value)?);
        }
        Ok(())
    }

    fn read(&self, _: &PortId) -> Result<Option<Value>, PortError> {
        Ok(self.selection.clone().map(value))
    }

    fn run(&mut self) -> anyhow::Result<()> {
        let map = self.map.as_ref().ok_or_else(|| anyhow!("No map received"))?;
        let index = self
            .index
            .as_ref()
            .ok_or_else(|| anyhow!("No index received"))?;
        self.selection = Some(map.get(index).cloned());
        Ok(())
    }

    fn on_reset(&mut self, _: &ResetSet) {
        self.selection = None;
    }
}
