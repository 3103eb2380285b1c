//! Ready-made tasks covering the usual plumbing of a graph.
//!
//! All of them are [`Simple`](crate::Simple) tasks with a [`RESET`] input.

#[cfg(feature = "csv")]
mod csv;
mod identity;
mod lookup;
#[cfg(feature = "random")]
mod random;

#[cfg(feature = "csv")]
pub use csv::{CsvSink, Renderer};
pub use identity::Identity;
pub use lookup::MapLookup;
#[cfg(feature = "random")]
pub use random::RandomPick;

use crate::port::PortId;

pub const RESET: PortId = PortId::name("reset");
pub const CONTENT: PortId = PortId::name("content");
pub const MAP: PortId = PortId::name("map");
pub const INDEX: PortId = PortId::name("index");
pub const COLLECTION: PortId = PortId::name("collection");
pub const SELECTION: PortId = PortId::name("selection");
pub const CSV: PortId = PortId::name("csv");
pub const ROW_COUNTER: PortId = PortId::name("row counter");
