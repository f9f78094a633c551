//! Graph builder: bounded breadth-first expansion over adjacency records

mod expand;
mod lookup;
mod types;

pub use expand::{expand, Expansion};
pub use lookup::{Layered, RecordLookup};
pub use types::{ExpandedGraph, GraphNode};
