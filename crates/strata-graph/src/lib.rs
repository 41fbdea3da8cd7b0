//! Graph container APIs used by `strata`.
//!
//! The container is a directed multigraph stored in an arena. Nodes and edges are addressed by
//! small `Copy` handles ([`NodeIx`], [`EdgeIx`]) that stay valid until the element is removed;
//! removed slots are tombstoned and never reused, so a handle can never alias a newer element.
//!
//! A handful of helper algorithms live in [`alg`].

mod graph;

pub use graph::{EdgeIx, Graph, NodeIx, alg};
