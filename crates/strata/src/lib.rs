#![forbid(unsafe_code)]

//! Layered layout for node editors.
//!
//! `strata` arranges the selected elements of a node graph (nodes with ordered input and output
//! sockets, nested frames, reroutes and multi-input sockets) into columns flowing left to right.
//! The layout follows the Sugiyama scheme: ranking, crossing minimization over the frame nesting
//! tree, Brandes-Köpf style vertical placement and column based horizontal placement, followed by
//! reroute routing and node stacking.
//!
//! The host document is read from a [`GraphSnapshot`]; every change the layout makes is returned
//! as an [`Arrangement`] that can be applied with [`GraphSnapshot::apply`].

pub mod build;
pub mod cluster_graph;
pub mod columns;
pub mod config;
pub mod context;
pub mod error;
pub mod geom;
pub mod model;
pub mod normalize;
pub mod order;
pub mod pipeline;
pub mod position;
pub mod rank;
pub mod realize;
pub mod recenter;
pub mod reroutes;
pub mod routing;
pub mod snapshot;
pub mod stacking;

pub use config::{Direction, LayoutConfig, Origin, SocketAlignment};
pub use error::{Diagnostic, Error, Result};
pub use geom::{Rect, Vec2};
pub use pipeline::{BatchFailure, BatchReport, NamedGraph, arrange, arrange_all, recenter_all};
pub use recenter::recenter;
pub use snapshot::{
    Arrangement, Element, ElementKind, GraphSnapshot, Link, MultiInputOrder, SocketInfo,
    SortedSource,
};
