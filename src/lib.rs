//! Maximum flow over a capacitated directed graph, computed with the
//! highest-label push-relabel method and the global relabeling heuristic.
//!
//! ```
//! use max_flow::{MaxFlow, ReverseArcGraph, Status};
//!
//! let mut graph = ReverseArcGraph::new();
//! graph.add_nodes(3);
//! let first = graph.add_arc(0, 1);
//! let second = graph.add_arc(1, 2);
//!
//! let mut solver: MaxFlow<i64> = MaxFlow::new(&graph, 0, 2);
//! solver.set_arc_capacity(first, 5);
//! solver.set_arc_capacity(second, 3);
//! assert!(solver.solve());
//! assert_eq!(solver.status(), Status::Optimal);
//! assert_eq!(solver.optimal_flow(), 3);
//! ```

pub mod flow_model;
pub mod graph;
pub mod max_flow;
pub mod priority_queue;
mod residual;
pub mod status;

pub use crate::flow_model::FlowModel;
pub use crate::graph::{ArcIndex, NodeIndex, ReverseArcGraph, NIL_ARC};
pub use crate::max_flow::MaxFlow;
pub use crate::status::Status;
