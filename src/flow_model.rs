use crate::graph::NodeIndex;
use serde::{Deserialize, Serialize};

/// Serializable snapshot of a flow problem, as produced by
/// `MaxFlow::create_flow_model`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum FlowProblemType {
    MaxFlow,
    MinCostFlow,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: NodeIndex,
    /// For a maximum flow problem, 1 at the source, -1 at the sink and 0
    /// elsewhere.
    pub supply: i64,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct FlowArc<Flow> {
    pub tail: NodeIndex,
    pub head: NodeIndex,
    pub capacity: Flow,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct FlowModel<Flow> {
    pub problem_type: FlowProblemType,
    pub nodes: Vec<FlowNode>,
    pub arcs: Vec<FlowArc<Flow>>,
}
