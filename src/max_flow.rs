use crate::flow_model::{FlowArc, FlowModel, FlowNode, FlowProblemType};
use crate::graph::{ArcIndex, NodeIndex, ReverseArcGraph, NIL_ARC};
use crate::priority_queue::PriorityQueueWithRestrictedPush;
use crate::residual::ResidualArcCapacities;
use crate::status::Status;
use log::{debug, error};
use num_traits::{Bounded, NumAssign, Signed};
use std::fmt::Debug;

/// Heights never exceed twice the number of nodes.
pub type NodeHeight = usize;

/// Maximum flow between a source and a sink, computed with the
/// push-relabel method: highest-label node selection, a global relabeling
/// heuristic (reverse BFS from the sink), and a second phase that returns
/// leftover excess to the source so the result is a flow and not merely a
/// preflow.
///
/// The solver borrows the graph read-only and owns all per-node and
/// per-arc state. Capacities are set through `set_arc_capacity`; any
/// capacity change invalidates the previous solution.
pub struct MaxFlow<'a, Flow> {
    graph: &'a ReverseArcGraph,

    /// Inflow minus outflow at each node. Positive for interior nodes
    /// while the preflow is being refined, non-positive at the source.
    node_excess: Vec<Flow>,

    /// Height function. The source is pinned at `num_nodes`; a node at
    /// height `num_nodes` or above cannot reach the sink in the residual
    /// graph. For every residual arc, `height[tail] <= height[head] + 1`.
    node_potential: Vec<NodeHeight>,

    /// Remaining capacity per signed arc id. The flow on a forward arc is
    /// the residual capacity of its opposite, so this single store also
    /// encodes the flow.
    residual_arc_capacity: ResidualArcCapacities<Flow>,

    /// Scan resume hint for `discharge`. May be stale after a global
    /// relabel; the relaxed `relabel` makes that harmless.
    first_admissible_arc: Vec<ArcIndex>,

    /// Active nodes, retrieved highest first. Discharging sends flow to
    /// height `h - 1`, which is exactly the restricted push this queue
    /// demands.
    active_node_by_height: PriorityQueueWithRestrictedPush<NodeIndex, NodeHeight>,

    source: NodeIndex,
    sink: NodeIndex,
    status: Status,

    // Scratch for the BFS of global_update and the cut extraction.
    node_in_bfs_queue: Vec<bool>,
    bfs_queue: Vec<NodeIndex>,
}

impl<'a, Flow> MaxFlow<'a, Flow>
where
    Flow: NumAssign + Signed + Ord + Copy + Bounded + Debug,
{
    /// The source and the sink may lie outside the graph; they are then
    /// treated as disconnected and the optimal flow is zero.
    pub fn new(graph: &'a ReverseArcGraph, source: NodeIndex, sink: NodeIndex) -> Self {
        let max_num_nodes = graph.node_reservation();
        Self {
            graph,
            node_excess: vec![Flow::zero(); max_num_nodes],
            node_potential: vec![0; max_num_nodes],
            residual_arc_capacity: ResidualArcCapacities::new(graph.arc_reservation()),
            first_admissible_arc: vec![NIL_ARC; max_num_nodes],
            active_node_by_height: PriorityQueueWithRestrictedPush::new(),
            source,
            sink,
            status: Status::NotSolved,
            node_in_bfs_queue: Vec::new(),
            bfs_queue: Vec::with_capacity(max_num_nodes),
        }
    }

    pub fn graph(&self) -> &ReverseArcGraph {
        self.graph
    }

    pub fn source(&self) -> NodeIndex {
        self.source
    }

    pub fn sink(&self) -> NodeIndex {
        self.sink
    }

    /// Status of the last `solve`. `NotSolved` if `solve` was never called
    /// or if the problem was modified since.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Sets the capacity of a forward arc. If the new capacity drops below
    /// the flow currently on the arc, that flow is cleared.
    pub fn set_arc_capacity(&mut self, arc: ArcIndex, new_capacity: Flow) {
        debug_assert!(new_capacity >= Flow::zero());
        debug_assert!(self.is_arc_direct(arc));
        let free_capacity = self.residual_arc_capacity.residual(arc);
        let capacity_delta = new_capacity - self.capacity(arc);
        if capacity_delta == Flow::zero() {
            return;
        }
        self.status = Status::NotSolved;
        if free_capacity + capacity_delta >= Flow::zero() {
            // Either the capacity grows, or it shrinks by no more than the
            // free capacity, so the flow on the arc can be kept.
            self.residual_arc_capacity.set_residual(arc, free_capacity + capacity_delta);
        } else {
            self.set_capacity_and_clear_flow(arc, new_capacity);
        }
    }

    /// Computes the maximum flow. Always returns true; the outcome of the
    /// run is reported by `status`.
    pub fn solve(&mut self) -> bool {
        self.status = Status::NotSolved;
        self.initialize_preflow();

        // The source and the sink are given independently of the graph, so
        // either may be missing; the problem then degenerates to zero flow.
        // The arc flows were cleared by initialize_preflow.
        if !self.graph.is_node_valid(self.source) || !self.graph.is_node_valid(self.sink) {
            self.status = Status::Optimal;
            return true;
        }

        self.refine_with_global_update();

        self.status = Status::Optimal;
        debug_assert!(self.check_result());

        if self.optimal_flow() == Flow::max_value() && self.augmenting_path_exists() {
            // The true maximum flow is larger than the representable ceiling.
            self.status = Status::IntOverflow;
        }
        debug!("solve: status {:?}, optimal flow {:?}", self.status, self.optimal_flow());
        true
    }

    /// The value of the computed maximum flow.
    pub fn optimal_flow(&self) -> Flow {
        if self.graph.is_node_valid(self.sink) {
            self.node_excess[self.sink]
        } else {
            Flow::zero()
        }
    }

    /// Flow on an arc: nonnegative on forward arcs, and the negation of
    /// the forward flow on reverse arcs.
    pub fn flow(&self, arc: ArcIndex) -> Flow {
        if self.is_arc_direct(arc) {
            self.residual_arc_capacity.residual(self.graph.opposite_arc(arc))
        } else {
            -self.residual_arc_capacity.residual(arc)
        }
    }

    /// Capacity of a forward arc; reverse arcs have capacity zero.
    pub fn capacity(&self, arc: ArcIndex) -> Flow {
        if self.is_arc_direct(arc) {
            self.residual_arc_capacity.residual(arc)
                + self.residual_arc_capacity.residual(self.graph.opposite_arc(arc))
        } else {
            Flow::zero()
        }
    }

    /// Nodes reachable from the source in the residual graph. The arcs
    /// leaving this set form a minimum cut.
    pub fn source_side_min_cut(&mut self) -> Vec<NodeIndex> {
        self.compute_reachable_nodes(self.source, false)
    }

    /// Nodes that can reach the sink in the residual graph. The arcs
    /// entering this set form a minimum cut; when this is the complement
    /// of the source side, the minimum cut is unique.
    pub fn sink_side_min_cut(&mut self) -> Vec<NodeIndex> {
        self.compute_reachable_nodes(self.sink, true)
    }

    /// True if a path with remaining capacity exists from the source to
    /// the sink.
    pub fn augmenting_path_exists(&self) -> bool {
        let graph = self.graph;
        let mut is_reached = vec![false; graph.num_nodes()];
        let mut to_process = vec![self.source];
        is_reached[self.source] = true;
        while let Some(node) = to_process.pop() {
            for arc in graph.outgoing_or_opposite_incoming_arcs(node) {
                if self.residual_arc_capacity.residual(arc) > Flow::zero() {
                    let head = graph.head(arc);
                    if !is_reached[head] {
                        is_reached[head] = true;
                        to_process.push(head);
                    }
                }
            }
        }
        is_reached[self.sink]
    }

    /// Snapshot of the current problem for serialization.
    pub fn create_flow_model(&self) -> FlowModel<Flow> {
        let graph = self.graph;
        let nodes = (0..graph.num_nodes())
            .map(|id| {
                let supply = if id == self.source {
                    1
                } else if id == self.sink {
                    -1
                } else {
                    0
                };
                FlowNode { id, supply }
            })
            .collect();
        let arcs = (0..graph.num_arcs() as ArcIndex)
            .map(|arc| FlowArc { tail: graph.tail(arc), head: graph.head(arc), capacity: self.capacity(arc) })
            .collect();
        FlowModel { problem_type: FlowProblemType::MaxFlow, nodes, arcs }
    }

    #[inline]
    fn is_arc_direct(&self, arc: ArcIndex) -> bool {
        self.graph.is_arc_valid(arc) && arc >= 0
    }

    #[inline]
    fn is_admissible(&self, tail: NodeIndex, arc: ArcIndex) -> bool {
        debug_assert_eq!(tail, self.graph.tail(arc));
        self.residual_arc_capacity.residual(arc) > Flow::zero()
            && self.node_potential[tail] == self.node_potential[self.graph.head(arc)] + 1
    }

    #[inline]
    fn is_active(&self, node: NodeIndex) -> bool {
        node != self.source && node != self.sink && self.node_excess[node] > Flow::zero()
    }

    fn set_capacity_and_clear_flow(&mut self, arc: ArcIndex, capacity: Flow) {
        self.residual_arc_capacity.set_residual(arc, capacity);
        self.residual_arc_capacity.set_residual(self.graph.opposite_arc(arc), Flow::zero());
    }

    fn initialize_preflow(&mut self) {
        // Also clears any flow computed by a previous solve; re-solving is
        // not incremental.
        self.node_excess.fill(Flow::zero());
        for arc in 0..self.graph.num_arcs() as ArcIndex {
            let capacity = self.capacity(arc);
            self.set_capacity_and_clear_flow(arc, capacity);
        }

        self.node_potential.fill(0);
        if self.graph.is_node_valid(self.source) {
            self.node_potential[self.source] = self.graph.num_nodes();
        }

        // No arc is admissible yet except possibly those leaving the
        // source, and the source is handled separately in
        // saturate_outgoing_arcs_from_source.
        self.first_admissible_arc.fill(NIL_ARC);
    }

    /// Pushes flow on `arc` and updates the excesses at its endpoints.
    fn push_flow(&mut self, flow: Flow, tail: NodeIndex, arc: ArcIndex) {
        debug_assert!(flow != Flow::zero());
        self.residual_arc_capacity.push_flow(flow, arc);
        self.node_excess[tail] -= flow;
        let head = self.graph.head(arc);
        self.node_excess[head] += flow;
    }

    /// Tries to saturate the arcs leaving the source whose heads can still
    /// reach the sink. Returns true if any flow was pushed. The net flow
    /// out of the source is capped at the representable maximum, so when
    /// the cap is hit some arcs are left unsaturated.
    fn saturate_outgoing_arcs_from_source(&mut self) -> bool {
        let graph = self.graph;
        let num_nodes = graph.num_nodes();
        let max_flow_quantity = Flow::max_value();

        // Nothing more can be pushed once either endpoint carries the
        // largest representable quantity.
        if self.node_excess[self.sink] == max_flow_quantity {
            return false;
        }
        if self.node_excess[self.source] == -max_flow_quantity {
            return false;
        }

        let mut flow_pushed = false;
        for arc in graph.outgoing_arcs(self.source) {
            let flow = self.residual_arc_capacity.residual(arc);

            // The admissibility condition takes this special form at the source.
            if flow == Flow::zero() || self.node_potential[graph.head(arc)] >= num_nodes {
                continue;
            }

            let current_flow_out_of_source = -self.node_excess[self.source];
            debug_assert!(flow >= Flow::zero());
            debug_assert!(current_flow_out_of_source >= Flow::zero());
            let capped_flow = max_flow_quantity - current_flow_out_of_source;
            if capped_flow < flow {
                // Push the largest amount that keeps the total below the
                // ceiling. Some flow was already pushed earlier in the
                // loop if capped_flow is zero here.
                if capped_flow == Flow::zero() {
                    return true;
                }
                self.push_flow(capped_flow, self.source, arc);
                return true;
            }
            self.push_flow(flow, self.source, arc);
            flow_pushed = true;
        }
        debug_assert!(self.node_excess[self.source] <= Flow::zero());
        flow_pushed
    }

    /// Recomputes every height as the BFS distance to the sink in the
    /// reverse residual graph, then refills the active queue in BFS order
    /// so the queue's push restriction holds.
    fn global_update(&mut self) {
        let graph = self.graph;
        let num_nodes = graph.num_nodes();
        self.bfs_queue.clear();
        self.node_in_bfs_queue.clear();
        self.node_in_bfs_queue.resize(num_nodes, false);
        self.node_in_bfs_queue[self.sink] = true;

        // All arcs out of the source are saturated, so the source cannot be
        // reached, except when flow was capped at the numeric ceiling. Mark
        // it up front so its height is never touched either way.
        self.node_in_bfs_queue[self.source] = true;
        self.bfs_queue.push(self.sink);

        let mut queue_index = 0;
        while queue_index != self.bfs_queue.len() {
            let node = self.bfs_queue[queue_index];
            queue_index += 1;
            let candidate_distance = self.node_potential[node] + 1;
            for arc in graph.outgoing_or_opposite_incoming_arcs(node) {
                let head = graph.head(arc);

                // Already assigned its distance (this is a reverse BFS).
                if self.node_in_bfs_queue[head] {
                    continue;
                }
                let opposite_arc = graph.opposite_arc(arc);
                if self.residual_arc_capacity.residual(opposite_arc) > Flow::zero() {
                    // If the head carries excess, steal as much as fits
                    // through this arc before deciding whether to visit it.
                    if self.node_excess[head] > Flow::zero() {
                        let flow = self.node_excess[head].min(self.residual_arc_capacity.residual(opposite_arc));
                        self.push_flow(flow, head, opposite_arc);

                        // The arc got saturated, so it left the residual
                        // graph and head cannot be reached through it.
                        if self.residual_arc_capacity.residual(opposite_arc) == Flow::zero() {
                            continue;
                        }
                    }

                    // The stale first_admissible_arc hints are fine here
                    // because relabel is relaxed.
                    self.node_potential[head] = candidate_distance;
                    self.node_in_bfs_queue[head] = true;
                    self.bfs_queue.push(head);
                }
            }
        }

        // Nodes the BFS missed can reach neither the sink nor the source in
        // the residual graph; park them at an unreachable height so no more
        // flow is pushed toward them. This also keeps the anti-overflow
        // loop from resaturating arcs whose head has no other connection.
        for node in 0..num_nodes {
            if !self.node_in_bfs_queue[node] {
                self.node_potential[node] = 2 * num_nodes - 1;
            }
        }

        // Requeue the active nodes in BFS order, i.e. by nondecreasing
        // height. Entry 0 is the sink.
        debug_assert!(self.active_node_by_height.is_empty());
        for index in 1..self.bfs_queue.len() {
            let node = self.bfs_queue[index];
            if self.node_excess[node] > Flow::zero() {
                debug_assert!(self.is_active(node));
                self.active_node_by_height.push(node, self.node_potential[node]);
            }
        }
    }

    /// Pushes flow out of an active node along admissible arcs until the
    /// excess is gone, relabeling and rescanning whenever the adjacency
    /// scan runs dry. Stops early if the node rises to a height from which
    /// the sink is unreachable.
    fn discharge(&mut self, node: NodeIndex) {
        let graph = self.graph;
        let num_nodes = graph.num_nodes();
        loop {
            debug_assert!(self.is_active(node));
            for arc in graph.outgoing_or_opposite_incoming_arcs_from(node, self.first_admissible_arc[node]) {
                if self.is_admissible(node, arc) {
                    let head = graph.head(arc);
                    if self.node_excess[head] == Flow::zero() {
                        // The push below activates the head for sure. This
                        // may enqueue the sink; the driver skips it.
                        self.active_node_by_height.push(head, self.node_potential[head]);
                    }
                    let delta = self.node_excess[node].min(self.residual_arc_capacity.residual(arc));
                    self.push_flow(delta, node, arc);
                    if self.node_excess[node] == Flow::zero() {
                        // The arc may still be admissible next time.
                        self.first_admissible_arc[node] = arc;
                        return;
                    }
                }
            }
            self.relabel(node);

            // The node can no longer reach the sink; its leftover excess is
            // dealt with by push_flow_excess_back_to_source.
            if self.node_potential[node] >= num_nodes {
                break;
            }
        }
    }

    /// Raises the node to one above the lowest residual neighbor. Relaxed:
    /// if an arc admissible at the current height is found, the scan stops
    /// there and the height does not change, which makes stale
    /// first_admissible_arc hints harmless.
    fn relabel(&mut self, node: NodeIndex) {
        let graph = self.graph;
        let mut min_height = NodeHeight::MAX;
        let mut first_admissible_arc = NIL_ARC;
        for arc in graph.outgoing_or_opposite_incoming_arcs(node) {
            if self.residual_arc_capacity.residual(arc) > Flow::zero() {
                let head_height = self.node_potential[graph.head(arc)];
                if head_height < min_height {
                    min_height = head_height;
                    first_admissible_arc = arc;
                    if min_height + 1 == self.node_potential[node] {
                        break;
                    }
                }
            }
        }
        // An active node always has at least one residual arc: flow came in
        // through something.
        debug_assert_ne!(first_admissible_arc, NIL_ARC);
        self.node_potential[node] = min_height + 1;

        // Arcs before this one all point at strictly higher neighbors, so
        // the discharge scan can resume here.
        self.first_admissible_arc[node] = first_admissible_arc;
    }

    /// Driver: saturate the source arcs, discharge active nodes highest
    /// first with periodic global updates, then return leftover excess.
    /// The outer loop runs more than once only when the flow is capped at
    /// the numeric ceiling, in which case returning excess may reopen
    /// room on the source arcs.
    fn refine_with_global_update(&mut self) {
        let num_nodes = self.graph.node_reservation();
        let mut skip_active_node: Vec<u8> = Vec::new();

        while self.saturate_outgoing_arcs_from_source() {
            loop {
                let mut num_skipped = 0;
                skip_active_node.clear();
                skip_active_node.resize(num_nodes, 0);
                skip_active_node[self.sink] = 2;
                skip_active_node[self.source] = 2;
                self.global_update();
                while let Some(node) = self.active_node_by_height.pop() {
                    if skip_active_node[node] > 1 {
                        if node != self.sink && node != self.source {
                            num_skipped += 1;
                        }
                        continue;
                    }
                    let old_height = self.node_potential[node];
                    self.discharge(node);

                    // A discharge that lifts a node by more than one is a
                    // sign of ping-pong with a neighbor that got cut off
                    // from the sink; the next global update repairs such
                    // heights wholesale, so stop discharging this node
                    // after a second offense rather than climb step by
                    // step.
                    if self.node_potential[node] > old_height + 1 {
                        skip_active_node[node] += 1;
                    }
                }
                if num_skipped == 0 {
                    break;
                }
            }

            // Two phases: the loop above works only toward the sink and
            // already determines the flow value and a minimum cut; this
            // pass turns the preflow into a flow.
            self.push_flow_excess_back_to_source();
        }
    }

    /// Returns the flow excess stranded at interior nodes back to the
    /// source: a depth-first search over the arcs carrying flow cancels
    /// flow cycles, then the excess is drained along the remaining acyclic
    /// flow in reverse topological order.
    ///
    /// Canceling flow on a cycle breaks the height invariant; callers must
    /// run global_update before discharging again.
    fn push_flow_excess_back_to_source(&mut self) {
        let graph = self.graph;
        let num_nodes = graph.num_nodes();

        // Cycle detection in the style of Tarjan's depth-first search.
        // Stored nodes are settled and listed in reverse_topological_order
        // (except the sink, which is not stored); visited nodes that are
        // not stored form the current branch.
        let mut stored = vec![false; num_nodes];
        stored[self.sink] = true;
        let mut visited = vec![false; num_nodes];
        visited[self.sink] = true;

        // The current node of the search is the head of the top arc.
        let mut arc_stack: Vec<ArcIndex> = Vec::new();
        // Indices into arc_stack forming the current branch from the source.
        let mut index_branch: Vec<usize> = Vec::new();
        let mut reverse_topological_order: Vec<NodeIndex> = Vec::new();

        // Seeding the stack with every flow-carrying arc out of the source
        // keeps the source itself out of reverse_topological_order.
        for arc in graph.outgoing_arcs(self.source) {
            if self.flow(arc) > Flow::zero() {
                arc_stack.push(arc);
            }
        }
        visited[self.source] = true;

        while let Some(&top_arc) = arc_stack.last() {
            let node = graph.head(top_arc);

            // A visited head means the search just backtracked over it:
            // settle it and move on.
            if visited[node] {
                if !stored[node] {
                    stored[node] = true;
                    reverse_topological_order.push(node);
                    debug_assert!(!index_branch.is_empty());
                    index_branch.pop();
                }
                arc_stack.pop();
                continue;
            }

            debug_assert!(!stored[node]);
            debug_assert!(index_branch.last().map_or(true, |&last| arc_stack.len() - 1 > last));
            visited[node] = true;
            index_branch.push(arc_stack.len() - 1);

            for arc in graph.outgoing_arcs(node) {
                let flow = self.flow(arc);
                let head = graph.head(arc);
                if flow > Flow::zero() && !stored[head] {
                    if !visited[head] {
                        arc_stack.push(arc);
                    } else {
                        // Found a flow-carrying cycle; arc closes it back
                        // to head. Locate where the cycle starts on the
                        // current branch.
                        let mut cycle_begin = index_branch.len();
                        while cycle_begin > 0
                            && graph.head(arc_stack[index_branch[cycle_begin - 1]]) != head
                        {
                            cycle_begin -= 1;
                        }

                        // The amount to cancel and the first branch arc
                        // that will be drained to zero by the cancellation.
                        let mut max_flow = flow;
                        let mut first_saturated_index = index_branch.len();
                        for index in (cycle_begin..index_branch.len()).rev() {
                            let arc_on_cycle = arc_stack[index_branch[index]];
                            if self.flow(arc_on_cycle) <= max_flow {
                                max_flow = self.flow(arc_on_cycle);
                                first_saturated_index = index;
                            }
                        }

                        let excess_before = self.node_excess[head];

                        // Cancel the cycle and unvisit the nodes that the
                        // search will backtrack over, so the reverse
                        // topological order stays well defined.
                        self.push_flow(-max_flow, node, arc);
                        for index in (cycle_begin..index_branch.len()).rev() {
                            let arc_on_cycle = arc_stack[index_branch[index]];
                            self.push_flow(-max_flow, graph.tail(arc_on_cycle), arc_on_cycle);
                            if index >= first_saturated_index {
                                debug_assert!(visited[graph.head(arc_on_cycle)]);
                                visited[graph.head(arc_on_cycle)] = false;
                            } else {
                                debug_assert!(self.flow(arc_on_cycle) > Flow::zero());
                            }
                        }

                        // Canceling a cycle moves no net flow.
                        debug_assert_eq!(excess_before, self.node_excess[head]);

                        if first_saturated_index < index_branch.len() {
                            // Backtrack to just before the first drained
                            // arc; the current node was backtracked over,
                            // so stop scanning its arcs.
                            arc_stack.truncate(index_branch[first_saturated_index]);
                            index_branch.truncate(first_saturated_index);
                            break;
                        }
                    }
                }
            }
        }
        debug_assert!(arc_stack.is_empty());
        debug_assert!(index_branch.is_empty());

        // The flow subgraph is now acyclic, so draining leaves first cannot
        // strand any excess; everything reaches the source. Neither the
        // source nor the sink is in reverse_topological_order.
        for index in 0..reverse_topological_order.len() {
            let node = reverse_topological_order[index];
            if self.node_excess[node] == Flow::zero() {
                continue;
            }
            for arc in graph.incoming_arcs(node) {
                let opposite_arc = graph.opposite_arc(arc);
                if self.residual_arc_capacity.residual(opposite_arc) > Flow::zero() {
                    let flow = self.node_excess[node].min(self.residual_arc_capacity.residual(opposite_arc));
                    self.push_flow(flow, node, opposite_arc);
                    if self.node_excess[node] == Flow::zero() {
                        break;
                    }
                }
            }
            debug_assert_eq!(self.node_excess[node], Flow::zero());
        }
        debug_assert_eq!(-self.node_excess[self.source], self.node_excess[self.sink]);
    }

    /// Nodes reachable from `start` in the residual graph, or in its
    /// reverse when `reverse` is set. An invalid start node reaches only
    /// itself.
    fn compute_reachable_nodes(&mut self, start: NodeIndex, reverse: bool) -> Vec<NodeIndex> {
        let graph = self.graph;
        if !graph.is_node_valid(start) {
            return vec![start];
        }
        self.bfs_queue.clear();
        self.node_in_bfs_queue.clear();
        self.node_in_bfs_queue.resize(graph.num_nodes(), false);
        self.bfs_queue.push(start);
        self.node_in_bfs_queue[start] = true;

        let mut queue_index = 0;
        while queue_index != self.bfs_queue.len() {
            let node = self.bfs_queue[queue_index];
            queue_index += 1;
            for arc in graph.outgoing_or_opposite_incoming_arcs(node) {
                let head = graph.head(arc);
                if self.node_in_bfs_queue[head] {
                    continue;
                }
                let residual_arc = if reverse { graph.opposite_arc(arc) } else { arc };
                if self.residual_arc_capacity.residual(residual_arc) == Flow::zero() {
                    continue;
                }
                self.node_in_bfs_queue[head] = true;
                self.bfs_queue.push(head);
            }
        }
        self.bfs_queue.clone()
    }

    /// Verifies that the excesses form a flow, that residual capacities are
    /// consistent, and that no augmenting path remains (unless the flow hit
    /// the numeric ceiling).
    fn check_result(&self) -> bool {
        let graph = self.graph;
        if self.node_excess[self.source] != -self.node_excess[self.sink] {
            error!(
                "-node_excess[source] = {:?} != node_excess[sink] = {:?}",
                -self.node_excess[self.source],
                self.node_excess[self.sink]
            );
            return false;
        }
        for node in 0..graph.num_nodes() {
            if node != self.source && node != self.sink && self.node_excess[node] != Flow::zero() {
                error!("node_excess[{}] = {:?} != 0", node, self.node_excess[node]);
                return false;
            }
        }
        for arc in 0..graph.num_arcs() as ArcIndex {
            let opposite_arc = graph.opposite_arc(arc);
            let direct_capacity = self.residual_arc_capacity.residual(arc);
            let opposite_capacity = self.residual_arc_capacity.residual(opposite_arc);
            if direct_capacity < Flow::zero() {
                error!("residual_arc_capacity[{}] = {:?} < 0", arc, direct_capacity);
                return false;
            }
            if opposite_capacity < Flow::zero() {
                error!("residual_arc_capacity[{}] = {:?} < 0", opposite_arc, opposite_capacity);
                return false;
            }
            // The initial capacity of a forward arc is nonnegative.
            if direct_capacity + opposite_capacity < Flow::zero() {
                error!("initial capacity [{}] = {:?} < 0", arc, direct_capacity + opposite_capacity);
                return false;
            }
        }
        if self.optimal_flow() < Flow::max_value() && self.augmenting_path_exists() {
            error!("the algorithm terminated, but the flow is not maximal");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    fn build_graph(num_nodes: usize, arcs: &[(NodeIndex, NodeIndex, i64)]) -> (ReverseArcGraph, Vec<ArcIndex>) {
        let mut graph = ReverseArcGraph::new();
        graph.add_nodes(num_nodes);
        let arc_ids = arcs.iter().map(|&(tail, head, _)| graph.add_arc(tail, head)).collect();
        (graph, arc_ids)
    }

    fn set_capacities(solver: &mut MaxFlow<i64>, arc_ids: &[ArcIndex], arcs: &[(NodeIndex, NodeIndex, i64)]) {
        for (&arc, &(_, _, capacity)) in arc_ids.iter().zip(arcs) {
            solver.set_arc_capacity(arc, capacity);
        }
    }

    /// Total capacity of the forward arcs crossing out of `cut`, checking
    /// on the way that each of them is saturated.
    fn crossing_capacity(solver: &MaxFlow<i64>, cut: &[NodeIndex], out_of_cut: bool) -> i64 {
        let graph = solver.graph();
        let mut in_cut = vec![false; graph.num_nodes()];
        for &node in cut {
            if graph.is_node_valid(node) {
                in_cut[node] = true;
            }
        }
        let mut total = 0;
        for arc in 0..graph.num_arcs() as ArcIndex {
            let crosses = if out_of_cut {
                in_cut[graph.tail(arc)] && !in_cut[graph.head(arc)]
            } else {
                !in_cut[graph.tail(arc)] && in_cut[graph.head(arc)]
            };
            if crosses {
                assert_eq!(solver.flow(arc), solver.capacity(arc));
                total += solver.capacity(arc);
            }
        }
        total
    }

    #[rstest]
    #[case::trivial_chain(3, &[(0, 1, 5), (1, 2, 3)], 0, 2, 3)]
    #[case::parallel_paths(4, &[(0, 1, 7), (1, 3, 7), (0, 2, 4), (2, 3, 9)], 0, 3, 11)]
    #[case::diamond_with_bottleneck(4, &[(0, 1, 10), (0, 2, 10), (1, 2, 2), (1, 3, 4), (2, 3, 9)], 0, 3, 13)]
    #[case::single_arc(2, &[(0, 1, 8)], 0, 1, 8)]
    #[case::no_arcs(2, &[], 0, 1, 0)]
    fn finds_the_maximum_flow(
        #[case] num_nodes: usize,
        #[case] arcs: &'static [(NodeIndex, NodeIndex, i64)],
        #[case] source: NodeIndex,
        #[case] sink: NodeIndex,
        #[case] expected_flow: i64,
    ) {
        let (graph, arc_ids) = build_graph(num_nodes, arcs);
        let mut solver: MaxFlow<i64> = MaxFlow::new(&graph, source, sink);
        set_capacities(&mut solver, &arc_ids, arcs);

        assert_eq!(solver.status(), Status::NotSolved);
        assert!(solver.solve());
        assert_eq!(solver.status(), Status::Optimal);
        assert_eq!(solver.optimal_flow(), expected_flow);
        assert!(solver.check_result());

        // Max-flow min-cut duality, on both sides of the cut.
        let source_side = solver.source_side_min_cut();
        assert!(source_side.contains(&source));
        assert!(!source_side.contains(&sink));
        assert_eq!(crossing_capacity(&solver, &source_side, true), expected_flow);

        let sink_side = solver.sink_side_min_cut();
        assert!(sink_side.contains(&sink));
        assert!(!sink_side.contains(&source));
        assert_eq!(crossing_capacity(&solver, &sink_side, false), expected_flow);
    }

    #[test]
    fn trivial_chain_cut_sides() {
        let arcs = [(0, 1, 5), (1, 2, 3)];
        let (graph, arc_ids) = build_graph(3, &arcs);
        let mut solver: MaxFlow<i64> = MaxFlow::new(&graph, 0, 2);
        set_capacities(&mut solver, &arc_ids, &arcs);
        solver.solve();

        let mut source_side = solver.source_side_min_cut();
        source_side.sort_unstable();
        assert_eq!(source_side, vec![0, 1]);
        assert_eq!(solver.sink_side_min_cut(), vec![2]);

        assert_eq!(solver.flow(arc_ids[0]), 3);
        assert_eq!(solver.flow(arc_ids[1]), 3);
    }

    #[test]
    fn disconnected_sink_gets_zero_flow() {
        // The sink is present but no arc reaches it.
        let arcs = [(0, 1, 5), (1, 2, 3)];
        let (graph, arc_ids) = build_graph(4, &arcs);
        let mut solver: MaxFlow<i64> = MaxFlow::new(&graph, 0, 3);
        set_capacities(&mut solver, &arc_ids, &arcs);

        assert!(solver.solve());
        assert_eq!(solver.status(), Status::Optimal);
        assert_eq!(solver.optimal_flow(), 0);
        assert_eq!(solver.flow(arc_ids[0]), 0);
        assert_eq!(solver.flow(arc_ids[1]), 0);

        let mut source_side = solver.source_side_min_cut();
        source_side.sort_unstable();
        assert_eq!(source_side, vec![0, 1, 2]);
        assert_eq!(solver.sink_side_min_cut(), vec![3]);
    }

    #[test]
    fn sink_outside_the_graph() {
        let arcs = [(0, 1, 5)];
        let (graph, arc_ids) = build_graph(2, &arcs);
        let mut solver: MaxFlow<i64> = MaxFlow::new(&graph, 0, 7);
        set_capacities(&mut solver, &arc_ids, &arcs);

        assert!(solver.solve());
        assert_eq!(solver.status(), Status::Optimal);
        assert_eq!(solver.optimal_flow(), 0);
        assert_eq!(solver.sink_side_min_cut(), vec![7]);

        let mut source_side = solver.source_side_min_cut();
        source_side.sort_unstable();
        assert_eq!(source_side, vec![0, 1]);
    }

    #[test]
    fn empty_graph() {
        let graph = ReverseArcGraph::new();
        let mut solver: MaxFlow<i64> = MaxFlow::new(&graph, 0, 1);

        assert!(solver.solve());
        assert_eq!(solver.status(), Status::Optimal);
        assert_eq!(solver.optimal_flow(), 0);
        assert_eq!(solver.source_side_min_cut(), vec![0]);
        assert_eq!(solver.sink_side_min_cut(), vec![1]);
    }

    #[test]
    fn flow_beyond_the_numeric_ceiling_reports_overflow() {
        let arcs = [(0, 1, i64::MAX), (0, 2, i64::MAX), (1, 3, i64::MAX), (2, 3, i64::MAX)];
        let (graph, arc_ids) = build_graph(4, &arcs);
        let mut solver: MaxFlow<i64> = MaxFlow::new(&graph, 0, 3);
        set_capacities(&mut solver, &arc_ids, &arcs);

        assert!(solver.solve());
        assert_eq!(solver.status(), Status::IntOverflow);
        // The computed flow is feasible and reaches the ceiling.
        assert_eq!(solver.optimal_flow(), i64::MAX);
        assert!(solver.augmenting_path_exists());
    }

    #[test]
    fn anti_parallel_arcs_do_not_leak_into_each_other() {
        let arcs = [(0, 1, 5), (1, 0, 3), (1, 2, 5)];
        let (graph, arc_ids) = build_graph(3, &arcs);
        let mut solver: MaxFlow<i64> = MaxFlow::new(&graph, 0, 2);
        set_capacities(&mut solver, &arc_ids, &arcs);

        assert!(solver.solve());
        assert_eq!(solver.optimal_flow(), 5);
        assert_eq!(solver.flow(arc_ids[0]), 5);
        assert_eq!(solver.flow(arc_ids[1]), 0);
        assert_eq!(solver.flow(arc_ids[2]), 5);

        // Each direction keeps its own capacity; a reverse arc has none.
        assert_eq!(solver.capacity(arc_ids[0]), 5);
        assert_eq!(solver.capacity(arc_ids[1]), 3);
        assert_eq!(solver.capacity(graph.opposite_arc(arc_ids[0])), 0);
        assert_eq!(solver.flow(graph.opposite_arc(arc_ids[0])), -5);
    }

    #[test]
    fn resolving_an_unmodified_instance_is_idempotent() {
        let arcs = [(0, 1, 10), (0, 2, 10), (1, 2, 2), (1, 3, 4), (2, 3, 9)];
        let (graph, arc_ids) = build_graph(4, &arcs);
        let mut solver: MaxFlow<i64> = MaxFlow::new(&graph, 0, 3);
        set_capacities(&mut solver, &arc_ids, &arcs);

        assert!(solver.solve());
        let first_flow = solver.optimal_flow();
        let first_arc_flows: Vec<i64> = arc_ids.iter().map(|&arc| solver.flow(arc)).collect();
        let first_cut = solver.source_side_min_cut();

        assert!(solver.solve());
        assert_eq!(solver.status(), Status::Optimal);
        assert_eq!(solver.optimal_flow(), first_flow);
        let second_arc_flows: Vec<i64> = arc_ids.iter().map(|&arc| solver.flow(arc)).collect();
        assert_eq!(first_arc_flows, second_arc_flows);
        assert_eq!(first_cut, solver.source_side_min_cut());
    }

    #[test]
    fn increasing_a_capacity_cannot_decrease_the_flow() {
        let arcs = [(0, 1, 10), (0, 2, 10), (1, 2, 2), (1, 3, 4), (2, 3, 9)];
        let (graph, arc_ids) = build_graph(4, &arcs);
        let mut solver: MaxFlow<i64> = MaxFlow::new(&graph, 0, 3);
        set_capacities(&mut solver, &arc_ids, &arcs);

        solver.solve();
        assert_eq!(solver.optimal_flow(), 13);

        solver.set_arc_capacity(arc_ids[3], 6);
        assert_eq!(solver.status(), Status::NotSolved);
        solver.solve();
        assert_eq!(solver.optimal_flow(), 15);
    }

    #[test]
    fn reducing_a_capacity_below_the_flow_clears_the_arc() {
        let arcs = [(0, 1, 5), (1, 2, 3)];
        let (graph, arc_ids) = build_graph(3, &arcs);
        let mut solver: MaxFlow<i64> = MaxFlow::new(&graph, 0, 2);
        set_capacities(&mut solver, &arc_ids, &arcs);

        solver.solve();
        assert_eq!(solver.optimal_flow(), 3);
        assert_eq!(solver.flow(arc_ids[0]), 3);

        // 1 is below the current flow of 3, so the arc is reset.
        solver.set_arc_capacity(arc_ids[0], 1);
        assert_eq!(solver.status(), Status::NotSolved);
        assert_eq!(solver.capacity(arc_ids[0]), 1);
        assert_eq!(solver.flow(arc_ids[0]), 0);

        solver.solve();
        assert_eq!(solver.optimal_flow(), 1);
    }

    #[test]
    fn reducing_a_capacity_within_the_free_capacity_keeps_the_flow() {
        let arcs = [(0, 1, 5), (1, 2, 3)];
        let (graph, arc_ids) = build_graph(3, &arcs);
        let mut solver: MaxFlow<i64> = MaxFlow::new(&graph, 0, 2);
        set_capacities(&mut solver, &arc_ids, &arcs);

        solver.solve();
        solver.set_arc_capacity(arc_ids[0], 4);
        assert_eq!(solver.status(), Status::NotSolved);
        assert_eq!(solver.capacity(arc_ids[0]), 4);
        assert_eq!(solver.flow(arc_ids[0]), 3);

        solver.solve();
        assert_eq!(solver.optimal_flow(), 3);
    }

    #[test]
    fn setting_the_same_capacity_keeps_the_solution() {
        let arcs = [(0, 1, 5), (1, 2, 3)];
        let (graph, arc_ids) = build_graph(3, &arcs);
        let mut solver: MaxFlow<i64> = MaxFlow::new(&graph, 0, 2);
        set_capacities(&mut solver, &arc_ids, &arcs);

        solver.solve();
        assert_eq!(solver.status(), Status::Optimal);
        solver.set_arc_capacity(arc_ids[0], 5);
        assert_eq!(solver.status(), Status::Optimal);
    }

    #[test]
    fn layered_instance_satisfies_the_flow_invariants() {
        // Deterministic capacities from a linear congruential sequence.
        let mut state: u64 = 42;
        let mut next_capacity = move || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((state >> 33) % 50 + 1) as i64
        };

        let layers = 3;
        let width = 4;
        let mut graph = ReverseArcGraph::new();
        let num_nodes = 2 + layers * width;
        graph.add_nodes(num_nodes);
        let source = 0;
        let sink = num_nodes - 1;
        let layer_node = |layer: usize, offset: usize| 1 + layer * width + offset;

        let mut arcs = Vec::new();
        for offset in 0..width {
            arcs.push((graph.add_arc(source, layer_node(0, offset)), next_capacity()));
            arcs.push((graph.add_arc(layer_node(layers - 1, offset), sink), next_capacity()));
        }
        for layer in 0..layers - 1 {
            for from in 0..width {
                for to in 0..width {
                    arcs.push((graph.add_arc(layer_node(layer, from), layer_node(layer + 1, to)), next_capacity()));
                }
            }
        }

        let mut solver: MaxFlow<i64> = MaxFlow::new(&graph, source, sink);
        for &(arc, capacity) in &arcs {
            solver.set_arc_capacity(arc, capacity);
        }

        assert!(solver.solve());
        assert_eq!(solver.status(), Status::Optimal);
        assert!(solver.check_result());
        assert!(!solver.augmenting_path_exists());

        // Capacities survive the solve.
        for &(arc, capacity) in &arcs {
            assert_eq!(solver.capacity(arc), capacity);
            assert!(solver.flow(arc) >= 0);
            assert!(solver.flow(arc) <= capacity);
        }

        // The flow out of the source matches the flow value.
        let outflow: i64 = graph.outgoing_arcs(source).map(|arc| solver.flow(arc)).sum();
        assert_eq!(outflow, solver.optimal_flow());

        // Both cuts certify the optimum and do not overlap.
        let optimal_flow = solver.optimal_flow();
        let source_side = solver.source_side_min_cut();
        assert_eq!(crossing_capacity(&solver, &source_side, true), optimal_flow);
        let sink_side = solver.sink_side_min_cut();
        assert_eq!(crossing_capacity(&solver, &sink_side, false), optimal_flow);
        assert!(source_side.iter().all(|node| !sink_side.contains(node)));
    }
}
