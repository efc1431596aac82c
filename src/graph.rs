pub type NodeIndex = usize;

/// Arcs carry signed ids: the forward arcs of the graph are `0..num_arcs`,
/// and the opposite of arc `a` is `!a`, so `opposite_arc` is an involution
/// and the reverse arcs live in `-num_arcs..0`.
pub type ArcIndex = isize;

/// Sentinel for "no arc", usable as an iteration resume point meaning
/// "start from the beginning".
pub const NIL_ARC: ArcIndex = ArcIndex::MIN;

/// Directed graph where every added arc also materializes its reverse.
///
/// Per node we keep the list of arcs whose tail is that node in the
/// residual sense: its outgoing forward arcs plus the opposites of its
/// incoming forward arcs, in insertion order.
#[derive(Default)]
pub struct ReverseArcGraph {
    arc_tail: Vec<NodeIndex>,
    arc_head: Vec<NodeIndex>,
    incident_arcs: Vec<Vec<ArcIndex>>,
    // Positions of a forward arc in incident_arcs[tail] and of its
    // opposite in incident_arcs[head], for resuming iteration at an arc.
    direct_arc_position: Vec<usize>,
    opposite_arc_position: Vec<usize>,
}

impl ReverseArcGraph {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.incident_arcs.len()
    }

    #[inline]
    pub fn num_arcs(&self) -> usize {
        self.arc_tail.len()
    }

    // This container allocates exactly, so the reservations equal the counts.
    #[inline]
    pub fn node_reservation(&self) -> usize {
        self.num_nodes()
    }

    #[inline]
    pub fn arc_reservation(&self) -> usize {
        self.num_arcs()
    }

    pub fn add_node(&mut self) -> NodeIndex {
        self.incident_arcs.push(Vec::new());
        self.num_nodes() - 1
    }

    pub fn add_nodes(&mut self, count: usize) -> Vec<NodeIndex> {
        (0..count).map(|_| self.add_node()).collect()
    }

    /// Adds a forward arc and its zero-capacity reverse; returns the
    /// forward arc id.
    pub fn add_arc(&mut self, tail: NodeIndex, head: NodeIndex) -> ArcIndex {
        debug_assert!(self.is_node_valid(tail));
        debug_assert!(self.is_node_valid(head));
        let arc = self.num_arcs() as ArcIndex;
        self.direct_arc_position.push(self.incident_arcs[tail].len());
        self.incident_arcs[tail].push(arc);
        self.opposite_arc_position.push(self.incident_arcs[head].len());
        self.incident_arcs[head].push(!arc);
        self.arc_tail.push(tail);
        self.arc_head.push(head);
        arc
    }

    #[inline]
    pub fn tail(&self, arc: ArcIndex) -> NodeIndex {
        if arc >= 0 {
            self.arc_tail[arc as usize]
        } else {
            self.arc_head[!arc as usize]
        }
    }

    #[inline]
    pub fn head(&self, arc: ArcIndex) -> NodeIndex {
        if arc >= 0 {
            self.arc_head[arc as usize]
        } else {
            self.arc_tail[!arc as usize]
        }
    }

    #[inline]
    pub fn opposite_arc(&self, arc: ArcIndex) -> ArcIndex {
        debug_assert!(self.is_arc_valid(arc));
        !arc
    }

    #[inline]
    pub fn is_node_valid(&self, node: NodeIndex) -> bool {
        node < self.num_nodes()
    }

    #[inline]
    pub fn is_arc_valid(&self, arc: ArcIndex) -> bool {
        let forward = if arc >= 0 { arc } else { !arc };
        (forward as usize) < self.num_arcs()
    }

    /// Forward arcs leaving `node`, in insertion order.
    pub fn outgoing_arcs(&self, node: NodeIndex) -> impl Iterator<Item = ArcIndex> + '_ {
        self.incident_arcs[node].iter().copied().filter(|&arc| arc >= 0)
    }

    /// Forward arcs entering `node`, in insertion order.
    pub fn incoming_arcs(&self, node: NodeIndex) -> impl Iterator<Item = ArcIndex> + '_ {
        self.incident_arcs[node].iter().copied().filter(|&arc| arc < 0).map(|arc| !arc)
    }

    /// Every arc whose tail is `node` in the residual sense: outgoing
    /// forward arcs and opposites of incoming forward arcs.
    pub fn outgoing_or_opposite_incoming_arcs(&self, node: NodeIndex) -> impl Iterator<Item = ArcIndex> + '_ {
        self.incident_arcs[node].iter().copied()
    }

    /// Same as `outgoing_or_opposite_incoming_arcs` but resuming at `arc`
    /// (inclusive). Passing `NIL_ARC` starts from the beginning.
    pub fn outgoing_or_opposite_incoming_arcs_from(&self, node: NodeIndex, arc: ArcIndex) -> impl Iterator<Item = ArcIndex> + '_ {
        let first = if arc == NIL_ARC {
            0
        } else {
            debug_assert_eq!(self.tail(arc), node);
            self.arc_position(arc)
        };
        self.incident_arcs[node][first..].iter().copied()
    }

    #[inline]
    fn arc_position(&self, arc: ArcIndex) -> usize {
        if arc >= 0 {
            self.direct_arc_position[arc as usize]
        } else {
            self.opposite_arc_position[!arc as usize]
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn opposite_arc_is_an_involution() {
        let mut graph = ReverseArcGraph::new();
        graph.add_nodes(3);
        let a = graph.add_arc(0, 1);
        let b = graph.add_arc(1, 2);

        assert_eq!(graph.opposite_arc(graph.opposite_arc(a)), a);
        assert_eq!(graph.opposite_arc(graph.opposite_arc(b)), b);
        assert_ne!(graph.opposite_arc(a), a);
    }

    #[test]
    fn head_and_tail_swap_on_the_opposite_arc() {
        let mut graph = ReverseArcGraph::new();
        graph.add_nodes(2);
        let a = graph.add_arc(0, 1);
        let opposite = graph.opposite_arc(a);

        assert_eq!(graph.tail(a), 0);
        assert_eq!(graph.head(a), 1);
        assert_eq!(graph.tail(opposite), 1);
        assert_eq!(graph.head(opposite), 0);
    }

    #[test]
    fn iteration_covers_outgoing_and_incoming() {
        let mut graph = ReverseArcGraph::new();
        graph.add_nodes(3);
        let a = graph.add_arc(0, 1);
        let b = graph.add_arc(1, 2);
        let c = graph.add_arc(2, 1);

        let outgoing: Vec<_> = graph.outgoing_arcs(1).collect();
        assert_eq!(outgoing, vec![b]);

        let incoming: Vec<_> = graph.incoming_arcs(1).collect();
        assert_eq!(incoming, vec![a, c]);

        let incident: Vec<_> = graph.outgoing_or_opposite_incoming_arcs(1).collect();
        assert_eq!(incident, vec![!a, b, !c]);
    }

    #[test]
    fn iteration_resumes_at_the_given_arc() {
        let mut graph = ReverseArcGraph::new();
        graph.add_nodes(3);
        let a = graph.add_arc(0, 1);
        let b = graph.add_arc(1, 2);
        let c = graph.add_arc(2, 1);

        let from_b: Vec<_> = graph.outgoing_or_opposite_incoming_arcs_from(1, b).collect();
        assert_eq!(from_b, vec![b, !c]);

        let from_nil: Vec<_> = graph.outgoing_or_opposite_incoming_arcs_from(1, NIL_ARC).collect();
        assert_eq!(from_nil, vec![!a, b, !c]);
    }

    #[test]
    fn validity_checks() {
        let mut graph = ReverseArcGraph::new();
        graph.add_nodes(2);
        let a = graph.add_arc(0, 1);

        assert!(graph.is_node_valid(1));
        assert!(!graph.is_node_valid(2));
        assert!(graph.is_arc_valid(a));
        assert!(graph.is_arc_valid(!a));
        assert!(!graph.is_arc_valid(1));
        assert!(!graph.is_arc_valid(!1));
    }
}
