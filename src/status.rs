#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub enum Status {
    /// No solution available, or the problem data changed since the last solve.
    #[default]
    NotSolved,
    /// An optimal maximum flow was found.
    Optimal,
    /// The true maximum flow exceeds the largest representable flow quantity.
    /// The computed flow is feasible and reaches that ceiling.
    IntOverflow,
}
