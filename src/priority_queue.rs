use num_traits::PrimInt;

/// Priority queue over integer priorities that only supports pushes with a
/// priority greater than or equal to the current maximum minus one. Under
/// that precondition every operation is O(1) and memory is O(len). Elements
/// of equal priority pop in LIFO order.
///
/// The trick is to split elements by priority parity: the restricted push
/// keeps both stacks sorted by nondecreasing priority, so the element with
/// the highest priority is at the back of one of the two.
pub struct PriorityQueueWithRestrictedPush<Element, IntegerPriority> {
    even_queue: Vec<(Element, IntegerPriority)>,
    odd_queue: Vec<(Element, IntegerPriority)>,
}

impl<Element, IntegerPriority> PriorityQueueWithRestrictedPush<Element, IntegerPriority>
where
    Element: Copy,
    IntegerPriority: PrimInt,
{
    pub fn new() -> Self {
        Self { even_queue: Vec::new(), odd_queue: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.even_queue.is_empty() && self.odd_queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.even_queue.clear();
        self.odd_queue.clear();
    }

    /// Pushes an element. `priority` must be greater than or equal to the
    /// highest priority present in the queue minus one; violating this is
    /// caught in debug builds and silently corrupts the order otherwise.
    pub fn push(&mut self, element: Element, priority: IntegerPriority) {
        let one = IntegerPriority::one();
        debug_assert!(self.even_queue.last().map_or(true, |&(_, top)| priority + one >= top));
        debug_assert!(self.odd_queue.last().map_or(true, |&(_, top)| priority + one >= top));
        if priority & one == one {
            debug_assert!(self.odd_queue.last().map_or(true, |&(_, top)| priority >= top));
            self.odd_queue.push((element, priority));
        } else {
            debug_assert!(self.even_queue.last().map_or(true, |&(_, top)| priority >= top));
            self.even_queue.push((element, priority));
        }
    }

    /// Removes and returns the element with the highest priority.
    pub fn pop(&mut self) -> Option<Element> {
        match (self.even_queue.last(), self.odd_queue.last()) {
            (None, None) => None,
            (Some(_), None) => self.even_queue.pop().map(|(element, _)| element),
            (None, Some(_)) => self.odd_queue.pop().map(|(element, _)| element),
            (Some(&(_, even)), Some(&(_, odd))) => {
                if odd > even {
                    self.odd_queue.pop().map(|(element, _)| element)
                } else {
                    self.even_queue.pop().map(|(element, _)| element)
                }
            }
        }
    }
}

impl<Element, IntegerPriority> Default for PriorityQueueWithRestrictedPush<Element, IntegerPriority>
where
    Element: Copy,
    IntegerPriority: PrimInt,
{
    fn default() -> Self {
        Self::new()
    }
}
