//! List counters and marker geometry.
//!
//! Ordered lists keep one counter per nesting level on a LIFO stack; the top
//! is the active counter. Unordered nesting never touches the stack.

/// Per-nesting-level ordered-list counters.
#[derive(Debug, Default)]
pub struct CounterStack {
    counters: Vec<u32>,
}

impl CounterStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entering a nested ordered list: keep the parent's counter below and
    /// start a fresh working counter at 1.
    pub fn enter_ordered(&mut self) {
        self.counters.push(1);
    }

    /// Exiting an ordered list pops back to the parent's counter. The stack
    /// never pops below its initial depth.
    pub fn exit_ordered(&mut self) {
        self.counters.pop();
    }

    /// Read-then-increment the active counter. Outside any ordered list the
    /// stack top is absent and item numbering is not in effect.
    pub fn next(&mut self) -> Option<u32> {
        let top = self.counters.last_mut()?;
        let value = *top;
        *top += 1;
        Some(value)
    }

    pub fn depth(&self) -> usize {
        self.counters.len()
    }

    /// Roll back to a recorded depth after a failed subtree, dropping any
    /// levels the failure left behind.
    pub fn truncate_to(&mut self, depth: usize) {
        self.counters.truncate(depth);
    }
}

/// Number prefix spliced into an ordered item's first text node.
pub fn ordered_prefix(value: u32) -> String {
    format!("{value}. ")
}

/// Geometry of a filled circular bullet, placed off the first rendered
/// line's actual origin rather than the block's nominal edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulletMarker {
    pub cx: f32,
    pub cy: f32,
    pub radius: f32,
}

pub fn bullet_marker(first_line_origin: (f32, f32), font_size: f32) -> BulletMarker {
    let (x, baseline) = first_line_origin;
    BulletMarker {
        cx: x - font_size * 0.6,
        cy: baseline - font_size * 0.27,
        radius: font_size * 0.16,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_then_increment() {
        let mut stack = CounterStack::new();
        stack.enter_ordered();
        assert_eq!(stack.next(), Some(1));
        assert_eq!(stack.next(), Some(2));
        stack.enter_ordered();
        assert_eq!(stack.next(), Some(1));
        stack.exit_ordered();
        assert_eq!(stack.next(), Some(3));
    }

    #[test]
    fn never_pops_below_initial_depth() {
        let mut stack = CounterStack::new();
        stack.exit_ordered();
        stack.exit_ordered();
        assert_eq!(stack.depth(), 0);
        assert_eq!(stack.next(), None);
    }

    #[test]
    fn truncate_restores_depth_after_failure() {
        let mut stack = CounterStack::new();
        stack.enter_ordered();
        let depth = stack.depth();
        stack.enter_ordered();
        stack.enter_ordered();
        stack.truncate_to(depth);
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn bullet_sits_left_of_the_text_origin() {
        let marker = bullet_marker((100.0, 200.0), 12.0);
        assert!(marker.cx < 100.0);
        assert!(marker.cy < 200.0);
        assert!(marker.radius > 0.0);
    }
}
