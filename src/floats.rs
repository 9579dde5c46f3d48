//! Float coordinator – deferred width/position corrections around floated
//! content.
//!
//! Placing a float shrinks the available width immediately; undoing that, or
//! honoring `clear`, happens later, when the flow has advanced far enough.
//! Those deferred checks are plain data (no closures over mutable state):
//! tagged predicates swept in registration order after every committed line
//! or image. A predicate that fires is removed; the rest keep their order.

use crate::content::FloatSide;
use crate::flow::Cursor;

/// A deferred layout correction, carried as data.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchPredicate {
    /// Undo a float's width/x shrink once the flow passes its bottom edge,
    /// or as soon as a visited node could not fit the shrunk frame.
    Restore {
        bottom: f32,
        restore_x: f32,
        restore_width: f32,
    },
    /// Force the cursor below the float when a `clear: both` node arrives
    /// before natural restoration.
    Clear { bottom: f32 },
}

/// What a sweep may learn about the node currently being visited.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeProbe {
    /// The node carries `clear: both`.
    pub clears: bool,
    /// Width the node needs; wider than the shrunk frame means starvation.
    pub min_width: f32,
}

#[derive(Default)]
pub struct FloatCoordinator {
    watchers: Vec<WatchPredicate>,
}

impl FloatCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }

    pub fn watcher_count(&self) -> usize {
        self.watchers.len()
    }

    /// Register a floated margin-box at the cursor and shrink the frame.
    ///
    /// `float: left` shifts x right by the box width; `float: right` leaves
    /// x alone and shrinks from the right. Both register a restore and a
    /// clear predicate anchored at the box's bottom edge.
    pub fn place(&mut self, cursor: &mut Cursor, side: FloatSide, width: f32, height: f32) {
        if side == FloatSide::None {
            return;
        }
        let bottom = cursor.y + height;
        let restore_x = cursor.x;
        let restore_width = cursor.width;
        if side == FloatSide::Left {
            cursor.x += width;
        }
        cursor.width = (cursor.width - width).max(0.0);
        self.watchers.push(WatchPredicate::Restore {
            bottom,
            restore_x,
            restore_width,
        });
        self.watchers.push(WatchPredicate::Clear { bottom });
    }

    /// Evaluate all predicates in registration order against the cursor and
    /// the optionally known triggering node. Fired predicates are removed.
    /// Returns true when any fired (the frame geometry or position moved),
    /// which tells the flow to re-break uncommitted lines.
    pub fn sweep(&mut self, cursor: &mut Cursor, node: Option<&NodeProbe>) -> bool {
        let mut changed = false;
        let mut remaining = Vec::with_capacity(self.watchers.len());
        for watcher in self.watchers.drain(..) {
            let fired = match &watcher {
                WatchPredicate::Restore {
                    bottom,
                    restore_x,
                    restore_width,
                } => {
                    let starved = node.map(|n| n.min_width > cursor.width).unwrap_or(false);
                    if cursor.y >= *bottom || starved {
                        cursor.x = *restore_x;
                        cursor.width = *restore_width;
                        true
                    } else {
                        false
                    }
                }
                WatchPredicate::Clear { bottom } => {
                    if node.map(|n| n.clears).unwrap_or(false) {
                        if cursor.y < *bottom {
                            cursor.y = *bottom;
                        }
                        true
                    } else {
                        false
                    }
                }
            };
            if fired {
                changed = true;
            } else {
                remaining.push(watcher);
            }
        }
        self.watchers = remaining;
        changed
    }
}
