//! Arena node of a hierarchy tree.

use core::fmt;

/// A segment in a [`HierarchicalStructure`](super::HierarchicalStructure).
///
/// Nodes reference each other by arena index. A leaf that ends above the
/// deepest level keeps standing in for itself down to `max_depth` ("tailing"),
/// so every node is active over a contiguous range of depths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Arena index of this node.
    pub id: usize,
    /// Segment name.
    pub name: String,
    /// Depth in tree (0 = root).
    pub depth: usize,
    /// Parent arena index (`None` for the root).
    pub parent: Option<usize>,
    /// Child arena indices, in declaration order.
    pub children: Vec<usize>,
    /// Deepest level at which this node is still the active segment.
    pub last_active_depth: usize,
}

impl Node {
    /// Check if this is a leaf node.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Whether this node is the active segment of its branch at `depth`.
    pub fn is_active_at(&self, depth: usize) -> bool {
        self.depth <= depth && depth <= self.last_active_depth
    }

    /// Whether the node reaches `depth` only through tailing.
    pub fn is_tailing_at(&self, depth: usize) -> bool {
        self.is_leaf() && self.depth < depth && depth <= self.last_active_depth
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_leaf() {
            write!(
                f,
                "Leaf[{}] {} L{}..L{}",
                self.id, self.name, self.depth, self.last_active_depth
            )
        } else {
            write!(f, "Node[{}] {} L{}", self.id, self.name, self.depth)
        }
    }
}
