//! Lazy, one-shot traversals over a [Tree].
//!
//! Each iterator borrows the tree immutably, so the tree cannot be edited
//! while a traversal is in progress. Re-invoke the traversal to walk the tree
//! again.

use super::node::NodeId;
use super::tree::Tree;
use std::collections::VecDeque;

/// Parents before children; children in their stored order.
pub struct Preorder<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
}

impl Iterator for Preorder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let node_id = self.stack.pop()?;
        self.stack.extend(self.tree.child_ids(node_id).iter().rev());
        Some(node_id)
    }
}

/// Children before parents.
pub struct Postorder<'a> {
    tree: &'a Tree,
    stack: Vec<(NodeId, bool)>,
}

impl Iterator for Postorder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        loop {
            let (node_id, expanded) = self.stack.pop()?;
            let child_ids = self.tree.child_ids(node_id);
            if expanded || child_ids.is_empty() {
                return Some(node_id);
            }
            self.stack.push((node_id, true));
            self.stack.extend(child_ids.iter().rev().map(|&c| (c, false)));
        }
    }
}

/// Breadth first, one depth level at a time.
pub struct LevelOrder<'a> {
    tree: &'a Tree,
    queue: VecDeque<NodeId>,
}

impl Iterator for LevelOrder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let node_id = self.queue.pop_front()?;
        self.queue.extend(self.tree.child_ids(node_id));
        Some(node_id)
    }
}

/// Leaves only, in preorder.
pub struct Leaves<'a> {
    inner: Preorder<'a>,
}

impl Iterator for Leaves<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let tree = self.inner.tree;
        self.inner.by_ref().find(|&node_id| tree.is_leaf(node_id))
    }
}

/// From a node's parent up to the seed node.
pub struct Ancestors<'a> {
    tree: &'a Tree,
    current: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let node_id = self.tree.parent_id(self.current?);
        self.current = node_id;
        node_id
    }
}

impl Tree {
    pub fn preorder(&self) -> Preorder<'_> {
        self.preorder_from(self.seed_node_id())
    }

    pub fn preorder_from(&self, node_id: NodeId) -> Preorder<'_> {
        Preorder { tree: self, stack: vec![node_id] }
    }

    pub fn postorder(&self) -> Postorder<'_> {
        self.postorder_from(self.seed_node_id())
    }

    pub fn postorder_from(&self, node_id: NodeId) -> Postorder<'_> {
        Postorder { tree: self, stack: vec![(node_id, false)] }
    }

    pub fn level_order(&self) -> LevelOrder<'_> {
        LevelOrder { tree: self, queue: VecDeque::from([self.seed_node_id()]) }
    }

    pub fn leaves(&self) -> Leaves<'_> {
        self.leaves_from(self.seed_node_id())
    }

    pub fn leaves_from(&self, node_id: NodeId) -> Leaves<'_> {
        Leaves { inner: self.preorder_from(node_id) }
    }

    pub fn ancestors(&self, node_id: NodeId) -> Ancestors<'_> {
        Ancestors { tree: self, current: Some(node_id) }
    }
}
