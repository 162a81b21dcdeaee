use super::edge::EdgeLength;
use super::node::{Node, NodeId};
use super::tree::{Rooting, Tree, TreeError};
use crate::splits::Bitmask;

impl Tree {
    // =========================================================================
    // Rooting Operations
    // =========================================================================

    /// Makes `node_id` the seed node.
    ///
    /// Every edge on the path from the old seed node down to `node_id` is
    /// inverted: its tail becomes its head. Edge lengths travel with their
    /// edges. When splits have been encoded, only the masks of the inverted
    /// edges change, and each is the complement of the mask the edge had
    /// before; the split map is rekeyed to match.
    ///
    /// The old seed node may be left with a single child; with
    /// `suppress_unifurcations` it is then removed.
    ///
    /// Leaves cannot become the seed node, since a taxon must stay on a leaf:
    /// a leaf target is `TreeError::InvalidRerootTarget` and leaves the tree
    /// as it was. Use [`Tree::root_with_outgroup`] to root on a leaf's edge.
    pub fn reroot_at(
        &mut self,
        node_id: NodeId,
        suppress_unifurcations: bool,
    ) -> Result<(), TreeError> {
        if !self.node_exists(node_id) {
            return Err(TreeError::NodeDoesNotExist(node_id));
        }
        if node_id == self.seed_node_id() {
            return Ok(());
        }
        if self.is_leaf(node_id) {
            return Err(TreeError::InvalidRerootTarget(node_id, "node is a leaf"));
        }

        let old_seed_node_id = self.seed_node_id();
        let all: Option<Bitmask> = self.bitmask(old_seed_node_id).cloned();
        let root_edge_length = self.edge_length(old_seed_node_id).clone();

        let mut path: Vec<NodeId> = vec![node_id];
        path.extend(self.ancestors(node_id));

        let saved: Vec<(EdgeLength, Option<Bitmask>)> = path
            .iter()
            .map(|&id| (self.edge_length(id).clone(), self.bitmask(id).cloned()))
            .collect();

        for (i, pair) in path.windows(2).enumerate() {
            let (child_id, parent_id) = (pair[0], pair[1]);
            let (length, mask) = &saved[i];
            let nodes = self.nodes_mut();
            _ = nodes[parent_id].remove_child_id(child_id);
            nodes[child_id].add_child_id(parent_id);
            nodes[parent_id].set_parent_id(Some(child_id));
            nodes[parent_id].set_edge_length(length.clone());
            let inverted = match (&all, mask) {
                (Some(all), Some(mask)) => Some(mask.complement(all)),
                _ => None,
            };
            *nodes[parent_id].edge_mut().bitmask_mut() = inverted;
        }

        let nodes = self.nodes_mut();
        nodes[node_id].set_parent_id(None);
        nodes[node_id].set_edge_length(root_edge_length);
        *nodes[node_id].edge_mut().bitmask_mut() = all;
        self.set_seed_node_id(node_id);

        if suppress_unifurcations && self.child_count(old_seed_node_id) == 1 {
            self.suppress_node(old_seed_node_id);
        }

        self.rekey_split_map();
        log::debug!("Rerooted from {old_seed_node_id} to {node_id}");
        Ok(())
    }

    /// Turns a bifurcating seed node into a multifurcation by collapsing one
    /// of its two child edges; the collapsed edge's length is added to the
    /// other child's edge. The tree is unrooted afterwards.
    ///
    /// A seed node that does not have exactly two children is left as is.
    pub fn deroot(&mut self) -> Result<(), TreeError> {
        if let Some(node_to_drop_id) = self.select_root_child_node_to_drop() {
            self.slide_length_through_root(node_to_drop_id);
            self.collapse_edge(node_to_drop_id)?;
        }
        self.set_rooting(Rooting::Unrooted);
        Ok(())
    }

    fn slide_length_through_root(&mut self, source_node_id: NodeId) {
        let seed_node_id = self.seed_node_id();
        let Some(receive_node_id) = self
            .child_ids(seed_node_id)
            .iter()
            .copied()
            .find(|&other_id| other_id != source_node_id)
        else {
            return;
        };

        let merged = self
            .edge_length(receive_node_id)
            .merged(self.edge_length(source_node_id));
        if let Some(receive_node) = self.node_mut(receive_node_id) {
            receive_node.set_edge_length(merged);
        }
        if let Some(source_node) = self.node_mut(source_node_id) {
            source_node.set_edge_length(EdgeLength::Unspecified);
        }
    }

    fn select_root_child_node_to_drop(&self) -> Option<NodeId> {
        let seed_node_id = self.seed_node_id();
        if self.child_count(seed_node_id) != 2 {
            return None;
        }
        let child_ids = self.child_ids(seed_node_id);
        let (child_1, child_2) = (child_ids[0], child_ids[1]);

        match (self.is_leaf(child_1), self.is_leaf(child_2)) {
            (true, true) => None,
            (true, false) => Some(child_2),
            (false, true) => Some(child_1),
            // Neither is a leaf; drop the one with more descending leaves.
            (false, false) => {
                let leaf_count_1 = self.leaves_from(child_1).count();
                let leaf_count_2 = self.leaves_from(child_2).count();
                if leaf_count_1 > leaf_count_2 { Some(child_1) } else { Some(child_2) }
            }
        }
    }

    pub fn is_valid_potential_outgroup_node(&self, node_id: NodeId) -> bool {
        self.node_exists(node_id) && node_id != self.seed_node_id()
    }

    /// Roots the tree on the edge above `node_id`: a new bifurcating seed
    /// node is placed halfway along that edge, with the outgroup on one side
    /// and the rest of the tree on the other.
    ///
    /// If the seed node already bifurcates with `node_id` on one side, the
    /// tree is only marked as rooted. Returns the seed node.
    pub fn root_with_outgroup(&mut self, node_id: NodeId) -> Result<NodeId, TreeError> {
        if !self.is_valid_potential_outgroup_node(node_id) {
            return Err(TreeError::InvalidOutgroupNode(node_id));
        }

        let seed_node_id = self.seed_node_id();
        if self.child_count(seed_node_id) == 2
            && self.child_ids(seed_node_id).contains(&node_id)
        {
            self.set_rooting(Rooting::Rooted);
            return Ok(seed_node_id);
        }

        self.deroot()?;

        let parent_node_id = self
            .parent_id(node_id)
            .ok_or(TreeError::InvalidOutgroupNode(node_id))?;
        let half_length = match self.edge_length(node_id) {
            EdgeLength::Numeric(length) => EdgeLength::Numeric(length / 2e0),
            other => other.clone(),
        };
        let mask = self.bitmask(node_id).cloned();

        let mut new_root = Node::new();
        new_root.set_edge_length(half_length.clone());
        let new_root_id = self.insert_node(new_root, Some(parent_node_id));
        *self.nodes_mut()[new_root_id].edge_mut().bitmask_mut() = mask;

        let nodes = self.nodes_mut();
        if let Some(slot) = nodes[parent_node_id]
            .child_ids_mut()
            .iter_mut()
            .find(|id| **id == node_id)
        {
            *slot = new_root_id;
        }
        nodes[new_root_id].add_child_id(node_id);
        nodes[node_id].set_parent_id(Some(new_root_id));
        nodes[node_id].set_edge_length(half_length);

        self.reroot_at(new_root_id, true)?;
        self.set_rooting(Rooting::Rooted);
        Ok(new_root_id)
    }
}
