use super::TreeFloat;
use super::edge::{Edge, EdgeLength};
use super::node::{Node, NodeId};
use super::taxon::{TaxonId, TaxonNamespace};
use crate::splits::{Bitmask, SplitMap, split_map_from_masks};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::SlotMap;
use std::cmp::Reverse;
use std::fmt::Display;
use std::sync::Arc;
use thiserror::Error;

/// Whether a tree's seed node is a biological root.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Rooting {
    Rooted,
    Unrooted,
    /// Nothing said either way; treated as unrooted.
    #[default]
    Unknown,
}

impl Rooting {
    pub fn is_rooted(self) -> bool {
        self == Rooting::Rooted
    }
}

impl Display for Rooting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Rooting::Rooted => "Rooted",
                Rooting::Unrooted => "Unrooted",
                Rooting::Unknown => "Unknown",
            }
        )
    }
}

#[derive(Debug, Clone)]
pub struct Tree {
    nodes: SlotMap<NodeId, Node>,
    seed_node_id: NodeId,
    rooting: Rooting,
    name: Option<Arc<str>>,
    weight: Option<TreeFloat>,
    comments: Vec<String>,
    split_map: Option<SplitMap>,
}

#[derive(Debug, Error, PartialEq)]
pub enum TreeError {
    #[error("Parent node with NodeId: {0} does not exist.")]
    ParentNodeDoesNotExist(NodeId),
    #[error("Node with NodeId: {0} does not exist.")]
    NodeDoesNotExist(NodeId),
    #[error("Cannot reroot at node {0}: {1}.")]
    InvalidRerootTarget(NodeId, &'static str),
    #[error("The edge above node {0} is not an internal edge.")]
    NotAnInternalEdge(NodeId),
    #[error("Node {0} is not a leaf.")]
    NotALeaf(NodeId),
    #[error("Cannot use this node as outgroup: {0}.")]
    InvalidOutgroupNode(NodeId),
    #[error("Tree validation failed: {0}.")]
    InvalidTree(String),
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    // =========================================================================
    // Construction & Validation
    // =========================================================================

    /// A tree holding only its seed node.
    pub fn new() -> Self {
        let mut nodes: SlotMap<NodeId, Node> = SlotMap::with_key();
        let seed_node_id = nodes.insert_with_key(|node_id| {
            let mut node = Node::default();
            node.set_node_id(node_id);
            node
        });
        Self {
            nodes,
            seed_node_id,
            rooting: Rooting::default(),
            name: None,
            weight: None,
            comments: Vec::new(),
            split_map: None,
        }
    }

    pub fn add_child(
        &mut self,
        parent_node_id: NodeId,
        node: Node,
    ) -> Result<NodeId, TreeError> {
        if !self.node_exists(parent_node_id) {
            return Err(TreeError::ParentNodeDoesNotExist(parent_node_id));
        }
        let node_id = self.insert_node(node, Some(parent_node_id));
        self.nodes[parent_node_id].add_child_id(node_id);
        Ok(node_id)
    }

    pub fn new_child(
        &mut self,
        parent_node_id: NodeId,
    ) -> Result<NodeId, TreeError> {
        self.add_child(parent_node_id, Node::default())
    }

    pub fn add_leaf(
        &mut self,
        parent_node_id: NodeId,
        taxon_id: TaxonId,
        length: impl Into<EdgeLength>,
    ) -> Result<NodeId, TreeError> {
        let mut node = Node::with_taxon(taxon_id);
        node.set_edge_length(length);
        self.add_child(parent_node_id, node)
    }

    /// Inserts a node without linking it into its parent's child list.
    pub(crate) fn insert_node(
        &mut self,
        mut node: Node,
        parent_node_id: Option<NodeId>,
    ) -> NodeId {
        node.set_parent_id(parent_node_id);
        node.set_child_ids(Vec::new());
        self.nodes.insert_with_key(|node_id| {
            node.set_node_id(node_id);
            node
        })
    }

    pub(crate) fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        self.nodes.remove(node_id)
    }

    pub(crate) fn set_seed_node_id(&mut self, node_id: NodeId) {
        self.seed_node_id = node_id;
    }

    /// Checks the structural invariants: every node except the seed has
    /// exactly one parent that lists it as a child, and every node is
    /// reachable from the seed without revisiting any node.
    pub fn validate(&self) -> Result<(), TreeError> {
        if self.nodes[self.seed_node_id].parent_id().is_some() {
            return Err(TreeError::InvalidTree(
                "the seed node has a parent".to_string(),
            ));
        }

        let mut seen: FxHashSet<NodeId> = FxHashSet::default();
        for node_id in self.preorder() {
            if !seen.insert(node_id) {
                return Err(TreeError::InvalidTree(format!(
                    "node {node_id} is its own ancestor"
                )));
            }
            for &child_id in self.child_ids(node_id) {
                if self.nodes[child_id].parent_id() != Some(node_id) {
                    return Err(TreeError::InvalidTree(format!(
                        "node {child_id} is listed as a child of {node_id} but points elsewhere"
                    )));
                }
            }
        }

        if seen.len() != self.nodes.len() {
            return Err(TreeError::InvalidTree(format!(
                "{} of {} nodes are unreachable from the seed node",
                self.nodes.len() - seen.len(),
                self.nodes.len()
            )));
        }

        Ok(())
    }

    // =========================================================================
    // Tree Properties
    // =========================================================================

    pub fn rooting(&self) -> Rooting {
        self.rooting
    }

    pub fn set_rooting(&mut self, rooting: Rooting) {
        if self.rooting.is_rooted() != rooting.is_rooted() {
            self.rooting = rooting;
            self.rekey_split_map();
        } else {
            self.rooting = rooting;
        }
    }

    pub fn is_rooted(&self) -> bool {
        self.rooting.is_rooted()
    }

    pub fn name(&self) -> Option<Arc<str>> {
        self.name.clone()
    }

    pub fn set_name<'a>(&mut self, name: Option<impl Into<&'a str>>) {
        self.name = name.map(|name| name.into().into());
    }

    /// Tree weight, as given by a `[&W ...]` comment.
    pub fn weight(&self) -> Option<TreeFloat> {
        self.weight
    }

    pub fn set_weight(&mut self, weight: Option<TreeFloat>) {
        self.weight = weight;
    }

    /// Comments that preceded the tree description.
    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    pub fn add_comments(&mut self, comments: impl IntoIterator<Item = String>) {
        self.comments.extend(comments);
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.values().filter(|node| node.is_leaf()).count()
    }

    pub fn internal_node_count(&self) -> usize {
        self.node_count() - self.leaf_count()
    }

    /// Number of edges, not counting the root edge.
    pub fn edge_count(&self) -> usize {
        self.node_count() - 1
    }

    pub fn has_edge_lengths(&self) -> bool {
        self.nodes.iter().any(|(node_id, node)| {
            node_id != self.seed_node_id && node.edge_length().value().is_some()
        })
    }

    pub fn has_internal_node_labels(&self) -> bool {
        self.nodes.values().any(|n| !n.is_leaf() && n.label().is_some())
    }

    /// Sum of all numeric edge lengths below the seed node.
    pub fn length(&self) -> TreeFloat {
        self.nodes
            .iter()
            .filter(|(node_id, _)| *node_id != self.seed_node_id)
            .filter_map(|(_, node)| node.edge_length().value())
            .sum()
    }

    /// Path length between two nodes; unspecified lengths count as zero.
    pub fn distance(&self, left_node_id: NodeId, right_node_id: NodeId) -> TreeFloat {
        if left_node_id == right_node_id {
            return 0.0;
        }
        let mrca = self.mrca(left_node_id, right_node_id);
        self.distance_to_ancestor(left_node_id, mrca)
            + self.distance_to_ancestor(right_node_id, mrca)
    }

    fn distance_to_ancestor(&self, node_id: NodeId, ancestor_id: NodeId) -> TreeFloat {
        let mut total_distance: TreeFloat = 0.0;
        let mut current_node_id = node_id;
        while current_node_id != ancestor_id {
            total_distance += self.edge_length(current_node_id).value().unwrap_or(0.0);
            match self.parent_id(current_node_id) {
                Some(parent_node_id) => current_node_id = parent_node_id,
                None => break,
            }
        }
        total_distance
    }

    /// Most recent common ancestor of two nodes.
    pub fn mrca(&self, left_node_id: NodeId, right_node_id: NodeId) -> NodeId {
        let left_ancestors: FxHashSet<NodeId> =
            std::iter::once(left_node_id).chain(self.ancestors(left_node_id)).collect();
        std::iter::once(right_node_id)
            .chain(self.ancestors(right_node_id))
            .find(|node_id| left_ancestors.contains(node_id))
            .unwrap_or(self.seed_node_id)
    }

    /// Greatest distance from the seed node to any leaf.
    pub fn height(&self) -> TreeFloat {
        let seed_node_id = self.seed_node_id;
        let leaf_ids: Vec<NodeId> = self.leaves().collect();

        // Use parallel processing for larger trees
        if leaf_ids.len() > 100 {
            leaf_ids
                .par_iter()
                .map(|&leaf_id| self.distance_to_ancestor(leaf_id, seed_node_id))
                .reduce(|| 0.0, TreeFloat::max)
        } else {
            leaf_ids
                .iter()
                .map(|&leaf_id| self.distance_to_ancestor(leaf_id, seed_node_id))
                .fold(0.0, TreeFloat::max)
        }
    }

    /// Taxa at the leaves, in preorder.
    pub fn leaf_taxa(&self) -> Vec<TaxonId> {
        self.leaves().filter_map(|leaf_id| self.taxon(leaf_id)).collect()
    }

    // =========================================================================
    // Node Access
    // =========================================================================

    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(node_id)
    }

    pub fn node_exists(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(node_id)
    }

    pub fn seed_node_id(&self) -> NodeId {
        self.seed_node_id
    }

    pub fn seed_node(&self) -> &Node {
        &self.nodes[self.seed_node_id]
    }

    pub fn node_ids_all(&self) -> Vec<NodeId> {
        self.nodes.keys().collect()
    }

    pub fn parent_id(&self, node_id: NodeId) -> Option<NodeId> {
        self.nodes[node_id].parent_id()
    }

    pub fn child_ids(&self, node_id: NodeId) -> &[NodeId] {
        self.nodes[node_id].child_ids()
    }

    pub fn children(&self, node_id: NodeId) -> Vec<&Node> {
        self.child_ids(node_id)
            .iter()
            .map(|&child_id| &self.nodes[child_id])
            .collect()
    }

    pub fn child_count(&self, node_id: NodeId) -> usize {
        self.nodes[node_id].child_count()
    }

    pub fn is_leaf(&self, node_id: NodeId) -> bool {
        self.nodes[node_id].is_leaf()
    }

    pub fn taxon(&self, node_id: NodeId) -> Option<TaxonId> {
        self.nodes[node_id].taxon()
    }

    pub fn label(&self, node_id: NodeId) -> Option<Arc<str>> {
        self.nodes[node_id].label()
    }

    pub fn node_id_by_taxon(&self, taxon_id: TaxonId) -> Option<NodeId> {
        self.nodes
            .iter()
            .find_map(|(node_id, node)| (node.taxon() == Some(taxon_id)).then_some(node_id))
    }

    /// Finds a node by its own label, or by its taxon's label.
    pub fn node_id_by_label(&self, label: &str, ns: &TaxonNamespace) -> Option<NodeId> {
        self.preorder().find(|&node_id| {
            let node = &self.nodes[node_id];
            node.label().is_some_and(|l| &*l == label)
                || node.taxon().and_then(|t| ns.label(t)) == Some(label)
        })
    }

    // =========================================================================
    // Edge Access
    // =========================================================================

    /// The edge subtending `node_id`.
    pub fn edge(&self, node_id: NodeId) -> &Edge {
        self.nodes[node_id].edge()
    }

    pub fn edge_length(&self, node_id: NodeId) -> &EdgeLength {
        self.nodes[node_id].edge_length()
    }

    /// Tail of the edge subtending `node_id`; `None` for the root edge.
    pub fn edge_tail(&self, node_id: NodeId) -> Option<NodeId> {
        self.parent_id(node_id)
    }

    pub fn is_root_edge(&self, node_id: NodeId) -> bool {
        node_id == self.seed_node_id
    }

    pub fn bitmask(&self, node_id: NodeId) -> Option<&Bitmask> {
        self.nodes[node_id].edge().bitmask()
    }

    // =========================================================================
    // Split Map
    // =========================================================================

    /// Canonical split mask → head node of the edge, once splits have been
    /// encoded.
    pub fn split_map(&self) -> Option<&SplitMap> {
        self.split_map.as_ref()
    }

    pub(crate) fn set_split_map(&mut self, split_map: SplitMap) -> &SplitMap {
        self.split_map.insert(split_map)
    }

    /// Head node of the edge inducing `split` (a canonical mask).
    pub fn edge_for_split(&self, split: &Bitmask) -> Option<NodeId> {
        self.split_map.as_ref()?.get(split).copied()
    }

    /// Drops the split map and every stored clade mask.
    pub fn clear_splits(&mut self) {
        if self.split_map.take().is_some() {
            for node in self.nodes.values_mut() {
                node.edge_mut().set_bitmask(None);
            }
        }
    }

    /// Rebuilds split-map keys from the stored clade masks, for instance
    /// after the rooting changed.
    pub(crate) fn rekey_split_map(&mut self) {
        if self.split_map.is_some() {
            self.split_map = Some(split_map_from_masks(self));
        }
    }

    fn retarget_split(&mut self, from: NodeId, to: NodeId) {
        if let Some(split_map) = &mut self.split_map {
            split_map.values_mut().filter(|v| **v == from).for_each(|v| *v = to);
        }
    }

    // =========================================================================
    // Tree Manipulation
    // =========================================================================

    /// Removes the internal edge above `node_id`, promoting the node's
    /// children into its parent at the node's position.
    ///
    /// Clade masks of the remaining edges are unchanged; an existing split map
    /// is rekeyed from them.
    pub fn collapse_edge(&mut self, node_id: NodeId) -> Result<(), TreeError> {
        if !self.node_exists(node_id) {
            return Err(TreeError::NodeDoesNotExist(node_id));
        }
        let Some(parent_node_id) = self.parent_id(node_id) else {
            return Err(TreeError::NotAnInternalEdge(node_id));
        };
        if self.is_leaf(node_id) {
            return Err(TreeError::NotAnInternalEdge(node_id));
        }

        let child_ids = self.child_ids(node_id).to_vec();
        let Some(position) = self.nodes[parent_node_id].remove_child_id(node_id) else {
            return Err(TreeError::InvalidTree(format!(
                "node {node_id} is not listed as a child of {parent_node_id}"
            )));
        };
        for &child_id in &child_ids {
            self.nodes[child_id].set_parent_id(Some(parent_node_id));
        }
        _ = self.nodes[parent_node_id]
            .child_ids_mut()
            .splice(position..position, child_ids);
        _ = self.remove_node(node_id);
        self.rekey_split_map();
        log::trace!("Collapsed edge above {node_id}");
        Ok(())
    }

    /// Removes a node with exactly one child, joining its edge with the
    /// child's edge.
    pub(crate) fn suppress_node(&mut self, node_id: NodeId) {
        let child_id = self.child_ids(node_id)[0];
        match self.parent_id(node_id) {
            Some(parent_node_id) => {
                let merged = self.edge_length(child_id).merged(self.edge_length(node_id));
                self.nodes[child_id].set_edge_length(merged);
                self.nodes[child_id].set_parent_id(Some(parent_node_id));
                let parent_node = &mut self.nodes[parent_node_id];
                if let Some(slot) = parent_node.child_ids_mut().iter_mut().find(|id| **id == node_id) {
                    *slot = child_id;
                }
            }
            None => {
                let root_edge_length = self.edge_length(node_id).clone();
                self.nodes[child_id].set_edge_length(root_edge_length);
                self.nodes[child_id].set_parent_id(None);
                self.seed_node_id = child_id;
            }
        }
        if let Some(label) = self.label(node_id)
            && self.nodes[child_id].label().is_none()
            && !self.nodes[child_id].is_leaf()
        {
            self.nodes[child_id].set_label(Some(&*label));
        }
        _ = self.remove_node(node_id);
        self.retarget_split(node_id, child_id);
    }

    /// Removes every degree-two node (a node with exactly one child),
    /// summing the lengths of the joined edges. A seed node with one child
    /// is replaced by that child.
    ///
    /// Returns the number of nodes removed.
    pub fn suppress_unifurcations(&mut self) -> usize {
        let to_suppress: Vec<NodeId> = self
            .postorder()
            .filter(|&node_id| self.child_count(node_id) == 1)
            .collect();
        for &node_id in &to_suppress {
            self.suppress_node(node_id);
        }
        to_suppress.len()
    }

    /// Removes a leaf. Internal nodes left without children are removed as
    /// well; a parent left with a single child is suppressed when
    /// `suppress_unifurcations` is set.
    ///
    /// Any split map is dropped, since every ancestor's clade changes.
    pub fn prune_leaf(
        &mut self,
        node_id: NodeId,
        suppress_unifurcations: bool,
    ) -> Result<(), TreeError> {
        if !self.node_exists(node_id) {
            return Err(TreeError::NodeDoesNotExist(node_id));
        }
        if !self.is_leaf(node_id) {
            return Err(TreeError::NotALeaf(node_id));
        }
        if node_id == self.seed_node_id {
            return Err(TreeError::InvalidTree("cannot prune the seed node".to_string()));
        }

        self.clear_splits();

        let mut current_node_id = node_id;
        while let Some(parent_node_id) = self.parent_id(current_node_id) {
            _ = self.nodes[parent_node_id].remove_child_id(current_node_id);
            _ = self.remove_node(current_node_id);
            if !self.is_leaf(parent_node_id) || parent_node_id == self.seed_node_id {
                current_node_id = parent_node_id;
                break;
            }
            current_node_id = parent_node_id;
        }

        if suppress_unifurcations && self.child_count(current_node_id) == 1 {
            self.suppress_node(current_node_id);
        }
        Ok(())
    }

    /// Prunes every leaf carrying one of `taxa`. Returns the number of leaves
    /// removed.
    pub fn prune_taxa(
        &mut self,
        taxa: &[TaxonId],
        suppress_unifurcations: bool,
    ) -> Result<usize, TreeError> {
        let taxa: FxHashSet<TaxonId> = taxa.iter().copied().collect();
        let leaf_ids: Vec<NodeId> = self
            .leaves()
            .filter(|&leaf_id| self.taxon(leaf_id).is_some_and(|t| taxa.contains(&t)))
            .collect();
        for &leaf_id in &leaf_ids {
            self.prune_leaf(leaf_id, suppress_unifurcations)?;
        }
        Ok(leaf_ids.len())
    }

    /// Orders every node's children by the size of their clades, smallest
    /// first (largest first with `reverse`).
    pub fn ladderize(&mut self, reverse: bool) {
        let mut leaf_counts: FxHashMap<NodeId, usize> = FxHashMap::default();
        for node_id in self.postorder() {
            let count = if self.is_leaf(node_id) {
                1
            } else {
                self.child_ids(node_id).iter().map(|c| leaf_counts[c]).sum()
            };
            _ = leaf_counts.insert(node_id, count);
        }

        let node_ids: Vec<NodeId> = self.nodes.keys().collect();
        for node_id in node_ids {
            let mut sorted_ids: Vec<NodeId> = self.nodes[node_id].child_ids().to_vec();
            if reverse {
                sorted_ids.par_sort_by_key(|c| Reverse(leaf_counts[c]));
            } else {
                sorted_ids.par_sort_by_key(|c| leaf_counts[c]);
            }
            self.nodes[node_id].set_child_ids(sorted_ids);
        }
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut SlotMap<NodeId, Node> {
        &mut self.nodes
    }

    // =========================================================================
    // Display
    // =========================================================================

    fn print_tree(&self) -> String {
        let mut result: String = String::new();
        result.push_str(&format!(
            "Internal Nodes: {}\nLeaves: {}\nAll Nodes: {}\n{}\nHeight: {:7.5}\nEdge lengths: {}\n\n",
            self.internal_node_count(),
            self.leaf_count(),
            self.node_count(),
            self.rooting,
            self.height(),
            self.has_edge_lengths()
        ));
        result.push_str(&self.print_node(self.seed_node_id, 0));
        result
    }

    fn print_node(&self, node_id: NodeId, level: usize) -> String {
        let node = &self.nodes[node_id];
        let mut result = format!(
            "{}- {} | {} | {} | {}\n",
            " ".repeat(level * 4),
            node_id,
            node.label().map(|l| l.to_string()).unwrap_or_else(|| "None".to_string()),
            node.taxon().map(|t| t.to_string()).unwrap_or_else(|| "None".to_string()),
            node.edge_length(),
        );
        for &child_node_id in node.child_ids() {
            result.push_str(&self.print_node(child_node_id, level + 1));
        }
        result
    }
}

impl Display for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.print_tree())
    }
}
