use super::edge::{Edge, EdgeLength};
use super::taxon::TaxonId;
use slotmap::new_key_type;
use std::{fmt::Display, sync::Arc};

new_key_type! { pub struct NodeId; }

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Node {
    node_id: Option<NodeId>,
    parent_id: Option<NodeId>,
    child_ids: Vec<NodeId>,
    taxon: Option<TaxonId>,
    label: Option<Arc<str>>,
    edge: Edge,
    comments: Vec<String>,
}

impl Node {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_taxon(taxon_id: TaxonId) -> Self {
        Self { taxon: Some(taxon_id), ..Self::default() }
    }

    pub fn is_leaf(&self) -> bool {
        self.child_ids.is_empty()
    }

    pub fn child_ids(&self) -> &[NodeId] {
        &self.child_ids
    }

    pub(crate) fn child_ids_mut(&mut self) -> &mut Vec<NodeId> {
        &mut self.child_ids
    }

    pub(crate) fn set_child_ids(&mut self, child_ids: Vec<NodeId>) {
        self.child_ids = child_ids
    }

    pub fn child_count(&self) -> usize {
        self.child_ids.len()
    }

    pub(crate) fn add_child_id(&mut self, node_id: NodeId) {
        self.child_ids.push(node_id)
    }

    /// Removes `node_id` from the children, keeping the order of the rest.
    /// Returns the position it was found at.
    pub(crate) fn remove_child_id(&mut self, node_id: NodeId) -> Option<usize> {
        let idx = self.child_ids.iter().position(|&id| id == node_id)?;
        _ = self.child_ids.remove(idx);
        Some(idx)
    }

    pub fn node_id(&self) -> Option<NodeId> {
        self.node_id
    }

    pub(crate) fn set_node_id(&mut self, node_id: NodeId) {
        self.node_id = Some(node_id);
    }

    pub fn parent_id(&self) -> Option<NodeId> {
        self.parent_id
    }

    pub(crate) fn set_parent_id(&mut self, node_id: Option<NodeId>) {
        self.parent_id = node_id;
    }

    pub fn taxon(&self) -> Option<TaxonId> {
        self.taxon
    }

    pub fn set_taxon(&mut self, taxon_id: Option<TaxonId>) {
        self.taxon = taxon_id;
    }

    pub fn label(&self) -> Option<Arc<str>> {
        self.label.clone()
    }

    pub fn set_label<'a>(&mut self, label: Option<impl Into<&'a str>>) {
        self.label = label.map(|label| label.into().into());
    }

    pub fn edge(&self) -> &Edge {
        &self.edge
    }

    pub fn edge_mut(&mut self) -> &mut Edge {
        &mut self.edge
    }

    pub fn edge_length(&self) -> &EdgeLength {
        self.edge.length()
    }

    pub fn set_edge_length(&mut self, length: impl Into<EdgeLength>) {
        self.edge.set_length(length.into());
    }

    /// Raw text of the bracketed comments that followed this node.
    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    pub fn add_comments(&mut self, comments: impl IntoIterator<Item = String>) {
        self.comments.extend(comments);
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let disp = format!("{self:?}");
        write!(f, "{}", &disp[7..disp.len() - 1])
    }
}
