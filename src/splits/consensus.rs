use super::Bitmask;
use super::distribution::{SplitDistribution, format_support};
use super::encoder::{SplitError, split_map_from_masks};
use crate::phylo::{Node, NodeId, Rooting, TaxonNamespace, Tree, TreeError, TreeFloat};
use rayon::prelude::*;
use std::cmp::Reverse;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConsensusError {
    #[error("No trees have been counted.")]
    EmptyDistribution,
    #[error("Minimum split frequency must be within [0, 1]; got {0}.")]
    InvalidFrequency(TreeFloat),
    #[error("Splits {0} and {1} cannot both be in one tree.")]
    IncompatibleSplits(Bitmask, Bitmask),
    #[error("No taxon has bit index {0}.")]
    MissingTaxon(usize),
    #[error(transparent)]
    Split(#[from] SplitError),
    #[error(transparent)]
    Tree(#[from] TreeError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsensusConfig {
    /// Splits found in at least this share of the trees are kept.
    pub min_frequency: TreeFloat,
    /// Give each edge the mean length observed for its split.
    pub edge_lengths: bool,
    /// Label internal nodes with the frequency of their split.
    pub support_labels: bool,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self { min_frequency: 0.5, edge_lengths: true, support_labels: false }
    }
}

impl ConsensusConfig {
    pub fn min_frequency(mut self, min_frequency: TreeFloat) -> Self {
        self.min_frequency = min_frequency;
        self
    }

    pub fn edge_lengths(mut self, edge_lengths: bool) -> Self {
        self.edge_lengths = edge_lengths;
        self
    }

    pub fn support_labels(mut self, support_labels: bool) -> Self {
        self.support_labels = support_labels;
        self
    }
}

/// Builds the majority-rule consensus of the trees counted into `dist`.
///
/// Every taxon seen in the distribution becomes a leaf. A non-trivial split
/// is kept when its frequency is at least `config.min_frequency`.
///
/// Above 0.5 the kept splits are always mutually compatible and a conflict
/// is reported as an error. At or below 0.5 splits are accepted in order of
/// decreasing frequency, ties going to the split seen first, and a split
/// that conflicts with one already accepted is left out.
pub fn build_consensus(
    dist: &SplitDistribution,
    ns: &TaxonNamespace,
    config: &ConsensusConfig,
) -> Result<Tree, ConsensusError> {
    if dist.total_trees() == 0 {
        return Err(ConsensusError::EmptyDistribution);
    }
    let min_frequency = config.min_frequency;
    if !(0e0..=1e0).contains(&min_frequency) {
        return Err(ConsensusError::InvalidFrequency(min_frequency));
    }

    let all = dist.taxa_mask().clone();
    let is_rooted = dist.is_rooted();

    let mut candidates: Vec<(Bitmask, TreeFloat)> = dist
        .splits()
        .filter_map(|split| {
            let frequency = dist.frequency(split);
            let clade = orient(split, &all, is_rooted);
            (frequency >= min_frequency && is_informative(&clade, &all, is_rooted))
                .then_some((clade, frequency))
        })
        .collect();
    // Stable: equal frequencies keep discovery order.
    candidates.par_sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut accepted: Vec<Bitmask> = Vec::with_capacity(candidates.len());
    for (clade, frequency) in candidates {
        if let Some(conflict) = accepted.iter().find(|other| !clade.is_compatible_with(other)) {
            if min_frequency > 0.5 {
                return Err(ConsensusError::IncompatibleSplits(conflict.clone(), clade));
            }
            log::debug!(
                "Rejected split {clade} (frequency {frequency:.3}); conflicts with {conflict}"
            );
            continue;
        }
        accepted.push(clade);
    }
    log::debug!(
        "Consensus of {} trees keeps {} non-trivial splits",
        dist.total_trees(),
        accepted.len()
    );

    let mut tree = tree_from_clades(accepted, &all, ns)?;

    if config.edge_lengths || config.support_labels {
        let seed_node_id = tree.seed_node_id();
        let node_ids: Vec<NodeId> = tree.preorder().collect();
        for node_id in node_ids {
            let Some(split) = tree.bitmask(node_id).map(|m| m.canonical(&all, is_rooted)) else {
                continue;
            };
            let mean_length = dist.mean_edge_length(&split);
            let support = (node_id != seed_node_id && !tree.is_leaf(node_id))
                .then(|| format_support(dist.frequency(&split)));
            let Some(node) = tree.node_mut(node_id) else {
                continue;
            };
            if config.edge_lengths
                && let Some(length) = mean_length
            {
                node.set_edge_length(length);
            }
            if config.support_labels
                && let Some(support) = support
            {
                node.set_label(Some(support.as_str()));
            }
        }
    }

    tree.set_rooting(if is_rooted { Rooting::Rooted } else { Rooting::Unrooted });
    _ = tree.set_split_map(split_map_from_masks(&tree));
    Ok(tree)
}

/// Builds a tree holding exactly the given splits, plus a leaf for every
/// taxon in `ns`. Any two incompatible splits are an error.
pub fn consensus_from_splits(
    splits: &[Bitmask],
    ns: &TaxonNamespace,
    is_rooted: bool,
) -> Result<Tree, ConsensusError> {
    let all = ns.all_taxa_mask();
    let mut clades: Vec<Bitmask> = Vec::with_capacity(splits.len());
    for split in splits {
        let clade = orient(&split.intersection(&all), &all, is_rooted);
        if !is_informative(&clade, &all, is_rooted) || clades.contains(&clade) {
            continue;
        }
        if let Some(conflict) = clades.iter().find(|other| !clade.is_compatible_with(other)) {
            return Err(ConsensusError::IncompatibleSplits(conflict.clone(), clade));
        }
        clades.push(clade);
    }

    let mut tree = tree_from_clades(clades, &all, ns)?;
    tree.set_rooting(if is_rooted { Rooting::Rooted } else { Rooting::Unrooted });
    _ = tree.set_split_map(split_map_from_masks(&tree));
    Ok(tree)
}

/// The side of an unrooted split that excludes the lowest-index taxon, so
/// that all splits read as clades of a tree rooted on that taxon.
fn orient(split: &Bitmask, all: &Bitmask, is_rooted: bool) -> Bitmask {
    match all.lowest_bit() {
        Some(anchor) if !is_rooted && split.contains(anchor) => split.complement(all),
        _ => split.clone(),
    }
}

/// Leaves and the root are always part of the tree; only the clades in
/// between need inserting.
fn is_informative(clade: &Bitmask, all: &Bitmask, is_rooted: bool) -> bool {
    let count = clade.count_ones();
    let limit = all.count_ones().saturating_sub(usize::from(!is_rooted));
    count > 1 && count < limit
}

fn tree_from_clades(
    mut clades: Vec<Bitmask>,
    all: &Bitmask,
    ns: &TaxonNamespace,
) -> Result<Tree, ConsensusError> {
    let mut tree = Tree::new();
    let seed_node_id = tree.seed_node_id();
    if let Some(seed) = tree.node_mut(seed_node_id) {
        seed.edge_mut().set_bitmask(Some(all.clone()));
    }

    for index in all.iter() {
        let taxon_id = ns.taxon_at(index).ok_or(ConsensusError::MissingTaxon(index))?;
        let mut leaf = Node::with_taxon(taxon_id);
        leaf.edge_mut().set_bitmask(Some(Bitmask::singleton(index)));
        _ = tree.add_child(seed_node_id, leaf)?;
    }

    // Supersets first, so each clade's parent is already in place.
    clades.par_sort_by_key(|clade| Reverse(clade.count_ones()));
    for clade in clades {
        _ = insert_clade(&mut tree, clade)?;
    }
    Ok(tree)
}

/// Places a new node for `clade` below the smallest clade containing it and
/// moves the children it covers underneath.
fn insert_clade(tree: &mut Tree, clade: Bitmask) -> Result<NodeId, ConsensusError> {
    let mut parent_node_id = tree.seed_node_id();
    while let Some(&child_id) = tree.child_ids(parent_node_id).iter().find(|&&child_id| {
        !tree.is_leaf(child_id) && tree.bitmask(child_id).is_some_and(|m| clade.is_subset_of(m))
    }) {
        parent_node_id = child_id;
    }

    let mut covered = Bitmask::new();
    let mut moved: Vec<NodeId> = Vec::new();
    for &child_id in tree.child_ids(parent_node_id) {
        let Some(mask) = tree.bitmask(child_id) else {
            continue;
        };
        if mask.is_subset_of(&clade) {
            covered |= mask;
            moved.push(child_id);
        } else if !mask.is_disjoint(&clade) {
            return Err(ConsensusError::IncompatibleSplits(mask.clone(), clade));
        }
    }
    if covered != clade {
        let parent_mask = tree.bitmask(parent_node_id).cloned().unwrap_or_default();
        return Err(ConsensusError::IncompatibleSplits(parent_mask, clade));
    }

    let position = tree
        .child_ids(parent_node_id)
        .iter()
        .position(|child_id| moved.contains(child_id))
        .unwrap_or(0);

    let mut node = Node::new();
    node.edge_mut().set_bitmask(Some(clade));
    let node_id = tree.insert_node(node, Some(parent_node_id));

    let nodes = tree.nodes_mut();
    nodes[parent_node_id].child_ids_mut().retain(|child_id| !moved.contains(child_id));
    nodes[parent_node_id].child_ids_mut().insert(position, node_id);
    for &child_id in &moved {
        nodes[child_id].set_parent_id(Some(node_id));
        nodes[node_id].add_child_id(child_id);
    }
    log::trace!("Inserted clade {} with {} children", node_id, moved.len());
    Ok(node_id)
}
