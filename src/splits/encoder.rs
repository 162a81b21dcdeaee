use super::Bitmask;
use crate::phylo::{NodeId, TaxonId, TaxonNamespace, Tree};
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

/// Canonical split mask → head node of the edge inducing the split.
pub type SplitMap = FxHashMap<Bitmask, NodeId>;

#[derive(Debug, Error, PartialEq)]
pub enum SplitError {
    #[error("Taxon {0} is not part of the taxon namespace.")]
    UnknownTaxon(TaxonId),
    #[error("Taxon '{label}' appears at more than one leaf.")]
    DuplicateTaxon { label: String },
    #[error("Leaf {0} has no taxon.")]
    LeafWithoutTaxon(NodeId),
}

pub type SplitResult<T> = Result<T, SplitError>;

/// Computes the clade mask of every node without touching the tree.
///
/// A leaf's mask is the single bit of its taxon; an internal node's mask is
/// the union of its children's masks. Taxa on internal nodes do not
/// contribute.
pub fn compute_masks(
    tree: &Tree,
    ns: &TaxonNamespace,
) -> SplitResult<FxHashMap<NodeId, Bitmask>> {
    let mut masks: FxHashMap<NodeId, Bitmask> = FxHashMap::default();
    let mut seen: FxHashSet<usize> = FxHashSet::default();

    for node_id in tree.postorder() {
        let mask = if tree.is_leaf(node_id) {
            let taxon_id = tree
                .taxon(node_id)
                .ok_or(SplitError::LeafWithoutTaxon(node_id))?;
            let index = ns
                .bit_index(taxon_id)
                .ok_or(SplitError::UnknownTaxon(taxon_id))?;
            if !seen.insert(index) {
                return Err(SplitError::DuplicateTaxon {
                    label: ns.label(taxon_id).unwrap_or_default().to_string(),
                });
            }
            Bitmask::singleton(index)
        } else {
            let mut mask = Bitmask::new();
            for child_id in tree.child_ids(node_id) {
                mask |= &masks[child_id];
            }
            mask
        };
        _ = masks.insert(node_id, mask);
    }

    Ok(masks)
}

/// Computes and stores the clade mask of every edge, then builds the tree's
/// split map.
///
/// Nothing on the tree changes when an error is returned.
pub fn encode_splits<'a>(
    tree: &'a mut Tree,
    ns: &TaxonNamespace,
) -> SplitResult<&'a SplitMap> {
    let masks = compute_masks(tree, ns)?;
    for (node_id, mask) in masks {
        if let Some(node) = tree.node_mut(node_id) {
            node.edge_mut().set_bitmask(Some(mask));
        }
    }
    let split_map = split_map_from_masks(tree);
    log::debug!(
        "Encoded {} splits over {} nodes",
        split_map.len(),
        tree.node_count()
    );
    Ok(tree.set_split_map(split_map))
}

/// Keys the masks stored on the tree's edges by their canonical form.
///
/// On an unrooted tree the two edges below a bifurcating seed node induce
/// the same bipartition; the first one in preorder keeps the key.
pub(crate) fn split_map_from_masks(tree: &Tree) -> SplitMap {
    let all = tree.bitmask(tree.seed_node_id()).cloned().unwrap_or_default();
    let is_rooted = tree.is_rooted();
    let mut split_map = SplitMap::default();
    for node_id in tree.preorder() {
        if let Some(mask) = tree.bitmask(node_id) {
            _ = split_map
                .entry(mask.canonical(&all, is_rooted))
                .or_insert(node_id);
        }
    }
    split_map
}

/// Union of the leaf masks: the taxa actually present in the tree, which may
/// be a subset of a larger shared namespace.
pub fn tree_all_taxa_mask(tree: &Tree, ns: &TaxonNamespace) -> SplitResult<Bitmask> {
    if let Some(mask) = tree.bitmask(tree.seed_node_id()) {
        return Ok(mask.clone());
    }
    let mut all = Bitmask::new();
    for leaf_id in tree.leaves() {
        let taxon_id = tree.taxon(leaf_id).ok_or(SplitError::LeafWithoutTaxon(leaf_id))?;
        let index = ns.bit_index(taxon_id).ok_or(SplitError::UnknownTaxon(taxon_id))?;
        all.set(index);
    }
    Ok(all)
}

/// Canonical splits of every edge (root edge included) paired with the head
/// node of the edge, in preorder. Stored masks are reused when present.
///
/// Duplicate canonical keys, which occur only around a bifurcating seed node
/// of an unrooted tree, are reported once per edge.
pub fn canonical_splits(
    tree: &Tree,
    ns: &TaxonNamespace,
    is_rooted: bool,
) -> SplitResult<Vec<(Bitmask, NodeId)>> {
    let masks: FxHashMap<NodeId, Bitmask> = if tree.split_map().is_some() {
        tree.preorder()
            .filter_map(|node_id| tree.bitmask(node_id).map(|mask| (node_id, mask.clone())))
            .collect()
    } else {
        compute_masks(tree, ns)?
    };

    let all = masks.get(&tree.seed_node_id()).cloned().unwrap_or_default();
    Ok(tree
        .preorder()
        .filter_map(|node_id| {
            masks
                .get(&node_id)
                .map(|mask| (mask.canonical(&all, is_rooted), node_id))
        })
        .collect())
}

/// Sorted, de-duplicated canonical split masks of a tree, following the
/// tree's own rooting.
pub fn split_bitmasks(tree: &Tree, ns: &TaxonNamespace) -> SplitResult<Vec<Bitmask>> {
    let mut splits: Vec<Bitmask> = canonical_splits(tree, ns, tree.is_rooted())?
        .into_iter()
        .map(|(mask, _)| mask)
        .collect();
    splits.sort();
    splits.dedup();
    Ok(splits)
}

/// Robinson-Foulds distance: the number of non-trivial splits found in
/// exactly one of the two trees.
///
/// Trees are compared as unrooted unless both are rooted.
pub fn robinson_foulds(a: &Tree, b: &Tree, ns: &TaxonNamespace) -> SplitResult<usize> {
    let is_rooted = a.is_rooted() && b.is_rooted();
    let non_trivial = |tree: &Tree| -> SplitResult<FxHashSet<Bitmask>> {
        let all = tree_all_taxa_mask(tree, ns)?;
        Ok(canonical_splits(tree, ns, is_rooted)?
            .into_iter()
            .map(|(mask, _)| mask)
            .filter(|mask| {
                if is_rooted {
                    mask.count_ones() > 1 && *mask != all
                } else {
                    !mask.is_trivial(&all)
                }
            })
            .collect())
    };
    let splits_a = non_trivial(a)?;
    let splits_b = non_trivial(b)?;
    Ok(splits_a.symmetric_difference(&splits_b).count())
}
