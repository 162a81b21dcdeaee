use super::Bitmask;
use super::encoder::{SplitResult, canonical_splits};
use crate::phylo::{EdgeLength, Rooting, TaxonNamespace, Tree, TreeFloat};
use rayon::prelude::*;
use rustc_hash::FxHashMap;

/// What a distribution knows about one split.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitSummary {
    count: usize,
    weight: TreeFloat,
    edge_lengths: Vec<TreeFloat>,
}

impl SplitSummary {
    /// Number of trees the split was observed in.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Sum of the weights of the trees the split was observed in.
    pub fn weight(&self) -> TreeFloat {
        self.weight
    }

    /// Numeric lengths of the edges inducing the split, one per tree that
    /// had one.
    pub fn edge_lengths(&self) -> &[TreeFloat] {
        &self.edge_lengths
    }

    pub fn mean_edge_length(&self) -> Option<TreeFloat> {
        if self.edge_lengths.is_empty() {
            None
        } else {
            Some(self.edge_lengths.iter().sum::<TreeFloat>() / self.edge_lengths.len() as TreeFloat)
        }
    }
}

/// Splits of a single tree, ready to be merged into a distribution.
struct TreeSplits {
    all: Bitmask,
    weight: TreeFloat,
    splits: Vec<(Bitmask, Option<TreeFloat>)>,
}

/// Canonical split → observation count and edge lengths, accumulated over
/// many trees that share one [TaxonNamespace].
///
/// Splits are remembered in the order they were first seen, which is what
/// consensus construction falls back on to break frequency ties.
#[derive(Debug, Clone, Default)]
pub struct SplitDistribution {
    is_rooted: bool,
    use_tree_weights: bool,
    summaries: FxHashMap<Bitmask, SplitSummary>,
    order: Vec<Bitmask>,
    total_trees: usize,
    total_weight: TreeFloat,
    taxa_mask: Bitmask,
}

impl SplitDistribution {
    pub fn new(is_rooted: bool) -> Self {
        Self { is_rooted, ..Self::default() }
    }

    pub fn is_rooted(&self) -> bool {
        self.is_rooted
    }

    /// Weigh each tree by its `[&W ...]` weight when computing frequencies.
    /// Trees without a weight count as 1.
    pub fn use_tree_weights(mut self, use_tree_weights: bool) -> Self {
        self.use_tree_weights = use_tree_weights;
        self
    }

    // =========================================================================
    // Counting
    // =========================================================================

    /// Counts every split of `tree` once. A tree's stored split masks are
    /// reused when it has them.
    pub fn count_splits(&mut self, tree: &Tree, ns: &TaxonNamespace) -> SplitResult<()> {
        let tree_splits = self.extract(tree, ns)?;
        self.merge(tree_splits);
        Ok(())
    }

    /// Counts the splits of many trees. Extraction runs in parallel; results
    /// are merged in input order, so the outcome is the same as calling
    /// [SplitDistribution::count_splits] on each tree in turn.
    ///
    /// Nothing is counted when any tree fails.
    pub fn count_splits_in(&mut self, trees: &[Tree], ns: &TaxonNamespace) -> SplitResult<()> {
        let this = &*self;
        let extracted: Vec<TreeSplits> = trees
            .par_iter()
            .map(|tree| this.extract(tree, ns))
            .collect::<SplitResult<Vec<_>>>()?;
        for tree_splits in extracted {
            self.merge(tree_splits);
        }
        log::debug!(
            "Counted splits of {} trees; {} distinct splits so far",
            trees.len(),
            self.order.len()
        );
        Ok(())
    }

    fn extract(&self, tree: &Tree, ns: &TaxonNamespace) -> SplitResult<TreeSplits> {
        if tree.rooting() != Rooting::Unknown && tree.is_rooted() != self.is_rooted {
            log::warn!(
                "Counting a {} tree into a distribution of {} trees",
                tree.rooting(),
                if self.is_rooted { Rooting::Rooted } else { Rooting::Unrooted }
            );
        }

        let mut splits: Vec<(Bitmask, EdgeLength)> = Vec::new();
        let mut positions: FxHashMap<Bitmask, usize> = FxHashMap::default();
        for (mask, node_id) in canonical_splits(tree, ns, self.is_rooted)? {
            let length = tree.edge_length(node_id);
            if let EdgeLength::Raw(raw) = length {
                log::warn!("Ignoring non-numeric edge length '{raw}' above {node_id}");
            }
            // Both edges below a bifurcating unrooted seed are one split.
            match positions.get(&mask) {
                Some(&i) => splits[i].1 = splits[i].1.merged(length),
                None => {
                    _ = positions.insert(mask.clone(), splits.len());
                    splits.push((mask, length.clone()));
                }
            }
        }

        Ok(TreeSplits {
            all: splits.first().map(|(mask, _)| mask.clone()).unwrap_or_default(),
            weight: tree.weight().unwrap_or(1e0),
            splits: splits
                .into_iter()
                .map(|(mask, length)| (mask, length.value()))
                .collect(),
        })
    }

    fn merge(&mut self, tree_splits: TreeSplits) {
        let TreeSplits { all, weight, splits } = tree_splits;
        for (mask, length) in splits {
            if !self.summaries.contains_key(&mask) {
                self.order.push(mask.clone());
            }
            let summary = self.summaries.entry(mask).or_default();
            summary.count += 1;
            summary.weight += weight;
            if let Some(length) = length {
                summary.edge_lengths.push(length);
            }
        }
        self.taxa_mask |= &all;
        self.total_trees += 1;
        self.total_weight += weight;
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn total_trees(&self) -> usize {
        self.total_trees
    }

    pub fn total_weight(&self) -> TreeFloat {
        self.total_weight
    }

    /// Union of the taxa seen in any counted tree.
    pub fn taxa_mask(&self) -> &Bitmask {
        &self.taxa_mask
    }

    /// Distinct splits, in the order they were first seen.
    pub fn splits(&self) -> impl Iterator<Item = &Bitmask> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn summary(&self, split: &Bitmask) -> Option<&SplitSummary> {
        self.summaries.get(split)
    }

    pub fn split_count(&self, split: &Bitmask) -> usize {
        self.summary(split).map_or(0, SplitSummary::count)
    }

    /// Share of trees (or of total tree weight) containing `split`.
    pub fn frequency(&self, split: &Bitmask) -> TreeFloat {
        let Some(summary) = self.summary(split) else {
            return 0e0;
        };
        if self.use_tree_weights {
            if self.total_weight > 0e0 { summary.weight / self.total_weight } else { 0e0 }
        } else if self.total_trees > 0 {
            summary.count as TreeFloat / self.total_trees as TreeFloat
        } else {
            0e0
        }
    }

    pub fn mean_edge_length(&self, split: &Bitmask) -> Option<TreeFloat> {
        self.summary(split).and_then(SplitSummary::mean_edge_length)
    }

    /// Labels every internal node of `tree` (the seed node excepted) with the
    /// frequency of its split in this distribution. Nodes whose split was
    /// never seen keep their label.
    ///
    /// Returns the number of labelled nodes.
    pub fn annotate_support(&self, tree: &mut Tree, ns: &TaxonNamespace) -> SplitResult<usize> {
        let seed_node_id = tree.seed_node_id();
        let mut annotated = 0;
        for (mask, node_id) in canonical_splits(tree, ns, self.is_rooted)? {
            if node_id == seed_node_id || tree.is_leaf(node_id) || self.summary(&mask).is_none() {
                continue;
            }
            let support = format_support(self.frequency(&mask));
            if let Some(node) = tree.node_mut(node_id) {
                node.set_label(Some(support.as_str()));
                annotated += 1;
            }
        }
        Ok(annotated)
    }
}

pub(crate) fn format_support(frequency: TreeFloat) -> String {
    format!("{frequency:.2}")
}
