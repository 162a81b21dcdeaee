//! Split encoding: every edge of a tree divides its taxa in two, and the side
//! below the edge is recorded as a [Bitmask] over the taxa's bit indices.
//!
//! Masks computed against the same [TaxonNamespace](crate::TaxonNamespace)
//! are comparable across trees, which is what [SplitDistribution] and
//! [build_consensus] rely on.

mod bitmask;
mod consensus;
mod distribution;
mod encoder;

pub use bitmask::Bitmask;
pub use consensus::{ConsensusConfig, ConsensusError, build_consensus, consensus_from_splits};
pub use distribution::{SplitDistribution, SplitSummary};
pub use encoder::{
    SplitError, SplitMap, SplitResult, canonical_splits, compute_masks, encode_splits,
    robinson_foulds, split_bitmasks, tree_all_taxa_mask,
};

pub(crate) use encoder::split_map_from_masks;
