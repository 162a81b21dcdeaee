// -------------------------------------
// #![allow(dead_code)]
// #![allow(unused_mut)]
// #![allow(unused_imports)]
// #![allow(unused_variables)]
// #![allow(unused_assignments)]
// #![allow(clippy::single_match)]
// #![allow(clippy::collapsible_if)]
// #![allow(clippy::type_complexity)]
// #![allow(clippy::too_many_arguments)]
// -------------------------------------

mod parsers;
mod phylo;
mod splits;

pub use parsers::newick::NewickReader;
pub use parsers::newick::NewickWriterConfig;
pub use parsers::newick::TreeParser;
pub use parsers::newick::TreeParserConfig;
pub use parsers::newick::parse_newick;
pub use parsers::newick::write_newick;
pub use parsers::newick::write_newick_trees;
pub use parsers::nexus::NexusFile;
pub use parsers::nexus::parse_nexus;
pub use parsers::nexus::parse_nexus_with;
pub use parsers::parse_trees;
pub use parsers::tokenizer::Token;
pub use parsers::tokenizer::Tokenizer;
pub use parsers::tokenizer::TokenizerConfig;
pub use parsers::{ParseError, ParseResult, Position};
pub use phylo::Edge;
pub use phylo::EdgeLength;
pub use phylo::Node;
pub use phylo::NodeId;
pub use phylo::Rooting;
pub use phylo::Taxon;
pub use phylo::TaxonId;
pub use phylo::TaxonNamespace;
pub use phylo::Tree;
pub use phylo::TreeError;
pub use phylo::TreeFloat;
pub use phylo::{Ancestors, Leaves, LevelOrder, Postorder, Preorder};
pub use splits::Bitmask;
pub use splits::ConsensusConfig;
pub use splits::ConsensusError;
pub use splits::SplitDistribution;
pub use splits::SplitError;
pub use splits::SplitMap;
pub use splits::SplitResult;
pub use splits::SplitSummary;
pub use splits::build_consensus;
pub use splits::canonical_splits;
pub use splits::compute_masks;
pub use splits::consensus_from_splits;
pub use splits::encode_splits;
pub use splits::robinson_foulds;
pub use splits::split_bitmasks;
pub use splits::tree_all_taxa_mask;
