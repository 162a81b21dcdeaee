mod edge;
mod node;
mod rooting;
mod taxon;
mod traversal;
mod tree;

pub type TreeFloat = f64;

pub use edge::{Edge, EdgeLength};
pub use node::{Node, NodeId};
pub use taxon::{Taxon, TaxonId, TaxonNamespace};
pub use traversal::{Ancestors, Leaves, LevelOrder, Postorder, Preorder};
pub use tree::{Rooting, Tree, TreeError};
