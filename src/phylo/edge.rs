use super::TreeFloat;
use crate::splits::Bitmask;
use std::fmt::Display;

/// Length of an edge as it was written.
///
/// Non-numeric lengths are kept verbatim instead of being coerced, so callers
/// can decide whether such input is an error.
#[derive(Debug, Default, Clone, PartialEq)]
pub enum EdgeLength {
    Numeric(TreeFloat),
    Raw(String),
    #[default]
    Unspecified,
}

impl EdgeLength {
    /// Parses a length token; tokens that are not floats become
    /// [EdgeLength::Raw].
    pub fn parse(token: &str) -> Self {
        match token.parse::<TreeFloat>() {
            Ok(value) => EdgeLength::Numeric(value),
            Err(_) => EdgeLength::Raw(token.to_string()),
        }
    }

    pub fn value(&self) -> Option<TreeFloat> {
        match self {
            EdgeLength::Numeric(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_specified(&self) -> bool {
        !matches!(self, EdgeLength::Unspecified)
    }

    /// Sum of two lengths, as when two edges merge into one.
    ///
    /// An unspecified side contributes nothing; a raw side cannot be summed,
    /// so the other side wins.
    pub fn merged(&self, other: &EdgeLength) -> EdgeLength {
        match (self, other) {
            (EdgeLength::Numeric(a), EdgeLength::Numeric(b)) => {
                EdgeLength::Numeric(a + b)
            }
            (EdgeLength::Numeric(_), _) => self.clone(),
            (_, EdgeLength::Numeric(_)) => other.clone(),
            (EdgeLength::Unspecified, _) => other.clone(),
            _ => self.clone(),
        }
    }
}

impl From<TreeFloat> for EdgeLength {
    fn from(value: TreeFloat) -> Self {
        EdgeLength::Numeric(value)
    }
}

impl From<Option<TreeFloat>> for EdgeLength {
    fn from(value: Option<TreeFloat>) -> Self {
        value.map_or(EdgeLength::Unspecified, EdgeLength::Numeric)
    }
}

impl Display for EdgeLength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeLength::Numeric(value) => write!(f, "{value:?}"),
            EdgeLength::Raw(raw) => write!(f, "{raw}"),
            EdgeLength::Unspecified => Ok(()),
        }
    }
}

/// The edge subtending a node.
///
/// Every node owns exactly one edge; the node is the edge's head and the
/// node's parent is its tail. The edge above the seed node has no tail and is
/// the root edge.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Edge {
    length: EdgeLength,
    bitmask: Option<Bitmask>,
}

impl Edge {
    pub fn new(length: EdgeLength) -> Self {
        Self { length, bitmask: None }
    }

    pub fn length(&self) -> &EdgeLength {
        &self.length
    }

    pub fn set_length(&mut self, length: EdgeLength) {
        self.length = length;
    }

    /// Clade mask of the head node, once splits have been encoded.
    pub fn bitmask(&self) -> Option<&Bitmask> {
        self.bitmask.as_ref()
    }

    pub(crate) fn set_bitmask(&mut self, bitmask: Option<Bitmask>) {
        self.bitmask = bitmask;
    }

    pub(crate) fn bitmask_mut(&mut self) -> &mut Option<Bitmask> {
        &mut self.bitmask
    }
}
