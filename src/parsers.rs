pub(crate) mod newick;
pub(crate) mod nexus;
pub(crate) mod tokenizer;

use crate::phylo::{TaxonNamespace, Tree, TreeError};
use crate::splits::SplitError;
use newick::parse_newick;
use nexus::parse_nexus;
use std::fmt::Display;
use thiserror::Error;

/// 1-based line and column of a character in the input.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("Unterminated quoted label starting at {0}.")]
    UnterminatedQuote(Position),
    #[error("Unterminated comment starting at {0}.")]
    UnterminatedComment(Position),
    #[error("Unbalanced parentheses at {0}.")]
    UnbalancedParentheses(Position),
    #[error("Missing taxon specifier at {0}; found '(,', ',,' or ',)'.")]
    MissingTaxonSpecifier(Position),
    #[error("Unexpected token '{token}' at {position}.")]
    UnexpectedToken { token: String, position: Position },
    #[error("Unexpected end of input at {0}.")]
    UnexpectedEof(Position),
    #[error("Malformed TRANSLATE statement at {position}: {message}.")]
    MalformedTranslate { message: String, position: Position },
    #[error("Invalid NEXUS file; missing header: \"#NEXUS\".")]
    MissingHeader,
    #[error("Taxon '{label}' at {position} is not in the taxon namespace.")]
    UnknownTaxon { label: String, position: Position },
    #[error("Taxa count mismatch: expected {expected} taxa but found {actual}.")]
    TaxaCountMismatch { expected: usize, actual: usize },
    #[error("Splits can only be encoded against a locked taxon namespace.")]
    MutableNamespace,
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Split(#[from] SplitError),
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parses NEXUS (recognized by its `#NEXUS` header) or Newick text.
pub fn parse_trees(text: &str, ns: &mut TaxonNamespace) -> ParseResult<Vec<Tree>> {
    if text.trim_start().get(..6).is_some_and(|h| h.eq_ignore_ascii_case("#NEXUS")) {
        let trees = parse_nexus(text, ns)?.into_trees();
        log::debug!("NEXUS: {} trees.", trees.len());
        Ok(trees)
    } else {
        let trees = parse_newick(text, ns)?;
        log::debug!("NEWICK: {} trees.", trees.len());
        Ok(trees)
    }
}
