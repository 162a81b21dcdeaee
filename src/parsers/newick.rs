mod hints;
mod writer;

pub use writer::{NewickWriterConfig, write_newick, write_newick_trees};

use super::tokenizer::{Token, Tokenizer, TokenizerConfig};
use super::{ParseError, ParseResult, Position};
use crate::phylo::{EdgeLength, NodeId, Rooting, TaxonNamespace, Tree};
use crate::splits::{Bitmask, SplitError, split_map_from_masks};
use hints::TreeHint;
use rustc_hash::{FxHashMap, FxHashSet};

/// Punctuation read as part of labels and edge lengths inside a tree
/// description, so that `1e-5` or `A-1` stay whole.
const LABEL_CHARS: &[char] = &['-', '+', '*', '/', '<', '>', '=', '{', '}', '\\', '`', '"'];

#[derive(Debug, Clone, Default)]
pub struct TreeParserConfig {
    /// Keep underscores in unquoted labels instead of reading them as spaces.
    pub preserve_underscores: bool,
    /// Rooting of trees that carry no `[&R]` or `[&U]` comment.
    pub default_rooting: Rooting,
    /// Compute split masks while parsing. Requires a locked namespace.
    pub encode_splits: bool,
    /// Leaf tokens found here are replaced by the label they map to.
    pub translate_table: Option<FxHashMap<String, String>>,
}

impl TreeParserConfig {
    pub fn preserve_underscores(mut self, preserve_underscores: bool) -> Self {
        self.preserve_underscores = preserve_underscores;
        self
    }

    pub fn default_rooting(mut self, default_rooting: Rooting) -> Self {
        self.default_rooting = default_rooting;
        self
    }

    pub fn encode_splits(mut self, encode_splits: bool) -> Self {
        self.encode_splits = encode_splits;
        self
    }

    pub fn translate_table(mut self, translate_table: Option<FxHashMap<String, String>>) -> Self {
        self.translate_table = translate_table;
        self
    }

    pub(crate) fn tokenizer_config(&self) -> TokenizerConfig {
        TokenizerConfig { preserve_underscores: self.preserve_underscores }
    }
}

/// Builds trees from a token stream, resolving leaf labels to taxa in a
/// shared [TaxonNamespace].
pub struct TreeParser<'a> {
    ns: &'a mut TaxonNamespace,
    config: TreeParserConfig,
}

impl<'a> TreeParser<'a> {
    pub fn new(ns: &'a mut TaxonNamespace, config: TreeParserConfig) -> Self {
        Self { ns, config }
    }

    pub fn config(&self) -> &TreeParserConfig {
        &self.config
    }

    pub fn set_translate_table(&mut self, translate_table: Option<FxHashMap<String, String>>) {
        self.config.translate_table = translate_table;
    }

    /// Reads one tree description, up to and including its `;`.
    ///
    /// Returns `Ok(None)` when the input ends before the first token. On
    /// error nothing is returned, but taxa already added to the namespace
    /// stay there.
    pub fn parse_tree<I: Iterator<Item = char>>(
        &mut self,
        tokenizer: &mut Tokenizer<I>,
    ) -> ParseResult<Option<Tree>> {
        read_tree(self.ns, &self.config, tokenizer)
    }
}

/// Per-tree parser state.
struct TreeBuilder<'p> {
    ns: &'p mut TaxonNamespace,
    config: &'p TreeParserConfig,
    tree: Tree,
    current: NodeId,
    /// The current node has a label, or its clade has been closed.
    complete: bool,
    seen: FxHashSet<usize>,
}

pub(crate) fn read_tree<I: Iterator<Item = char>>(
    ns: &mut TaxonNamespace,
    config: &TreeParserConfig,
    tokenizer: &mut Tokenizer<I>,
) -> ParseResult<Option<Tree>> {
    if config.encode_splits && ns.is_mutable() {
        return Err(ParseError::MutableNamespace);
    }

    let Some(first) = tokenizer.next_token_with(LABEL_CHARS)? else {
        return Ok(None);
    };

    let mut tree = Tree::new();
    let mut rooting = config.default_rooting;
    let mut comments = Vec::new();
    for comment in tokenizer.take_comments() {
        match hints::interpret(&comment) {
            TreeHint::Rooting(r) => rooting = r,
            TreeHint::Weight(w) => tree.set_weight(Some(w)),
            TreeHint::None => comments.push(comment),
        }
    }
    tree.add_comments(comments);
    tree.set_rooting(rooting);

    let current = tree.seed_node_id();
    let mut builder =
        TreeBuilder { ns, config, tree, current, complete: false, seen: FxHashSet::default() };
    let mut token = Some(first);

    loop {
        let position = tokenizer.token_position();
        match token {
            None => {
                if !builder.at_seed() {
                    return Err(ParseError::UnbalancedParentheses(tokenizer.cursor()));
                }
                if !builder.complete {
                    return Err(ParseError::MissingTaxonSpecifier(tokenizer.cursor()));
                }
                break;
            }
            Some(Token::Punctuation(';')) => {
                if !builder.at_seed() {
                    return Err(ParseError::UnbalancedParentheses(position));
                }
                // Nothing was read for the seed node: an empty tree description.
                if !builder.complete {
                    return Err(ParseError::MissingTaxonSpecifier(position));
                }
                break;
            }
            Some(Token::Punctuation('(')) => {
                if builder.complete {
                    return Err(ParseError::UnexpectedToken { token: "(".to_string(), position });
                }
                builder.current = builder.tree.new_child(builder.current)?;
                builder.complete = false;
            }
            Some(Token::Punctuation(',')) => {
                if !builder.complete {
                    return Err(ParseError::MissingTaxonSpecifier(position));
                }
                let Some(parent_id) = builder.tree.parent_id(builder.current) else {
                    return Err(ParseError::UnexpectedToken { token: ",".to_string(), position });
                };
                builder.fold_mask(parent_id);
                builder.current = builder.tree.new_child(parent_id)?;
                builder.complete = false;
            }
            Some(Token::Punctuation(')')) => {
                if !builder.complete {
                    return Err(ParseError::MissingTaxonSpecifier(position));
                }
                let Some(parent_id) = builder.tree.parent_id(builder.current) else {
                    return Err(ParseError::UnbalancedParentheses(position));
                };
                builder.fold_mask(parent_id);
                builder.current = parent_id;
            }
            Some(Token::Punctuation(':')) => {
                let length = match tokenizer.require_token_with(LABEL_CHARS)? {
                    Token::Word(word) => EdgeLength::parse(&word),
                    other => {
                        return Err(ParseError::UnexpectedToken {
                            token: other.text(),
                            position: tokenizer.token_position(),
                        });
                    }
                };
                if let EdgeLength::Raw(raw) = &length {
                    log::warn!("Non-numeric edge length '{raw}' at {}", tokenizer.token_position());
                }
                if let Some(node) = builder.tree.node_mut(builder.current) {
                    node.set_edge_length(length);
                }
                builder.attach_comments(tokenizer.take_comments());
            }
            Some(Token::Punctuation(c)) => {
                return Err(ParseError::UnexpectedToken { token: c.to_string(), position });
            }
            Some(Token::Word(label)) | Some(Token::Quoted(label)) => {
                if (builder.complete && builder.tree.is_leaf(builder.current))
                    || builder.tree.label(builder.current).is_some()
                {
                    return Err(ParseError::UnexpectedToken { token: label, position });
                }
                builder.set_label(label, position)?;
                builder.complete = true;
            }
        }

        token = tokenizer.next_token_with(LABEL_CHARS)?;
        builder.attach_comments(tokenizer.take_comments());
        // A closed clade is complete before any label follows it.
        if !builder.tree.is_leaf(builder.current) {
            builder.complete = true;
        }
    }

    let mut tree = builder.tree;
    if config.encode_splits {
        let split_map = split_map_from_masks(&tree);
        _ = tree.set_split_map(split_map);
    }
    log::debug!("Parsed a tree with {} leaves ({})", tree.leaf_count(), tree.rooting());
    Ok(Some(tree))
}

impl TreeBuilder<'_> {
    fn at_seed(&self) -> bool {
        self.current == self.tree.seed_node_id()
    }

    fn attach_comments(&mut self, comments: Vec<String>) {
        if comments.is_empty() {
            return;
        }
        if let Some(node) = self.tree.node_mut(self.current) {
            node.add_comments(comments);
        }
    }

    /// Leaves resolve their label to a taxon; internal nodes keep it as is.
    fn set_label(&mut self, label: String, position: Position) -> ParseResult<()> {
        let node_id = self.current;
        if !self.tree.is_leaf(node_id) {
            if let Some(node) = self.tree.node_mut(node_id) {
                node.set_label(Some(label.as_str()));
            }
            return Ok(());
        }

        let label = match &self.config.translate_table {
            Some(table) => table.get(&label).cloned().unwrap_or(label),
            None => label,
        };
        let taxon_id = self
            .ns
            .require_taxon(&label)
            .ok_or_else(|| ParseError::UnknownTaxon { label: label.clone(), position })?;

        let mask = if self.config.encode_splits {
            let index = self.ns.bit_index(taxon_id).ok_or(SplitError::UnknownTaxon(taxon_id))?;
            if !self.seen.insert(index) {
                return Err(SplitError::DuplicateTaxon { label }.into());
            }
            Some(Bitmask::singleton(index))
        } else {
            None
        };

        if let Some(node) = self.tree.node_mut(node_id) {
            node.set_taxon(Some(taxon_id));
            node.edge_mut().set_bitmask(mask);
        }
        Ok(())
    }

    /// Adds the finished node's mask to its parent's.
    fn fold_mask(&mut self, parent_id: NodeId) {
        if !self.config.encode_splits {
            return;
        }
        let Some(mask) = self.tree.bitmask(self.current).cloned() else {
            return;
        };
        if let Some(parent) = self.tree.node_mut(parent_id) {
            let edge = parent.edge_mut();
            let merged = match edge.bitmask() {
                Some(existing) => existing | &mask,
                None => mask,
            };
            edge.set_bitmask(Some(merged));
        }
    }
}

/// Lazily reads trees from Newick text, one per `;`.
///
/// Iteration stops after the first error.
pub struct NewickReader<'a, I: Iterator<Item = char>> {
    tokenizer: Tokenizer<I>,
    parser: TreeParser<'a>,
    failed: bool,
}

impl<'a, I: Iterator<Item = char>> NewickReader<'a, I> {
    pub fn new(chars: I, ns: &'a mut TaxonNamespace, config: TreeParserConfig) -> Self {
        let tokenizer = Tokenizer::with_config(chars, config.tokenizer_config());
        Self { tokenizer, parser: TreeParser::new(ns, config), failed: false }
    }
}

impl<I: Iterator<Item = char>> Iterator for NewickReader<'_, I> {
    type Item = ParseResult<Tree>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.parser.parse_tree(&mut self.tokenizer) {
            Ok(tree) => tree.map(Ok),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

/// Parses every tree in `text` with the default configuration.
pub fn parse_newick(text: &str, ns: &mut TaxonNamespace) -> ParseResult<Vec<Tree>> {
    NewickReader::new(text.chars(), ns, TreeParserConfig::default()).collect()
}
