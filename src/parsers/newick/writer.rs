use crate::parsers::tokenizer::is_punctuation;
use crate::phylo::{NodeId, Rooting, TaxonNamespace, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewickWriterConfig {
    pub edge_lengths: bool,
    pub internal_labels: bool,
    /// Prefix each tree with `[&R] ` or `[&U] `.
    pub rooting_comment: bool,
    /// Quote labels containing spaces instead of writing underscores.
    pub preserve_spaces: bool,
}

impl Default for NewickWriterConfig {
    fn default() -> Self {
        Self {
            edge_lengths: true,
            internal_labels: true,
            rooting_comment: false,
            preserve_spaces: false,
        }
    }
}

/// Writes trees one per line.
pub fn write_newick_trees(
    trees: &[Tree],
    ns: &TaxonNamespace,
    config: &NewickWriterConfig,
) -> String {
    trees
        .iter()
        .map(|tree| write_newick(tree, ns, config))
        .reduce(|mut a, b| {
            a.push('\n');
            a.push_str(&b);
            a
        })
        .unwrap_or_default()
}

/// Converts a single [Tree] to a Newick string, terminated by `;`.
pub fn write_newick(tree: &Tree, ns: &TaxonNamespace, config: &NewickWriterConfig) -> String {
    let mut newick = String::new();
    if config.rooting_comment {
        match tree.rooting() {
            Rooting::Rooted => newick.push_str("[&R] "),
            Rooting::Unrooted => newick.push_str("[&U] "),
            Rooting::Unknown => {}
        }
    }
    newick_string_recursive(tree, tree.seed_node_id(), ns, config, &mut newick);
    newick.push(';');
    newick
}

fn newick_string_recursive(
    tree: &Tree,
    node_id: NodeId,
    ns: &TaxonNamespace,
    config: &NewickWriterConfig,
    newick: &mut String,
) {
    let child_ids = tree.child_ids(node_id);
    if !child_ids.is_empty() {
        newick.push('(');
        for (i, &child_id) in child_ids.iter().enumerate() {
            if i > 0 {
                newick.push(',');
            }
            newick_string_recursive(tree, child_id, ns, config, newick);
        }
        newick.push(')');
    }

    let label = if tree.is_leaf(node_id) || config.internal_labels {
        tree.taxon(node_id)
            .and_then(|taxon_id| ns.label(taxon_id))
            .map(str::to_string)
            .or_else(|| tree.label(node_id).map(|label| label.to_string()))
    } else {
        None
    };
    if let Some(label) = label {
        newick.push_str(&format_label(&label, config.preserve_spaces));
    }

    if config.edge_lengths {
        let length = tree.edge_length(node_id);
        if length.is_specified() {
            newick.push_str(&format!(":{length}"));
        }
    }
}

/// Quotes labels the tokenizer would otherwise split or alter.
fn format_label(label: &str, preserve_spaces: bool) -> String {
    let needs_quotes = label.chars().any(|c| {
        is_punctuation(c) || c == '_' || (c.is_whitespace() && (preserve_spaces || c != ' '))
    });
    if needs_quotes {
        format!("'{}'", label.replace('\'', "''"))
    } else {
        label.replace(' ', "_")
    }
}
