mod parser;

use super::ParseResult;
use super::newick::TreeParserConfig;
use crate::phylo::{TaxonNamespace, Tree};
use parser::NexusParser;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Parses a NEXUS document with the default tree parser configuration.
pub fn parse_nexus(text: &str, ns: &mut TaxonNamespace) -> ParseResult<NexusFile> {
    parse_nexus_with(text.chars(), ns, TreeParserConfig::default())
}

pub fn parse_nexus_with<I: Iterator<Item = char>>(
    chars: I,
    ns: &mut TaxonNamespace,
    config: TreeParserConfig,
) -> ParseResult<NexusFile> {
    NexusParser::new(chars, ns, config).parse()
}

/// Contents of a NEXUS document that this crate understands. Taxa live in
/// the namespace the document was parsed into.
#[derive(Debug, Clone, Default)]
pub struct NexusFile {
    pub trees: Vec<Tree>,
    /// The last TRANSLATE table seen.
    pub translate_table: Option<FxHashMap<String, String>>,
    /// NTAX of the last TAXA block.
    pub ntax: Option<usize>,
}

impl NexusFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub fn tree_names(&self) -> Vec<Arc<str>> {
        self.trees.iter().filter_map(Tree::name).collect()
    }

    pub fn tree(&self, name: &str) -> Option<&Tree> {
        self.trees.iter().find(|tree| tree.name().is_some_and(|n| &*n == name))
    }

    pub fn into_trees(self) -> Vec<Tree> {
        self.trees
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::ParseError;

    #[test]
    fn test_translate_table_resolves_leaves() {
        let content = r#"#NEXUS
BEGIN TAXA;
    DIMENSIONS NTAX=3;
    TAXLABELS Alpha Beta Gamma;
END;
BEGIN TREES;
    TRANSLATE
        1 Alpha,
        2 Beta,
        3 Gamma;
    TREE test = [&R] (1:0.1,(2:0.2,3:0.3):0.4);
END;
"#;
        let mut ns = TaxonNamespace::new();
        let nexus_file = parse_nexus(content, &mut ns).unwrap();

        assert_eq!(ns.labels(), vec!["Alpha", "Beta", "Gamma"]);
        let translate_table = nexus_file.translate_table.as_ref().unwrap();
        assert_eq!(translate_table.get("2").map(String::as_str), Some("Beta"));

        let tree = nexus_file.tree("test").unwrap();
        assert!(tree.is_rooted());
        let labels: Vec<&str> =
            tree.leaf_taxa().into_iter().filter_map(|t| ns.label(t)).collect();
        assert_eq!(labels, vec!["Alpha", "Beta", "Gamma"]);
    }

    #[test]
    fn test_missing_header() {
        let mut ns = TaxonNamespace::new();
        let result = parse_nexus("BEGIN TREES; TREE t = (A,B); END;", &mut ns);
        assert_eq!(result.unwrap_err(), ParseError::MissingHeader);
    }
}
