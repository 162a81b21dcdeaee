use super::NexusFile;
use crate::parsers::newick::{TreeParserConfig, read_tree};
use crate::parsers::tokenizer::{Token, Tokenizer};
use crate::parsers::{ParseError, ParseResult};
use crate::phylo::TaxonNamespace;
use rustc_hash::FxHashMap;

/// Statement-level NEXUS reader. Only TAXA and TREES blocks are interpreted;
/// every other block is skipped up to its `END;` or `ENDBLOCK;`.
pub(crate) struct NexusParser<'a, I: Iterator<Item = char>> {
    tokenizer: Tokenizer<I>,
    ns: &'a mut TaxonNamespace,
    config: TreeParserConfig,
    nexus_file: NexusFile,
}

impl<'a, I: Iterator<Item = char>> NexusParser<'a, I> {
    pub(crate) fn new(chars: I, ns: &'a mut TaxonNamespace, config: TreeParserConfig) -> Self {
        let tokenizer = Tokenizer::with_config(chars, config.tokenizer_config());
        Self { tokenizer, ns, config, nexus_file: NexusFile::new() }
    }

    pub(crate) fn parse(mut self) -> ParseResult<NexusFile> {
        if !self.has_nexus_header()? {
            return Err(ParseError::MissingHeader);
        }

        while let Some(token) = self.tokenizer.next_token()? {
            if token.is_keyword("BEGIN") {
                let block_name = self.tokenizer.require_token()?.text().to_uppercase();
                self.require_semicolon()?;
                self.parse_block(&block_name)?;
            } else {
                return Err(self.unexpected(&token));
            }
        }

        Ok(self.nexus_file)
    }

    fn has_nexus_header(&mut self) -> ParseResult<bool> {
        Ok(self.tokenizer.next_token()?.is_some_and(|token| token.is_keyword("#NEXUS")))
    }

    fn parse_block(&mut self, block_name: &str) -> ParseResult<()> {
        log::debug!("Reading {block_name} block");
        match block_name {
            "TAXA" => self.parse_taxa_block(),
            "TREES" => self.parse_trees_block(),
            _ => self.skip_to_end_block(),
        }
    }

    // =========================================================================
    // TAXA
    // =========================================================================

    fn parse_taxa_block(&mut self) -> ParseResult<()> {
        let mut expected_ntax: Option<usize> = None;
        let mut actual = 0;

        loop {
            let token = self.require_statement()?;
            if is_end(&token) {
                self.require_semicolon()?;
                if let Some(expected) = expected_ntax
                    && expected != actual
                {
                    return Err(ParseError::TaxaCountMismatch { expected, actual });
                }
                return Ok(());
            }

            if token.is_keyword("DIMENSIONS") {
                expected_ntax = self.parse_dimensions()?;
                self.nexus_file.ntax = expected_ntax;
            } else if token.is_keyword("TAXLABELS") {
                actual += self.parse_taxlabels()?;
                if let Some(expected) = expected_ntax
                    && actual > expected
                {
                    return Err(ParseError::TaxaCountMismatch { expected, actual });
                }
            } else {
                self.tokenizer.skip_to_semicolon()?;
            }
        }
    }

    /// Reads `NTAX=n` from a DIMENSIONS statement.
    fn parse_dimensions(&mut self) -> ParseResult<Option<usize>> {
        let mut ntax = None;
        loop {
            let token = self.tokenizer.require_token()?;
            if token.is_punctuation(';') {
                return Ok(ntax);
            }
            if token.is_keyword("NTAX") {
                let equals = self.tokenizer.require_token()?;
                if !equals.is_punctuation('=') {
                    return Err(self.unexpected(&equals));
                }
                let value = self.tokenizer.require_token()?;
                match value.text().parse::<usize>() {
                    Ok(n) => ntax = Some(n),
                    Err(_) => return Err(self.unexpected(&value)),
                }
            }
        }
    }

    /// Adds every label to the namespace, reusing taxa that already carry
    /// it. Returns the number of labels read.
    fn parse_taxlabels(&mut self) -> ParseResult<usize> {
        let mut count = 0;
        loop {
            let token = self.tokenizer.require_token()?;
            if token.is_punctuation(';') {
                return Ok(count);
            }
            let Some(label) = token.as_label() else {
                return Err(self.unexpected(&token));
            };
            if self.ns.require_taxon(label).is_none() {
                return Err(ParseError::UnknownTaxon {
                    label: label.to_string(),
                    position: self.tokenizer.token_position(),
                });
            }
            count += 1;
        }
    }

    // =========================================================================
    // TREES
    // =========================================================================

    fn parse_trees_block(&mut self) -> ParseResult<()> {
        loop {
            let token = self.require_statement()?;
            if is_end(&token) {
                return self.require_semicolon();
            }

            if token.is_keyword("TRANSLATE") {
                let translate_table = self.parse_translate_command()?;
                self.config.translate_table = Some(translate_table.clone());
                self.nexus_file.translate_table = Some(translate_table);
            } else if token.is_keyword("TREE") || token.is_keyword("UTREE") {
                self.parse_tree_definition()?;
            } else {
                self.tokenizer.skip_to_semicolon()?;
            }
        }
    }

    /// `TRANSLATE key label, key label, ... ;`
    fn parse_translate_command(&mut self) -> ParseResult<FxHashMap<String, String>> {
        let mut translate_table = FxHashMap::default();
        loop {
            let key = self.tokenizer.require_token()?;
            if key.is_punctuation(';') {
                break;
            }
            let Some(key) = key.as_label().map(str::to_string) else {
                return Err(self.malformed_translate(format!("expected a key, found '{}'", key.text())));
            };

            let label = self.tokenizer.require_token()?;
            let Some(label) = label.as_label().map(str::to_string) else {
                return Err(self.malformed_translate(format!("missing label for key '{key}'")));
            };
            _ = translate_table.insert(key, label);

            let separator = self.tokenizer.require_token()?;
            if separator.is_punctuation(';') {
                break;
            }
            if !separator.is_punctuation(',') {
                return Err(self.malformed_translate(format!(
                    "expected ',' or ';', found '{}'",
                    separator.text()
                )));
            }
        }
        log::debug!("TRANSLATE table with {} entries", translate_table.len());
        Ok(translate_table)
    }

    /// `TREE [*] name = [&R] newick;`
    fn parse_tree_definition(&mut self) -> ParseResult<()> {
        let mut token = self.tokenizer.require_token()?;
        if token.is_punctuation('*') {
            token = self.tokenizer.require_token()?;
        }
        let Some(name) = token.as_label().map(str::to_string) else {
            return Err(self.unexpected(&token));
        };

        let equals = self.tokenizer.require_token()?;
        if !equals.is_punctuation('=') {
            return Err(self.unexpected(&equals));
        }

        let Some(mut tree) = read_tree(self.ns, &self.config, &mut self.tokenizer)? else {
            return Err(ParseError::UnexpectedEof(self.tokenizer.cursor()));
        };
        tree.set_name(Some(name.as_str()));
        self.nexus_file.trees.push(tree);
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn skip_to_end_block(&mut self) -> ParseResult<()> {
        loop {
            let token = self.require_statement()?;
            if is_end(&token) {
                return self.require_semicolon();
            }
            self.tokenizer.skip_to_semicolon()?;
        }
    }

    /// First token of a statement; running out of input inside a block is an
    /// error.
    fn require_statement(&mut self) -> ParseResult<Token> {
        loop {
            let token = self.tokenizer.require_token()?;
            // Empty statements.
            if !token.is_punctuation(';') {
                return Ok(token);
            }
        }
    }

    fn require_semicolon(&mut self) -> ParseResult<()> {
        let token = self.tokenizer.require_token()?;
        if token.is_punctuation(';') { Ok(()) } else { Err(self.unexpected(&token)) }
    }

    fn unexpected(&self, token: &Token) -> ParseError {
        ParseError::UnexpectedToken {
            token: token.text(),
            position: self.tokenizer.token_position(),
        }
    }

    fn malformed_translate(&self, message: String) -> ParseError {
        ParseError::MalformedTranslate { message, position: self.tokenizer.token_position() }
    }
}

fn is_end(token: &Token) -> bool {
    token.is_keyword("END") || token.is_keyword("ENDBLOCK")
}
