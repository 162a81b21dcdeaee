//! Pull-based NEXUS/Newick tokenizer.
//!
//! A single forward pass over any character iterator. Bracketed comments are
//! skipped wherever whitespace is allowed, but their text is kept: the
//! comments found while reading a token are available from
//! [Tokenizer::comments] until the next token is read.

use super::{ParseError, ParseResult, Position};
use std::iter::Peekable;

/// Characters that end an unquoted word and are tokens of their own.
pub const PUNCTUATION: &str = "(){}[]/\\,;:=*'\"`+-<>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Punctuation(char),
    Word(String),
    /// A single-quoted label, quotes removed and `''` unescaped.
    Quoted(String),
}

impl Token {
    pub fn text(&self) -> String {
        match self {
            Token::Punctuation(c) => c.to_string(),
            Token::Word(word) | Token::Quoted(word) => word.clone(),
        }
    }

    pub fn is_punctuation(&self, c: char) -> bool {
        *self == Token::Punctuation(c)
    }

    /// Unquoted word matching `keyword`, ignoring case.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Word(word) if word.eq_ignore_ascii_case(keyword))
    }

    /// The token's text when it can name something.
    pub fn as_label(&self) -> Option<&str> {
        match self {
            Token::Word(word) | Token::Quoted(word) => Some(word),
            Token::Punctuation(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenizerConfig {
    /// Keep underscores in unquoted words instead of reading them as spaces.
    pub preserve_underscores: bool,
}

pub struct Tokenizer<I: Iterator<Item = char>> {
    chars: Peekable<I>,
    config: TokenizerConfig,
    line: usize,
    column: usize,
    token_position: Position,
    comments: Vec<String>,
}

impl<I: Iterator<Item = char>> Tokenizer<I> {
    pub fn new(chars: I) -> Self {
        Self::with_config(chars, TokenizerConfig::default())
    }

    pub fn with_config(chars: I, config: TokenizerConfig) -> Self {
        Self {
            chars: chars.peekable(),
            config,
            line: 1,
            column: 1,
            token_position: Position::new(1, 1),
            comments: Vec::new(),
        }
    }

    /// Position of the next unread character.
    pub fn cursor(&self) -> Position {
        Position::new(self.line, self.column)
    }

    /// Where the most recently read token started.
    pub fn token_position(&self) -> Position {
        self.token_position
    }

    /// Comments skipped while reading the most recent token.
    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    pub fn take_comments(&mut self) -> Vec<String> {
        std::mem::take(&mut self.comments)
    }

    pub fn next_token(&mut self) -> ParseResult<Option<Token>> {
        self.next_token_with(&[])
    }

    /// Reads a token, treating the characters in `ignore` as ordinary word
    /// characters for this call only. Quotes and brackets are never ignored.
    pub fn next_token_with(&mut self, ignore: &[char]) -> ParseResult<Option<Token>> {
        self.comments.clear();
        self.skip_whitespace_and_comments()?;
        self.token_position = self.cursor();

        let Some(&c) = self.chars.peek() else {
            return Ok(None);
        };

        let token = if c == '\'' {
            Token::Quoted(self.read_quoted()?)
        } else if is_punctuation(c) && !ignore.contains(&c) {
            _ = self.bump();
            Token::Punctuation(c)
        } else {
            Token::Word(self.read_word(ignore))
        };
        log::trace!("{}: {token:?}", self.token_position);
        Ok(Some(token))
    }

    /// Like [Tokenizer::next_token], but running out of input is an error.
    pub fn require_token(&mut self) -> ParseResult<Token> {
        self.require_token_with(&[])
    }

    pub fn require_token_with(&mut self, ignore: &[char]) -> ParseResult<Token> {
        self.next_token_with(ignore)?
            .ok_or_else(|| ParseError::UnexpectedEof(self.cursor()))
    }

    /// Next token's text in upper case, for keyword matching.
    pub fn next_token_upper(&mut self) -> ParseResult<Option<String>> {
        Ok(self.next_token()?.map(|token| token.text().to_uppercase()))
    }

    /// Consumes tokens up to and including the next `;`.
    pub fn skip_to_semicolon(&mut self) -> ParseResult<()> {
        loop {
            match self.next_token()? {
                Some(Token::Punctuation(';')) => return Ok(()),
                Some(_) => continue,
                None => return Err(ParseError::UnexpectedEof(self.cursor())),
            }
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_whitespace_and_comments(&mut self) -> ParseResult<()> {
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() {
                _ = self.bump();
            } else if c == '[' {
                let comment = self.read_comment()?;
                self.comments.push(comment);
            } else {
                break;
            }
        }
        Ok(())
    }

    /// Reads a bracketed comment. Nested brackets are allowed; only the
    /// outermost pair delimits the comment and inner brackets are dropped
    /// from its text.
    fn read_comment(&mut self) -> ParseResult<String> {
        let start = self.cursor();
        _ = self.bump();
        let mut depth = 1;
        let mut text = String::new();
        loop {
            match self.bump() {
                None => return Err(ParseError::UnterminatedComment(start)),
                Some('[') => depth += 1,
                Some(']') => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(text);
                    }
                }
                Some(c) => text.push(c),
            }
        }
    }

    fn read_quoted(&mut self) -> ParseResult<String> {
        let start = self.cursor();
        _ = self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                None => return Err(ParseError::UnterminatedQuote(start)),
                Some('\'') => {
                    if self.chars.peek() == Some(&'\'') {
                        _ = self.bump();
                        text.push('\'');
                    } else {
                        return Ok(text);
                    }
                }
                Some(c) => text.push(c),
            }
        }
    }

    fn read_word(&mut self, ignore: &[char]) -> String {
        let mut word = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace()
                || c == '['
                || c == '\''
                || (is_punctuation(c) && !ignore.contains(&c))
            {
                break;
            }
            _ = self.bump();
            if c == '_' && !self.config.preserve_underscores {
                word.push(' ');
            } else {
                word.push(c);
            }
        }
        word
    }
}

impl<I: Iterator<Item = char>> Iterator for Tokenizer<I> {
    type Item = ParseResult<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}

pub fn is_punctuation(c: char) -> bool {
    PUNCTUATION.contains(c)
}
