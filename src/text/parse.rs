//! `.gsn` text -> nodes.
//!
//! Grammar:
//!   file      := block*
//!   block     := NS_KEYWORD Name '{' node* '}'
//!   node      := type Name '{' statement* '}'
//!   statement := 'uuid' ':' String ';'
//!              | 'summary' ':' Text ';' | 'info' ':' Text ';'
//!              | 'label' ':' Name ';' | 'artifact' ':' String ';'
//!              | node
//!              | 'ref_'type ':' Name ('.' Name)* ';'
//!
//! `//` line comments and `/* */` block comments are skipped. Nested nodes
//! become containment children (context types under `inContextOf`, the rest
//! under `solvedBy`); `ref_` statements become reference entries in the
//! relation matching the target type.

use crate::model::{Model, Node, NodeType, RelationType, id};
use crate::text::REF_PREFIX;

use anyhow::Context;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}, column {col}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub col: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Ident(String),
    /// `"..."`
    Str(String),
    /// `'''...'''`
    Text(String),
    Colon,
    Semi,
    Dot,
    LBrace,
    RBrace,
}

impl Tok {
    fn describe(&self) -> String {
        match self {
            Tok::Ident(s) => format!("name \"{}\"", s),
            Tok::Str(_) => "string".to_string(),
            Tok::Text(_) => "text block".to_string(),
            Tok::Colon => "':'".to_string(),
            Tok::Semi => "';'".to_string(),
            Tok::Dot => "'.'".to_string(),
            Tok::LBrace => "'{'".to_string(),
            Tok::RBrace => "'}'".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Spanned {
    tok: Tok,
    line: usize,
    col: usize,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
            line: 1,
            col: 1,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn error(&self, line: usize, col: usize, message: impl Into<String>) -> ParseError {
        ParseError {
            line,
            col,
            message: message.into(),
        }
    }

    /// Consume input until `end` has been read; the text before it is returned.
    fn read_until(&mut self, end: &str, line: usize, col: usize) -> Result<String, ParseError> {
        let mut out = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(self.error(line, col, format!("unterminated literal, expected {}", end)));
            };
            out.push(c);
            if out.ends_with(end) {
                out.truncate(out.len() - end.len());
                return Ok(out);
            }
        }
    }

    fn tokens(mut self) -> Result<Vec<Spanned>, ParseError> {
        let mut out = Vec::new();

        while let Some(&c) = self.chars.peek() {
            let (line, col) = (self.line, self.col);

            if c.is_whitespace() {
                self.bump();
                continue;
            }

            let tok = match c {
                '/' => {
                    self.bump();
                    match self.bump() {
                        Some('/') => {
                            while let Some(&c) = self.chars.peek() {
                                if c == '\n' {
                                    break;
                                }
                                self.bump();
                            }
                        }
                        Some('*') => {
                            self.read_until("*/", line, col)?;
                        }
                        _ => return Err(self.error(line, col, "unexpected '/'")),
                    }
                    continue;
                }
                '"' => {
                    self.bump();
                    Tok::Str(self.read_until("\"", line, col)?)
                }
                '\'' => {
                    for _ in 0..3 {
                        if self.bump() != Some('\'') {
                            return Err(self.error(line, col, "text blocks start with '''"));
                        }
                    }
                    Tok::Text(self.read_until("'''", line, col)?)
                }
                ':' => {
                    self.bump();
                    Tok::Colon
                }
                ';' => {
                    self.bump();
                    Tok::Semi
                }
                '.' => {
                    self.bump();
                    Tok::Dot
                }
                '{' => {
                    self.bump();
                    Tok::LBrace
                }
                '}' => {
                    self.bump();
                    Tok::RBrace
                }
                c if c.is_ascii_alphanumeric() || c == '_' => {
                    let mut ident = String::new();
                    while let Some(&c) = self.chars.peek() {
                        if !(c.is_ascii_alphanumeric() || c == '_') {
                            break;
                        }
                        ident.push(c);
                        self.bump();
                    }
                    Tok::Ident(ident)
                }
                other => return Err(self.error(line, col, format!("unexpected character {:?}", other))),
            };

            out.push(Spanned { tok, line, col });
        }

        Ok(out)
    }
}

struct Parser {
    toks: Vec<Spanned>,
    pos: usize,
    /// Position reported for errors at end of input.
    end: (usize, usize),
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos).map(|s| &s.tok)
    }

    fn peek_at(&self, offset: usize) -> Option<&Tok> {
        self.toks.get(self.pos + offset).map(|s| &s.tok)
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        let (line, col) = self
            .toks
            .get(self.pos)
            .map(|s| (s.line, s.col))
            .unwrap_or(self.end);
        ParseError {
            line,
            col,
            message: message.into(),
        }
    }

    fn next(&mut self, expected: &str) -> Result<Tok, ParseError> {
        match self.toks.get(self.pos) {
            Some(s) => {
                self.pos += 1;
                Ok(s.tok.clone())
            }
            None => Err(self.error_here(format!("expected {}, found end of input", expected))),
        }
    }

    fn expect(&mut self, want: Tok) -> Result<(), ParseError> {
        let expected = want.describe();
        let got = self.next(&expected)?;
        if got == want {
            Ok(())
        } else {
            self.pos -= 1;
            Err(self.error_here(format!("expected {}, found {}", expected, got.describe())))
        }
    }

    fn ident(&mut self, what: &str) -> Result<String, ParseError> {
        match self.next(what)? {
            Tok::Ident(s) => Ok(s),
            other => {
                self.pos -= 1;
                Err(self.error_here(format!("expected {}, found {}", what, other.describe())))
            }
        }
    }

    fn name(&mut self, what: &str) -> Result<String, ParseError> {
        let name = self.ident(what)?;
        if !id::is_valid_name(&name) {
            self.pos -= 1;
            return Err(self.error_here(format!("invalid {} \"{}\": {}", what, name, id::NAME_HINT)));
        }
        Ok(name)
    }

    /// `type Name` starts a nested node; `key:` starts a statement.
    fn at_node_header(&self) -> bool {
        let is_type = matches!(self.peek(), Some(Tok::Ident(word)) if NodeType::from_keyword(word).is_some());
        is_type && matches!(self.peek_at(1), Some(Tok::Ident(_)))
    }

    fn file(&mut self) -> Result<Vec<Node>, ParseError> {
        let mut nodes = Vec::new();
        while self.peek().is_some() {
            let keyword = self.ident("namespace keyword")?;
            if NodeType::from_namespace_keyword(&keyword).is_none() {
                self.pos -= 1;
                return Err(self.error_here(format!("unknown namespace keyword \"{}\"", keyword)));
            }
            let ns = self.name("namespace name")?;
            self.expect(Tok::LBrace)?;
            while self.peek() != Some(&Tok::RBrace) {
                nodes.extend(self.node(&ns)?);
            }
            self.expect(Tok::RBrace)?;
        }
        Ok(nodes)
    }

    /// The node followed by all of its nested descendants.
    fn node(&mut self, owner_id: &str) -> Result<Vec<Node>, ParseError> {
        let keyword = self.ident("node type")?;
        let Some(kind) = NodeType::from_keyword(&keyword) else {
            self.pos -= 1;
            return Err(self.error_here(format!("unknown node type \"{}\"", keyword)));
        };
        let name = self.name("node name")?;
        let node_id = id::child_id(owner_id, &name);

        let mut node = Node::new(node_id.clone(), kind);
        let mut nested = Vec::new();

        self.expect(Tok::LBrace)?;
        loop {
            match self.peek() {
                Some(Tok::RBrace) => break,
                None => return Err(self.error_here("expected '}', found end of input")),
                Some(_) => {}
            }

            if self.at_node_header() {
                let sub = self.node(&node_id)?;
                if let Some(child) = sub.first() {
                    node.add_relation(RelationType::for_child(child.kind), &child.id);
                }
                nested.extend(sub);
            } else {
                self.statement(&mut node)?;
            }
        }
        self.expect(Tok::RBrace)?;

        let mut out = Vec::with_capacity(nested.len() + 1);
        out.push(node);
        out.extend(nested);
        Ok(out)
    }

    fn statement(&mut self, node: &mut Node) -> Result<(), ParseError> {
        let key = self.ident("attribute")?;
        self.expect(Tok::Colon)?;

        match key.as_str() {
            "uuid" => node.uuid = Some(self.string("uuid string")?),
            "summary" => node.summary = Some(self.text("summary text")?),
            "info" => node.info = Some(self.text("info text")?),
            "label" => {
                let label = self.ident("label name")?;
                node.labels.push(label);
            }
            "artifact" => {
                let artifact = self.string("artifact string")?;
                node.artifacts.push(artifact);
            }
            other => {
                let target_kind = other
                    .strip_prefix(REF_PREFIX)
                    .and_then(NodeType::from_keyword)
                    .ok_or_else(|| {
                        self.pos -= 2;
                        self.error_here(format!("unknown attribute \"{}\"", other))
                    })?;
                let mut path = vec![self.name("reference path")?];
                while self.peek() == Some(&Tok::Dot) {
                    self.pos += 1;
                    path.push(self.name("reference path")?);
                }
                let target = path.join(&id::SEPARATOR.to_string());
                node.add_relation(RelationType::for_child(target_kind), &target);
            }
        }

        self.expect(Tok::Semi)
    }

    fn string(&mut self, what: &str) -> Result<String, ParseError> {
        match self.next(what)? {
            Tok::Str(s) => Ok(s),
            other => {
                self.pos -= 1;
                Err(self.error_here(format!("expected {}, found {}", what, other.describe())))
            }
        }
    }

    fn text(&mut self, what: &str) -> Result<String, ParseError> {
        match self.next(what)? {
            Tok::Text(s) => Ok(s),
            other => {
                self.pos -= 1;
                Err(self.error_here(format!("expected {}, found {}", what, other.describe())))
            }
        }
    }
}

/// Parse one `.gsn` file into nodes, in text order.
pub fn parse_text(text: &str) -> Result<Vec<Node>, ParseError> {
    let lexer = Lexer::new(text);
    let toks = lexer.tokens()?;
    let end = text
        .lines()
        .enumerate()
        .last()
        .map(|(i, l)| (i + 1, l.chars().count() + 1))
        .unwrap_or((1, 1));

    let mut parser = Parser { toks, pos: 0, end };
    parser.file()
}

/// Parse several `.gsn` files into one model.
pub fn from_text<S: AsRef<str>>(texts: &[S]) -> crate::Result<Model> {
    let mut nodes = Vec::new();
    for (i, text) in texts.iter().enumerate() {
        let parsed = parse_text(text.as_ref()).with_context(|| format!("parse gsn text #{}", i + 1))?;
        nodes.extend(parsed);
    }
    Ok(Model::new(nodes)?)
}
