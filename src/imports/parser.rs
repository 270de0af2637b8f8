//! Parser for `cc_import` descriptor files.
//!
//! A descriptor lists pre-built libraries in Starlark-like syntax:
//!
//! ```text
//! cc_import(
//!     name = "zstd",
//!     hdrs = glob(["/usr/include/zstd*.h"]),
//!     static_library = "/usr/lib/libzstd.a",
//!     deps = [":xxhash"],
//! )
//! ```
//!
//! Only the attributes the translation understands are accepted; globs are
//! expanded against the filesystem when the file is parsed.

use std::path::Path;

use thiserror::Error;

use crate::core::target::CcImport;
use crate::util::fs::glob_files;

/// A malformed descriptor file.
#[derive(Debug, Error)]
pub enum ImportParseError {
    #[error("line {line}: expected {expected}, found {found}")]
    Unexpected {
        line: usize,
        expected: String,
        found: String,
    },

    #[error("line {line}: unterminated string")]
    UnterminatedString { line: usize },

    #[error("line {line}: cc_import without a name")]
    MissingName { line: usize },

    #[error("line {line}: unknown attribute `{attribute}`")]
    UnknownAttribute { line: usize, attribute: String },

    #[error("invalid glob `{pattern}`: {message}")]
    Glob { pattern: String, message: String },
}

/// One `cc_import(...)` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportDecl {
    pub name: String,
    pub import: CcImport,
    /// Labels as written (`":other"`, `"//pkg:lib"`, `"@repo//:lib"`).
    pub deps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Punct(char),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("`{}`", s),
            Token::Str(s) => format!("\"{}\"", s),
            Token::Int(i) => i.to_string(),
            Token::Punct(c) => format!("`{}`", c),
        }
    }
}

fn tokenize(text: &str) -> Result<Vec<(usize, Token)>, ImportParseError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    let mut line = 1;

    while let Some(&c) = chars.peek() {
        match c {
            '\n' => {
                line += 1;
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '#' => {
                while chars.peek().is_some_and(|&c| c != '\n') {
                    chars.next();
                }
            }
            '"' | '\'' => {
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some(ch) if ch == c => break,
                        Some('\\') => {
                            if let Some(escaped) = chars.next() {
                                value.push(escaped);
                            }
                        }
                        Some('\n') | None => {
                            return Err(ImportParseError::UnterminatedString { line })
                        }
                        Some(ch) => value.push(ch),
                    }
                }
                tokens.push((line, Token::Str(value)));
            }
            c if c.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                    digits.push(d);
                    chars.next();
                }
                let value = digits.parse().map_err(|_| ImportParseError::Unexpected {
                    line,
                    expected: "a number".to_string(),
                    found: digits.clone(),
                })?;
                tokens.push((line, Token::Int(value)));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek().filter(|d| d.is_alphanumeric() || **d == '_') {
                    ident.push(d);
                    chars.next();
                }
                tokens.push((line, Token::Ident(ident)));
            }
            _ => {
                tokens.push((line, Token::Punct(c)));
                chars.next();
            }
        }
    }
    Ok(tokens)
}

/// Value of an attribute.
#[derive(Debug, Clone)]
enum Value {
    Str(String),
    List(Vec<String>),
    Bool(bool),
}

struct Parser<'a> {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    base: &'a Path,
}

impl<'a> Parser<'a> {
    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(l, _)| *l)
            .unwrap_or(1)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        token
    }

    fn unexpected(&self, expected: &str, found: Option<&Token>) -> ImportParseError {
        ImportParseError::Unexpected {
            line: self.line(),
            expected: expected.to_string(),
            found: found
                .map(Token::describe)
                .unwrap_or_else(|| "end of file".to_string()),
        }
    }

    fn expect_punct(&mut self, c: char) -> Result<(), ImportParseError> {
        match self.peek() {
            Some(Token::Punct(p)) if *p == c => {
                self.pos += 1;
                Ok(())
            }
            other => Err(self.unexpected(&format!("`{}`", c), other)),
        }
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if matches!(self.peek(), Some(Token::Punct(p)) if *p == c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_all(&mut self) -> Result<Vec<ImportDecl>, ImportParseError> {
        let mut decls = Vec::new();
        while let Some(token) = self.next() {
            match token {
                Token::Ident(ref rule) if rule == "cc_import" => {
                    decls.push(self.parse_block()?);
                }
                other => return Err(self.unexpected("`cc_import(`", Some(&other))),
            }
        }
        Ok(decls)
    }

    fn parse_block(&mut self) -> Result<ImportDecl, ImportParseError> {
        let start = self.line();
        self.expect_punct('(')?;
        let mut decl = ImportDecl::default();

        loop {
            if self.eat_punct(')') {
                break;
            }
            let line = self.line();
            let attribute = match self.next() {
                Some(Token::Ident(name)) => name,
                other => return Err(self.unexpected("an attribute name", other.as_ref())),
            };
            self.expect_punct('=')?;
            let value = self.parse_value()?;
            self.apply(&mut decl, line, &attribute, value)?;
            if !self.eat_punct(',') {
                self.expect_punct(')')?;
                break;
            }
        }

        if decl.name.is_empty() {
            return Err(ImportParseError::MissingName { line: start });
        }
        Ok(decl)
    }

    fn parse_value(&mut self) -> Result<Value, ImportParseError> {
        match self.next() {
            Some(Token::Str(s)) => Ok(Value::Str(s)),
            Some(Token::Int(i)) => Ok(Value::Bool(i != 0)),
            Some(Token::Ident(ident)) if ident == "True" => Ok(Value::Bool(true)),
            Some(Token::Ident(ident)) if ident == "False" => Ok(Value::Bool(false)),
            Some(Token::Ident(ident)) if ident == "glob" => {
                self.expect_punct('(')?;
                let patterns = self.parse_list()?;
                self.eat_punct(',');
                self.expect_punct(')')?;
                let files = glob_files(self.base, &patterns).map_err(|e| ImportParseError::Glob {
                    pattern: patterns.join(", "),
                    message: format!("{:#}", e),
                })?;
                Ok(Value::List(
                    files
                        .into_iter()
                        .map(|p| p.to_string_lossy().into_owned())
                        .collect(),
                ))
            }
            Some(Token::Punct('[')) => {
                self.pos -= 1;
                Ok(Value::List(self.parse_list()?))
            }
            other => Err(self.unexpected("a value", other.as_ref())),
        }
    }

    fn parse_list(&mut self) -> Result<Vec<String>, ImportParseError> {
        self.expect_punct('[')?;
        let mut items = Vec::new();
        loop {
            if self.eat_punct(']') {
                break;
            }
            match self.next() {
                Some(Token::Str(s)) => items.push(s),
                other => return Err(self.unexpected("a string", other.as_ref())),
            }
            if !self.eat_punct(',') {
                self.expect_punct(']')?;
                break;
            }
        }
        Ok(items)
    }

    fn apply(
        &self,
        decl: &mut ImportDecl,
        line: usize,
        attribute: &str,
        value: Value,
    ) -> Result<(), ImportParseError> {
        let mismatch = |expected: &str| ImportParseError::Unexpected {
            line,
            expected: format!("{} for `{}`", expected, attribute),
            found: "another kind of value".to_string(),
        };
        let import = &mut decl.import;
        match (attribute, value) {
            ("name", Value::Str(s)) => decl.name = s,
            ("hdrs", Value::List(items)) => import.hdrs = items,
            ("hdrs", Value::Str(s)) => import.hdrs = vec![s],
            ("includes", Value::List(items)) => import.includes = Some(items),
            ("deps", Value::List(items)) => decl.deps = items,
            ("static_library" | "static_libs", Value::Str(s)) => import.static_library = Some(s),
            ("shared_library" | "interface_library", Value::Str(s)) => {
                import.shared_library = Some(s)
            }
            ("skip_wrapping", Value::Bool(b)) => import.skip_wrapping = b,
            ("system_provided", Value::Bool(b)) => import.system_provided = b,
            ("system_provided", Value::Str(s)) => import.system_provided = s != "0",
            ("alias", Value::Str(s)) => import.alias = Some(s),
            ("visibility", _) => {}
            (
                "name" | "static_library" | "static_libs" | "shared_library" | "interface_library"
                | "alias",
                _,
            ) => return Err(mismatch("a string")),
            ("hdrs" | "includes" | "deps", _) => return Err(mismatch("a list")),
            ("skip_wrapping" | "system_provided", _) => return Err(mismatch("a boolean")),
            (other, _) => {
                return Err(ImportParseError::UnknownAttribute {
                    line,
                    attribute: other.to_string(),
                })
            }
        }
        Ok(())
    }
}

/// Parse the content of a descriptor file. Relative globs are expanded
/// against `base`.
pub fn parse_descriptor(text: &str, base: &Path) -> Result<Vec<ImportDecl>, ImportParseError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        base,
    };
    parser.parse_all()
}
