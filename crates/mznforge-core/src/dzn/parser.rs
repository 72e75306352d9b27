//! Recursive-descent parser from dzn tokens to values.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use super::lexer::{Spanned, Token};
use crate::error::MalformedDataError;
use crate::value::{Array, Assignment, IndexSet, Value};

/// Known enum domains, by name, with their literals in declaration order.
pub(crate) type Domains = IndexMap<String, Vec<String>>;

pub(crate) struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    domains: &'a mut Domains,
    strict_enums: bool,
}

type Result<T> = std::result::Result<T, MalformedDataError>;

impl<'a> Parser<'a> {
    pub(crate) fn new(tokens: &'a [Spanned], domains: &'a mut Domains, strict_enums: bool) -> Self {
        Self {
            tokens,
            pos: 0,
            domains,
            strict_enums,
        }
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Fails unless all tokens were consumed; a trailing `;` is allowed.
    pub(crate) fn expect_end(&mut self) -> Result<()> {
        if self.peek() == Some(&Token::Semi) {
            self.pos += 1;
        }
        if self.is_at_end() {
            Ok(())
        } else {
            Err(self.unexpected("end of value"))
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|s| &s.token)
    }

    fn current_pos(&self) -> usize {
        self.tokens.get(self.pos).map(|s| s.pos).unwrap_or(0)
    }

    fn advance(&mut self) -> Option<&'a Spanned> {
        let spanned = self.tokens.get(self.pos);
        if spanned.is_some() {
            self.pos += 1;
        }
        spanned
    }

    fn unexpected(&self, expected: &'static str) -> MalformedDataError {
        match self.tokens.get(self.pos) {
            Some(spanned) => MalformedDataError::UnexpectedToken {
                pos: spanned.pos,
                found: spanned.token.describe(),
                expected,
            },
            None => MalformedDataError::UnexpectedEnd { expected },
        }
    }

    fn expect(&mut self, token: Token, expected: &'static str) -> Result<()> {
        if self.peek() == Some(&token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    /// Parses `name = value;` statements until the end of input.
    pub(crate) fn parse_assignment(&mut self) -> Result<Assignment> {
        let mut assignment = Assignment::new();
        while !self.is_at_end() {
            // Stray separators are tolerated.
            if self.peek() == Some(&Token::Semi) {
                self.pos += 1;
                continue;
            }
            let name = match self.advance() {
                Some(Spanned {
                    token: Token::Ident(name),
                    ..
                }) if !is_reserved(name) => name.clone(),
                _ => {
                    self.pos -= 1;
                    return Err(self.unexpected("an identifier"));
                }
            };
            self.expect(Token::Equals, "'='")?;
            let value = self.parse_expr()?;
            match self.peek() {
                Some(Token::Semi) => self.pos += 1,
                None => {}
                Some(_) => return Err(self.unexpected("';'")),
            }

            if let Value::EnumSet(literals) = &value {
                if !self.strict_enums {
                    self.domains.insert(name.clone(), literals.clone());
                }
            }
            if assignment.contains_key(&name) {
                return Err(MalformedDataError::DuplicateIdentifier(name));
            }
            assignment.insert(name, value);
        }
        Ok(assignment)
    }

    pub(crate) fn parse_expr(&mut self) -> Result<Value> {
        match self.peek() {
            Some(Token::LBracket) => {
                let start = self.current_pos();
                let elements = self.parse_list(start)?;
                Ok(Value::Array(Array::from_vec(elements)?))
            }
            Some(Token::LBracketBar) => self.parse_2d(),
            Some(Token::LBrace) => self.parse_set(),
            Some(Token::Absent) => {
                self.pos += 1;
                Ok(Value::Absent)
            }
            Some(Token::Str(s)) => {
                let s = s.clone();
                self.pos += 1;
                Ok(Value::Str(s))
            }
            Some(Token::Ident(name)) => {
                let name = name.clone();
                if let Some(dims) = array_call_dims(&name) {
                    if self.peek_at(1) == Some(&Token::LParen) {
                        self.pos += 1;
                        return self.parse_array_call(dims);
                    }
                }
                self.pos += 1;
                match name.as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    _ => {
                        if self.peek() == Some(&Token::DotDot) {
                            return Err(MalformedDataError::TypeMismatch(format!(
                                "enum literal range starting at '{name}' is not supported"
                            )));
                        }
                        self.check_enum_literal(&name)?;
                        Ok(Value::Enum(name))
                    }
                }
            }
            Some(Token::Minus) | Some(Token::Number { .. }) => {
                let lo = self.parse_number()?;
                if self.peek() != Some(&Token::DotDot) {
                    return Ok(lo);
                }
                self.pos += 1;
                let hi = self.parse_number()?;
                match (lo, hi) {
                    (Value::Int(lo), Value::Int(hi)) => Ok(Value::IntRange(lo, hi)),
                    (Value::Float(lo), Value::Float(hi)) => Ok(Value::FloatRange(lo, hi)),
                    _ => Err(MalformedDataError::TypeMismatch(
                        "range bounds mix int and float".to_string(),
                    )),
                }
            }
            _ => Err(self.unexpected("a value")),
        }
    }

    fn parse_number(&mut self) -> Result<Value> {
        let negative = if self.peek() == Some(&Token::Minus) {
            self.pos += 1;
            true
        } else {
            false
        };
        let pos = self.current_pos();
        let (text, is_float) = match self.peek() {
            Some(Token::Number { text, is_float }) => (text.clone(), *is_float),
            _ => return Err(self.unexpected("a number")),
        };
        self.pos += 1;

        let sign = if negative { "-" } else { "" };
        let invalid = || MalformedDataError::InvalidNumber {
            literal: format!("{sign}{text}"),
            pos,
        };
        if is_float {
            return format!("{sign}{text}")
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| invalid());
        }
        let parsed = if let Some(hex) = text.strip_prefix("0x") {
            i64::from_str_radix(&format!("{sign}{hex}"), 16)
        } else if let Some(oct) = text.strip_prefix("0o") {
            i64::from_str_radix(&format!("{sign}{oct}"), 8)
        } else {
            format!("{sign}{text}").parse::<i64>()
        };
        parsed.map(Value::Int).map_err(|_| invalid())
    }

    // Parses `[e1, e2, ...]`, returning the elements.
    fn parse_list(&mut self, start: usize) -> Result<Vec<Value>> {
        self.expect(Token::LBracket, "'['")?;
        let mut elements = Vec::new();
        loop {
            match self.peek() {
                None => {
                    return Err(MalformedDataError::Unterminated {
                        what: "array",
                        pos: start,
                    })
                }
                Some(Token::RBracket) => {
                    self.pos += 1;
                    return Ok(elements);
                }
                _ => {}
            }
            elements.push(self.parse_expr()?);
            match self.peek() {
                Some(Token::Comma) => self.pos += 1,
                Some(Token::RBracket) => {}
                None => {
                    return Err(MalformedDataError::Unterminated {
                        what: "array",
                        pos: start,
                    })
                }
                Some(_) => return Err(self.unexpected("',' or ']'")),
            }
        }
    }

    // Parses the 2-D literal `[| a, b | c, d |]`.
    fn parse_2d(&mut self) -> Result<Value> {
        let start = self.current_pos();
        self.expect(Token::LBracketBar, "'[|'")?;
        let mut rows: Vec<Vec<Value>> = Vec::new();
        let mut row = Vec::new();
        loop {
            match self.peek() {
                None => {
                    return Err(MalformedDataError::Unterminated {
                        what: "2d array",
                        pos: start,
                    })
                }
                Some(Token::BarRBracket) => {
                    self.pos += 1;
                    if !row.is_empty() {
                        rows.push(row);
                    }
                    break;
                }
                Some(Token::Bar) => {
                    self.pos += 1;
                    rows.push(std::mem::take(&mut row));
                    continue;
                }
                _ => {}
            }
            row.push(self.parse_expr()?);
            match self.peek() {
                Some(Token::Comma) => self.pos += 1,
                Some(Token::Bar) | Some(Token::BarRBracket) => {}
                None => {
                    return Err(MalformedDataError::Unterminated {
                        what: "2d array",
                        pos: start,
                    })
                }
                Some(_) => return Err(self.unexpected("',' or '|'")),
            }
        }

        let cols = rows.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = rows.iter().find(|r| r.len() != cols) {
            return Err(MalformedDataError::DimensionMismatch {
                expected: cols,
                found: bad.len(),
            });
        }
        let row_count = i64::try_from(rows.len()).unwrap_or(i64::MAX);
        let col_count = i64::try_from(cols).unwrap_or(i64::MAX);
        let array = Array::new(
            vec![IndexSet::range(1, row_count), IndexSet::range(1, col_count)],
            rows.into_iter().flatten().collect(),
        )?;
        Ok(Value::Array(array))
    }

    // Parses `arrayNd(s1, ..., sN, [elements])` after the function name.
    fn parse_array_call(&mut self, dims: usize) -> Result<Value> {
        let start = self.current_pos();
        self.expect(Token::LParen, "'('")?;
        let mut index_sets = Vec::new();
        let elements = loop {
            match self.peek() {
                None => {
                    return Err(MalformedDataError::Unterminated {
                        what: "array call",
                        pos: start,
                    })
                }
                Some(Token::LBracket) => {
                    let list_start = self.current_pos();
                    break self.parse_list(list_start)?;
                }
                _ => {
                    index_sets.push(self.parse_index_set()?);
                    self.expect(Token::Comma, "','")?;
                }
            }
        };
        self.expect(Token::RParen, "')'")?;

        if index_sets.len() != dims {
            return Err(MalformedDataError::ArityMismatch {
                declared: dims,
                found: index_sets.len(),
            });
        }
        Ok(Value::Array(Array::new(index_sets, elements)?))
    }

    fn parse_index_set(&mut self) -> Result<IndexSet> {
        match self.peek() {
            Some(Token::Ident(name)) if !is_reserved(name) => {
                let name = name.clone();
                if self.peek_at(1) == Some(&Token::DotDot) {
                    return Err(MalformedDataError::UnsupportedIndexSet(format!(
                        "enum literal range starting at '{name}'"
                    )));
                }
                self.pos += 1;
                let literals = self
                    .domains
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| MalformedDataError::UnknownEnum(name.clone()))?;
                Ok(IndexSet::Enum { name, literals })
            }
            Some(Token::LBrace) => Err(MalformedDataError::UnsupportedIndexSet(
                "set literal".to_string(),
            )),
            Some(Token::Minus) | Some(Token::Number { .. }) => {
                let lo = self.parse_number()?;
                self.expect(Token::DotDot, "'..'")?;
                let hi = self.parse_number()?;
                match (lo, hi) {
                    (Value::Int(lo), Value::Int(hi)) => Ok(IndexSet::range(lo, hi)),
                    _ => Err(MalformedDataError::TypeMismatch(
                        "index set bounds must be integers".to_string(),
                    )),
                }
            }
            _ => Err(self.unexpected("an index set")),
        }
    }

    fn parse_set(&mut self) -> Result<Value> {
        let start = self.current_pos();
        self.expect(Token::LBrace, "'{'")?;
        let mut ints = BTreeSet::new();
        let mut floats = Vec::new();
        let mut literals: Vec<String> = Vec::new();

        loop {
            match self.peek() {
                None => {
                    return Err(MalformedDataError::Unterminated {
                        what: "set",
                        pos: start,
                    })
                }
                Some(Token::RBrace) => {
                    self.pos += 1;
                    break;
                }
                Some(Token::Ident(name)) if !is_reserved(name) => {
                    let name = name.clone();
                    self.pos += 1;
                    if !literals.contains(&name) {
                        literals.push(name);
                    }
                }
                Some(Token::Minus) | Some(Token::Number { .. }) => match self.parse_number()? {
                    Value::Int(v) => {
                        ints.insert(v);
                    }
                    Value::Float(v) => floats.push(v),
                    _ => unreachable!("parse_number yields numbers"),
                },
                _ => return Err(self.unexpected("a set element")),
            }
            match self.peek() {
                Some(Token::Comma) => self.pos += 1,
                Some(Token::RBrace) => {}
                None => {
                    return Err(MalformedDataError::Unterminated {
                        what: "set",
                        pos: start,
                    })
                }
                Some(_) => return Err(self.unexpected("',' or '}'")),
            }
        }

        let kinds = [!ints.is_empty(), !floats.is_empty(), !literals.is_empty()];
        if kinds.iter().filter(|k| **k).count() > 1 {
            return Err(MalformedDataError::TypeMismatch(
                "set mixes elements of different types".to_string(),
            ));
        }
        if !floats.is_empty() {
            return Ok(Value::float_set(floats));
        }
        if !literals.is_empty() {
            for literal in &literals {
                self.check_enum_literal(literal)?;
            }
            return Ok(Value::EnumSet(literals));
        }
        Ok(Value::IntSet(ints))
    }

    fn check_enum_literal(&self, literal: &str) -> Result<()> {
        if !self.strict_enums || self.domains.values().any(|d| d.iter().any(|l| l == literal)) {
            Ok(())
        } else {
            Err(MalformedDataError::UnknownEnumLiteral {
                literal: literal.to_string(),
            })
        }
    }
}

pub(crate) fn is_reserved(name: &str) -> bool {
    matches!(name, "true" | "false") || array_call_dims(name).is_some()
}

// `array3d` -> Some(3)
fn array_call_dims(name: &str) -> Option<usize> {
    let digits = name.strip_prefix("array")?.strip_suffix('d')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|d| *d > 0)
}
