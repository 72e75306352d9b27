//! The dzn data codec.
//!
//! Converts between MiniZinc's flat data-interchange text and
//! [`Assignment`]s. Encoding is lossless: `decode(&encode(&a)?)? == a` for
//! every assignment whose floats are finite and whose names are valid
//! MiniZinc identifiers.
//!
//! # Grammar
//!
//! - scalars: `5`, `-3`, `0x1F`, `2.5`, `1e-3`, `true`, `"text"`, `Red`, `<>`
//! - sets: `{1, 3}`, `1..5`, `{1.5, 2.0}`, `1.0..2.5`, `{Red, Blue}`
//! - arrays: `[1, 2]`, `array2d(1..2, 0..1, [1, 2, 3, 4])`,
//!   `array1d(Color, [...])`, and the 2-D literal `[| 1, 2 | 3, 4 |]`
//!
//! Index sets of `arrayNd` calls are integer ranges or names of known enum
//! domains. An enum domain becomes known when the text assigns it a set of
//! literals (`Color = {Red, Green};`) or when it is registered on a
//! [`Decoder`].

mod encode;
mod lexer;
mod parser;

use indexmap::IndexMap;

use crate::error::MalformedDataError;
use crate::value::{Assignment, Value};

use self::parser::Parser;

/// Encodes an assignment as dzn text, one statement per line.
///
/// Enum domains used as array index sets are declared first, so the text
/// decodes without pre-registered domains. A domain missing from the
/// assignment is written as `Name = {A, B};` from the index set and shows
/// up as an extra identifier when the text is decoded. Use an [`Encoder`]
/// when the domains are declared elsewhere, such as in the model.
///
/// # Errors
///
/// Returns [`MalformedDataError::Unrepresentable`] for non-finite floats,
/// [`MalformedDataError::InvalidIdentifier`] for names that are not MiniZinc
/// identifiers and [`MalformedDataError::ConflictingDomain`] when index sets
/// and enum sets disagree on the literals of a domain.
pub fn encode(assignment: &Assignment) -> Result<String, MalformedDataError> {
    Encoder::new().encode(assignment)
}

/// Encodes a single value.
///
/// Enum index sets are written by name only; decoding the text back needs
/// a [`Decoder`] with the domain registered. [`Encoder::encode_value`]
/// checks them against registered domains instead.
pub fn encode_value(value: &Value) -> Result<String, MalformedDataError> {
    let mut out = String::new();
    encode::write_value(&mut out, value)?;
    Ok(out)
}

/// Decodes dzn text into an assignment.
pub fn decode(text: &str) -> Result<Assignment, MalformedDataError> {
    Decoder::new().decode(text)
}

/// Decodes a single value expression.
pub fn decode_value(text: &str) -> Result<Value, MalformedDataError> {
    Decoder::new().decode_value(text)
}

/// A dzn encoder that knows enum domains declared outside the data.
///
/// Registered domains are not written again, and enum index sets must
/// agree with them. Pair it with a [`Decoder`] holding the same domains.
///
/// # Examples
///
/// ```
/// use mznforge_core::{Array, Decoder, Encoder, IndexSet, Value};
///
/// let color = IndexSet::enumerated("Color", vec!["Red".into(), "Green".into()]);
/// let value = Value::Array(Array::new(vec![color], vec![Value::Int(3), Value::Int(4)]).unwrap());
///
/// let text = Encoder::new().with_enum("Color", ["Red", "Green"]).encode_value(&value).unwrap();
/// assert_eq!(text, "array1d(Color, [3, 4])");
///
/// let decoder = Decoder::new().with_enum("Color", ["Red", "Green"]);
/// assert_eq!(decoder.decode_value(&text).unwrap(), value);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    domains: IndexMap<String, Vec<String>>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an enum domain declared outside the encoded text.
    pub fn with_enum<I, S>(mut self, name: impl Into<String>, literals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domains
            .insert(name.into(), literals.into_iter().map(Into::into).collect());
        self
    }

    /// Encodes an assignment, declaring only the unregistered domains.
    pub fn encode(&self, assignment: &Assignment) -> Result<String, MalformedDataError> {
        encode::write_assignment(assignment, &self.domains)
    }

    /// Encodes a single value whose enum index sets are all registered.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedDataError::UnknownEnum`] for an unregistered
    /// index set and [`MalformedDataError::ConflictingDomain`] when its
    /// literals differ from the registered ones.
    pub fn encode_value(&self, value: &Value) -> Result<String, MalformedDataError> {
        encode::check_declared(value, &self.domains)?;
        encode_value(value)
    }
}

/// A configurable dzn decoder.
///
/// # Examples
///
/// ```
/// use mznforge_core::{Decoder, IndexSet, Value};
///
/// let decoder = Decoder::new().with_enum("Color", ["Red", "Green"]);
/// let value = decoder.decode_value("array1d(Color, [3, 4])").unwrap();
///
/// let array = value.as_array().unwrap();
/// assert!(matches!(&array.index_sets()[0], IndexSet::Enum { name, .. } if name == "Color"));
/// assert_eq!(array.elements(), &[Value::Int(3), Value::Int(4)]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    domains: IndexMap<String, Vec<String>>,
    strict_enums: bool,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an enum domain usable as an index set.
    pub fn with_enum<I, S>(mut self, name: impl Into<String>, literals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domains
            .insert(name.into(), literals.into_iter().map(Into::into).collect());
        self
    }

    /// Requires every enum literal to belong to a registered domain.
    ///
    /// In strict mode, sets of literals in the text do not declare new
    /// domains.
    pub fn strict_enums(mut self, strict: bool) -> Self {
        self.strict_enums = strict;
        self
    }

    /// Returns the registered domain literals for `name`.
    pub fn domain(&self, name: &str) -> Option<&[String]> {
        self.domains.get(name).map(Vec::as_slice)
    }

    pub fn decode(&self, text: &str) -> Result<Assignment, MalformedDataError> {
        let tokens = lexer::tokenize(text)?;
        let mut domains = self.domains.clone();
        Parser::new(&tokens, &mut domains, self.strict_enums).parse_assignment()
    }

    pub fn decode_value(&self, text: &str) -> Result<Value, MalformedDataError> {
        let tokens = lexer::tokenize(text)?;
        let mut domains = self.domains.clone();
        let mut parser = Parser::new(&tokens, &mut domains, self.strict_enums);
        let value = parser.parse_expr()?;
        parser.expect_end()?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests;
