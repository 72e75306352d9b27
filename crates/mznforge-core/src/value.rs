//! Structured MiniZinc values.
//!
//! A [`Value`] mirrors the data the MiniZinc toolkit can exchange through
//! dzn text. Arrays are stored flattened in row-major order together with
//! one [`IndexSet`] per dimension.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::error::MalformedDataError;

/// Identifier-to-value bindings, kept in insertion order.
///
/// Equality ignores order, so an assignment compares equal to its decoded
/// re-encoding even if statements were reordered.
pub type Assignment = IndexMap<String, Value>;

/// A single MiniZinc value.
///
/// Empty sets carry no element type: `IntSet({})`, `FloatSet([])` and
/// `EnumSet([])` all compare equal.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    /// A set of integers. Contiguous sets are written as ranges.
    IntSet(BTreeSet<i64>),
    /// The contiguous integer set `lo..hi`, empty when `hi < lo`.
    IntRange(i64, i64),
    /// A finite set of floats.
    FloatSet(Vec<f64>),
    /// A continuous float interval `lo..hi`.
    FloatRange(f64, f64),
    /// A set of enum literals, in declaration order.
    EnumSet(Vec<String>),
    /// A single enum literal.
    Enum(String),
    Array(Array),
    /// The absent value `<>` of an optional variable.
    Absent,
}

/// The kind of a value, used to check array homogeneity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Int,
    Float,
    Bool,
    Str,
    IntSet,
    FloatSet,
    EnumSet,
    /// An empty set, compatible with every set kind.
    EmptySet,
    Enum,
    Array,
    /// `<>`, compatible with every kind.
    Absent,
}

impl ValueKind {
    fn is_set(self) -> bool {
        matches!(
            self,
            ValueKind::IntSet | ValueKind::FloatSet | ValueKind::EnumSet | ValueKind::EmptySet
        )
    }

    /// Returns true if values of both kinds may share one array.
    pub fn is_compatible_with(self, other: ValueKind) -> bool {
        if self == other || self == ValueKind::Absent || other == ValueKind::Absent {
            return true;
        }
        (self == ValueKind::EmptySet && other.is_set())
            || (other == ValueKind::EmptySet && self.is_set())
    }
}

impl Value {
    /// Creates a float set, sorting and deduplicating the elements.
    pub fn float_set(values: impl IntoIterator<Item = f64>) -> Self {
        Value::FloatSet(normalize_floats(values.into_iter().collect()))
    }

    /// Creates an integer set from any iterator of integers.
    pub fn int_set(values: impl IntoIterator<Item = i64>) -> Self {
        Value::IntSet(values.into_iter().collect())
    }

    /// Creates the contiguous integer set `lo..hi` (empty when `hi < lo`).
    pub fn int_range(lo: i64, hi: i64) -> Self {
        Value::IntRange(lo, hi)
    }

    /// Creates an enum literal.
    pub fn enum_literal(name: impl Into<String>) -> Self {
        Value::Enum(name.into())
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Bool(_) => ValueKind::Bool,
            Value::Str(_) => ValueKind::Str,
            Value::IntSet(s) if s.is_empty() => ValueKind::EmptySet,
            Value::IntSet(_) => ValueKind::IntSet,
            Value::IntRange(lo, hi) if hi < lo => ValueKind::EmptySet,
            Value::IntRange(..) => ValueKind::IntSet,
            Value::FloatSet(s) if s.is_empty() => ValueKind::EmptySet,
            Value::FloatSet(_) | Value::FloatRange(..) => ValueKind::FloatSet,
            Value::EnumSet(s) if s.is_empty() => ValueKind::EmptySet,
            Value::EnumSet(_) => ValueKind::EnumSet,
            Value::Enum(_) => ValueKind::Enum,
            Value::Array(_) => ValueKind::Array,
            Value::Absent => ValueKind::Absent,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the text of a string value or an enum literal.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the elements of an integer set or range. The empty set of
    /// any kind yields an empty set.
    pub fn as_int_set(&self) -> Option<BTreeSet<i64>> {
        match self {
            Value::IntSet(s) => Some(s.clone()),
            Value::IntRange(lo, hi) => Some((*lo..=*hi).collect()),
            other if other.kind() == ValueKind::EmptySet => Some(BTreeSet::new()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::IntSet(a), Value::IntSet(b)) => a == b,
            (Value::IntRange(a_lo, a_hi), Value::IntRange(b_lo, b_hi)) => {
                (a_lo == b_lo && a_hi == b_hi) || (a_hi < a_lo && b_hi < b_lo)
            }
            (Value::IntSet(set), Value::IntRange(lo, hi))
            | (Value::IntRange(lo, hi), Value::IntSet(set)) => set_matches_range(set, *lo, *hi),
            (Value::FloatSet(a), Value::FloatSet(b)) => {
                normalize_floats(a.clone()) == normalize_floats(b.clone())
            }
            (Value::FloatRange(a_lo, a_hi), Value::FloatRange(b_lo, b_hi)) => {
                a_lo == b_lo && a_hi == b_hi
            }
            (Value::EnumSet(a), Value::EnumSet(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Absent, Value::Absent) => true,
            (a, b) => a.kind() == ValueKind::EmptySet && b.kind() == ValueKind::EmptySet,
        }
    }
}

fn set_matches_range(set: &BTreeSet<i64>, lo: i64, hi: i64) -> bool {
    if hi < lo {
        return set.is_empty();
    }
    let span = i128::from(hi) - i128::from(lo) + 1;
    set.first() == Some(&lo) && set.last() == Some(&hi) && set.len() as i128 == span
}

fn normalize_floats(mut values: Vec<f64>) -> Vec<f64> {
    values.sort_by(f64::total_cmp);
    values.dedup();
    values
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<BTreeSet<i64>> for Value {
    fn from(v: BTreeSet<i64>) -> Self {
        Value::IntSet(v)
    }
}

impl From<Array> for Value {
    fn from(v: Array) -> Self {
        Value::Array(v)
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::Array(Array::one_based(v.into_iter().map(Value::Int).collect()))
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::Array(Array::one_based(v.into_iter().map(Value::Float).collect()))
    }
}

impl From<Vec<bool>> for Value {
    fn from(v: Vec<bool>) -> Self {
        Value::Array(Array::one_based(v.into_iter().map(Value::Bool).collect()))
    }
}

/// The index set of one array dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexSet {
    /// The contiguous integer range `lo..hi`, empty when `hi < lo`.
    Range { lo: i64, hi: i64 },
    /// An enumerated domain, referenced by name in dzn text.
    Enum { name: String, literals: Vec<String> },
}

impl IndexSet {
    pub fn range(lo: i64, hi: i64) -> Self {
        IndexSet::Range { lo, hi }
    }

    pub fn enumerated(name: impl Into<String>, literals: Vec<String>) -> Self {
        IndexSet::Enum {
            name: name.into(),
            literals,
        }
    }

    /// Number of indices in this set.
    pub fn len(&self) -> usize {
        match self {
            IndexSet::Range { lo, hi } if hi < lo => 0,
            IndexSet::Range { lo, hi } => {
                usize::try_from(i128::from(*hi) - i128::from(*lo) + 1).unwrap_or(usize::MAX)
            }
            IndexSet::Enum { literals, .. } => literals.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Position of an integer index within a range index set.
    fn position(&self, index: i64) -> Option<usize> {
        match self {
            IndexSet::Range { lo, hi } if index >= *lo && index <= *hi => {
                usize::try_from(i128::from(index) - i128::from(*lo)).ok()
            }
            _ => None,
        }
    }
}

/// An N-dimensional array, stored flattened in row-major order.
///
/// Elements are homogeneous and never arrays themselves; the product of the
/// index set lengths always equals the number of elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    index_sets: Vec<IndexSet>,
    elements: Vec<Value>,
}

impl Array {
    /// Creates an array, validating shape and element homogeneity.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedDataError`] if there are no index sets, the
    /// element count does not match the index sets, elements of different
    /// kinds are mixed, or an element is itself an array.
    pub fn new(index_sets: Vec<IndexSet>, elements: Vec<Value>) -> Result<Self, MalformedDataError> {
        if index_sets.is_empty() {
            return Err(MalformedDataError::ArityMismatch {
                declared: 0,
                found: 0,
            });
        }
        let expected = index_sets
            .iter()
            .try_fold(1usize, |acc, set| acc.checked_mul(set.len()))
            .unwrap_or(usize::MAX);
        if expected != elements.len() {
            return Err(MalformedDataError::DimensionMismatch {
                expected,
                found: elements.len(),
            });
        }
        check_homogeneous(&elements)?;
        Ok(Self {
            index_sets,
            elements,
        })
    }

    /// Creates a 1-D array indexed from 1.
    pub fn from_vec(elements: Vec<Value>) -> Result<Self, MalformedDataError> {
        check_homogeneous(&elements)?;
        Ok(Self::one_based(elements))
    }

    // Callers guarantee homogeneity.
    fn one_based(elements: Vec<Value>) -> Self {
        let hi = i64::try_from(elements.len()).unwrap_or(i64::MAX);
        Self {
            index_sets: vec![IndexSet::range(1, hi)],
            elements,
        }
    }

    pub fn index_sets(&self) -> &[IndexSet] {
        &self.index_sets
    }

    pub fn elements(&self) -> &[Value] {
        &self.elements
    }

    pub fn into_elements(self) -> Vec<Value> {
        self.elements
    }

    /// Number of dimensions.
    pub fn dims(&self) -> usize {
        self.index_sets.len()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Returns true for a 1-D array indexed from 1, written as `[...]`.
    pub fn is_one_based_list(&self) -> bool {
        match self.index_sets.as_slice() {
            [IndexSet::Range { lo, .. }] => *lo == 1,
            _ => false,
        }
    }

    /// Looks up an element by integer indices, one per dimension.
    ///
    /// Returns `None` for out-of-range indices or enum-indexed dimensions.
    pub fn get(&self, indices: &[i64]) -> Option<&Value> {
        if indices.len() != self.index_sets.len() {
            return None;
        }
        let mut offset = 0usize;
        for (set, index) in self.index_sets.iter().zip(indices) {
            offset = offset.checked_mul(set.len())? + set.position(*index)?;
        }
        self.elements.get(offset)
    }
}

fn check_homogeneous(elements: &[Value]) -> Result<(), MalformedDataError> {
    let mut seen: Option<ValueKind> = None;
    for element in elements {
        let kind = element.kind();
        if kind == ValueKind::Array {
            return Err(MalformedDataError::TypeMismatch(
                "arrays cannot contain arrays".to_string(),
            ));
        }
        match seen {
            Some(prev) if !prev.is_compatible_with(kind) => {
                return Err(MalformedDataError::TypeMismatch(format!(
                    "array mixes {prev:?} and {kind:?} elements"
                )));
            }
            Some(ValueKind::Absent) | Some(ValueKind::EmptySet) | None => seen = Some(kind),
            Some(_) => {}
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "value_tests.rs"]
mod tests;
