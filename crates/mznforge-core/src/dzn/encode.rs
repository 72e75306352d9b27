//! Writing values as dzn text.

use std::fmt::Write;

use indexmap::IndexMap;

use super::parser::is_reserved;
use crate::error::MalformedDataError;
use crate::value::{Array, Assignment, IndexSet, Value};

type Result<T> = std::result::Result<T, MalformedDataError>;

pub(crate) fn write_assignment(
    assignment: &Assignment,
    declared: &IndexMap<String, Vec<String>>,
) -> Result<String> {
    let domains = index_domains(assignment, declared)?;

    let mut out = String::new();
    // Enum domains used as index sets must be declared before use.
    for (name, literals) in &domains {
        if declared.contains_key(*name) {
            continue;
        }
        check_identifier(name)?;
        let _ = write!(out, "{name} = ");
        write_value(&mut out, &Value::EnumSet(literals.to_vec()))?;
        out.push_str(";\n");
    }
    for (name, value) in assignment {
        if domains.contains_key(name.as_str()) {
            continue;
        }
        check_identifier(name)?;
        let _ = write!(out, "{name} = ");
        write_value(&mut out, value)?;
        out.push_str(";\n");
    }
    Ok(out)
}

// Collects the enum domains named by array index sets, checked against the
// assignment's own enum sets and the domains declared elsewhere.
fn index_domains<'a>(
    assignment: &'a Assignment,
    declared: &IndexMap<String, Vec<String>>,
) -> Result<IndexMap<&'a str, &'a [String]>> {
    let mut domains: IndexMap<&str, &[String]> = IndexMap::new();
    for set in assignment
        .values()
        .filter_map(Value::as_array)
        .flat_map(Array::index_sets)
    {
        let IndexSet::Enum { name, literals } = set else {
            continue;
        };
        match domains.get(name.as_str()) {
            Some(known) if *known != literals.as_slice() => {
                return Err(MalformedDataError::ConflictingDomain(name.clone()))
            }
            Some(_) => {}
            None => {
                domains.insert(name.as_str(), literals.as_slice());
            }
        }
    }

    for (name, literals) in &domains {
        let assigned = match assignment.get(*name) {
            Some(Value::EnumSet(assigned)) => Some(assigned),
            Some(_) => return Err(MalformedDataError::ConflictingDomain(name.to_string())),
            None => None,
        };
        let conflicts = assigned
            .into_iter()
            .chain(declared.get(*name))
            .any(|other| other.as_slice() != *literals);
        if conflicts {
            return Err(MalformedDataError::ConflictingDomain(name.to_string()));
        }
    }
    Ok(domains)
}

// Every enum index set of `value` must name a declared domain with the
// same literals.
pub(crate) fn check_declared(value: &Value, declared: &IndexMap<String, Vec<String>>) -> Result<()> {
    let Some(array) = value.as_array() else {
        return Ok(());
    };
    for set in array.index_sets() {
        if let IndexSet::Enum { name, literals } = set {
            match declared.get(name) {
                None => return Err(MalformedDataError::UnknownEnum(name.clone())),
                Some(known) if known != literals => {
                    return Err(MalformedDataError::ConflictingDomain(name.clone()))
                }
                Some(_) => {}
            }
        }
    }
    Ok(())
}

pub(crate) fn write_value(out: &mut String, value: &Value) -> Result<()> {
    match value {
        Value::Int(v) => {
            let _ = write!(out, "{v}");
        }
        Value::Float(v) => write_float(out, *v)?,
        Value::Bool(v) => {
            let _ = write!(out, "{v}");
        }
        Value::Str(s) => write_string(out, s),
        Value::IntSet(set) => {
            let first = set.first().copied();
            let last = set.last().copied();
            match (first, last) {
                (Some(lo), Some(hi))
                    if set.len() > 1 && i128::from(hi) - i128::from(lo) + 1 == set.len() as i128 =>
                {
                    let _ = write!(out, "{lo}..{hi}");
                }
                _ => write_braced(out, set.iter(), |out, v| {
                    let _ = write!(out, "{v}");
                    Ok(())
                })?,
            }
        }
        Value::IntRange(lo, hi) => {
            let _ = write!(out, "{lo}..{hi}");
        }
        Value::FloatSet(values) => {
            let mut sorted = values.clone();
            sorted.sort_by(f64::total_cmp);
            sorted.dedup();
            write_braced(out, sorted.iter(), |out, v| write_float(out, *v))?;
        }
        Value::FloatRange(lo, hi) => {
            write_float(out, *lo)?;
            out.push_str("..");
            write_float(out, *hi)?;
        }
        Value::EnumSet(literals) => write_braced(out, literals.iter(), |out, l| {
            check_identifier(l)?;
            out.push_str(l);
            Ok(())
        })?,
        Value::Enum(literal) => {
            check_identifier(literal)?;
            out.push_str(literal);
        }
        Value::Array(array) => write_array(out, array)?,
        Value::Absent => out.push_str("<>"),
    }
    Ok(())
}

fn write_array(out: &mut String, array: &Array) -> Result<()> {
    if !array.is_one_based_list() {
        let _ = write!(out, "array{}d(", array.dims());
        for set in array.index_sets() {
            match set {
                IndexSet::Range { lo, hi } => {
                    let _ = write!(out, "{lo}..{hi}");
                }
                IndexSet::Enum { name, .. } => {
                    check_identifier(name)?;
                    out.push_str(name);
                }
            }
            out.push_str(", ");
        }
    }
    out.push('[');
    for (i, element) in array.elements().iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_value(out, element)?;
    }
    out.push(']');
    if !array.is_one_based_list() {
        out.push(')');
    }
    Ok(())
}

fn write_braced<'a, T: 'a>(
    out: &mut String,
    items: impl Iterator<Item = &'a T>,
    mut write_item: impl FnMut(&mut String, &T) -> Result<()>,
) -> Result<()> {
    out.push('{');
    for (i, item) in items.enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_item(out, item)?;
    }
    out.push('}');
    Ok(())
}

// Debug formatting gives the shortest text that parses back to the same
// f64 and always contains a '.' or an exponent.
fn write_float(out: &mut String, v: f64) -> Result<()> {
    if !v.is_finite() {
        return Err(MalformedDataError::Unrepresentable(format!("float {v}")));
    }
    let _ = write!(out, "{v:?}");
    Ok(())
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
}

pub(crate) fn check_identifier(name: &str) -> Result<()> {
    let mut bytes = name.bytes();
    let valid_start = bytes
        .next()
        .is_some_and(|b| b.is_ascii_alphabetic() || b == b'_');
    if valid_start && bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_') && !is_reserved(name) {
        Ok(())
    } else {
        Err(MalformedDataError::InvalidIdentifier(name.to_string()))
    }
}
