//! Restricting solver output to chosen variables.
//!
//! In `--output-mode dzn` MiniZinc ignores the model's output item and
//! prints its output variables. Declarations annotated with
//! `:: add_to_output` replace the default set, so marking the chosen
//! variables is enough to restrict each solution block to them.

use crate::error::AssemblyError;

const ANNOTATION: &str = " :: add_to_output";

// Items that open with these keywords never declare a variable.
const NON_DECLARATIONS: [&str; 10] = [
    "annotation",
    "constraint",
    "enum",
    "function",
    "include",
    "output",
    "predicate",
    "solve",
    "test",
    "type",
];

/// Marks the declarations of `names` in `model` as output variables.
///
/// # Errors
///
/// Returns [`AssemblyError::UnknownOutputVar`] for a name the model does
/// not declare.
///
/// # Examples
///
/// ```
/// use mznforge_solver::annotate_output;
///
/// let model = "var 1..3: x;\nvar 1..3: y;\nsolve satisfy;";
/// let marked = annotate_output(model, &["y".to_string()]).unwrap();
/// assert_eq!(marked, "var 1..3: x;\nvar 1..3: y :: add_to_output;\nsolve satisfy;");
/// ```
pub fn annotate_output(model: &str, names: &[String]) -> Result<String, AssemblyError> {
    let masked = mask(model);
    let mut inserts = Vec::new();
    let mut start = 0;
    for item in masked.split(|b| *b == b';') {
        if let Some((end, name)) = declared_name(item) {
            if names.iter().any(|n| n.as_bytes() == name) {
                inserts.push((start + end, &model[start + end - name.len()..start + end]));
            }
        }
        start += item.len() + 1;
    }

    if let Some(missing) = names
        .iter()
        .find(|n| !inserts.iter().any(|(_, name)| *name == n.as_str()))
    {
        return Err(AssemblyError::UnknownOutputVar(missing.clone()));
    }

    let mut out = String::with_capacity(model.len() + inserts.len() * ANNOTATION.len());
    let mut last = 0;
    for (at, _) in inserts {
        out.push_str(&model[last..at]);
        out.push_str(ANNOTATION);
        last = at;
    }
    out.push_str(&model[last..]);
    Ok(out)
}

// Finds the declared name of one item, returning the byte offset just past
// the name. The first `:` outside brackets separates type and name.
fn declared_name(item: &[u8]) -> Option<(usize, &[u8])> {
    let keyword_start = item.iter().position(|b| !b.is_ascii_whitespace())?;
    let keyword_len = identifier_len(&item[keyword_start..]);
    if NON_DECLARATIONS
        .iter()
        .any(|k| k.as_bytes() == &item[keyword_start..keyword_start + keyword_len])
    {
        return None;
    }

    let mut depth = 0i32;
    for (i, b) in item.iter().enumerate() {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b'=' if depth == 0 => return None,
            b':' if depth == 0 => {
                if item.get(i + 1) == Some(&b':') {
                    return None;
                }
                let rest = &item[i + 1..];
                let name_start = i + 1 + rest.iter().position(|b| !b.is_ascii_whitespace())?;
                let name_len = identifier_len(&item[name_start..]);
                if name_len == 0 {
                    return None;
                }
                let end = name_start + name_len;
                return Some((end, &item[name_start..end]));
            }
            _ => {}
        }
    }
    None
}

fn identifier_len(text: &[u8]) -> usize {
    text.iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
        .count()
}

// Blanks comments and string contents so `;` and `:` inside them are not
// taken for structure. Byte offsets are preserved.
fn mask(model: &str) -> Vec<u8> {
    let bytes = model.as_bytes();
    let mut out = bytes.to_vec();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\\' && i + 1 < bytes.len() {
                        out[i] = b' ';
                        i += 1;
                    }
                    out[i] = b' ';
                    i += 1;
                }
            }
            b'%' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    out[i] = b' ';
                    i += 1;
                }
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let start = i;
                i += 2;
                while i < bytes.len() && !(bytes[i - 1] == b'*' && bytes[i] == b'/' && i > start + 2) {
                    i += 1;
                }
                let end = (i + 1).min(bytes.len());
                out[start..end].fill(b' ');
                i = end;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    out
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
