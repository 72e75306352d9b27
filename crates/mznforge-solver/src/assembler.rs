//! Model assembly.
//!
//! Combines a model, any number of data sources and an inline assignment into
//! a [`Payload`] ready to hand to the process driver.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use mznforge_core::{Assignment, Decoder, Encoder, Value};
use tracing::debug;

use crate::error::AssemblyError;
use crate::output::annotate_output;
use crate::template::{HandlebarsEngine, TemplateEngine, TemplateVars};

/// Where the model comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// A `.mzn` file.
    File(PathBuf),
    /// Model text.
    Text(String),
}

impl ModelSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        ModelSource::File(path.into())
    }

    pub fn text(text: impl Into<String>) -> Self {
        ModelSource::Text(text.into())
    }
}

/// Where a data segment comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// A `.dzn` file.
    File(PathBuf),
    /// dzn text.
    Text(String),
}

impl DataSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        DataSource::File(path.into())
    }

    pub fn text(text: impl Into<String>) -> Self {
        DataSource::Text(text.into())
    }
}

/// Model and data text for one invocation. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    name: String,
    model: String,
    data: String,
    assignment: Assignment,
    enums: IndexMap<String, Vec<String>>,
}

impl Payload {
    /// Creates a payload from model text and an already merged assignment.
    ///
    /// Enums the model defines are not declared again in the data.
    pub fn new(
        name: impl Into<String>,
        model: impl Into<String>,
        assignment: Assignment,
    ) -> Result<Self, AssemblyError> {
        let model = model.into();
        let enums = model_enums(&model);
        let encoder = enums
            .iter()
            .fold(Encoder::new(), |encoder, (name, literals)| {
                encoder.with_enum(name.clone(), literals.clone())
            });
        let data = encoder.encode(&assignment).map_err(|source| AssemblyError::Data {
            origin: "merged data".to_string(),
            source,
        })?;
        Ok(Self {
            name: sanitize_name(&name.into()),
            model,
            data,
            assignment,
            enums,
        })
    }

    /// Base name used for generated files and log fields.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// The merged data encoded as dzn text.
    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    /// Enums defined with their literals in the model.
    pub fn model_enums(&self) -> &IndexMap<String, Vec<String>> {
        &self.enums
    }
}

/// Builds payloads.
///
/// ```
/// use mznforge_core::{Assignment, Value};
/// use mznforge_solver::{Assembler, DataSource, ModelSource, TemplateVars};
///
/// let mut extra = Assignment::new();
/// extra.insert("capacity".into(), Value::Int(20));
///
/// let payload = Assembler::new()
///     .assemble(
///         &ModelSource::text("int: n; int: capacity; % comment\n"),
///         &[DataSource::text("n = 5; capacity = 10;")],
///         &extra,
///         &TemplateVars::new(),
///     )
///     .unwrap();
///
/// assert_eq!(payload.model(), "int: n; int: capacity; \n");
/// assert_eq!(payload.data(), "n = 5;\ncapacity = 20;\n");
/// ```
#[derive(Clone)]
pub struct Assembler {
    engine: Arc<dyn TemplateEngine>,
    decoder: Decoder,
    keep_comments: bool,
    output_vars: Vec<String>,
}

impl Assembler {
    /// Creates an assembler rendering templates with handlebars.
    pub fn new() -> Self {
        Self {
            engine: Arc::new(HandlebarsEngine::new()),
            decoder: Decoder::new(),
            keep_comments: false,
            output_vars: Vec::new(),
        }
    }

    /// Uses `engine` to render model templates.
    pub fn with_engine(mut self, engine: Arc<dyn TemplateEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Uses `decoder` (and its registered enum domains) for data sources.
    pub fn with_decoder(mut self, decoder: Decoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// Keeps comments in the model instead of stripping them.
    pub fn keep_comments(mut self, keep: bool) -> Self {
        self.keep_comments = keep;
        self
    }

    /// Restricts solutions to the variables named in `names`.
    ///
    /// Their declarations are marked with `:: add_to_output`.
    pub fn output_vars<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_vars = names.into_iter().map(Into::into).collect();
        self
    }

    /// Assembles a payload.
    ///
    /// Data sources are merged in order with `extra` last; a later binding of
    /// an identifier replaces an earlier one.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError`] when a source cannot be read, the template
    /// fails to render, an output variable is not declared, or data is
    /// malformed or unrepresentable.
    pub fn assemble(
        &self,
        model: &ModelSource,
        data: &[DataSource],
        extra: &Assignment,
        vars: &TemplateVars,
    ) -> Result<Payload, AssemblyError> {
        let (name, mut text) = match model {
            ModelSource::File(path) => (file_stem(path), read(path)?),
            ModelSource::Text(text) => ("model".to_string(), text.clone()),
        };

        if !vars.is_empty() {
            text = self.engine.render(&text, vars)?;
        }
        if !self.keep_comments {
            text = strip_comments(&text);
        }
        if !self.output_vars.is_empty() {
            text = annotate_output(&text, &self.output_vars)?;
        }

        let mut decoder = model_enums(&text)
            .into_iter()
            .fold(self.decoder.clone(), |decoder, (name, literals)| {
                decoder.with_enum(name, literals)
            });
        let mut merged = Assignment::new();
        for source in data {
            let (origin, dzn_text) = match source {
                DataSource::File(path) => (path.display().to_string(), read(path)?),
                DataSource::Text(text) => ("inline data".to_string(), text.clone()),
            };
            let segment = decoder
                .decode(&dzn_text)
                .map_err(|source| AssemblyError::Data { origin, source })?;
            decoder = register_domains(decoder, &segment);
            merged.extend(segment);
        }
        merged.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));

        let payload = Payload::new(name, text, merged)?;
        debug!(
            event = "payload_assembled",
            model = payload.name(),
            model_bytes = payload.model().len(),
            data_bytes = payload.data().len(),
            identifiers = payload.assignment().len(),
        );
        Ok(payload)
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Assembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assembler")
            .field("engine", &self.engine)
            .field("keep_comments", &self.keep_comments)
            .field("output_vars", &self.output_vars)
            .finish()
    }
}

/// Assembles a payload with the default [`Assembler`].
pub fn assemble(
    model: &ModelSource,
    data: &[DataSource],
    extra: &Assignment,
    vars: &TemplateVars,
) -> Result<Payload, AssemblyError> {
    Assembler::new().assemble(model, data, extra, vars)
}

// Later segments may index arrays by enums declared in earlier ones.
pub(crate) fn register_domains(decoder: Decoder, segment: &Assignment) -> Decoder {
    segment
        .iter()
        .fold(decoder, |decoder, (name, value)| match value {
            Value::EnumSet(literals) => decoder.with_enum(name.clone(), literals.clone()),
            _ => decoder,
        })
}

/// Finds the enums a model defines with a literal list, such as
/// `enum Color = {Red, Green};`.
///
/// Enums left for the data to define and enums built from constructor
/// calls are skipped.
pub fn model_enums(model: &str) -> IndexMap<String, Vec<String>> {
    let mut enums = IndexMap::new();
    for item in strip_comments(model).split(';') {
        let Some(rest) = item.trim_start().strip_prefix("enum") else {
            continue;
        };
        if !rest.starts_with(char::is_whitespace) {
            continue;
        }
        let Some((name, body)) = rest.split_once('=') else {
            continue;
        };
        let Some(literals) = body
            .trim()
            .strip_prefix('{')
            .and_then(|body| body.strip_suffix('}'))
        else {
            continue;
        };
        let name = name.trim();
        let literals: Vec<String> = literals
            .split(',')
            .map(str::trim)
            .filter(|literal| !literal.is_empty())
            .map(str::to_string)
            .collect();
        if is_identifier(name) && literals.iter().all(|l| is_identifier(l)) {
            enums.insert(name.to_string(), literals);
        }
    }
    enums
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn read(path: &Path) -> Result<String, AssemblyError> {
    std::fs::read_to_string(path).map_err(|source| AssemblyError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string())
}

fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "model".to_string()
    } else {
        cleaned
    }
}

/// Removes `%` line comments and `/* */` block comments from model text.
///
/// String literals are left untouched. The newline ending a line comment is
/// kept so line structure survives.
pub fn strip_comments(model: &str) -> String {
    let mut out = String::with_capacity(model.len());
    let mut chars = model.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                out.push(c);
                while let Some(c) = chars.next() {
                    out.push(c);
                    match c {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                out.push(escaped);
                            }
                        }
                        '"' => break,
                        _ => {}
                    }
                }
            }
            '%' => {
                while chars.peek().is_some_and(|c| *c != '\n') {
                    chars.next();
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
#[path = "assembler_tests.rs"]
mod tests;
