//! Model templating.
//!
//! The assembler never substitutes text itself; it hands the model and the
//! template variables to a [`TemplateEngine`].

use std::fmt::Debug;

use handlebars::Handlebars;

use crate::error::AssemblyError;

/// Variables available to a model template.
pub type TemplateVars = serde_json::Map<String, serde_json::Value>;

/// Renders a model template.
pub trait TemplateEngine: Send + Sync + Debug {
    /// Renders `template` with `vars`.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::Template`] on syntax errors or references to
    /// missing variables.
    fn render(&self, template: &str, vars: &TemplateVars) -> Result<String, AssemblyError>;
}

/// A [`TemplateEngine`] backed by handlebars.
///
/// Strict mode is on, so a reference to an undefined variable fails instead
/// of rendering as empty text. Output is not HTML-escaped.
///
/// ```
/// use mznforge_solver::{HandlebarsEngine, TemplateEngine, TemplateVars};
///
/// let mut vars = TemplateVars::new();
/// vars.insert("n".into(), 8.into());
///
/// let model = HandlebarsEngine::new()
///     .render("int: n = {{n}};\nconstraint x < \"<{{n}}>\";", &vars)
///     .unwrap();
/// assert_eq!(model, "int: n = 8;\nconstraint x < \"<8>\";");
/// ```
pub struct HandlebarsEngine {
    registry: Handlebars<'static>,
}

impl HandlebarsEngine {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(handlebars::no_escape);
        Self { registry }
    }
}

impl Default for HandlebarsEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for HandlebarsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlebarsEngine")
            .field("strict_mode", &self.registry.strict_mode())
            .finish()
    }
}

impl TemplateEngine for HandlebarsEngine {
    fn render(&self, template: &str, vars: &TemplateVars) -> Result<String, AssemblyError> {
        self.registry
            .render_template(template, vars)
            .map_err(|err| AssemblyError::Template(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, serde_json::Value)]) -> TemplateVars {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_render_substitutes_variables() {
        let engine = HandlebarsEngine::new();
        let out = engine
            .render(
                "int: capacity = {{capacity}};\n{{#if sym}}constraint symmetry;{{/if}}",
                &vars(&[("capacity", 20.into()), ("sym", true.into())]),
            )
            .unwrap();
        assert_eq!(out, "int: capacity = 20;\nconstraint symmetry;");
    }

    #[test]
    fn test_render_iterates_lists() {
        let engine = HandlebarsEngine::new();
        let out = engine
            .render(
                "{{#each items}}var 0..{{this}}: x{{@index}};\n{{/each}}",
                &vars(&[("items", serde_json::json!([3, 5]))]),
            )
            .unwrap();
        assert_eq!(out, "var 0..3: x0;\nvar 0..5: x1;\n");
    }

    #[test]
    fn test_missing_variable_fails() {
        let engine = HandlebarsEngine::new();
        let err = engine.render("int: n = {{n}};", &TemplateVars::new());
        assert!(matches!(err, Err(AssemblyError::Template(_))));
    }

    #[test]
    fn test_set_literals_pass_through() {
        let engine = HandlebarsEngine::new();
        let out = engine
            .render("set of int: S = {1, 2} union {{s}};", &vars(&[("s", "{3}".into())]))
            .unwrap();
        assert_eq!(out, "set of int: S = {1, 2} union {3};");
    }
}
