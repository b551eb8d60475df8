//! `{name}` placeholder templates.
//!
//! Templates are rendered under two policies that must stay separate:
//!
//! - [`render_lenient`] is used while resolving the variable environment.
//!   A reference to an unknown name is not an error, the caller simply keeps
//!   the previous value and retries on the next pass.
//! - [`render_strict`] is used to materialize commands. Every referenced
//!   name must exist.
//!
//! Both fail on malformed syntax. `{{` and `}}` render as literal braces.

mod env;
mod resolver;

pub use env::{BuiltinVars, RuntimeVars, VariableEnv};
pub use resolver::{resolve_variables, resolve_with_limit, MAX_RESOLVE_PASSES};

use crate::errors::TemplateSyntaxError;
use thiserror::Error;

/// One piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text copied verbatim (escapes already collapsed).
    Literal(String),
    /// A `{name}` reference.
    Placeholder(String),
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

/// Failure modes of strict rendering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The template could not be parsed.
    #[error(transparent)]
    Syntax(#[from] TemplateSyntaxError),
    /// A placeholder names a variable that is not defined.
    #[error("missing variable '{0}'")]
    MissingVariable(String),
}

impl Template {
    /// Parses a template string.
    ///
    /// # Errors
    ///
    /// Returns the first syntax error found, with its byte offset.
    pub fn parse(source: &str) -> Result<Self, TemplateSyntaxError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((idx, ch)) = chars.next() {
            match ch {
                '{' => {
                    if chars.next_if(|&(_, c)| c == '{').is_some() {
                        literal.push('{');
                        continue;
                    }

                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((pos, '{')) => return Err(TemplateSyntaxError::NestedBrace(pos)),
                            Some((_, c)) => name.push(c),
                            None => return Err(TemplateSyntaxError::UnclosedBrace(idx)),
                        }
                    }

                    if name.is_empty() {
                        return Err(TemplateSyntaxError::EmptyPlaceholder(idx));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name));
                }
                '}' => {
                    if chars.next_if(|&(_, c)| c == '}').is_some() {
                        literal.push('}');
                    } else {
                        return Err(TemplateSyntaxError::StrayClosingBrace(idx));
                    }
                }
                c => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    /// Returns the parsed segments.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Renders against `env`, or returns `None` if any name is undefined.
    #[must_use]
    pub fn render_lenient(&self, env: &VariableEnv) -> Option<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => out.push_str(env.get(name)?),
            }
        }
        Some(out)
    }

    /// Renders against `env`, failing on the first undefined name.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::MissingVariable`] naming the first undefined variable.
    pub fn render_strict(&self, env: &VariableEnv) -> Result<String, RenderError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = env
                        .get(name)
                        .ok_or_else(|| RenderError::MissingVariable(name.clone()))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

/// Parses and renders `source`, tolerating undefined names.
///
/// Returns `Ok(None)` when at least one placeholder is undefined; the
/// template is then left for a later pass.
///
/// # Errors
///
/// Returns a syntax error if `source` is malformed.
pub fn render_lenient(
    source: &str,
    env: &VariableEnv,
) -> Result<Option<String>, TemplateSyntaxError> {
    Ok(Template::parse(source)?.render_lenient(env))
}

/// Parses and renders `source`, requiring every name to be defined.
///
/// # Errors
///
/// Returns a syntax error if `source` is malformed, or the first undefined
/// variable name.
pub fn render_strict(source: &str, env: &VariableEnv) -> Result<String, RenderError> {
    Template::parse(source)?.render_strict(env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn env(pairs: &[(&str, &str)]) -> VariableEnv {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_parse_segments() {
        let template = Template::parse("make -C {root} {target}").unwrap();
        assert_eq!(
            template.segments(),
            &[
                Segment::Literal("make -C ".to_string()),
                Segment::Placeholder("root".to_string()),
                Segment::Literal(" ".to_string()),
                Segment::Placeholder("target".to_string()),
            ]
        );
    }

    #[test]
    fn test_escaped_braces() {
        let rendered = render_strict("awk '{{print $1}}' {file}", &env(&[("file", "a.txt")])).unwrap();
        assert_eq!(rendered, "awk '{print $1}' a.txt");
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(
            Template::parse("echo {name").unwrap_err(),
            TemplateSyntaxError::UnclosedBrace(5)
        );
        assert_eq!(
            Template::parse("echo name}").unwrap_err(),
            TemplateSyntaxError::StrayClosingBrace(9)
        );
        assert_eq!(
            Template::parse("echo {}").unwrap_err(),
            TemplateSyntaxError::EmptyPlaceholder(5)
        );
        assert_eq!(
            Template::parse("{a{b}}").unwrap_err(),
            TemplateSyntaxError::NestedBrace(2)
        );
    }

    #[test]
    fn test_lenient_leaves_unknown_names() {
        let vars = env(&[("x", "1")]);
        assert_eq!(render_lenient("{x}-{y}", &vars).unwrap(), None);
        assert_eq!(render_lenient("{x}-2", &vars).unwrap(), Some("1-2".to_string()));
    }

    #[test]
    fn test_strict_reports_missing_variable() {
        let err = render_strict("echo {undefined_var}", &VariableEnv::new()).unwrap_err();
        assert_eq!(err, RenderError::MissingVariable("undefined_var".to_string()));
    }

    #[test]
    fn test_strict_reports_syntax_before_missing() {
        let err = render_strict("echo {missing} }", &VariableEnv::new()).unwrap_err();
        assert!(matches!(err, RenderError::Syntax(TemplateSyntaxError::StrayClosingBrace(15))));
    }

    #[test]
    fn test_values_are_inserted_verbatim() {
        let vars = env(&[("pattern", "{not a placeholder}")]);
        assert_eq!(
            render_strict("grep '{pattern}'", &vars).unwrap(),
            "grep '{not a placeholder}'"
        );
    }

    #[test]
    fn test_unicode_offsets() {
        assert_eq!(
            Template::parse("→ {").unwrap_err(),
            TemplateSyntaxError::UnclosedBrace(4)
        );
    }
}
