//! Fixed-point resolution of the variable environment.

use super::{render_lenient, VariableEnv};
use crate::errors::MalformedTemplateError;
use tracing::{debug, warn};

/// Upper bound on resolution passes.
pub const MAX_RESOLVE_PASSES: usize = 20;

/// Resolves `{name}` references between variables.
///
/// Runs at most [`MAX_RESOLVE_PASSES`] passes and stops early once a pass
/// changes nothing. References that never resolve are left as literal text.
///
/// # Errors
///
/// Returns [`MalformedTemplateError`] for the first value that cannot be parsed.
pub fn resolve_variables(vars: &VariableEnv) -> Result<VariableEnv, MalformedTemplateError> {
    resolve_with_limit(vars, MAX_RESOLVE_PASSES)
}

/// Same as [`resolve_variables`] with an explicit pass limit.
///
/// # Errors
///
/// Returns [`MalformedTemplateError`] for the first value that cannot be parsed.
pub fn resolve_with_limit(
    vars: &VariableEnv,
    max_passes: usize,
) -> Result<VariableEnv, MalformedTemplateError> {
    let mut resolved = vars.clone();
    let keys: Vec<String> = resolved.names().map(str::to_string).collect();

    for pass in 1..=max_passes {
        let mut changes = 0usize;

        for key in &keys {
            let Some(current) = resolved.get(key).map(str::to_string) else {
                continue;
            };
            if !(current.contains('{') && current.contains('}')) {
                continue;
            }

            let rendered = render_lenient(&current, &resolved)
                .map_err(|source| MalformedTemplateError::new(key.as_str(), current.as_str(), source))?;

            if let Some(value) = rendered {
                if value != current {
                    resolved.insert(key.as_str(), value);
                    changes += 1;
                }
            }
        }

        debug!(pass, changes, "variable resolution pass");
        if changes == 0 {
            return Ok(resolved);
        }
    }

    warn!(max_passes, "variable resolution did not reach a fixed point");
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TemplateSyntaxError;
    use pretty_assertions::assert_eq;

    fn env(pairs: &[(&str, &str)]) -> VariableEnv {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_chain_resolves() {
        let resolved = resolve_variables(&env(&[("x", "1"), ("y", "{x}-2"), ("z", "{y}-3")])).unwrap();
        assert_eq!(resolved, env(&[("x", "1"), ("y", "1-2"), ("z", "1-2-3")]));
    }

    #[test]
    fn test_forward_reference_resolves_in_later_pass() {
        // "a" sorts before "b", so the first pass sees b's unresolved value.
        let resolved = resolve_variables(&env(&[
            ("a", "{b}/a"),
            ("b", "{c}/b"),
            ("c", "root"),
        ]))
        .unwrap();
        assert_eq!(resolved.get("a"), Some("root/b/a"));
        assert_eq!(resolved.get("b"), Some("root/b"));
    }

    #[test]
    fn test_idempotent_on_resolved_env() {
        let once = resolve_variables(&env(&[
            ("root", "/src"),
            ("out", "{root}/out"),
            ("orphan", "{nowhere}"),
        ]))
        .unwrap();
        let twice = resolve_variables(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unresolvable_reference_left_literal() {
        let resolved = resolve_variables(&env(&[("a", "{missing}/x"), ("b", "{a}")])).unwrap();
        assert_eq!(resolved.get("a"), Some("{missing}/x"));
        assert_eq!(resolved.get("b"), Some("{missing}/x"));
    }

    #[test]
    fn test_self_reference_terminates() {
        // Each pass wraps the value once more; the cap stops it.
        let resolved = resolve_with_limit(&env(&[("a", "({a})")]), 3).unwrap();
        assert_eq!(resolved.get("a"), Some("(((({a}))))"));
    }

    #[test]
    fn test_malformed_value_names_key() {
        let err = resolve_variables(&env(&[("ok", "1"), ("bad", "{ok} }")])).unwrap_err();
        assert_eq!(err.key, "bad");
        assert_eq!(err.template, "{ok} }");
        assert_eq!(err.source, TemplateSyntaxError::StrayClosingBrace(5));
    }

    #[test]
    fn test_values_without_braces_are_not_parsed() {
        // A lone closing brace is never scanned, so it is not reported.
        let resolved = resolve_variables(&env(&[("snippet", "fi }")])).unwrap();
        assert_eq!(resolved.get("snippet"), Some("fi }"));
    }
}
