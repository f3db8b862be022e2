use anyhow::Result;
use regex::{Captures, Regex};
use std::env;
use std::sync::OnceLock;
use tracing::{debug, warn};

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{(\w+)\}|\$([A-Za-z_]\w*)").expect("valid placeholder regex"))
}

/// Substitute environment variables in the format ${VAR_NAME} or $VAR_NAME
///
/// Unset variables keep their placeholder; callers decide whether that is
/// an error (see [`has_unresolved_env_vars`]).
pub fn substitute_env_vars(content: &str) -> Result<String> {
    substitute_with(content, |name| env::var(name).ok())
}

/// Substitution with an explicit variable lookup.
pub fn substitute_with<F>(content: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing_vars = Vec::new();

    let result = placeholder_regex().replace_all(content, |caps: &Captures| {
        let var_name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();

        match lookup(var_name) {
            Some(value) => {
                debug!("Substituting environment variable: {}", var_name);
                value
            }
            None => {
                warn!("Environment variable '{}' not set", var_name);
                missing_vars.push(var_name.to_string());
                caps[0].to_string()
            }
        }
    });

    if !missing_vars.is_empty() {
        debug!(
            "Environment variables not set (may use defaults or fail validation): {:?}",
            missing_vars
        );
    }

    Ok(result.into_owned())
}

/// Check if a string contains unresolved environment variable placeholders
pub fn has_unresolved_env_vars(content: &str) -> bool {
    placeholder_regex().is_match(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "DB_PASSWORD" => Some("hunter2".to_string()),
            "PGHOST" => Some("db.local".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_braced_and_bare_placeholders() {
        let out = substitute_with("password: ${DB_PASSWORD}\nhost: $PGHOST\n", lookup).unwrap();
        assert_eq!(out, "password: hunter2\nhost: db.local\n");
    }

    #[test]
    fn test_missing_variable_keeps_placeholder() {
        let out = substitute_with("password: ${NOT_SET_ANYWHERE}", lookup).unwrap();
        assert_eq!(out, "password: ${NOT_SET_ANYWHERE}");
        assert!(has_unresolved_env_vars(&out));
    }

    #[test]
    fn test_plain_text_untouched() {
        let out = substitute_with("label: 44% RH, 23 C", lookup).unwrap();
        assert_eq!(out, "label: 44% RH, 23 C");
        assert!(!has_unresolved_env_vars(&out));
    }
}
