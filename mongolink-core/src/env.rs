//! Environment variable expansion for configuration values.
//!
//! Supported forms:
//! - `${VAR}`: required
//! - `${VAR:-fallback}`: `fallback` when unset or empty
//! - `${VAR:?message}`: required, failing with `message`
//! - `$$`: a literal `$`
//!
//! Any other `$` is kept literally, so credentials such as `s3cr$t` need no
//! escaping. Only `$${` has to be written to get a literal `${`.

use std::collections::HashMap;
use std::iter::Peekable;
use std::str::Chars;

use crate::error::{ConnectError, ConnectResult};

/// Where variable values come from.
pub trait EnvSource: Send + Sync {
    /// Look up a variable.
    fn get(&self, name: &str) -> Option<String>;
}

/// Reads the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Fixed set of variables, handy in tests.
#[derive(Debug, Clone, Default)]
pub struct MapEnvSource {
    vars: HashMap<String, String>,
}

impl MapEnvSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

impl EnvSource for MapEnvSource {
    fn get(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

/// Expands variable references in strings.
#[derive(Debug, Clone, Default)]
pub struct EnvExpander<S: EnvSource = StdEnvSource> {
    source: S,
}

impl EnvExpander<StdEnvSource> {
    /// Expander over the process environment.
    pub fn new() -> Self {
        Self {
            source: StdEnvSource,
        }
    }
}

impl<S: EnvSource> EnvExpander<S> {
    /// Expander over a custom source.
    pub fn with_source(source: S) -> Self {
        Self { source }
    }

    /// Expand every reference in `input`.
    pub fn expand(&self, input: &str) -> ConnectResult<String> {
        if !input.contains('$') {
            return Ok(input.to_string());
        }

        let mut out = String::with_capacity(input.len());
        let mut chars = input.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' {
                out.push(c);
                continue;
            }

            match chars.peek() {
                Some('{') => {
                    chars.next();
                    out.push_str(&self.braced(&mut chars)?);
                }
                Some('$') => {
                    chars.next();
                    out.push('$');
                }
                _ => out.push('$'),
            }
        }

        Ok(out)
    }

    fn braced(&self, chars: &mut Peekable<Chars<'_>>) -> ConnectResult<String> {
        let mut body = String::new();
        let mut closed = false;
        for c in chars.by_ref() {
            if c == '}' {
                closed = true;
                break;
            }
            body.push(c);
        }

        if !closed {
            return Err(ConnectError::InvalidEnvValue {
                name: body,
                message: "unterminated '${'".to_string(),
            });
        }

        let (name, modifier) = match body.find(':') {
            Some(idx) => {
                let mut rest = body[idx + 1..].chars();
                let kind = rest.next();
                (
                    body[..idx].to_string(),
                    kind.map(|k| (k, rest.as_str().to_string())),
                )
            }
            None => (body, None),
        };

        if name.is_empty() {
            return Err(ConnectError::InvalidEnvValue {
                name,
                message: "empty variable name".to_string(),
            });
        }

        match (self.source.get(&name), modifier) {
            (Some(value), _) if !value.is_empty() => Ok(value),
            (_, Some(('-', fallback))) => Ok(fallback),
            (_, Some(('?', message))) => Err(ConnectError::InvalidEnvValue {
                message: if message.is_empty() {
                    format!("required variable '{}' is not set", name)
                } else {
                    message
                },
                name,
            }),
            (Some(value), None) => Ok(value),
            _ => Err(ConnectError::EnvNotFound(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expander() -> EnvExpander<MapEnvSource> {
        EnvExpander::with_source(
            MapEnvSource::new()
                .set("DB_USER", "app")
                .set("DB_PASS", "s3cr3t")
                .set("EMPTY", ""),
        )
    }

    #[test]
    fn test_plain_string_untouched() {
        assert_eq!(expander().expand("cluster0").unwrap(), "cluster0");
    }

    #[test]
    fn test_simple_and_braced() {
        let e = expander();
        assert_eq!(e.expand("${DB_USER}").unwrap(), "app");
        assert_eq!(e.expand("${DB_USER}:${DB_PASS}").unwrap(), "app:s3cr3t");
    }

    #[test]
    fn test_fallback() {
        let e = expander();
        assert_eq!(e.expand("${MISSING:-local}").unwrap(), "local");
        assert_eq!(e.expand("${EMPTY:-local}").unwrap(), "local");
        assert_eq!(e.expand("${DB_USER:-local}").unwrap(), "app");
    }

    #[test]
    fn test_required_message() {
        let err = expander().expand("${MISSING:?password required}").unwrap_err();
        assert!(err.to_string().contains("password required"));
    }

    #[test]
    fn test_missing_variable() {
        let err = expander().expand("${MISSING}").unwrap_err();
        assert!(matches!(err, ConnectError::EnvNotFound(name) if name == "MISSING"));

    }

    #[test]
    fn test_empty_without_modifier_is_kept() {
        assert_eq!(expander().expand("[${EMPTY}]").unwrap(), "[]");
    }

    #[test]
    fn test_literal_dollar() {
        let e = expander();
        assert_eq!(e.expand("s3cr$t").unwrap(), "s3cr$t");
        assert_eq!(e.expand("cost: $5").unwrap(), "cost: $5");
        assert_eq!(e.expand("trailing$").unwrap(), "trailing$");
        assert_eq!(e.expand("$DB_USER").unwrap(), "$DB_USER");
    }

    #[test]
    fn test_escaped_dollar() {
        let e = expander();
        assert_eq!(e.expand("p$$5").unwrap(), "p$5");
        assert_eq!(e.expand("$${DB_USER}").unwrap(), "${DB_USER}");
        assert_eq!(e.expand("$$$${DB_USER}").unwrap(), "$${DB_USER}");
        assert_eq!(e.expand("$$${DB_USER}").unwrap(), "$app");
    }

    #[test]
    fn test_unterminated_brace() {
        assert!(expander().expand("${DB_USER").is_err());
    }
}
