//! Single-pass placeholder renderer with configurable delimiters
//!
//! Templates are tokenized once into literal and placeholder fragments,
//! then resolved against a parameter namespace. The default delimiter
//! pair is `<%` / `%>` so templates can coexist with `{field}`-style
//! route templates without escaping.

use serde_json::Value;

use crate::error::{GantryError, Result};
use crate::params::Namespace;

/// Marker pair that delimits placeholders in template text
#[derive(Debug, Clone)]
pub struct Delimiters {
    pub open: String,
    pub close: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            open: "<%".to_string(),
            close: "%>".to_string(),
        }
    }
}

/// Parsed template fragment
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Literal text, copied through unchanged
    Literal(String),
    /// Placeholder key, trimmed of surrounding whitespace
    Placeholder(String),
}

/// Split template text into literal and placeholder tokens.
///
/// An opening delimiter without a matching close is a hard error.
pub fn tokenize(input: &str, delimiters: &Delimiters) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = 0;

    while let Some(found) = input[rest..].find(&delimiters.open) {
        let open = rest + found;
        if open > rest {
            tokens.push(Token::Literal(input[rest..open].to_string()));
        }

        let key_start = open + delimiters.open.len();
        let close = input[key_start..]
            .find(&delimiters.close)
            .ok_or(GantryError::UnclosedPlaceholder { position: open })?;

        let key = input[key_start..key_start + close].trim().to_string();
        tokens.push(Token::Placeholder(key));
        rest = key_start + close + delimiters.close.len();
    }

    if rest < input.len() {
        tokens.push(Token::Literal(input[rest..].to_string()));
    }

    Ok(tokens)
}

/// Render template text against a namespace.
///
/// Unresolved placeholders and placeholders resolving to lists or
/// objects are hard errors, never passed through verbatim.
pub fn render_str(input: &str, context: &Namespace, delimiters: &Delimiters) -> Result<String> {
    let tokens = tokenize(input, delimiters)?;
    let mut out = String::with_capacity(input.len());

    for token in tokens {
        match token {
            Token::Literal(text) => out.push_str(&text),
            Token::Placeholder(key) => {
                let value = context
                    .get(&key)
                    .ok_or_else(|| GantryError::UnresolvedPlaceholder { key: key.clone() })?;
                out.push_str(&scalar_to_string(&key, value)?);
            }
        }
    }

    Ok(out)
}

/// Render template text, substituting the empty string for unresolved
/// placeholders. Used only to peek at a template's embedded defaults
/// before final substitution parameters exist.
pub fn render_str_lenient(
    input: &str,
    context: &Namespace,
    delimiters: &Delimiters,
) -> Result<String> {
    let tokens = tokenize(input, delimiters)?;
    let mut out = String::with_capacity(input.len());

    for token in tokens {
        match token {
            Token::Literal(text) => out.push_str(&text),
            Token::Placeholder(key) => {
                if let Some(value) = context.get(&key) {
                    out.push_str(&scalar_to_string(&key, value)?);
                }
            }
        }
    }

    Ok(out)
}

/// Convert a scalar namespace value to its textual form
pub fn scalar_to_string(key: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(GantryError::NonScalarPlaceholder {
            key: key.to_string(),
        }),
    }
}
