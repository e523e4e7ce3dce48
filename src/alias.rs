//! Alias grammar for `${...}` placeholders.
//!
//! One pattern backs every placeholder concern in the crate: parameter
//! substitution inside loader scripts, alias decomposition during merge,
//! and output-name resolution. Three entry points, one grammar, so the
//! concerns cannot drift apart.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

/// Pattern matching a `${...}` placeholder anywhere in text.
static ALIAS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^{}]+?)\}").unwrap());

/// Pattern matching text that is exactly one placeholder and nothing else.
static SINGLE_ALIAS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$\{[^{}]+?\}$").unwrap());

/// Result type for alias operations.
pub type AliasResult<T> = Result<T, AliasError>;

/// Errors raised when a placeholder cannot be decomposed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AliasError {
    /// The context required both a band path and a parameter name.
    #[error("malformed alias [{raw}]: expected band path and parameter name")]
    Malformed { raw: String },
}

/// A placeholder's raw path separated into band path and parameter name.
///
/// Either side may be blank: `${name}` has a blank band path, `${Band.}`
/// a blank parameter name. Contexts that require both sides use
/// [`decompose`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandPathAndParameter {
    pub band_path: String,
    pub parameter: String,
}

impl BandPathAndParameter {
    /// True when either side is blank, which makes the alias ambiguous:
    /// it names a band (table scope) rather than a band-scoped value.
    pub fn is_table_scoped(&self) -> bool {
        self.band_path.is_empty() || self.parameter.is_empty()
    }
}

/// Returns true iff `text` is exactly one placeholder.
///
/// Single-alias text is eligible for typed substitution: the whole text
/// node is replaced by the parameter value itself, not its string form.
pub fn contains_single_alias(text: &str) -> bool {
    SINGLE_ALIAS_PATTERN.is_match(text)
}

/// Unwraps the raw path of a single-alias text, if it is one.
pub fn unwrap_alias(text: &str) -> Option<&str> {
    if contains_single_alias(text) {
        Some(&text[2..text.len() - 1])
    } else {
        None
    }
}

/// Splits a raw path on its last dot into (band path, parameter name).
///
/// `"Items.name"` yields `("Items", "name")`; `"A.B.total"` yields
/// `("A.B", "total")`; `"name"` yields `("", "name")`. Blank sides are
/// preserved so the caller can classify the alias as table-scoped.
pub fn split_band_and_parameter(raw: &str) -> BandPathAndParameter {
    match raw.rfind('.') {
        Some(idx) => BandPathAndParameter {
            band_path: raw[..idx].to_string(),
            parameter: raw[idx + 1..].to_string(),
        },
        None => BandPathAndParameter {
            band_path: String::new(),
            parameter: raw.to_string(),
        },
    }
}

/// Splits a raw path, requiring both sides to be present.
pub fn decompose(raw: &str) -> AliasResult<BandPathAndParameter> {
    let pair = split_band_and_parameter(raw);
    if pair.is_table_scoped() {
        return Err(AliasError::Malformed {
            raw: raw.to_string(),
        });
    }
    Ok(pair)
}

/// Returns every raw placeholder path in `text`, in document order.
pub fn find_all(text: &str) -> Vec<&str> {
    ALIAS_PATTERN
        .captures_iter(text)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str()))
        .collect()
}

/// Replaces every placeholder in `text` using `lookup`.
///
/// Unresolved placeholders are replaced with the empty string; the
/// caller decides whether that warrants a diagnostic.
pub fn substitute_placeholders<F>(text: &str, mut lookup: F) -> String
where
    F: FnMut(&str) -> Option<Value>,
{
    ALIAS_PATTERN
        .replace_all(text, |cap: &regex::Captures| {
            let raw = &cap[1];
            lookup(raw).map(|v| value_text(&v)).unwrap_or_default()
        })
        .into_owned()
}

/// Rewrites every placeholder in `text` through a fallible mapping.
///
/// Unlike [`substitute_placeholders`], the mapping decides what each
/// placeholder becomes and may abort the whole rewrite; loaders use this
/// to turn `${name}` references into bound statement slots.
pub fn rewrite_placeholders<E, F>(text: &str, mut rewrite: F) -> Result<String, E>
where
    F: FnMut(&str) -> Result<String, E>,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for cap in ALIAS_PATTERN.captures_iter(text) {
        let whole = cap.get(0).unwrap();
        out.push_str(&text[last..whole.start()]);
        out.push_str(&rewrite(&cap[1])?);
        last = whole.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

/// Plain-text rendering of a parameter value.
///
/// Strings render unquoted; null renders empty; compound values render
/// as compact JSON.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
