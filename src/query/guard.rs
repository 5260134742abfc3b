//! Security validator for constraints from untrusted sources (for example,
//! natural-language-driven tool calls).
//!
//! Two independent gates. The operator policy checks a fixed block-list of
//! code-evaluation operators *before* the allow-list, so "deliberately
//! dangerous" and "merely unsupported" surface as distinct errors. The
//! structural limits bound nesting depth and reject regex patterns that are
//! oversized or match a known catastrophic-backtracking shape.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::Error;
use crate::logger::AUDIT_TARGET;
use crate::types::{JsonMap, normalize_field};

/// Operators that enable arbitrary code evaluation on the store. Rejected
/// unconditionally, regardless of caller privilege.
const BLOCKED: &[&str] = &["$where", "$function", "$accumulator"];

/// Operators untrusted input may use. Anything not listed is rejected.
const ALLOWED: &[&str] = &[
    "$eq", "$ne", "$lt", "$lte", "$gt", "$gte", "$in", "$nin", "$all", "$exists", "$and", "$or",
    "$nor", "$not", "$size", "$elemMatch", "$regex", "$options", "$text", "$search", "$term",
];

/// Limits applied by the untrusted-path validator.
#[derive(Debug, Clone, Copy)]
pub struct GuardConfig {
    /// Maximum nesting depth of the constraint document.
    pub max_depth: usize,
    /// Maximum regex pattern length in bytes.
    pub max_pattern_len: usize,
    /// Largest count accepted inside a `{n}` / `{n,m}` repetition.
    pub max_repetition: u64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self { max_depth: 8, max_pattern_len: 500, max_repetition: 1000 }
    }
}

// Heuristic detectors for catastrophic-backtracking constructs. Immutable
// table, compiled once at first use. Each entry is (label, detector); the
// label goes into the error so callers can audit what fired.
static DANGEROUS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("lookaround assertion", Regex::new(r"\(\?[=!<]").unwrap_or_else(|e| panic!("{e}"))),
        (
            "adjacent wildcard quantifiers",
            Regex::new(r"\.[*+]\.[*+]").unwrap_or_else(|e| panic!("{e}")),
        ),
        (
            "nested quantified group",
            Regex::new(r"\([^()]*[*+][^()]*\)[*+{]").unwrap_or_else(|e| panic!("{e}")),
        ),
    ]
});

static REPETITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(\d+)(?:,(\d+))?\}").unwrap_or_else(|e| panic!("{e}")));

/// Checks one regex pattern against the length limit and the dangerous
/// construct detectors. A hit is a hard rejection, never a warning.
///
/// # Errors
/// `Error::UnsafePattern` naming the construct (or limit) that fired.
pub fn check_pattern(pattern: &str, cfg: &GuardConfig) -> Result<(), Error> {
    if pattern.len() > cfg.max_pattern_len {
        log::warn!(target: AUDIT_TARGET, "rejected pattern over length limit ({} bytes)", pattern.len());
        return Err(Error::UnsafePattern(format!(
            "pattern length {} exceeds limit {}",
            pattern.len(),
            cfg.max_pattern_len
        )));
    }
    for (label, detector) in DANGEROUS.iter() {
        if detector.is_match(pattern) {
            log::warn!(target: AUDIT_TARGET, "rejected pattern: {label}");
            return Err(Error::UnsafePattern((*label).to_owned()));
        }
    }
    for caps in REPETITION.captures_iter(pattern) {
        for idx in 1..=2 {
            if let Some(m) = caps.get(idx)
                && m.as_str().parse::<u64>().map_or(true, |n| n > cfg.max_repetition)
            {
                log::warn!(target: AUDIT_TARGET, "rejected pattern: repetition count {}", m.as_str());
                return Err(Error::UnsafePattern(format!(
                    "repetition count {} exceeds limit {}",
                    m.as_str(),
                    cfg.max_repetition
                )));
            }
        }
    }
    Ok(())
}

/// Validates one operator key. Block-list first, then allow-list.
fn check_operator(key: &str) -> Result<(), Error> {
    if BLOCKED.contains(&key) {
        log::warn!(target: AUDIT_TARGET, "rejected blocked operator {key}");
        return Err(Error::BlockedOperator(key.to_owned()));
    }
    if !ALLOWED.contains(&key) {
        return Err(Error::UnknownOperator(key.to_owned()));
    }
    Ok(())
}

/// Translates an untrusted constraint document into a mergeable compiled
/// map: every embedded operator key is re-validated at every depth, regex
/// values are safety-checked, and field names are normalized from the local
/// convention to the wire convention on the way through.
///
/// # Errors
/// `Error::BlockedOperator`, `Error::UnknownOperator`,
/// `Error::DepthExceeded` or `Error::UnsafePattern`; the input is never
/// partially translated.
pub fn translate(untrusted: &serde_json::Value, cfg: &GuardConfig) -> Result<serde_json::Value, Error> {
    walk(untrusted, cfg, 0)
}

fn walk(value: &serde_json::Value, cfg: &GuardConfig, depth: usize) -> Result<serde_json::Value, Error> {
    if depth > cfg.max_depth {
        return Err(Error::DepthExceeded { depth, limit: cfg.max_depth });
    }
    match value {
        serde_json::Value::Object(map) => {
            let mut out = JsonMap::new();
            for (key, inner) in map {
                let out_key = if key.starts_with('$') {
                    check_operator(key)?;
                    if key == "$regex" {
                        if let serde_json::Value::String(pattern) = inner {
                            check_pattern(pattern, cfg)?;
                        }
                    }
                    key.clone()
                } else {
                    normalize_field(key)
                };
                out.insert(out_key, walk(inner, cfg, depth + 1)?);
            }
            Ok(serde_json::Value::Object(out))
        }
        serde_json::Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(walk(item, cfg, depth + 1)?);
            }
            Ok(serde_json::Value::Array(out))
        }
        leaf => Ok(leaf.clone()),
    }
}
