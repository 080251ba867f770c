//! Rubric score aggregation.
//!
//! Grading results arrive as semi-structured JSON trees whose shape has
//! evolved over time: dimension sets differ per evaluation kind, sub-scores
//! may be numbers or numeric strings, and commentary fields sit next to
//! scores. Aggregation therefore filters by a small deny-list of field
//! names and tolerates mixed value types instead of assuming a fixed
//! schema. Old and new result shapes must both score correctly.

use std::collections::BTreeMap;

use serde_json::Value;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// An evaluation passes when its final score reaches this value.
pub const PASS_THRESHOLD: i32 = 70;

/// Top-level result key holding the rubric tree in grading payloads.
pub const RUBRIC_KEY: &str = "Evaluacion";

/// Field names that never contribute to an average: per-dimension totals
/// (recomputed here instead of trusted) and free-text commentary.
pub const EXCLUDED_FIELDS: &[&str] = &["Puntuacion_Total", "Comentarios"];

// ---------------------------------------------------------------------------
// Dimension averaging
// ---------------------------------------------------------------------------

/// Average the numeric sub-scores of a single rubric dimension.
///
/// Every entry except the [`EXCLUDED_FIELDS`] contributes: numbers are
/// taken as-is, strings are parsed as leading integers and discarded when
/// unparseable. A dimension with no usable sub-scores averages to `0`,
/// never an error. Non-object input also yields `0`.
pub fn dimension_average(dimension: &Value) -> i32 {
    let Some(entries) = dimension.as_object() else {
        return 0;
    };

    let mut scores: Vec<f64> = Vec::new();
    for (key, value) in entries {
        if EXCLUDED_FIELDS.contains(&key.as_str()) {
            continue;
        }
        match value {
            Value::Number(n) => {
                if let Some(f) = n.as_f64() {
                    scores.push(f);
                }
            }
            Value::String(s) => {
                if let Some(n) = parse_leading_int(s) {
                    scores.push(n as f64);
                }
            }
            _ => {}
        }
    }

    if scores.is_empty() {
        return 0;
    }
    let sum: f64 = scores.iter().sum();
    (sum / scores.len() as f64).round() as i32
}

/// Parse the leading integer of a string, ignoring whatever follows.
///
/// Accepts optional leading whitespace and sign, then one or more digits:
/// `"8"`, `" 8 "`, `"8/10"`, and `"8 puntos"` all parse to `8`; `"ocho"`
/// and `""` parse to `None`. Values that overflow `i64` are out of range
/// and also yield `None`.
fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let mut value: i64 = 0;
    let mut seen_digit = false;
    for c in digits.chars() {
        let Some(d) = c.to_digit(10) else { break };
        seen_digit = true;
        value = value.checked_mul(10)?.checked_add(d as i64)?;
    }

    if !seen_digit {
        return None;
    }
    Some(if negative { -value } else { value })
}

// ---------------------------------------------------------------------------
// Overall score
// ---------------------------------------------------------------------------

/// Average per recognized dimension of a rubric tree, keyed by dimension
/// name. Sorted by key so callers log and serialize deterministically.
pub fn dimension_averages(rubric: &Value) -> BTreeMap<String, i32> {
    let mut averages = BTreeMap::new();
    let Some(entries) = rubric.as_object() else {
        return averages;
    };
    for (key, value) in entries {
        if EXCLUDED_FIELDS.contains(&key.as_str()) {
            continue;
        }
        if value.is_object() {
            averages.insert(key.clone(), dimension_average(value));
        }
    }
    averages
}

/// Overall score of a rubric tree: the rounded mean of the averages of
/// every dimension present.
///
/// A dimension is any nested-object entry whose key is not on the
/// deny-list; the set is open, so new dimensions score without code
/// changes. No recognized dimensions yields `0`.
pub fn overall_score(rubric: &Value) -> i32 {
    let averages = dimension_averages(rubric);
    if averages.is_empty() {
        return 0;
    }
    let sum: i32 = averages.values().sum();
    (sum as f64 / averages.len() as f64).round() as i32
}

// ---------------------------------------------------------------------------
// Final score resolution
// ---------------------------------------------------------------------------

/// Final score and pass verdict for a grading result payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedScore {
    /// Final 0-100 score written to the evaluation record.
    pub score: i32,
    /// Whether the score reached [`PASS_THRESHOLD`].
    pub passed: bool,
    /// Per-dimension averages, empty when the payload has no rubric tree.
    pub dimension_scores: BTreeMap<String, i32>,
}

/// Resolve the final score of a grading result.
///
/// The payload's own `score` field is the fallback default; the computed
/// overall score overrides it whenever the computed value is positive.
/// The default-then-overwrite order is load-bearing: a rubric tree that
/// yields `0` (no recognized dimensions) must not clobber an explicit
/// upstream score.
pub fn resolve_final_score(result: &Value) -> ResolvedScore {
    let mut score = result
        .get("score")
        .and_then(Value::as_f64)
        .map(|f| f.round() as i32)
        .unwrap_or(0);

    let mut dimension_scores = BTreeMap::new();
    if let Some(rubric) = result.get(RUBRIC_KEY).filter(|v| v.is_object()) {
        dimension_scores = dimension_averages(rubric);
        let overall = overall_score(rubric);
        if overall > 0 {
            score = overall;
        }
    }

    ResolvedScore {
        score,
        passed: score >= PASS_THRESHOLD,
        dimension_scores,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
