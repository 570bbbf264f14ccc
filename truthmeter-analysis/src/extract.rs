//! Recover an [`AnalysisResult`] from free-form completion text.
//!
//! Models wrap their JSON in prose or code fences, emit numbers as strings,
//! and drop fields. Extraction locates one object, parses it, then
//! [`sanitize`] coerces every field into range with a default, so any
//! parseable object yields a complete result.

use crate::model::{AnalysisMetrics, AnalysisResult};
use serde_json::{Map, Value};
use truthmeter_common::{Result, TruthMeterError};
pub use truthmeter_config::ExtractionMode;

pub const NO_DETAILED_ANALYSIS: &str = "No detailed analysis provided.";

/// Locate the JSON object inside `text`.
pub fn extract_json_span(text: &str, mode: ExtractionMode) -> Result<&str> {
    let start = text.find('{').ok_or(TruthMeterError::NoJsonFound)?;
    match mode {
        ExtractionMode::Greedy => greedy_span(text, start),
        ExtractionMode::Balanced => match balanced_end(&text[start..]) {
            Some(len) => Ok(&text[start..start + len]),
            None => greedy_span(text, start),
        },
    }
}

fn greedy_span(text: &str, start: usize) -> Result<&str> {
    match text.rfind('}') {
        Some(end) if end > start => Ok(&text[start..=end]),
        _ => Err(TruthMeterError::NoJsonFound),
    }
}

/// Byte length of the object starting at `s[0] == '{'`, if it closes.
fn balanced_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Locate, parse and sanitize the analysis object in `text`.
pub fn extract_analysis(text: &str, mode: ExtractionMode) -> Result<AnalysisResult> {
    let span = extract_json_span(text, mode)?;
    let value: Value = serde_json::from_str(span).map_err(|e| {
        tracing::debug!(error = %e, span_chars = span.chars().count(), "extract.parse_failed");
        TruthMeterError::InvalidJson(e.to_string())
    })?;
    if !value.is_object() {
        return Err(TruthMeterError::InvalidJson(
            "expected a JSON object".to_string(),
        ));
    }
    Ok(sanitize(&value))
}

/// Coerce a parsed object into a schema-valid result. Never fails.
pub fn sanitize(value: &Value) -> AnalysisResult {
    let empty = Map::new();
    let obj = value.as_object().unwrap_or(&empty);
    let metrics = obj
        .get("metrics")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    AnalysisResult {
        overall_accuracy: score(obj.get("overallAccuracy")),
        metrics: AnalysisMetrics {
            factual_correctness: score(metrics.get("factualCorrectness")),
            logical_consistency: score(metrics.get("logicalConsistency")),
            clarity: score(metrics.get("clarity")),
            depth: score(metrics.get("depth")),
        },
        what_went_wrong: string_list(obj.get("whatWentWrong")),
        what_went_right: string_list(obj.get("whatWentRight")),
        detailed_analysis: match obj.get("detailedAnalysis") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => NO_DETAILED_ANALYSIS.to_string(),
        },
        confidence: score(obj.get("confidence")),
    }
}

fn score(value: Option<&Value>) -> u8 {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match raw {
        Some(x) if x.is_finite() => x.clamp(0.0, 100.0).round() as u8,
        _ => 0,
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
        .collect()
}
