//! Top-result summary extraction.
//!
//! Clients have posted results in several shapes over time (`prob` vs `percent` vs `score`,
//! band bounds at the top level or under `explain`, program fields nested or flat). Each concept
//! is read from a fixed list of paths and the first usable value wins:
//!
//! | concept      | paths, in priority order                                   |
//! |--------------|------------------------------------------------------------|
//! | prob         | `prob`, `percent` / 100, `score`, `explain.prob`           |
//! | low          | `low`, `ci_low`, `explain.low`                             |
//! | high         | `high`, `ci_high`, `explain.high`                          |
//! | risks        | `risks`, `factors`, `explain.risks`                        |
//! | improvements | `improvements`, `explain.improvements`                     |
//! | program id   | `program.id`, `program_id`, `id`                           |
//! | title        | `program.title`, `title`, `program_name`                   |
//! | university   | `program.university`, `university` (same for country/city) |
//!
//! Numbers may arrive as JSON numbers or numeric strings. Zero counts as a value; empty strings
//! and empty lists do not.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MAX_SUMMARY_ITEMS: usize = 8;

/// Denormalized snapshot of the top-ranked result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssessmentSummary {
    pub prob: Option<f64>,
    pub low: Option<f64>,
    pub high: Option<f64>,
    pub risks: Vec<String>,
    pub improvements: Vec<String>,
    pub top: TopProgramSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopProgramSummary {
    pub program_id: Option<u64>,
    pub title: String,
    pub university: String,
    pub country: String,
    pub city: String,
}

/// Builds the summary from the first entry of a result list. Anything that is not an object
/// yields an empty summary.
pub fn extract_summary(results: &[Value]) -> AssessmentSummary {
    match results.first() {
        Some(Value::Object(_)) => {}
        _ => return AssessmentSummary::default(),
    }
    let top = &results[0];
    let explain = top.get("explain");
    let program = top.get("program");

    let prob = number(top.get("prob"))
        .or_else(|| number(top.get("percent")).map(|percent| percent / 100.0))
        .or_else(|| number(top.get("score")))
        .or_else(|| number(explain.and_then(|explain| explain.get("prob"))));
    let low = number(top.get("low"))
        .or_else(|| number(top.get("ci_low")))
        .or_else(|| number(explain.and_then(|explain| explain.get("low"))));
    let high = number(top.get("high"))
        .or_else(|| number(top.get("ci_high")))
        .or_else(|| number(explain.and_then(|explain| explain.get("high"))));

    let risks = list(top.get("risks"))
        .or_else(|| list(top.get("factors")))
        .or_else(|| list(explain.and_then(|explain| explain.get("risks"))))
        .unwrap_or_default();
    let improvements = list(top.get("improvements"))
        .or_else(|| list(explain.and_then(|explain| explain.get("improvements"))))
        .unwrap_or_default();

    let nested = |field: &str| program.and_then(|program| program.get(field));

    AssessmentSummary {
        prob,
        low,
        high,
        risks,
        improvements,
        top: TopProgramSummary {
            program_id: identifier(nested("id"))
                .or_else(|| identifier(top.get("program_id")))
                .or_else(|| identifier(top.get("id"))),
            title: text(nested("title"))
                .or_else(|| text(top.get("title")))
                .or_else(|| text(top.get("program_name")))
                .unwrap_or_default(),
            university: text(nested("university"))
                .or_else(|| text(top.get("university")))
                .unwrap_or_default(),
            country: text(nested("country"))
                .or_else(|| text(top.get("country")))
                .unwrap_or_default(),
            city: text(nested("city"))
                .or_else(|| text(top.get("city")))
                .unwrap_or_default(),
        },
    }
}

fn number(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|value| value.is_finite())
}

fn identifier(value: Option<&Value>) -> Option<u64> {
    number(value)
        .filter(|value| *value >= 0.0 && value.fract() == 0.0)
        .map(|value| value as u64)
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        _ => None,
    }
}

fn list(value: Option<&Value>) -> Option<Vec<String>> {
    let items = value?.as_array().filter(|items| !items.is_empty())?;
    Some(
        items
            .iter()
            .take(MAX_SUMMARY_ITEMS)
            .map(|item| match item {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect(),
    )
}
