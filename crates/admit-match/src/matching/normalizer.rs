//! GPA scale normalization onto the 4.0 scale.
//!
//! Bare values above 5 are read as percentages. A 4.2 on a 5.0 scale is indistinguishable from
//! a 4.2 on a 4.0 scale and is passed through unchanged; callers that know the scale should use
//! [`normalize_gpa_with_scale`].

const TARGET_SCALE: f64 = 4.0;
const PERCENT_THRESHOLD: f64 = 5.0;

/// Normalizes a raw GPA string such as `"3.2/4.0"`, `"85 / 100"`, or `"3.6"`.
pub fn normalize_gpa(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();

    if let Some((numerator, denominator)) = trimmed.split_once('/') {
        let numerator = parse_unsigned(numerator.trim_end())?;
        let denominator = parse_unsigned(leading_number(denominator.trim_start()))?;
        if denominator > 0.0 {
            return Some(round_to(numerator / denominator * TARGET_SCALE, 3));
        }
        return None;
    }

    parse_unsigned(trimmed).map(normalize_gpa_value)
}

/// Applies the bare-number heuristic: values above 5 are percentages, the rest are kept.
pub fn normalize_gpa_value(value: f64) -> f64 {
    if value > PERCENT_THRESHOLD {
        round_to(value / 100.0 * TARGET_SCALE, 3)
    } else {
        value
    }
}

/// Rescales a GPA reported against an explicit scale such as 5.0 or 100.
pub fn normalize_gpa_with_scale(value: f64, scale: f64) -> f64 {
    if !scale.is_finite() || scale <= 0.0 {
        return normalize_gpa_value(value);
    }
    if (scale - TARGET_SCALE).abs() < f64::EPSILON {
        return value;
    }
    round_to(value / scale * TARGET_SCALE, 3)
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn leading_number(text: &str) -> &str {
    let end = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    &text[..end]
}

fn parse_unsigned(text: &str) -> Option<f64> {
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    text.parse::<f64>().ok()
}
