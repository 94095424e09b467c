//! Cell coercion
//!
//! Sheet cells arrive as display text. Coercion never fails: unparsable
//! integers become 0, unrecognised flags become `false`, blank optional
//! text becomes `None`.

use crate::domain::{FieldKind, FieldValue};

const TRUTHY: [&str; 5] = ["true", "1", "yes", "y", "t"];

pub fn coerce(kind: FieldKind, raw: &str) -> FieldValue {
    match kind {
        FieldKind::Text => FieldValue::Text(raw.trim().to_string()),
        FieldKind::OptionalText => FieldValue::OptionalText(coerce_optional_text(raw)),
        FieldKind::Integer => FieldValue::Integer(coerce_integer(raw)),
        FieldKind::Flag => FieldValue::Flag(coerce_flag(raw)),
    }
}

/// Whole numbers parse directly; decimals truncate toward zero.
pub fn coerce_integer(raw: &str) -> i64 {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return value;
    }

    match trimmed.parse::<f64>() {
        // `as` saturates at the i64 bounds
        Ok(value) if value.is_finite() => value.trunc() as i64,
        _ => 0,
    }
}

pub fn coerce_flag(raw: &str) -> bool {
    let normalized = raw.trim().to_ascii_lowercase();
    TRUTHY.contains(&normalized.as_str())
}

pub fn coerce_optional_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
