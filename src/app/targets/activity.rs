use super::{field, scalar_at};
use crate::core::Record;
use crate::utils::error::RecordError;
use chrono::DateTime;
use serde_json::Value;

pub fn event_description(alert_id: i64) -> String {
    match alert_id {
        9073 => "User viewed a product".to_string(),
        other => format!("Unknown Event (ID: {})", other),
    }
}

/// Unix seconds (possibly fractional) as `YYYY-MM-DD HH:MM:SS` UTC; unparseable input is kept as-is.
pub fn format_timestamp(raw: &str) -> String {
    let seconds = match raw.trim().parse::<f64>() {
        Ok(seconds) if seconds.is_finite() => seconds,
        _ => return raw.to_string(),
    };
    let secs = seconds.trunc() as i64;
    let nanos = (seconds.fract().abs() * 1_000_000_000.0) as u32;
    DateTime::from_timestamp(secs, nanos)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| raw.to_string())
}

pub fn activity_row(raw: &Value) -> Result<Record, RecordError> {
    field(raw, &["id"])?;
    let alert_id = field(raw, &["alert_id"])?
        .as_i64()
        .ok_or_else(|| RecordError::invalid("alert_id", "expected an integer"))?;
    let created_on = scalar_at(raw, &["created_on"])?;
    if created_on.is_empty() {
        return Err(RecordError::missing("created_on"));
    }

    let user = match raw.get("user_login") {
        Some(Value::String(login)) => login.clone(),
        _ => "Unknown".to_string(),
    };
    let email = match raw.get("user_email") {
        Some(Value::String(email)) => email.clone(),
        _ => String::new(),
    };
    let details = match raw.get("metadata") {
        Some(Value::Object(meta)) if !meta.is_empty() => {
            serde_json::to_string(meta).map_err(|e| RecordError::invalid("metadata", e.to_string()))?
        }
        _ => String::new(),
    };

    Ok(Record::new()
        .with("Timestamp", format_timestamp(&created_on))
        .with("Event ID", alert_id.to_string())
        .with("Event Description", event_description(alert_id))
        .with("User", user)
        .with("User Email", email)
        .with("Details", details))
}
