use super::scalar_at;
use crate::core::Record;
use crate::utils::error::RecordError;
use serde_json::Value;

pub fn order_row(raw: &Value) -> Result<Record, RecordError> {
    let first = scalar_at(raw, &["billing", "first_name"])?;
    let last = scalar_at(raw, &["billing", "last_name"])?;
    let name = format!("{} {}", first, last).trim().to_string();

    Ok(Record::new()
        .with("Name", name)
        .with("Email", scalar_at(raw, &["billing", "email"])?)
        .with("Phone", scalar_at(raw, &["billing", "phone"])?)
        .with("Order ID", scalar_at(raw, &["id"])?)
        .with("Order Status", scalar_at(raw, &["status"])?)
        .with("Order Amount", scalar_at(raw, &["total"])?))
}
