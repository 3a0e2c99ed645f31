use super::{first_of, scalar_at};
use crate::core::Record;
use crate::utils::error::RecordError;
use serde_json::Value;

pub fn product_row(raw: &Value) -> Result<Record, RecordError> {
    Ok(Record::new()
        .with("title", scalar_at(raw, &["name"])?)
        .with("price", scalar_at(raw, &["price"])?)
        .with("product_link", scalar_at(raw, &["permalink"])?)
        .with("category", first_of(raw, "categories", "name")?)
        .with("image_url", first_of(raw, "images", "src")?))
}

pub fn product_title_row(raw: &Value) -> Result<Record, RecordError> {
    Ok(Record::new().with("Product Title", scalar_at(raw, &["name"])?))
}
