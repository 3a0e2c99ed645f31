pub mod activity;
pub mod orders;
pub mod products;

use crate::core::Record;
use crate::utils::error::RecordError;
use serde_json::Value;
use std::fmt;

/// Projects one raw API/database record into an export row.
pub type RecordTransform = fn(&Value) -> Result<Record, RecordError>;

/// The kinds of data that can be exported. Each one owns its stream naming and projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ExportTarget {
    Products,
    ProductTitles,
    Orders,
    Activity,
}

impl ExportTarget {
    pub const ALL: [ExportTarget; 4] = [
        ExportTarget::Products,
        ExportTarget::ProductTitles,
        ExportTarget::Orders,
        ExportTarget::Activity,
    ];

    pub fn stream_prefix(self) -> &'static str {
        match self {
            ExportTarget::Products => "product_data",
            ExportTarget::ProductTitles => "product_titles",
            ExportTarget::Orders => "order_data",
            ExportTarget::Activity => "activity_log",
        }
    }

    /// Export identifier shared by the sink file and the checkpoint.
    pub fn stream_id(self, website: &str) -> String {
        format!("{}_{}", self.stream_prefix(), website)
    }

    /// WooCommerce REST resource, or `None` for database-backed targets.
    pub fn rest_resource(self) -> Option<&'static str> {
        match self {
            ExportTarget::Products | ExportTarget::ProductTitles => Some("products"),
            ExportTarget::Orders => Some("orders"),
            ExportTarget::Activity => None,
        }
    }

    pub fn transform(self) -> RecordTransform {
        match self {
            ExportTarget::Products => products::product_row,
            ExportTarget::ProductTitles => products::product_title_row,
            ExportTarget::Orders => orders::order_row,
            ExportTarget::Activity => activity::activity_row,
        }
    }
}

impl fmt::Display for ExportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportTarget::Products => "products",
            ExportTarget::ProductTitles => "product titles",
            ExportTarget::Orders => "orders",
            ExportTarget::Activity => "activity log",
        };
        f.write_str(name)
    }
}

/// Walks `path` through nested objects. `null` counts as present.
pub(crate) fn field<'a>(raw: &'a Value, path: &[&str]) -> Result<&'a Value, RecordError> {
    let mut current = raw;
    for key in path {
        current = current
            .get(key)
            .ok_or_else(|| RecordError::missing(path.join(".")))?;
    }
    Ok(current)
}

/// Renders a scalar JSON value as a CSV cell.
pub(crate) fn scalar(value: &Value, name: &str) -> Result<String, RecordError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        Value::Array(_) | Value::Object(_) => {
            Err(RecordError::invalid(name, "expected a scalar value"))
        }
    }
}

pub(crate) fn scalar_at(raw: &Value, path: &[&str]) -> Result<String, RecordError> {
    scalar(field(raw, path)?, &path.join("."))
}

/// First element's `key` from an array field, or an empty string when the array is empty.
pub(crate) fn first_of(raw: &Value, array: &str, key: &str) -> Result<String, RecordError> {
    let items = field(raw, &[array])?
        .as_array()
        .ok_or_else(|| RecordError::invalid(array, "expected an array"))?;
    let Some(item) = items.first() else {
        return Ok(String::new());
    };
    let name = format!("{}[0].{}", array, key);
    let value = item
        .get(key)
        .ok_or_else(|| RecordError::missing(name.as_str()))?;
    scalar(value, &name)
}
