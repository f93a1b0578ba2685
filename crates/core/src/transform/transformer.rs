//! Converts raw parser output into typed transactions.

use chrono::NaiveDate;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::records::Transaction;

/// Structural problems in parser output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    /// The top-level value does not have the expected shape.
    #[error("malformed parser output: {0}")]
    MalformedOutput(String),

    /// A transaction element is missing a field or has the wrong type.
    #[error("transaction {index}: field {field:?} {reason}")]
    MalformedField {
        index: usize,
        field: &'static str,
        reason: String,
    },
}

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Transforms `{"transactions": [...]}` into typed transactions.
///
/// Fails on the first malformed element, naming its index and field.
pub fn transform_output(output: &Value) -> Result<Vec<Transaction>, TransformError> {
    let root = output.as_object().ok_or_else(|| {
        TransformError::MalformedOutput(format!("expected an object, got {}", type_name(output)))
    })?;

    let items = match root.get("transactions") {
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(TransformError::MalformedOutput(format!(
                "\"transactions\" must be an array, got {}",
                type_name(other)
            )))
        }
        None => {
            return Err(TransformError::MalformedOutput(
                "missing \"transactions\" key".to_string(),
            ))
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| transform_item(index, item))
        .collect()
}

fn transform_item(index: usize, item: &Value) -> Result<Transaction, TransformError> {
    let fields = item.as_object().ok_or_else(|| TransformError::MalformedField {
        index,
        field: "transaction",
        reason: format!("must be an object, got {}", type_name(item)),
    })?;
    let reader = FieldReader { index, fields };

    let raw_date = reader.required_str("date")?;
    let date = NaiveDate::parse_from_str(&raw_date, DATE_FORMAT).map_err(|e| {
        TransformError::MalformedField {
            index,
            field: "date",
            reason: format!("is not an ISO date ({raw_date:?}): {e}"),
        }
    })?;

    Ok(Transaction {
        date,
        description: reader.required_str("description")?,
        amount: reader.required_f64("amount")?,
        currency: reader.required_str("currency")?,
        balance_after: reader.optional_f64("balance_after")?,
        account_name: reader.optional_str("account_name")?,
        account_number: reader.optional_str("account_number")?,
        category: reader.required_str("category")?,
        subcategory: reader.required_str("subcategory")?,
        category_id: None,
    })
}

struct FieldReader<'a> {
    index: usize,
    fields: &'a Map<String, Value>,
}

impl FieldReader<'_> {
    fn malformed(&self, field: &'static str, reason: impl Into<String>) -> TransformError {
        TransformError::MalformedField {
            index: self.index,
            field,
            reason: reason.into(),
        }
    }

    fn required_str(&self, field: &'static str) -> Result<String, TransformError> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Err(self.malformed(field, "is required")),
            Some(Value::String(s)) if s.trim().is_empty() => {
                Err(self.malformed(field, "must not be empty"))
            }
            Some(Value::String(s)) => Ok(s.trim().to_string()),
            Some(other) => Err(self.malformed(
                field,
                format!("must be a string, got {}", type_name(other)),
            )),
        }
    }

    fn optional_str(&self, field: &'static str) -> Result<Option<String>, TransformError> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
            Some(other) => Err(self.malformed(
                field,
                format!("must be a string, got {}", type_name(other)),
            )),
        }
    }

    fn required_f64(&self, field: &'static str) -> Result<f64, TransformError> {
        self.optional_f64(field)?
            .ok_or_else(|| self.malformed(field, "is required"))
    }

    fn optional_f64(&self, field: &'static str) -> Result<Option<f64>, TransformError> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            // as_f64 covers both integer and floating representations
            Some(Value::Number(n)) => n
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.malformed(field, "is not representable as a number")),
            Some(other) => Err(self.malformed(
                field,
                format!("must be a number, got {}", type_name(other)),
            )),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
