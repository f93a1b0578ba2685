//! Types for documents, parsing runs and transactions.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Processing status of an ingested document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Registered, no successful parse yet.
    Pending,
    /// At least one parsing run succeeded.
    Processed,
    /// Processing gave up on this document.
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processed" => Some(Self::Processed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A source file registered for ingestion, deduplicated by checksum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// Hex SHA-256 of the raw file bytes.
    pub checksum: String,
    /// Human-readable filename extracted from the source locator.
    pub filename: String,
    pub source_uri: String,
    pub owner_id: String,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle status of one parsing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
    /// A newer run exists for the same document.
    Superseded,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Superseded => "superseded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            "superseded" => Some(Self::Superseded),
            _ => None,
        }
    }
}

/// One attempt to extract transactions from a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsingRun {
    pub id: String,
    pub document_id: String,
    pub status: RunStatus,
    /// Model identifier the run was parsed with.
    pub model: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ParsingRun {
    /// Creates a run in the running state, stamped now.
    pub fn start(id: impl Into<String>, document_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            document_id: document_id.into(),
            status: RunStatus::Running,
            model: model.into(),
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
        }
    }
}

/// Unmodified parser output kept for auditing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawModelOutput {
    pub run_id: String,
    pub document_id: String,
    pub output: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A top-level category or a subcategory of one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRow {
    pub id: String,
    pub name: String,
    /// Owning top-level category; `None` for top-level rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl CategoryRow {
    /// A top-level category.
    pub fn category(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_id: None,
            active: true,
        }
    }

    /// A subcategory owned by `parent_id`.
    pub fn subcategory(
        id: impl Into<String>,
        parent_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_id: Some(parent_id.into()),
            active: true,
        }
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Direction of money movement, derived from the amount sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inflow,
    Outflow,
}

/// A normalized statement line, before persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: NaiveDate,
    pub description: String,
    /// Positive is money in, negative is money out.
    pub amount: f64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_after: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    pub category: String,
    pub subcategory: String,
    /// Set once the category pair has been validated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
}

impl Transaction {
    pub fn direction(&self) -> Direction {
        if self.amount < 0.0 {
            Direction::Outflow
        } else {
            Direction::Inflow
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transaction(amount: f64) -> Transaction {
        Transaction {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            description: "Coffee".to_string(),
            amount,
            currency: "GBP".to_string(),
            balance_after: None,
            account_name: None,
            account_number: None,
            category: "Food & Dining".to_string(),
            subcategory: "Cafes".to_string(),
            category_id: None,
        }
    }

    #[test]
    fn test_direction_from_sign() {
        assert_eq!(transaction(-3.5).direction(), Direction::Outflow);
        assert_eq!(transaction(1200.0).direction(), Direction::Inflow);
        assert_eq!(transaction(0.0).direction(), Direction::Inflow);
    }

    #[test]
    fn test_status_strings() {
        for status in [
            RunStatus::Running,
            RunStatus::Succeeded,
            RunStatus::Failed,
            RunStatus::Superseded,
        ] {
            assert_eq!(RunStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(DocumentStatus::parse("processed"), Some(DocumentStatus::Processed));
        assert_eq!(DocumentStatus::parse("unknown"), None);
    }

    #[test]
    fn test_category_row_deserialize_defaults_active() {
        let row: CategoryRow = serde_json::from_str(r#"{"id":"c1","name":"Housing"}"#).unwrap();
        assert!(row.active);
        assert!(row.is_top_level());
    }
}
