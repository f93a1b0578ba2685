//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the collaborator traits the
//! ingestion pipeline and job queue depend on, so both can be exercised end
//! to end without a database, file system or parsing service.
//!
//! # Example
//!
//! ```rust,ignore
//! use ledgerline_core::testing::{fixtures, MockDocumentRepository, MockStatementParser, MockStorage};
//!
//! let repo = MockDocumentRepository::new().with_categories(fixtures::taxonomy());
//! let storage = MockStorage::new().with_file("statement.pdf", fixtures::statement_bytes());
//! let parser = MockStatementParser::new().with_response(fixtures::coffee_output());
//!
//! // Build an IngestService from them...
//! ```

mod mock_parser;
mod mock_repository;
mod mock_storage;
mod recording_delay;

pub use mock_parser::MockStatementParser;
pub use mock_repository::{MockDocumentRepository, StoredTransaction};
pub use mock_storage::MockStorage;
pub use recording_delay::RecordingDelay;

/// Test fixtures and helper functions.
pub mod fixtures {
    use serde_json::{json, Value};

    use crate::records::CategoryRow;

    /// Id of the "Food & Dining" category in [`taxonomy`].
    pub const FOOD_AND_DINING_ID: &str = "cat-food";

    /// A small two-level taxonomy:
    /// - Food & Dining: Cafes, Groceries
    /// - Housing: Rent, Utilities
    /// - Income: Salary
    /// - Transfers (no subcategories)
    pub fn taxonomy() -> Vec<CategoryRow> {
        vec![
            CategoryRow::category(FOOD_AND_DINING_ID, "Food & Dining"),
            CategoryRow::subcategory("sub-cafes", FOOD_AND_DINING_ID, "Cafes"),
            CategoryRow::subcategory("sub-groceries", FOOD_AND_DINING_ID, "Groceries"),
            CategoryRow::category("cat-housing", "Housing"),
            CategoryRow::subcategory("sub-rent", "cat-housing", "Rent"),
            CategoryRow::subcategory("sub-utilities", "cat-housing", "Utilities"),
            CategoryRow::category("cat-income", "Income"),
            CategoryRow::subcategory("sub-salary", "cat-income", "Salary"),
            CategoryRow::category("cat-transfers", "Transfers"),
        ]
    }

    /// Raw statement content. Any non-empty bytes do.
    pub fn statement_bytes() -> Vec<u8> {
        b"%PDF-1.4\n% statement fixture\n".to_vec()
    }

    /// Parser output with a single coffee purchase.
    pub fn coffee_output() -> Value {
        coffee_output_with("Food & Dining", "Cafes")
    }

    /// Parser output with a single coffee purchase in the given category.
    pub fn coffee_output_with(category: &str, subcategory: &str) -> Value {
        json!({
            "transactions": [{
                "date": "2024-01-01",
                "description": "Coffee",
                "amount": -3.50,
                "currency": "GBP",
                "category": category,
                "subcategory": subcategory
            }]
        })
    }

    /// Parser output with several transactions across the taxonomy.
    pub fn monthly_output() -> Value {
        json!({
            "transactions": [
                {
                    "date": "2024-01-01",
                    "description": "Salary",
                    "amount": 2500,
                    "currency": "GBP",
                    "balance_after": 2750.25,
                    "account_name": "Current Account",
                    "account_number": "12345678",
                    "category": "Income",
                    "subcategory": "Salary"
                },
                {
                    "date": "2024-01-02",
                    "description": "Rent",
                    "amount": -1200.0,
                    "currency": "GBP",
                    "category": "housing",
                    "subcategory": " rent "
                },
                {
                    "date": "2024-01-03",
                    "description": "Tesco",
                    "amount": -42.17,
                    "currency": "GBP",
                    "category": "FOOD & DINING",
                    "subcategory": "groceries"
                }
            ]
        })
    }
}
