//! In-memory index of valid category/subcategory pairs.

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::warn;

use crate::records::CategoryRow;

/// Why a proposed classification was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unknown category: {category:?}")]
    UnknownCategory { category: String },

    #[error("unknown subcategory {subcategory:?} for category {category:?}")]
    UnknownSubcategory {
        category: String,
        subcategory: String,
    },
}

/// Indexed entry for one top-level category.
#[derive(Debug, Clone)]
struct CategoryEntry {
    id: String,
    subcategories: HashSet<String>,
}

/// Checks proposed (category, subcategory) pairs against the taxonomy.
///
/// Names are compared after trimming and upper-case folding, so
/// `" housing "` and `"HOUSING"` address the same entry.
#[derive(Debug, Clone, Default)]
pub struct CategoryValidator {
    categories: HashMap<String, CategoryEntry>,
}

/// Trims and case-folds a category or subcategory name.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_uppercase()
}

impl CategoryValidator {
    /// Builds the index from taxonomy rows.
    ///
    /// Inactive rows are ignored. Subcategory rows whose parent is not an
    /// active top-level category are skipped.
    pub fn new(rows: &[CategoryRow]) -> Self {
        let mut categories: HashMap<String, CategoryEntry> = HashMap::new();
        let mut names_by_id: HashMap<&str, String> = HashMap::new();

        for row in rows.iter().filter(|r| r.active && r.is_top_level()) {
            let key = normalize_name(&row.name);
            names_by_id.insert(row.id.as_str(), key.clone());
            categories.entry(key).or_insert_with(|| CategoryEntry {
                id: row.id.clone(),
                subcategories: HashSet::new(),
            });
        }

        for row in rows.iter().filter(|r| r.active) {
            let Some(parent_id) = row.parent_id.as_deref() else {
                continue;
            };
            match names_by_id.get(parent_id).and_then(|key| categories.get_mut(key)) {
                Some(entry) => {
                    entry.subcategories.insert(normalize_name(&row.name));
                }
                None => {
                    warn!(
                        subcategory_id = %row.id,
                        parent_id = %parent_id,
                        "Skipping subcategory with unknown parent"
                    );
                }
            }
        }

        Self { categories }
    }

    /// Validates a pair and returns the id of the top-level category.
    pub fn validate(&self, category: &str, subcategory: &str) -> Result<String, ValidationError> {
        let category_key = normalize_name(category);
        let subcategory_key = normalize_name(subcategory);

        let entry = self
            .categories
            .get(&category_key)
            .ok_or_else(|| ValidationError::UnknownCategory {
                category: category.trim().to_string(),
            })?;

        let valid = if entry.subcategories.is_empty() {
            subcategory_key.is_empty()
        } else {
            entry.subcategories.contains(&subcategory_key)
        };

        if !valid {
            return Err(ValidationError::UnknownSubcategory {
                category: category.trim().to_string(),
                subcategory: subcategory.trim().to_string(),
            });
        }

        Ok(entry.id.clone())
    }

    /// Number of top-level categories indexed.
    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taxonomy() -> Vec<CategoryRow> {
        vec![
            CategoryRow::category("cat-food", "Food & Dining"),
            CategoryRow::subcategory("sub-cafes", "cat-food", "Cafes"),
            CategoryRow::subcategory("sub-groceries", "cat-food", "Groceries"),
            CategoryRow::category("cat-housing", "Housing"),
            CategoryRow::subcategory("sub-rent", "cat-housing", "Rent"),
            CategoryRow::category("cat-transfers", "Transfers"),
        ]
    }

    #[test]
    fn test_valid_pair_returns_category_id() {
        let validator = CategoryValidator::new(&taxonomy());
        assert_eq!(validator.validate("Food & Dining", "Cafes").unwrap(), "cat-food");
        assert_eq!(validator.category_count(), 3);
    }

    #[test]
    fn test_case_and_whitespace_insensitive() {
        let validator = CategoryValidator::new(&taxonomy());
        let loose = validator.validate(" housing ", " rent ");
        let strict = validator.validate("HOUSING", "RENT");
        assert_eq!(loose, strict);
        assert_eq!(loose.unwrap(), "cat-housing");
    }

    #[test]
    fn test_unknown_category() {
        let validator = CategoryValidator::new(&taxonomy());
        let err = validator.validate("Nonexistent", "Cafes").unwrap_err();
        assert!(matches!(err, ValidationError::UnknownCategory { .. }));
    }

    #[test]
    fn test_unknown_subcategory() {
        let validator = CategoryValidator::new(&taxonomy());
        let err = validator.validate("Food & Dining", "Rent").unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownSubcategory {
                category: "Food & Dining".to_string(),
                subcategory: "Rent".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_subcategory_when_children_exist() {
        let validator = CategoryValidator::new(&taxonomy());
        assert!(validator.validate("Housing", "").is_err());
        assert!(validator.validate("Housing", "   ").is_err());
    }

    #[test]
    fn test_leaf_category_rejects_any_subcategory() {
        let validator = CategoryValidator::new(&taxonomy());
        assert_eq!(validator.validate("Transfers", "").unwrap(), "cat-transfers");
        assert_eq!(validator.validate("transfers", "  ").unwrap(), "cat-transfers");
        assert!(matches!(
            validator.validate("Transfers", "anything"),
            Err(ValidationError::UnknownSubcategory { .. })
        ));
    }

    #[test]
    fn test_inactive_rows_ignored() {
        let mut rows = taxonomy();
        rows.push(CategoryRow {
            active: false,
            ..CategoryRow::category("cat-old", "Legacy")
        });
        rows.push(CategoryRow {
            active: false,
            ..CategoryRow::subcategory("sub-old", "cat-food", "Takeaway")
        });

        let validator = CategoryValidator::new(&rows);
        assert!(validator.validate("Legacy", "").is_err());
        assert!(validator.validate("Food & Dining", "Takeaway").is_err());
    }

    #[test]
    fn test_orphan_subcategory_skipped() {
        let rows = vec![
            CategoryRow::category("cat-a", "Alpha"),
            CategoryRow::subcategory("sub-x", "missing", "Orphan"),
        ];
        let validator = CategoryValidator::new(&rows);
        // Alpha keeps an empty subcategory set, so it stays a leaf.
        assert!(validator.validate("Alpha", "").is_ok());
        assert!(validator.validate("Alpha", "Orphan").is_err());
    }

    #[test]
    fn test_names_differing_only_in_case_collapse() {
        let rows = vec![
            CategoryRow::category("cat-1", "Bills"),
            CategoryRow::category("cat-2", " BILLS "),
            CategoryRow::subcategory("sub-1", "cat-1", "Power"),
            CategoryRow::subcategory("sub-2", "cat-2", "power "),
        ];
        let validator = CategoryValidator::new(&rows);
        assert_eq!(validator.category_count(), 1);
        assert_eq!(validator.validate("bills", "POWER").unwrap(), "cat-1");
    }

    #[test]
    fn test_empty_taxonomy() {
        let validator = CategoryValidator::new(&[]);
        assert!(validator.is_empty());
        assert!(validator.validate("Anything", "").is_err());
    }
}
