//! Category taxonomy validation.
//!
//! The taxonomy is a two-level hierarchy: top-level categories, each owning
//! zero or more subcategories. A category without subcategories only accepts
//! an empty subcategory.

mod validator;

pub use validator::{normalize_name, CategoryValidator, ValidationError};
