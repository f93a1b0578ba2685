//! Transaction transformer.
//!
//! Turns the loosely-typed output of the statement parser into typed
//! [`Transaction`](crate::records::Transaction) records. No I/O.

mod transformer;

pub use transformer::{transform_output, TransformError};
