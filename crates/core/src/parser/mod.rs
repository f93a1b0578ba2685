//! Client side of the external AI statement parsing service.
//!
//! The service is treated as an opaque function from file bytes to JSON.

mod config;
mod http;
mod traits;

pub use config::ParserConfig;
pub use http::HttpStatementParser;
pub use traits::{ParserError, StatementParser};
