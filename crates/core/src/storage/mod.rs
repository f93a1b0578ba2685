//! Storage accessors for raw source files.

mod fs;
mod traits;

pub use fs::FsStorage;
pub use traits::{filename_from_locator, SourceStorage, StorageError};
