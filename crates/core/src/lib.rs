pub mod apply;
pub mod backend;
pub mod error;
pub mod list;
pub mod matcher;
pub mod path;
pub mod storage;

pub use error::{Result, StorageError};
pub use storage::Storage;
