pub mod error;
pub mod headers;

pub use error::{AdapterError, Result};
pub use headers::{Headers, find_header};
