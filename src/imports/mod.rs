mod errors;
mod parse;
mod service;

pub use errors::ImportError;
pub use service::{ImportService, ImportStatus, ImportSummary};
