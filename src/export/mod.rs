pub mod json;

pub use json::{ExportError, ImportSummary, ReviewExport};
