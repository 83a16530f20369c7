pub mod file;
pub mod sheet;

use arrow::record_batch::RecordBatch;
use async_trait::async_trait;

use crate::config::{SourceConfig, SourceKind};
use crate::errors::SourceError;

pub use file::FileSource;
pub use sheet::SheetSource;

/// Produces the table a pipeline run works on.
///
/// Vendor access (API credentials, pagination) stays outside this crate;
/// sources here read what those exporters leave behind.
#[async_trait]
pub trait Source: Send + Sync {
    async fn extract(&self) -> Result<RecordBatch, SourceError>;

    /// Human-readable location, used in logs.
    fn describe(&self) -> String;
}

pub fn source_from_config(config: &SourceConfig) -> Box<dyn Source> {
    match config.kind {
        SourceKind::File => Box::new(FileSource::new(&config.path, config.format)),
        SourceKind::Sheet => Box::new(SheetSource::new(&config.path)),
    }
}
