use std::io::{Cursor, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::compute::concat_batches;
use arrow::csv::ReaderBuilder;
use arrow::csv::reader::Format;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::info;

use super::Source;
use crate::config::FileFormat;
use crate::errors::SourceError;

/// Reads a local Parquet or CSV file into one batch.
pub struct FileSource {
    path: PathBuf,
    format: Option<FileFormat>,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>, format: Option<FileFormat>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            format,
        }
    }

    fn resolve_format(&self) -> Result<FileFormat, SourceError> {
        if let Some(format) = self.format {
            return Ok(format);
        }
        match self.path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("parquet") => Ok(FileFormat::Parquet),
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Ok(FileFormat::Csv),
            _ => Err(SourceError::Read {
                path: self.describe(),
                reason: "cannot infer file format, set source.format".to_string(),
            }),
        }
    }

    fn malformed(&self, err: impl std::fmt::Display) -> SourceError {
        SourceError::Malformed {
            reason: format!("{}: {}", self.describe(), err),
        }
    }

    fn read_parquet(&self, bytes: Bytes) -> Result<(SchemaRef, Vec<RecordBatch>), SourceError> {
        let builder =
            ParquetRecordBatchReaderBuilder::try_new(bytes).map_err(|e| self.malformed(e))?;
        let schema = builder.schema().clone();
        let reader = builder.build().map_err(|e| self.malformed(e))?;
        let batches = reader
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| self.malformed(e))?;
        Ok((schema, batches))
    }

    fn read_csv(&self, bytes: Bytes) -> Result<(SchemaRef, Vec<RecordBatch>), SourceError> {
        let mut cursor = Cursor::new(bytes);
        let format = Format::default().with_header(true);
        let (schema, _) = format
            .infer_schema(&mut cursor, None)
            .map_err(|e| self.malformed(e))?;
        cursor
            .seek(SeekFrom::Start(0))
            .map_err(|e| self.malformed(e))?;

        let schema = Arc::new(schema);
        let reader = ReaderBuilder::new(schema.clone())
            .with_header(true)
            .build(cursor)
            .map_err(|e| self.malformed(e))?;
        let batches = reader
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| self.malformed(e))?;
        Ok((schema, batches))
    }
}

#[async_trait]
impl Source for FileSource {
    async fn extract(&self) -> Result<RecordBatch, SourceError> {
        let format = self.resolve_format()?;
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| SourceError::Read {
                path: self.describe(),
                reason: e.to_string(),
            })?;
        if bytes.is_empty() {
            return Err(SourceError::Empty {
                path: self.describe(),
            });
        }

        let (schema, batches) = match format {
            FileFormat::Parquet => self.read_parquet(Bytes::from(bytes))?,
            FileFormat::Csv => self.read_csv(Bytes::from(bytes))?,
        };
        let batch = concat_batches(&schema, &batches).map_err(|e| self.malformed(e))?;

        info!("Extracted {} rows from {}", batch.num_rows(), self.describe());
        Ok(batch)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
