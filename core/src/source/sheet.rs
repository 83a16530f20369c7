use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::Source;
use crate::errors::SourceError;

/// Body of a spreadsheet values export.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Reads a saved spreadsheet values export into an all-`Utf8` batch.
///
/// The first row names the columns. Cells that are not strings are rendered
/// as their JSON text and `null` cells stay null.
pub struct SheetSource {
    path: PathBuf,
}

impl SheetSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn parse(&self, body: &[u8]) -> Result<RecordBatch, SourceError> {
        let range: ValueRange =
            serde_json::from_slice(body).map_err(|e| SourceError::Malformed {
                reason: format!("{}: {}", self.describe(), e),
            })?;

        let mut rows = range.values.into_iter();
        let header: Vec<String> = match rows.next() {
            Some(header) if !header.is_empty() => header
                .iter()
                .map(|cell| cell_text(cell).unwrap_or_default())
                .collect(),
            _ => {
                return Err(SourceError::Empty {
                    path: self.describe(),
                });
            }
        };

        let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); header.len()];
        for (index, row) in rows.enumerate() {
            if row.len() != header.len() {
                return Err(SourceError::Malformed {
                    reason: format!(
                        "row {} has {} cells, expected {}",
                        index + 2,
                        row.len(),
                        header.len()
                    ),
                });
            }
            for (column, cell) in columns.iter_mut().zip(row.iter()) {
                column.push(cell_text(cell));
            }
        }

        let schema = Arc::new(Schema::new(
            header
                .iter()
                .map(|name| Field::new(name, DataType::Utf8, true))
                .collect::<Vec<_>>(),
        ));
        let arrays = columns
            .into_iter()
            .map(|values| Arc::new(StringArray::from(values)) as ArrayRef)
            .collect();

        RecordBatch::try_new(schema, arrays).map_err(|e| SourceError::Malformed {
            reason: e.to_string(),
        })
    }
}

fn cell_text(cell: &Value) -> Option<String> {
    match cell {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl Source for SheetSource {
    async fn extract(&self) -> Result<RecordBatch, SourceError> {
        let body = tokio::fs::read(&self.path)
            .await
            .map_err(|e| SourceError::Read {
                path: self.describe(),
                reason: e.to_string(),
            })?;
        let batch = self.parse(&body)?;
        info!("Extracted {} rows from sheet {}", batch.num_rows(), self.describe());
        Ok(batch)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
