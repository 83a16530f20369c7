use std::sync::Arc;

use arrow::array::TimestampMicrosecondArray;
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};

use crate::errors::TransformError;

/// Appends a UTC load-time column, one identical value per row.
pub fn add_created_at_column(
    batch: &RecordBatch,
    column_name: &str,
) -> Result<RecordBatch, TransformError> {
    add_created_at_column_at(batch, column_name, Utc::now())
}

pub fn add_created_at_column_at(
    batch: &RecordBatch,
    column_name: &str,
    created_at: DateTime<Utc>,
) -> Result<RecordBatch, TransformError> {
    let schema = batch.schema();
    if schema.column_with_name(column_name).is_some() {
        return Err(TransformError::ColumnExists {
            column: column_name.to_string(),
        });
    }

    let timestamps =
        TimestampMicrosecondArray::from_value(created_at.timestamp_micros(), batch.num_rows())
            .with_timezone("UTC");

    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    fields.push(Field::new(
        column_name,
        DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
        false,
    ));
    let mut columns = batch.columns().to_vec();
    columns.push(Arc::new(timestamps));

    let batch = RecordBatch::try_new(
        Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone())),
        columns,
    )?;
    Ok(batch)
}
