//! Date-based table partitioning.
//!
//! Splits a `RecordBatch` into one sub-batch per calendar date found in a
//! designated date or timestamp column. Rows whose partition value is null
//! are dropped from every partition.

use std::collections::BTreeSet;
use std::fmt::Write;

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, Date32Array};
use arrow::compute::kernels::boolean::or;
use arrow::compute::kernels::cmp::eq;
use arrow::compute::filter_record_batch;
use arrow::datatypes::{
    DataType, Date32Type, Date64Type, TimeUnit, TimestampMicrosecondType,
    TimestampMillisecondType, TimestampNanosecondType, TimestampSecondType,
};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use chrono::format::{Item, StrftimeItems};
use tracing::debug;

use crate::errors::PartitionError;

pub const DEFAULT_PARTITION_FORMAT: &str = "date=%Y-%m-%d";

/// Days from 0001-01-01 (CE day 1) to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

const SECONDS_PER_DAY: i64 = 86_400;
const MILLIS_PER_DAY: i64 = SECONDS_PER_DAY * 1_000;
const MICROS_PER_DAY: i64 = MILLIS_PER_DAY * 1_000;
const NANOS_PER_DAY: i64 = MICROS_PER_DAY * 1_000;

/// Rejects strftime templates chrono cannot render.
pub fn validate_format(format: &str) -> Result<(), PartitionError> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(PartitionError::InvalidFormat {
            format: format.to_string(),
        });
    }
    Ok(())
}

/// One date-bucketed slice of the input table.
#[derive(Debug, Clone)]
pub struct Partition {
    pub key: String,
    /// Earliest calendar date that rendered to `key`.
    pub date: NaiveDate,
    pub batch: RecordBatch,
}

impl Partition {
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }
}

/// Partitions keyed by their rendered key, enumerated in ascending date order.
#[derive(Debug, Clone, Default)]
pub struct PartitionMap {
    partitions: Vec<Partition>,
}

impl PartitionMap {
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&RecordBatch> {
        self.partitions
            .iter()
            .find(|p| p.key == key)
            .map(|p| &p.batch)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.partitions.iter().map(|p| p.key.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Partition> {
        self.partitions.iter()
    }

    /// Sum of rows across all partitions.
    pub fn total_rows(&self) -> usize {
        self.partitions.iter().map(Partition::num_rows).sum()
    }
}

impl IntoIterator for PartitionMap {
    type Item = Partition;
    type IntoIter = std::vec::IntoIter<Partition>;

    fn into_iter(self) -> Self::IntoIter {
        self.partitions.into_iter()
    }
}

impl<'a> IntoIterator for &'a PartitionMap {
    type Item = &'a Partition;
    type IntoIter = std::slice::Iter<'a, Partition>;

    fn into_iter(self) -> Self::IntoIter {
        self.partitions.iter()
    }
}

/// Partitions record batches by a date or timestamp column.
#[derive(Debug, Clone)]
pub struct Partitioner {
    partition_column: String,
    partition_format: String,
}

impl Partitioner {
    /// Uses the default `date=%Y-%m-%d` key template.
    pub fn new(partition_column: impl Into<String>) -> Self {
        Self {
            partition_column: partition_column.into(),
            partition_format: DEFAULT_PARTITION_FORMAT.to_string(),
        }
    }

    /// Uses a custom strftime key template.
    pub fn with_format(
        partition_column: impl Into<String>,
        partition_format: impl Into<String>,
    ) -> Result<Self, PartitionError> {
        let partition_format = partition_format.into();
        validate_format(&partition_format)?;
        Ok(Self {
            partition_column: partition_column.into(),
            partition_format,
        })
    }

    pub fn partition_column(&self) -> &str {
        &self.partition_column
    }

    pub fn partition_format(&self) -> &str {
        &self.partition_format
    }

    pub fn partition(&self, batch: &RecordBatch) -> Result<PartitionMap, PartitionError> {
        let partition_col = self.validated_partition_column(batch)?;
        let dates = normalize_to_dates(&partition_col)?;
        let unique_dates: BTreeSet<i32> = dates.iter().flatten().collect();

        let mut groups: Vec<(String, NaiveDate, Vec<i32>)> = Vec::new();
        for days in unique_dates {
            let date = days_to_date(days)?;
            let key = self.format_partition_key(date)?;
            match groups.iter_mut().find(|(k, _, _)| *k == key) {
                Some((_, _, members)) => members.push(days),
                None => groups.push((key, date, vec![days])),
            }
        }

        let mut partitions = Vec::with_capacity(groups.len());
        for (key, date, members) in groups {
            let mask = date_mask(&dates, &members)?;
            let filtered = filter_record_batch(batch, &mask).map_err(compute_error)?;
            debug!("Partition {} holds {} rows", key, filtered.num_rows());
            partitions.push(Partition {
                key,
                date,
                batch: filtered,
            });
        }

        Ok(PartitionMap { partitions })
    }

    fn validated_partition_column(&self, batch: &RecordBatch) -> Result<ArrayRef, PartitionError> {
        let schema = batch.schema();
        let index = schema.index_of(&self.partition_column).map_err(|_| {
            PartitionError::ColumnNotFound {
                column: self.partition_column.clone(),
                available: schema.fields().iter().map(|f| f.name().clone()).collect(),
            }
        })?;

        let column = batch.column(index).clone();
        if !is_date_or_timestamp(column.data_type()) {
            return Err(PartitionError::NotTemporal {
                column: self.partition_column.clone(),
                data_type: column.data_type().to_string(),
            });
        }
        Ok(column)
    }

    fn format_partition_key(&self, date: NaiveDate) -> Result<String, PartitionError> {
        let mut key = String::new();
        write!(key, "{}", date.format(&self.partition_format)).map_err(|_| {
            PartitionError::InvalidFormat {
                format: self.partition_format.clone(),
            }
        })?;
        Ok(key)
    }
}

fn is_date_or_timestamp(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _)
    )
}

/// Truncates every value to its UTC calendar date, as days since the epoch.
fn normalize_to_dates(column: &ArrayRef) -> Result<Date32Array, PartitionError> {
    let dates = match column.data_type() {
        DataType::Date32 => column.as_primitive::<Date32Type>().clone(),
        DataType::Date64 => column
            .as_primitive::<Date64Type>()
            .try_unary(|ms| days_since_epoch(ms, MILLIS_PER_DAY))?,
        DataType::Timestamp(TimeUnit::Second, _) => column
            .as_primitive::<TimestampSecondType>()
            .try_unary(|v| days_since_epoch(v, SECONDS_PER_DAY))?,
        DataType::Timestamp(TimeUnit::Millisecond, _) => column
            .as_primitive::<TimestampMillisecondType>()
            .try_unary(|v| days_since_epoch(v, MILLIS_PER_DAY))?,
        DataType::Timestamp(TimeUnit::Microsecond, _) => column
            .as_primitive::<TimestampMicrosecondType>()
            .try_unary(|v| days_since_epoch(v, MICROS_PER_DAY))?,
        DataType::Timestamp(TimeUnit::Nanosecond, _) => column
            .as_primitive::<TimestampNanosecondType>()
            .try_unary(|v| days_since_epoch(v, NANOS_PER_DAY))?,
        other => {
            return Err(PartitionError::Compute {
                reason: format!("cannot normalize {} to dates", other),
            });
        }
    };
    Ok(dates)
}

/// Floors `value` to whole days, failing when the day count leaves `i32`.
fn days_since_epoch(value: i64, units_per_day: i64) -> Result<i32, PartitionError> {
    let days = value.div_euclid(units_per_day);
    i32::try_from(days).map_err(|_| PartitionError::Compute {
        reason: format!("{} days since epoch is out of range", days),
    })
}

fn days_to_date(days: i32) -> Result<NaiveDate, PartitionError> {
    days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or_else(|| PartitionError::Compute {
            reason: format!("{} days since epoch is out of range", days),
        })
}

/// Rows whose date is one of `members`. Null dates compare as null and are
/// dropped by the filter.
fn date_mask(dates: &Date32Array, members: &[i32]) -> Result<BooleanArray, PartitionError> {
    let mut mask: Option<BooleanArray> = None;
    for days in members {
        let matches = eq(dates, &Date32Array::new_scalar(*days)).map_err(compute_error)?;
        mask = Some(match mask {
            Some(acc) => or(&acc, &matches).map_err(compute_error)?,
            None => matches,
        });
    }
    mask.ok_or_else(|| PartitionError::Compute {
        reason: "empty partition group".to_string(),
    })
}

fn compute_error(err: arrow::error::ArrowError) -> PartitionError {
    PartitionError::Compute {
        reason: err.to_string(),
    }
}
