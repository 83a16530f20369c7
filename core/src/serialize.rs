//! In-memory Parquet encoding of record batches.

use std::collections::BTreeMap;
use std::io::Cursor;

use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use tracing::debug;

use crate::config::CompressionType;
use crate::errors::SerializationError;
use crate::transform::PartitionMap;

/// A finished Parquet file, read position at the start.
pub type ParquetBuffer = Cursor<Vec<u8>>;

impl From<CompressionType> for Compression {
    fn from(value: CompressionType) -> Self {
        match value {
            CompressionType::None => Compression::UNCOMPRESSED,
            CompressionType::Gzip => Compression::GZIP(GzipLevel::default()),
            CompressionType::Snappy => Compression::SNAPPY,
            CompressionType::Lz4 => Compression::LZ4,
            CompressionType::Zstd => Compression::ZSTD(ZstdLevel::default()),
        }
    }
}

/// Encodes a batch as a Parquet file held in memory.
pub fn table_to_parquet_buffer(batch: &RecordBatch) -> Result<ParquetBuffer, SerializationError> {
    table_to_parquet_buffer_with(batch, CompressionType::default())
}

pub fn table_to_parquet_buffer_with(
    batch: &RecordBatch,
    compression: CompressionType,
) -> Result<ParquetBuffer, SerializationError> {
    let props = WriterProperties::builder()
        .set_compression(compression.into())
        .build();

    let mut writer = ArrowWriter::try_new(Vec::new(), batch.schema(), Some(props))?;
    writer.write(batch)?;
    let bytes = writer.into_inner()?;

    debug!(
        "Encoded {} rows into {} bytes of parquet",
        batch.num_rows(),
        bytes.len()
    );
    Ok(Cursor::new(bytes))
}

/// One buffer per partition, keyed like the input.
pub fn partitions_to_parquet_buffers(
    partitions: &PartitionMap,
    compression: CompressionType,
) -> Result<BTreeMap<String, ParquetBuffer>, SerializationError> {
    let mut buffers = BTreeMap::new();
    for partition in partitions {
        let buffer = table_to_parquet_buffer_with(&partition.batch, compression)?;
        buffers.insert(partition.key.clone(), buffer);
    }
    Ok(buffers)
}
