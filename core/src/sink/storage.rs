//! Parquet uploads to an object store (GCS, local filesystem or memory).

use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use chrono::{NaiveDate, Utc};
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::prefix::PrefixStore;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use tracing::info;
use url::Url;

use crate::config::CompressionType;
use crate::errors::{Result, StorageError};
use crate::serialize::table_to_parquet_buffer_with;
use crate::transform::PartitionMap;

const PARQUET_CONTENT_TYPE: &str = "application/octet-stream";

/// `YYYY-MM-DDTHHMMSS` in UTC, safe to embed in object names.
pub fn generate_file_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H%M%S").to_string()
}

/// `{source}/{partition_key}/{source}-{YYYY-MM-DD}.parquet`
pub fn build_object_path(source: &str, partition_key: &str, date: NaiveDate) -> Path {
    Path::from(format!(
        "{source}/{partition_key}/{source}-{}.parquet",
        date.format("%Y-%m-%d")
    ))
}

/// Builds a store scoped to the path component of `url`.
///
/// `gs://bucket/prefix` reads credentials from the `GOOGLE_*` environment
/// variables. `file:///abs/dir` and `memory:///prefix` need no credentials.
pub fn store_from_url(url: &str) -> Result<Arc<dyn ObjectStore>> {
    let parsed = Url::parse(url).map_err(|e| StorageError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    let prefix = Path::from(parsed.path().trim_matches('/'));

    let store: Arc<dyn ObjectStore> = match parsed.scheme() {
        "gs" => {
            let gcs = GoogleCloudStorageBuilder::from_env()
                .with_url(url)
                .build()
                .map_err(StorageError::from)?;
            Arc::new(PrefixStore::new(gcs, prefix))
        }
        "file" => Arc::new(PrefixStore::new(LocalFileSystem::new(), prefix)),
        "memory" => Arc::new(PrefixStore::new(InMemory::new(), prefix)),
        other => {
            return Err(StorageError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme '{}'", other),
            }
            .into());
        }
    };
    Ok(store)
}

pub struct ObjectStoreLoader {
    store: Arc<dyn ObjectStore>,
    compression: CompressionType,
}

impl ObjectStoreLoader {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            compression: CompressionType::default(),
        }
    }

    pub fn with_compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    /// Uploads `batch` as `{blob_name}.parquet`, or with a UTC timestamp suffix
    /// when `timestamp` is set.
    pub async fn load(&self, batch: &RecordBatch, blob_name: &str, timestamp: bool) -> Result<Path> {
        let name = if timestamp {
            format!("{}_{}.parquet", blob_name, generate_file_timestamp())
        } else {
            format!("{}.parquet", blob_name)
        };
        let location = Path::from(name);
        self.put(batch, &location).await?;
        Ok(location)
    }

    /// Uploads one object per partition, in partition order.
    pub async fn load_partitions(&self, partitions: &PartitionMap, source: &str) -> Result<Vec<Path>> {
        let mut written = Vec::with_capacity(partitions.len());
        for partition in partitions {
            let location = build_object_path(source, &partition.key, partition.date);
            self.put(&partition.batch, &location).await?;
            written.push(location);
        }
        Ok(written)
    }

    async fn put(&self, batch: &RecordBatch, location: &Path) -> Result<()> {
        let buffer = table_to_parquet_buffer_with(batch, self.compression)?;
        let bytes = buffer.into_inner();
        let size = bytes.len();

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, PARQUET_CONTENT_TYPE.into());
        let opts = PutOptions {
            attributes,
            ..Default::default()
        };

        let payload = PutPayload::from(bytes);
        match self.store.put_opts(location, payload.clone(), opts).await {
            Ok(_) => {}
            // Local filesystems store no object attributes.
            Err(object_store::Error::NotImplemented { .. }) => {
                self.store
                    .put(location, payload)
                    .await
                    .map_err(StorageError::from)?;
            }
            Err(e) => return Err(StorageError::from(e).into()),
        }
        info!("Uploaded {} rows ({} bytes) to {}", batch.num_rows(), size, location);
        Ok(())
    }
}
