use std::sync::Arc;

use tracing::{debug, info};

use super::LoadInput;
use crate::config::{CompressionType, LoadConfig};
use crate::errors::{LoadError, Result};
use crate::serialize::table_to_parquet_buffer_with;
use crate::warehouse::{
    LoadJob, LoadJobConfig, LoadStream, TableConfig, TableReference, TableSchema, TableStatus,
    Warehouse, ensure_table_exists,
};

/// What a single warehouse load did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub job: LoadJob,
    /// Set only when the destination was probed before an in-memory load.
    pub table_status: Option<TableStatus>,
}

/// Routes a `LoadInput` to the matching warehouse transfer.
pub struct WarehouseLoader {
    client: Arc<dyn Warehouse>,
    compression: CompressionType,
}

impl WarehouseLoader {
    pub fn new(client: Arc<dyn Warehouse>) -> Self {
        Self {
            client,
            compression: CompressionType::default(),
        }
    }

    pub fn with_compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    /// Loads one input into the configured table and waits for the job.
    ///
    /// The destination is provisioned only for in-memory tables, since file and
    /// URI inputs carry no schema until the warehouse reads them.
    pub async fn load(&self, input: impl Into<LoadInput>, config: &LoadConfig) -> Result<LoadOutcome> {
        let input = input.into();
        let destination = TableReference::new(
            self.client.project(),
            &config.dataset_id,
            &config.table_id,
        );

        let table_status = match &input {
            LoadInput::Table(batch) if config.create_table_if_needed => {
                let table_config = TableConfig::new(&config.dataset_id, &config.table_id)
                    .with_schema(TableSchema::Arrow(batch.schema()))
                    .with_partition_field(config.partition_field.clone())
                    .with_cluster_fields(config.cluster_fields.clone());
                Some(ensure_table_exists(self.client.as_ref(), &table_config).await?)
            }
            _ => None,
        };

        let job_config = LoadJobConfig {
            write_disposition: config.write_disposition,
            source_format: config.source_format,
            autodetect: true,
        };

        debug!("Dispatching {} load into {}", input.kind(), destination);
        let job = match input {
            LoadInput::RemoteUri(uri) => {
                self.client
                    .load_from_uri(&uri, &destination, &job_config)
                    .await?
            }
            LoadInput::LocalFile(path) => {
                let file = tokio::fs::File::open(&path)
                    .await
                    .map_err(|e| LoadError::OpenFile {
                        path: path.display().to_string(),
                        source: e,
                    })?;
                let reader: LoadStream = Box::new(file);
                self.client
                    .load_from_reader(reader, &destination, &job_config)
                    .await?
            }
            LoadInput::Table(batch) => {
                let buffer = table_to_parquet_buffer_with(&batch, self.compression)?;
                let reader: LoadStream = Box::new(buffer);
                self.client
                    .load_from_reader(reader, &destination, &job_config)
                    .await?
            }
        };

        info!("Loaded {} rows into {}", job.output_rows, destination);
        Ok(LoadOutcome { job, table_status })
    }
}
