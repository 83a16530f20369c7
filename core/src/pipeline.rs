use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use object_store::ObjectStore;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::errors::{ConfigError, Result};
use crate::sink::{LoadInput, ObjectStoreLoader, WarehouseLoader};
use crate::source::Source;
use crate::telemetry::PipelineMetrics;
use crate::transform::{PartitionMap, Partitioner, add_created_at_column};
use crate::warehouse::{TableStatus, Warehouse};

/// Summary of one pipeline run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    pub rows_extracted: usize,
    pub partitions: Vec<String>,
    pub objects_written: Vec<String>,
    pub rows_loaded: Option<u64>,
    pub table_status: Option<TableStatus>,
}

/// Runs one extracted table through transform, object storage and warehouse.
pub struct Pipeline {
    config: PipelineConfig,
    partitioner: Option<Partitioner>,
    storage: Option<ObjectStoreLoader>,
    warehouse: Option<WarehouseLoader>,
    metrics: PipelineMetrics,
}

impl Pipeline {
    /// Validates the config and pairs each configured sink with its handle.
    ///
    /// A `storage` section needs `store` and a `warehouse` section needs
    /// `client`. Handles without a matching section are ignored.
    pub fn new(
        config: PipelineConfig,
        store: Option<Arc<dyn ObjectStore>>,
        client: Option<Arc<dyn Warehouse>>,
    ) -> Result<Self> {
        config.validate()?;
        let compression = config.transform.compression;

        let partitioner = match &config.transform.partition_column {
            Some(column) => Some(Partitioner::with_format(
                column,
                &config.transform.partition_format,
            )?),
            None => None,
        };

        let storage = match (&config.storage, store) {
            (Some(_), Some(store)) => {
                Some(ObjectStoreLoader::new(store).with_compression(compression))
            }
            (Some(_), None) => {
                return Err(ConfigError::MissingField {
                    field: "object store for storage.url".to_string(),
                }
                .into());
            }
            (None, _) => None,
        };

        let warehouse = match (&config.warehouse, client) {
            (Some(_), Some(client)) => {
                Some(WarehouseLoader::new(client).with_compression(compression))
            }
            (Some(_), None) => {
                return Err(ConfigError::MissingField {
                    field: "warehouse client".to_string(),
                }
                .into());
            }
            (None, _) => None,
        };

        Ok(Self {
            config,
            partitioner,
            storage,
            warehouse,
            metrics: PipelineMetrics::default(),
        })
    }

    /// Extracts from `source` and runs the result.
    pub async fn run_source(&mut self, source: &dyn Source) -> Result<PipelineReport> {
        let batch = match source.extract().await {
            Ok(batch) => batch,
            Err(e) => {
                self.metrics.runs += 1;
                self.metrics.failed_runs += 1;
                return Err(e.into());
            }
        };
        self.run(batch).await
    }

    pub async fn run(&mut self, batch: RecordBatch) -> Result<PipelineReport> {
        self.metrics.runs += 1;
        match self.execute(batch).await {
            Ok(report) => {
                self.metrics.rows_extracted += report.rows_extracted;
                self.metrics.partitions_built += report.partitions.len();
                self.metrics.objects_written += report.objects_written.len();
                self.metrics.rows_loaded += report.rows_loaded.unwrap_or(0);
                if report.table_status == Some(TableStatus::Created) {
                    self.metrics.tables_created += 1;
                }
                Ok(report)
            }
            Err(e) => {
                self.metrics.failed_runs += 1;
                warn!("Pipeline run failed: {}", e);
                Err(e)
            }
        }
    }

    async fn execute(&self, batch: RecordBatch) -> Result<PipelineReport> {
        let mut report = PipelineReport {
            rows_extracted: batch.num_rows(),
            ..Default::default()
        };

        // Classified before any upload so a bad input fails without side effects.
        let configured_input = match self.config.warehouse.as_ref().and_then(|w| w.input.as_ref()) {
            Some(value) => Some(LoadInput::try_from(value.clone())?),
            None => None,
        };

        let batch = match &self.config.transform.created_at_column {
            Some(column) => add_created_at_column(&batch, column)?,
            None => batch,
        };

        let partitions: Option<PartitionMap> = match &self.partitioner {
            Some(partitioner) => {
                let partitions = partitioner.partition(&batch)?;
                info!(
                    "Built {} partitions on '{}'",
                    partitions.len(),
                    partitioner.partition_column()
                );
                report.partitions = partitions.keys().map(str::to_string).collect();
                Some(partitions)
            }
            None => None,
        };

        if let (Some(loader), Some(storage)) = (&self.storage, &self.config.storage) {
            let written = match &partitions {
                Some(partitions) => {
                    loader
                        .load_partitions(partitions, &storage.source_name)
                        .await?
                }
                None => vec![
                    loader
                        .load(&batch, &storage.source_name, storage.timestamp)
                        .await?,
                ],
            };
            report.objects_written = written.iter().map(|p| p.to_string()).collect();
        }

        if let (Some(loader), Some(warehouse)) = (&self.warehouse, &self.config.warehouse) {
            let input = configured_input.unwrap_or(LoadInput::Table(batch));
            let outcome = loader.load(input, &warehouse.load).await?;
            report.rows_loaded = Some(outcome.job.output_rows);
            report.table_status = outcome.table_status;
        }

        Ok(report)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }
}
