//! Destination warehouse boundary.
//!
//! The core never builds or authenticates a warehouse client. It receives an
//! already-authenticated `Arc<dyn Warehouse>` and drives it through the
//! operations below.

pub mod schema;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

#[cfg(test)]
use mockall::automock;

use crate::config::{SourceFormat, WriteDisposition};
use crate::errors::WarehouseError;

pub use schema::{
    FieldMode, TableConfig, TableDescriptor, TableSchema, TableStatus, TimePartitioning,
    TimePartitioningType, WarehouseField, WarehouseType, arrow_to_warehouse_schema,
    ensure_table_exists,
};

/// Byte stream handed to a local-stream load.
pub type LoadStream = Box<dyn AsyncRead + Send + Unpin>;

/// Fully-qualified `project.dataset.table` name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct TableReference {
    pub project: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl TableReference {
    pub fn new(
        project: impl Into<String>,
        dataset_id: impl Into<String>,
        table_id: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            dataset_id: dataset_id.into(),
            table_id: table_id.into(),
        }
    }
}

impl fmt::Display for TableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset_id, self.table_id)
    }
}

/// Destination-native description of a load job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadJobConfig {
    pub write_disposition: WriteDisposition,
    pub source_format: SourceFormat,
    /// Infer the schema from the transferred data.
    pub autodetect: bool,
}

/// Result of a completed load job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadJob {
    pub job_id: String,
    pub output_rows: u64,
}

/// An authenticated destination warehouse client.
///
/// Every method resolves only once the remote operation has finished. A
/// missing table is reported as `WarehouseError::NotFound`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Project that unqualified `dataset.table` names resolve against.
    fn project(&self) -> String;

    async fn get_table(&self, table: &TableReference) -> Result<TableDescriptor, WarehouseError>;

    async fn create_table(
        &self,
        descriptor: &TableDescriptor,
    ) -> Result<TableDescriptor, WarehouseError>;

    /// Streams bytes from this process into the destination table.
    async fn load_from_reader(
        &self,
        reader: LoadStream,
        destination: &TableReference,
        job: &LoadJobConfig,
    ) -> Result<LoadJob, WarehouseError>;

    /// Imports directly from an external object-store location.
    async fn load_from_uri(
        &self,
        uri: &str,
        destination: &TableReference,
        job: &LoadJobConfig,
    ) -> Result<LoadJob, WarehouseError>;
}
