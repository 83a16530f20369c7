pub mod storage;
pub mod warehouse;

use std::path::{Path, PathBuf};

use arrow::record_batch::RecordBatch;

use crate::errors::LoadError;

pub use storage::{ObjectStoreLoader, build_object_path, generate_file_timestamp, store_from_url};
pub use warehouse::{LoadOutcome, WarehouseLoader};

/// The only object-store location a warehouse can import from directly.
pub const GCS_URI_PREFIX: &str = "gs://";

/// Data handed to a warehouse load, classified once at the entry point.
#[derive(Debug, Clone)]
pub enum LoadInput {
    /// An object-store URI the warehouse reads itself.
    RemoteUri(String),
    /// A file on the local filesystem streamed through this process.
    LocalFile(PathBuf),
    /// An in-memory table serialized to Parquet before transfer.
    Table(RecordBatch),
}

impl LoadInput {
    pub fn kind(&self) -> &'static str {
        match self {
            LoadInput::RemoteUri(_) => "remote uri",
            LoadInput::LocalFile(_) => "local file",
            LoadInput::Table(_) => "table",
        }
    }
}

impl From<String> for LoadInput {
    fn from(value: String) -> Self {
        if value.starts_with(GCS_URI_PREFIX) {
            LoadInput::RemoteUri(value)
        } else {
            LoadInput::LocalFile(PathBuf::from(value))
        }
    }
}

impl From<&str> for LoadInput {
    fn from(value: &str) -> Self {
        LoadInput::from(value.to_string())
    }
}

impl From<PathBuf> for LoadInput {
    fn from(value: PathBuf) -> Self {
        match value.to_str() {
            Some(s) if s.starts_with(GCS_URI_PREFIX) => LoadInput::RemoteUri(s.to_string()),
            _ => LoadInput::LocalFile(value),
        }
    }
}

impl From<&Path> for LoadInput {
    fn from(value: &Path) -> Self {
        LoadInput::from(value.to_path_buf())
    }
}

impl From<RecordBatch> for LoadInput {
    fn from(value: RecordBatch) -> Self {
        LoadInput::Table(value)
    }
}

impl TryFrom<serde_yaml::Value> for LoadInput {
    type Error = LoadError;

    fn try_from(value: serde_yaml::Value) -> Result<Self, Self::Error> {
        use serde_yaml::Value;

        let type_name = match value {
            Value::String(s) => return Ok(LoadInput::from(s)),
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
            Value::Tagged(_) => "tagged",
        };
        Err(LoadError::UnsupportedDataType {
            type_name: type_name.to_string(),
        })
    }
}
