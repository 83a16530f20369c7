use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Data source error: {0}")]
    Source(#[from] SourceError),

    #[error("Partition error: {0}")]
    Partition(#[from] PartitionError),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Warehouse error: {0}")]
    Warehouse(#[from] WarehouseError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Failed to load configuration from {origin}: {error}")]
    LoadFailed {
        origin: String,
        #[source]
        error: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to read source {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Malformed source data: {reason}")]
    Malformed { reason: String },

    #[error("Source {path} contains no data")]
    Empty { path: String },
}

#[derive(Error, Debug)]
pub enum PartitionError {
    #[error("Partition column '{column}' not found in table. Available columns: {available:?}")]
    ColumnNotFound {
        column: String,
        available: Vec<String>,
    },

    #[error("'{column}' must be date or timestamp, got {data_type}")]
    NotTemporal { column: String, data_type: String },

    #[error("Invalid partition format '{format}'")]
    InvalidFormat { format: String },

    #[error("Partition compute failed: {reason}")]
    Compute { reason: String },
}

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Column '{column}' already exists in table")]
    ColumnExists { column: String },

    #[error("Failed to build transformed table: {0}")]
    Arrow(#[from] ArrowError),
}

/// Errors raised by a destination warehouse client.
///
/// `NotFound` is the only variant the core treats as an expected condition.
/// Everything else is carried in `Client` and surfaced with the client's own
/// message.
#[derive(Error, Debug)]
pub enum WarehouseError {
    #[error("Table {table} not found")]
    NotFound { table: String },

    #[error(transparent)]
    Client(#[from] Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error(
        "Unsupported data type: {type_name}. Expected a record batch, a local file path, or a gs:// URI string."
    )]
    UnsupportedDataType { type_name: String },

    #[error("Failed to open {path} for loading: {source}")]
    OpenFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid storage url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Object store request failed: {0}")]
    ObjectStore(#[from] object_store::Error),
}

#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("JSON serialization failed: {reason}")]
    Json { reason: String },

    #[error("YAML serialization failed: {reason}")]
    Yaml { reason: String },

    #[error("Arrow serialization failed: {reason}")]
    Arrow { reason: String },

    #[error("Parquet serialization failed: {reason}")]
    Parquet { reason: String },
}

pub type Result<T> = std::result::Result<T, PlatformError>;

impl From<serde_json::Error> for PlatformError {
    fn from(err: serde_json::Error) -> Self {
        PlatformError::Serialization(SerializationError::Json {
            reason: err.to_string(),
        })
    }
}

impl From<serde_yaml::Error> for PlatformError {
    fn from(err: serde_yaml::Error) -> Self {
        PlatformError::Serialization(SerializationError::Yaml {
            reason: err.to_string(),
        })
    }
}

impl From<ArrowError> for SerializationError {
    fn from(err: ArrowError) -> Self {
        SerializationError::Arrow {
            reason: err.to_string(),
        }
    }
}

impl From<ParquetError> for SerializationError {
    fn from(err: ParquetError) -> Self {
        SerializationError::Parquet {
            reason: err.to_string(),
        }
    }
}

impl From<ArrowError> for PlatformError {
    fn from(err: ArrowError) -> Self {
        PlatformError::Serialization(err.into())
    }
}

impl From<ParquetError> for PlatformError {
    fn from(err: ParquetError) -> Self {
        PlatformError::Serialization(err.into())
    }
}

impl From<object_store::Error> for PlatformError {
    fn from(err: object_store::Error) -> Self {
        PlatformError::Storage(StorageError::ObjectStore(err))
    }
}

impl PlatformError {
    /// Whether an outer orchestrator may reasonably re-run the failed step.
    /// Nothing in this crate retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            PlatformError::Warehouse(WarehouseError::Client(_)) => true,
            PlatformError::Storage(StorageError::ObjectStore(_)) => true,
            PlatformError::Io(_) => true,
            _ => false,
        }
    }

    /// Validation failures are raised before any network call is made.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PlatformError::Partition(PartitionError::ColumnNotFound { .. })
                | PlatformError::Partition(PartitionError::NotTemporal { .. })
                | PlatformError::Partition(PartitionError::InvalidFormat { .. })
                | PlatformError::Transform(TransformError::ColumnExists { .. })
                | PlatformError::Load(LoadError::UnsupportedDataType { .. })
                | PlatformError::Config(_)
        )
    }
}
