use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::ConfigError;
use crate::transform::partitioner::{DEFAULT_PARTITION_FORMAT, validate_format};

/// Upper bound the destination warehouse places on clustering columns.
pub const MAX_CLUSTER_FIELDS: usize = 4;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    pub version: u32,
    pub source: SourceConfig,
    #[serde(default)]
    pub transform: TransformConfig,
    pub storage: Option<StorageConfig>,
    pub warehouse: Option<WarehouseConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub path: String,
    pub format: Option<FileFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    File,
    Sheet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    Parquet,
    Csv,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransformConfig {
    pub partition_column: Option<String>,
    #[serde(default = "default_partition_format")]
    pub partition_format: String,
    pub created_at_column: Option<String>,
    #[serde(default)]
    pub compression: CompressionType,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            partition_column: None,
            partition_format: default_partition_format(),
            created_at_column: None,
            compression: CompressionType::default(),
        }
    }
}

fn default_partition_format() -> String {
    DEFAULT_PARTITION_FORMAT.to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionType {
    None,
    Gzip,
    #[default]
    Snappy,
    Lz4,
    Zstd,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// `gs://bucket/prefix`, `file:///abs/dir` or `memory://`.
    pub url: String,
    pub source_name: String,
    #[serde(default = "default_true")]
    pub timestamp: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WarehouseConfig {
    #[serde(flatten)]
    pub load: LoadConfig,
    /// Load this path or `gs://` URI instead of the extracted table.
    #[serde(default)]
    pub input: Option<serde_yaml::Value>,
}

/// Write semantics for exactly one load operation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoadConfig {
    pub dataset_id: String,
    pub table_id: String,
    #[serde(default)]
    pub write_disposition: WriteDisposition,
    #[serde(default)]
    pub source_format: SourceFormat,
    #[serde(default = "default_true")]
    pub create_table_if_needed: bool,
    pub partition_field: Option<String>,
    pub cluster_fields: Option<Vec<String>>,
}

impl LoadConfig {
    pub fn new(dataset_id: impl Into<String>, table_id: impl Into<String>) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            table_id: table_id.into(),
            write_disposition: WriteDisposition::default(),
            source_format: SourceFormat::default(),
            create_table_if_needed: true,
            partition_field: None,
            cluster_fields: None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dataset_id.is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "Dataset id cannot be empty".to_string(),
            });
        }
        if self.table_id.is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "Table id cannot be empty".to_string(),
            });
        }
        if let Some(fields) = &self.cluster_fields {
            if fields.len() > MAX_CLUSTER_FIELDS {
                return Err(ConfigError::ValidationFailed {
                    reason: format!(
                        "At most {} cluster fields are allowed, got {}",
                        MAX_CLUSTER_FIELDS,
                        fields.len()
                    ),
                });
            }
            if fields.iter().any(|f| f.is_empty()) {
                return Err(ConfigError::ValidationFailed {
                    reason: "Cluster field names cannot be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum WriteDisposition {
    #[default]
    #[serde(rename = "WRITE_TRUNCATE", alias = "truncate")]
    Truncate,
    #[serde(rename = "WRITE_APPEND", alias = "append")]
    Append,
    /// Fails the load when the destination already holds rows.
    #[serde(rename = "WRITE_EMPTY", alias = "empty")]
    Empty,
}

impl WriteDisposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteDisposition::Truncate => "WRITE_TRUNCATE",
            WriteDisposition::Append => "WRITE_APPEND",
            WriteDisposition::Empty => "WRITE_EMPTY",
        }
    }
}

impl fmt::Display for WriteDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum SourceFormat {
    #[default]
    #[serde(rename = "PARQUET", alias = "parquet")]
    Parquet,
    #[serde(rename = "CSV", alias = "csv")]
    Csv,
    #[serde(rename = "NEWLINE_DELIMITED_JSON", alias = "json")]
    NewlineDelimitedJson,
    #[serde(rename = "AVRO", alias = "avro")]
    Avro,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Parquet => "PARQUET",
            SourceFormat::Csv => "CSV",
            SourceFormat::NewlineDelimitedJson => "NEWLINE_DELIMITED_JSON",
            SourceFormat::Avro => "AVRO",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_true() -> bool {
    true
}

pub async fn load_config(config_path: Option<&str>) -> anyhow::Result<PipelineConfig> {
    match config_path {
        Some(path) => PipelineConfig::from_file(path),
        None => PipelineConfig::from_env(),
    }
}

impl PipelineConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            origin: path.to_string(),
            error: Box::new(e),
        })?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let config_str = std::env::var("PIPELINE_CONFIG")
            .map_err(|_| anyhow::anyhow!("PIPELINE_CONFIG environment variable not set"))?;
        let config: PipelineConfig = serde_yaml::from_str(&config_str)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.path.is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "Source path cannot be empty".to_string(),
            });
        }
        if let Some(column) = &self.transform.partition_column {
            if column.is_empty() {
                return Err(ConfigError::ValidationFailed {
                    reason: "Partition column cannot be empty".to_string(),
                });
            }
        }
        validate_format(&self.transform.partition_format).map_err(|e| {
            ConfigError::ValidationFailed {
                reason: e.to_string(),
            }
        })?;
        if let Some(storage) = &self.storage {
            if storage.url.is_empty() {
                return Err(ConfigError::ValidationFailed {
                    reason: "Storage url cannot be empty".to_string(),
                });
            }
            if storage.source_name.is_empty() {
                return Err(ConfigError::ValidationFailed {
                    reason: "Storage source name cannot be empty".to_string(),
                });
            }
        }
        if let Some(warehouse) = &self.warehouse {
            warehouse.load.validate()?;
        }
        if self.storage.is_none() && self.warehouse.is_none() {
            return Err(ConfigError::MissingField {
                field: "storage or warehouse".to_string(),
            });
        }
        Ok(())
    }
}
