//! Arrow to warehouse schema reconciliation and table provisioning.

use std::fmt;

use arrow::datatypes::{DataType, Schema, SchemaRef};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{TableReference, Warehouse};
use crate::errors::WarehouseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WarehouseType {
    Integer,
    Float,
    String,
    Boolean,
    Date,
    Timestamp,
}

impl WarehouseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarehouseType::Integer => "INTEGER",
            WarehouseType::Float => "FLOAT",
            WarehouseType::String => "STRING",
            WarehouseType::Boolean => "BOOLEAN",
            WarehouseType::Date => "DATE",
            WarehouseType::Timestamp => "TIMESTAMP",
        }
    }

    /// Resolves the destination type of an Arrow column.
    ///
    /// Timestamps are parameterized by unit and timezone, so they are matched
    /// by predicate before the fixed table is consulted. Anything neither
    /// covers is stored as a string.
    pub fn from_arrow(data_type: &DataType) -> Self {
        if matches!(data_type, DataType::Timestamp(_, _)) {
            return WarehouseType::Timestamp;
        }
        Self::from_static_map(data_type).unwrap_or(WarehouseType::String)
    }

    fn from_static_map(data_type: &DataType) -> Option<Self> {
        let mapped = match data_type {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => WarehouseType::Integer,
            DataType::Float16 | DataType::Float32 | DataType::Float64 => WarehouseType::Float,
            DataType::Utf8 => WarehouseType::String,
            DataType::Boolean => WarehouseType::Boolean,
            DataType::Date32 | DataType::Date64 => WarehouseType::Date,
            _ => return None,
        };
        Some(mapped)
    }
}

impl fmt::Display for WarehouseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldMode {
    #[default]
    Nullable,
    Required,
    Repeated,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WarehouseField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: WarehouseType,
    #[serde(default)]
    pub mode: FieldMode,
}

impl WarehouseField {
    pub fn nullable(name: impl Into<String>, field_type: WarehouseType) -> Self {
        Self {
            name: name.into(),
            field_type,
            mode: FieldMode::Nullable,
        }
    }
}

/// Maps every Arrow field to a nullable warehouse field, in order.
pub fn arrow_to_warehouse_schema(schema: &Schema) -> Vec<WarehouseField> {
    schema
        .fields()
        .iter()
        .map(|field| {
            WarehouseField::nullable(field.name().clone(), WarehouseType::from_arrow(field.data_type()))
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimePartitioningType {
    #[default]
    Day,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TimePartitioning {
    pub field: String,
    #[serde(rename = "type")]
    pub kind: TimePartitioningType,
}

/// Metadata used to create a destination table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TableDescriptor {
    pub reference: TableReference,
    pub schema: Vec<WarehouseField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_partitioning: Option<TimePartitioning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clustering_fields: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A schema given either in warehouse terms or as an Arrow schema to reconcile.
#[derive(Debug, Clone)]
pub enum TableSchema {
    Warehouse(Vec<WarehouseField>),
    Arrow(SchemaRef),
}

impl TableSchema {
    fn prepare(&self) -> Vec<WarehouseField> {
        match self {
            TableSchema::Warehouse(fields) => fields.clone(),
            TableSchema::Arrow(schema) => arrow_to_warehouse_schema(schema),
        }
    }
}

/// Settings for provisioning one destination table.
#[derive(Debug, Clone)]
pub struct TableConfig {
    pub dataset_id: String,
    pub table_id: String,
    pub schema: Option<TableSchema>,
    pub partition_field: Option<String>,
    pub cluster_fields: Option<Vec<String>>,
    pub description: Option<String>,
}

impl TableConfig {
    pub fn new(dataset_id: impl Into<String>, table_id: impl Into<String>) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            table_id: table_id.into(),
            schema: None,
            partition_field: None,
            cluster_fields: None,
            description: None,
        }
    }

    pub fn with_schema(mut self, schema: TableSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_partition_field(mut self, field: Option<String>) -> Self {
        self.partition_field = field;
        self
    }

    pub fn with_cluster_fields(mut self, fields: Option<Vec<String>>) -> Self {
        self.cluster_fields = fields;
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    fn descriptor(&self, reference: TableReference) -> TableDescriptor {
        TableDescriptor {
            reference,
            schema: self.schema.as_ref().map(TableSchema::prepare).unwrap_or_default(),
            time_partitioning: self.partition_field.as_ref().map(|field| TimePartitioning {
                field: field.clone(),
                kind: TimePartitioningType::Day,
            }),
            clustering_fields: self.cluster_fields.clone(),
            description: self.description.clone(),
        }
    }
}

/// What `ensure_table_exists` found or did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TableStatus {
    Exists,
    Created,
}

/// Creates the destination table unless it already exists.
///
/// Only `WarehouseError::NotFound` from the probe leads to creation. Any other
/// probe failure is returned untouched. An existing table is never altered.
pub async fn ensure_table_exists(
    client: &dyn Warehouse,
    config: &TableConfig,
) -> Result<TableStatus, WarehouseError> {
    let reference = TableReference::new(client.project(), &config.dataset_id, &config.table_id);

    match client.get_table(&reference).await {
        Ok(_) => {
            info!("Table {} exists", reference);
            return Ok(TableStatus::Exists);
        }
        Err(WarehouseError::NotFound { .. }) => {}
        Err(e) => return Err(e),
    }

    let descriptor = config.descriptor(reference.clone());
    client.create_table(&descriptor).await?;
    info!("Created table {}", reference);
    Ok(TableStatus::Created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::MockWarehouse;
    use arrow::datatypes::{Field, TimeUnit};
    use mockall::predicate::always;
    use std::sync::Arc;

    fn mock_client() -> MockWarehouse {
        let mut client = MockWarehouse::new();
        client
            .expect_project()
            .return_const("test-project".to_string());
        client
    }

    fn students_schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
            Field::new("score", DataType::Float64, true),
        ]))
    }

    #[test]
    fn test_integer_widths_map_to_integer() {
        for data_type in [
            DataType::Int8,
            DataType::Int16,
            DataType::Int32,
            DataType::Int64,
            DataType::UInt8,
            DataType::UInt16,
            DataType::UInt32,
            DataType::UInt64,
        ] {
            assert_eq!(WarehouseType::from_arrow(&data_type), WarehouseType::Integer);
        }
    }

    #[test]
    fn test_scalar_types_map() {
        assert_eq!(WarehouseType::from_arrow(&DataType::Float32), WarehouseType::Float);
        assert_eq!(WarehouseType::from_arrow(&DataType::Float64), WarehouseType::Float);
        assert_eq!(WarehouseType::from_arrow(&DataType::Utf8), WarehouseType::String);
        assert_eq!(WarehouseType::from_arrow(&DataType::Boolean), WarehouseType::Boolean);
        assert_eq!(WarehouseType::from_arrow(&DataType::Date32), WarehouseType::Date);
        assert_eq!(WarehouseType::from_arrow(&DataType::Date64), WarehouseType::Date);
    }

    #[test]
    fn test_every_timestamp_variant_maps_to_timestamp() {
        for unit in [
            TimeUnit::Second,
            TimeUnit::Millisecond,
            TimeUnit::Microsecond,
            TimeUnit::Nanosecond,
        ] {
            for tz in [None, Some("UTC".into()), Some("+09:00".into())] {
                let data_type = DataType::Timestamp(unit, tz);
                assert_eq!(
                    WarehouseType::from_arrow(&data_type),
                    WarehouseType::Timestamp,
                    "{:?}",
                    data_type
                );
            }
        }
    }

    #[test]
    fn test_unmapped_types_fall_back_to_string() {
        assert_eq!(WarehouseType::from_arrow(&DataType::Binary), WarehouseType::String);
        assert_eq!(
            WarehouseType::from_arrow(&DataType::Decimal128(10, 2)),
            WarehouseType::String
        );
        assert_eq!(WarehouseType::from_arrow(&DataType::LargeUtf8), WarehouseType::String);
    }

    #[test]
    fn test_arrow_to_warehouse_schema() {
        let fields = arrow_to_warehouse_schema(&students_schema());

        assert_eq!(
            fields,
            vec![
                WarehouseField::nullable("id", WarehouseType::Integer),
                WarehouseField::nullable("name", WarehouseType::String),
                WarehouseField::nullable("score", WarehouseType::Float),
            ]
        );
    }

    #[tokio::test]
    async fn test_existing_table_is_left_alone() {
        let mut client = mock_client();
        client
            .expect_get_table()
            .times(1)
            .returning(|reference| {
                Ok(TableDescriptor {
                    reference: reference.clone(),
                    schema: vec![],
                    time_partitioning: None,
                    clustering_fields: None,
                    description: None,
                })
            });
        client.expect_create_table().never();

        let config = TableConfig::new("staging", "stg_students")
            .with_schema(TableSchema::Arrow(students_schema()));
        let status = ensure_table_exists(&client, &config).await.unwrap();

        assert_eq!(status, TableStatus::Exists);
    }

    #[tokio::test]
    async fn test_missing_table_is_created_once() {
        let mut client = mock_client();
        client
            .expect_get_table()
            .withf(|reference| reference.to_string() == "test-project.staging.stg_students")
            .times(1)
            .returning(|reference| {
                Err(WarehouseError::NotFound {
                    table: reference.to_string(),
                })
            });
        client
            .expect_create_table()
            .withf(|descriptor| {
                descriptor.schema.len() == 3
                    && descriptor.time_partitioning.is_none()
                    && descriptor.clustering_fields.is_none()
                    && descriptor.description.is_none()
            })
            .times(1)
            .returning(|descriptor| Ok(descriptor.clone()));

        let config = TableConfig::new("staging", "stg_students")
            .with_schema(TableSchema::Arrow(students_schema()));
        let status = ensure_table_exists(&client, &config).await.unwrap();

        assert_eq!(status, TableStatus::Created);
    }

    #[tokio::test]
    async fn test_created_table_carries_partitioning_and_clustering() {
        let mut client = mock_client();
        client.expect_get_table().returning(|reference| {
            Err(WarehouseError::NotFound {
                table: reference.to_string(),
            })
        });
        client
            .expect_create_table()
            .withf(|descriptor| {
                descriptor.time_partitioning
                    == Some(TimePartitioning {
                        field: "created_date".to_string(),
                        kind: TimePartitioningType::Day,
                    })
                    && descriptor.clustering_fields
                        == Some(vec!["student_id".to_string(), "school_id".to_string()])
                    && descriptor.description.as_deref() == Some("Student roster")
                    && descriptor.schema
                        == vec![WarehouseField::nullable("student_id", WarehouseType::Integer)]
            })
            .times(1)
            .returning(|descriptor| Ok(descriptor.clone()));

        let config = TableConfig::new("staging", "stg_students")
            .with_schema(TableSchema::Warehouse(vec![WarehouseField::nullable(
                "student_id",
                WarehouseType::Integer,
            )]))
            .with_partition_field(Some("created_date".to_string()))
            .with_cluster_fields(Some(vec![
                "student_id".to_string(),
                "school_id".to_string(),
            ]))
            .with_description(Some("Student roster".to_string()));

        let status = ensure_table_exists(&client, &config).await.unwrap();
        assert_eq!(status, TableStatus::Created);
    }

    #[tokio::test]
    async fn test_probe_failure_other_than_not_found_propagates() {
        let mut client = mock_client();
        client
            .expect_get_table()
            .returning(|_| Err(WarehouseError::Client("403 Access Denied".into())));
        client.expect_create_table().with(always()).never();

        let config = TableConfig::new("staging", "stg_students");
        let err = ensure_table_exists(&client, &config).await.unwrap_err();

        assert_eq!(err.to_string(), "403 Access Denied");
    }

    #[tokio::test]
    async fn test_creation_failure_propagates() {
        let mut client = mock_client();
        client.expect_get_table().returning(|reference| {
            Err(WarehouseError::NotFound {
                table: reference.to_string(),
            })
        });
        client
            .expect_create_table()
            .times(1)
            .returning(|_| Err(WarehouseError::Client("409 Already Exists".into())));

        let config = TableConfig::new("staging", "stg_students");
        let err = ensure_table_exists(&client, &config).await.unwrap_err();

        assert_eq!(err.to_string(), "409 Already Exists");
    }
}
