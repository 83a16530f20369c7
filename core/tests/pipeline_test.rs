use std::io::Write;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::ObjectStore;
use object_store::memory::InMemory;
use object_store::path::Path;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use platform_core::config::PipelineConfig;
use platform_core::errors::{PlatformError, WarehouseError};
use platform_core::pipeline::Pipeline;
use platform_core::source::FileSource;
use platform_core::warehouse::{
    LoadJob, LoadJobConfig, LoadStream, TableDescriptor, TableReference, TableStatus, Warehouse,
};
use tokio::io::AsyncReadExt;

const STUDENTS_CSV: &str = "\
id,name,enrolled_on
1,Alice,2024-11-01
2,Bob,2024-11-01
3,Charlie,2024-11-02
4,Dana,2024-11-02
5,Eve,
";

/// Records calls and keeps created tables in memory.
#[derive(Default)]
struct RecordingWarehouse {
    tables: Mutex<Vec<TableDescriptor>>,
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl Warehouse for RecordingWarehouse {
    fn project(&self) -> String {
        "test-project".to_string()
    }

    async fn get_table(&self, table: &TableReference) -> Result<TableDescriptor, WarehouseError> {
        self.calls.lock().unwrap().push(format!("get {}", table));
        self.tables
            .lock()
            .unwrap()
            .iter()
            .find(|t| &t.reference == table)
            .cloned()
            .ok_or_else(|| WarehouseError::NotFound {
                table: table.to_string(),
            })
    }

    async fn create_table(
        &self,
        descriptor: &TableDescriptor,
    ) -> Result<TableDescriptor, WarehouseError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("create {}", descriptor.reference));
        self.tables.lock().unwrap().push(descriptor.clone());
        Ok(descriptor.clone())
    }

    async fn load_from_reader(
        &self,
        mut reader: LoadStream,
        destination: &TableReference,
        _job: &LoadJobConfig,
    ) -> Result<LoadJob, WarehouseError> {
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .map_err(|e| WarehouseError::Client(Box::new(e)))?;
        let rows = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(buf))
            .map_err(|e| WarehouseError::Client(Box::new(e)))?
            .metadata()
            .file_metadata()
            .num_rows();
        self.calls
            .lock()
            .unwrap()
            .push(format!("load {}", destination));
        Ok(LoadJob {
            job_id: "job_local".to_string(),
            output_rows: rows as u64,
        })
    }

    async fn load_from_uri(
        &self,
        uri: &str,
        destination: &TableReference,
        _job: &LoadJobConfig,
    ) -> Result<LoadJob, WarehouseError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("import {} {}", uri, destination));
        Ok(LoadJob {
            job_id: "job_remote".to_string(),
            output_rows: 0,
        })
    }
}

fn write_students() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(STUDENTS_CSV.as_bytes()).unwrap();
    file
}

fn parse_config(yaml: &str) -> PipelineConfig {
    serde_yaml::from_str(yaml).unwrap()
}

async fn list(store: &Arc<dyn ObjectStore>) -> Vec<String> {
    let mut paths: Vec<String> = store
        .list(None)
        .map_ok(|meta| meta.location.to_string())
        .try_collect()
        .await
        .unwrap();
    paths.sort();
    paths
}

#[tokio::test]
async fn test_csv_to_partitioned_objects_and_warehouse() {
    let file = write_students();
    let config = parse_config(
        r#"
version: 1
source:
  type: file
  path: students.csv
transform:
  partition_column: enrolled_on
  created_at_column: created_at
storage:
  url: memory:///
  source_name: students
warehouse:
  dataset_id: staging
  table_id: stg_students
  write_disposition: append
  partition_field: enrolled_on
"#,
    );

    let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
    let warehouse = Arc::new(RecordingWarehouse::default());
    let mut pipeline =
        Pipeline::new(config, Some(store.clone()), Some(warehouse.clone())).unwrap();

    let source = FileSource::new(file.path(), None);
    let report = pipeline.run_source(&source).await.unwrap();

    assert_eq!(report.rows_extracted, 5);
    assert_eq!(
        report.partitions,
        vec!["date=2024-11-01", "date=2024-11-02"]
    );
    assert_eq!(
        list(&store).await,
        vec![
            "students/date=2024-11-01/students-2024-11-01.parquet",
            "students/date=2024-11-02/students-2024-11-02.parquet",
        ]
    );

    // The null-dated row is left out of object storage but loaded to the warehouse.
    let object = store
        .get(&Path::from(
            "students/date=2024-11-02/students-2024-11-02.parquet",
        ))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    let partition = ParquetRecordBatchReaderBuilder::try_new(object)
        .unwrap()
        .build()
        .unwrap()
        .next()
        .unwrap()
        .unwrap();
    assert_eq!(partition.num_rows(), 2);
    assert!(partition.schema().column_with_name("created_at").is_some());

    assert_eq!(report.rows_loaded, Some(5));
    assert_eq!(report.table_status, Some(TableStatus::Created));
    assert_eq!(
        *warehouse.calls.lock().unwrap(),
        vec![
            "get test-project.staging.stg_students",
            "create test-project.staging.stg_students",
            "load test-project.staging.stg_students",
        ]
    );

    let tables = warehouse.tables.lock().unwrap();
    let created = &tables[0];
    assert_eq!(created.schema.len(), 4);
    assert_eq!(
        created.time_partitioning.as_ref().map(|p| p.field.as_str()),
        Some("enrolled_on")
    );
}

#[tokio::test]
async fn test_second_run_reuses_existing_table() {
    let file = write_students();
    let config = parse_config(
        r#"
version: 1
source:
  type: file
  path: students.csv
warehouse:
  dataset_id: staging
  table_id: stg_students
"#,
    );

    let warehouse = Arc::new(RecordingWarehouse::default());
    let mut pipeline = Pipeline::new(config, None, Some(warehouse.clone())).unwrap();
    let source = FileSource::new(file.path(), None);

    let first = pipeline.run_source(&source).await.unwrap();
    let second = pipeline.run_source(&source).await.unwrap();

    assert_eq!(first.table_status, Some(TableStatus::Created));
    assert_eq!(second.table_status, Some(TableStatus::Exists));
    assert_eq!(warehouse.tables.lock().unwrap().len(), 1);
    assert_eq!(pipeline.metrics().runs, 2);
    assert_eq!(pipeline.metrics().tables_created, 1);
    assert_eq!(pipeline.metrics().rows_loaded, 10);
}

#[tokio::test]
async fn test_configured_uri_input_is_imported() {
    let file = write_students();
    let config = parse_config(
        r#"
version: 1
source:
  type: file
  path: students.csv
warehouse:
  dataset_id: staging
  table_id: stg_students
  input: gs://landing/students/*.parquet
"#,
    );

    let warehouse = Arc::new(RecordingWarehouse::default());
    let mut pipeline = Pipeline::new(config, None, Some(warehouse.clone())).unwrap();
    let report = pipeline
        .run_source(&FileSource::new(file.path(), None))
        .await
        .unwrap();

    assert_eq!(report.table_status, None);
    assert_eq!(
        *warehouse.calls.lock().unwrap(),
        vec!["import gs://landing/students/*.parquet test-project.staging.stg_students"]
    );
}

#[tokio::test]
async fn test_non_temporal_partition_column_fails() {
    let file = write_students();
    let config = parse_config(
        r#"
version: 1
source:
  type: file
  path: students.csv
transform:
  partition_column: name
storage:
  url: memory:///
  source_name: students
"#,
    );

    let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
    let mut pipeline = Pipeline::new(config, Some(store.clone()), None).unwrap();
    let err = pipeline
        .run_source(&FileSource::new(file.path(), None))
        .await
        .unwrap_err();

    assert!(matches!(err, PlatformError::Partition(_)));
    assert!(err.to_string().contains("must be date or timestamp"));
    assert!(list(&store).await.is_empty());
    assert_eq!(pipeline.metrics().failed_runs, 1);
}
