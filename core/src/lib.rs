pub mod config;
pub mod errors;
pub mod pipeline;
pub mod serialize;
pub mod sink;
pub mod source;
pub mod telemetry;
pub mod transform;
pub mod warehouse;

pub use config::{LoadConfig, PipelineConfig};
pub use errors::{PlatformError, Result};
pub use pipeline::{Pipeline, PipelineReport};
pub use sink::{LoadInput, ObjectStoreLoader, WarehouseLoader};
pub use transform::{PartitionMap, Partitioner};
pub use warehouse::{Warehouse, ensure_table_exists};
