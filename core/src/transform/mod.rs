//! Transforms applied to extracted tables before they reach a sink.

pub mod metadata;
pub mod partitioner;

pub use metadata::add_created_at_column;
pub use partitioner::{Partition, PartitionMap, Partitioner};
