//! Output module
//!
//! Handles persistence of datasets.
//!
//! # Overview
//!
//! This module provides utilities for:
//! - Converting records to Arrow RecordBatches
//! - Writing and reading CSV datasets
//! - Writing Parquet exports
//! - The [`DatasetStore`] and its single-writer [`DatasetLock`]

mod reader;
mod schema;
mod store;
mod writer;

pub use reader::{read_column_types, read_csv_records};
pub use schema::{
    column_order, column_types, infer_column_type, infer_schema, parse_cell, records_to_batch,
    ColumnType,
};
pub use store::{DatasetLock, DatasetStore, DEFAULT_REQUIRED_INT_FIELDS};
pub use writer::{
    write_batch_to_csv, write_batch_to_parquet, write_column_types, ParquetWriterConfig,
};

#[cfg(test)]
mod tests;
