//! CSV and Parquet writers
//!
//! Both write to a sibling temp file which is renamed over the target once
//! the file is complete.

use super::schema::ColumnType;
use crate::error::{Error, Result};
use arrow::csv::WriterBuilder;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Configuration for Parquet writer
#[derive(Debug, Clone)]
pub struct ParquetWriterConfig {
    compression: Compression,
    row_group_size: usize,
}

impl Default for ParquetWriterConfig {
    fn default() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: 1024 * 1024,
        }
    }
}

impl ParquetWriterConfig {
    /// Create a new config with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set compression algorithm
    #[must_use]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Set row group size
    #[must_use]
    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    /// Get row group size
    #[must_use]
    pub fn row_group_size(&self) -> usize {
        self.row_group_size
    }

    fn build_properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build()
    }
}

/// Path of the temp file used while writing `path`
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write through `write` into a temp file, then rename it over `path`
fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(File) -> Result<()>,
{
    let temp = temp_path(path);
    let file = File::create(&temp).map_err(|e| Error::Output {
        message: format!("Failed to create {}: {e}", temp.display()),
    })?;

    if let Err(e) = write(file) {
        let _ = std::fs::remove_file(&temp);
        return Err(e);
    }

    std::fs::rename(&temp, path).map_err(|e| Error::Output {
        message: format!("Failed to rename {} to {}: {e}", temp.display(), path.display()),
    })
}

/// Write a RecordBatch to a CSV file with a header row
pub fn write_batch_to_csv(path: impl AsRef<Path>, batch: &RecordBatch) -> Result<usize> {
    write_atomic(path.as_ref(), |file| {
        let mut out = BufWriter::new(file);
        {
            let mut writer = WriterBuilder::new().with_header(true).build(&mut out);
            writer.write(batch)?;
        }
        out.flush()?;
        Ok(())
    })?;

    Ok(batch.num_rows())
}

/// Write the column types of a CSV dataset as JSON
pub fn write_column_types(path: impl AsRef<Path>, types: &BTreeMap<String, ColumnType>) -> Result<()> {
    write_atomic(path.as_ref(), |file| {
        let mut out = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut out, types)?;
        out.flush()?;
        Ok(())
    })
}

/// Write a RecordBatch to a Parquet file
pub fn write_batch_to_parquet(
    path: impl AsRef<Path>,
    batch: &RecordBatch,
    config: Option<&ParquetWriterConfig>,
) -> Result<usize> {
    let default_config = ParquetWriterConfig::default();
    let config = config.unwrap_or(&default_config);

    write_atomic(path.as_ref(), |file| {
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(config.build_properties()))
            .map_err(|e| Error::Output {
                message: format!("Failed to create Parquet writer: {e}"),
            })?;
        writer.write(batch).map_err(|e| Error::Output {
            message: format!("Failed to write batch: {e}"),
        })?;
        writer.close().map_err(|e| Error::Output {
            message: format!("Failed to close Parquet writer: {e}"),
        })?;
        Ok(())
    })?;

    Ok(batch.num_rows())
}
