//! Dataset persistence
//!
//! [`DatasetStore`] owns the path of one dataset and the derived paths of
//! its column types, cleaned projection, Parquet export and lock file.

use super::reader::{read_column_types, read_csv_records};
use super::schema::{column_types, records_to_batch};
use super::writer::{
    write_batch_to_csv, write_batch_to_parquet, write_column_types, ParquetWriterConfig,
};
use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::page::{Record, RecordLayout};
use crate::types::{value_as_id, JsonValue};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Fields that must be present and integer-valued in the cleaned dataset
pub const DEFAULT_REQUIRED_INT_FIELDS: [&str; 2] = ["radiant_team_id", "dire_team_id"];

/// Reads and writes one dataset file and its derived files
#[derive(Debug, Clone)]
pub struct DatasetStore {
    path: PathBuf,
    layout: RecordLayout,
    required_int_fields: Vec<String>,
    parquet: Option<ParquetWriterConfig>,
}

impl DatasetStore {
    /// Create a store for the dataset at `path`
    pub fn new(path: impl AsRef<Path>, layout: RecordLayout) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            layout,
            required_int_fields: DEFAULT_REQUIRED_INT_FIELDS
                .iter()
                .map(|f| (*f).to_string())
                .collect(),
            parquet: None,
        }
    }

    /// Replace the fields the cleaned projection requires
    #[must_use]
    pub fn with_required_int_fields(mut self, fields: Vec<String>) -> Self {
        self.required_int_fields = fields;
        self
    }

    /// Also export the cleaned projection as Parquet
    #[must_use]
    pub fn with_parquet_export(mut self, config: Option<ParquetWriterConfig>) -> Self {
        self.parquet = config;
        self
    }

    /// Path of the full dataset
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Column layout used for reading and writing
    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    /// Fields the cleaned projection requires
    pub fn required_int_fields(&self) -> &[String] {
        &self.required_int_fields
    }

    /// `clean_<name>` next to the full dataset
    pub fn clean_path(&self) -> PathBuf {
        self.prefixed("clean_", "")
    }

    /// `clean_<stem>.parquet` next to the full dataset
    pub fn parquet_path(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.path.with_file_name(format!("clean_{stem}.parquet"))
    }

    /// `<name>.types.json` next to the full dataset
    pub fn types_path(&self) -> PathBuf {
        self.prefixed("", ".types.json")
    }

    /// `<name>.lock` next to the full dataset
    pub fn lock_path(&self) -> PathBuf {
        self.prefixed("", ".lock")
    }

    fn prefixed(&self, prefix: &str, suffix: &str) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.path.with_file_name(format!("{prefix}{name}{suffix}"))
    }

    /// Whether a persisted dataset exists
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Take the single-writer lock, creating the data directory if needed
    pub fn lock(&self) -> Result<DatasetLock> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        DatasetLock::acquire(self.lock_path(), &self.path)
    }

    /// Load the persisted dataset
    pub fn load(&self) -> Result<Dataset> {
        if !self.exists() {
            return Err(Error::MissingDataset {
                path: self.path.display().to_string(),
            });
        }

        let types = read_column_types(self.types_path())?;
        let records = read_csv_records(&self.path, &self.layout, types.as_ref())?;
        let dataset = Dataset::from_records(records)?;
        info!("Loaded {} rows from {}", dataset.len(), self.path.display());
        Ok(dataset)
    }

    /// Write the full dataset
    pub fn save(&self, dataset: &Dataset) -> Result<usize> {
        let batch = records_to_batch(dataset.records(), &self.layout)?;
        let rows = write_batch_to_csv(&self.path, &batch)?;
        write_column_types(self.types_path(), &column_types(dataset.records(), &self.layout))?;
        info!("Saved {} rows to {}", rows, self.path.display());
        Ok(rows)
    }

    /// Write the cleaned projection (and its Parquet export when enabled)
    pub fn save_clean(&self, dataset: &Dataset) -> Result<usize> {
        let clean = self.clean_projection(dataset)?;
        let batch = records_to_batch(&clean, &self.layout)?;

        let clean_path = self.clean_path();
        let rows = write_batch_to_csv(&clean_path, &batch)?;
        info!("Saved {} clean rows to {}", rows, clean_path.display());

        if let Some(ref config) = self.parquet {
            let parquet_path = self.parquet_path();
            write_batch_to_parquet(&parquet_path, &batch, Some(config))?;
            info!("Exported {} rows to {}", rows, parquet_path.display());
        }

        Ok(rows)
    }

    /// Rows with every required field present, those fields as integers
    pub fn clean_projection(&self, dataset: &Dataset) -> Result<Vec<Record>> {
        let mut kept = Vec::with_capacity(dataset.len());

        'rows: for record in dataset.records() {
            let mut record = record.clone();
            for field in &self.required_int_fields {
                let value = match record.fields.get(field) {
                    None | Some(JsonValue::Null) => continue 'rows,
                    Some(value) => value,
                };
                let id = value_as_id(value).ok_or_else(|| {
                    Error::schema(field, format!("cannot coerce {value} to an integer"))
                })?;
                record.fields.insert(field.clone(), JsonValue::from(id));
            }
            kept.push(record);
        }

        let dropped = dataset.len().saturating_sub(kept.len());
        if dropped > 0 {
            debug!("Dropped {dropped} rows missing required fields");
        }

        Ok(kept)
    }
}

/// Advisory lock file held for the duration of one run
#[derive(Debug)]
pub struct DatasetLock {
    path: PathBuf,
}

impl DatasetLock {
    /// Create `lock_path`, failing if another run holds it
    pub fn acquire(lock_path: impl AsRef<Path>, dataset: &Path) -> Result<Self> {
        let lock_path = lock_path.as_ref().to_path_buf();

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(Error::DatasetLocked {
                    path: dataset.display().to_string(),
                    lock_path: lock_path.display().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        writeln!(file, "{}", std::process::id())?;
        debug!("Acquired lock {}", lock_path.display());

        Ok(Self { path: lock_path })
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DatasetLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("Failed to remove lock {}: {e}", self.path.display());
        }
    }
}
