//! CSV dataset reader
//!
//! Reads a persisted dataset back into records. Every column is read as
//! text and converted by its column type; the time column is re-parsed
//! into a timestamp.

use super::schema::{infer_column_type, parse_cell, parse_header, ColumnType};
use crate::error::{Error, Result};
use crate::page::{Record, RecordLayout};
use crate::types::{parse_timestamp_str, JsonObject};
use arrow::array::{Array, AsArray, StringArray};
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType, Field, Schema};
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

const BATCH_SIZE: usize = 8192;

/// Read the column types written next to a dataset, if any
pub fn read_column_types(path: impl AsRef<Path>) -> Result<Option<BTreeMap<String, ColumnType>>> {
    let path = path.as_ref();
    if !path.is_file() {
        return Ok(None);
    }
    let types = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    Ok(Some(types))
}

/// Read every row of the CSV file at `path`
///
/// `types` gives the type each column was written with. Columns missing
/// from it have their type inferred from all of their cells.
pub fn read_csv_records(
    path: impl AsRef<Path>,
    layout: &RecordLayout,
    types: Option<&BTreeMap<String, ColumnType>>,
) -> Result<Vec<Record>> {
    let path = path.as_ref();
    let mut file = File::open(path)?;

    let mut header = String::new();
    BufReader::new(&mut file).read_line(&mut header)?;
    if header.trim().is_empty() {
        return Err(Error::decode(format!("{} has no header row", path.display())));
    }
    let columns = parse_header(&header);

    let time_idx = columns
        .iter()
        .position(|c| c == &layout.time_field)
        .ok_or_else(|| Error::schema(&layout.time_field, "column not present in dataset file"))?;

    let schema = Schema::new(
        columns
            .iter()
            .map(|name| Field::new(name, DataType::Utf8, true))
            .collect::<Vec<_>>(),
    );

    file.seek(SeekFrom::Start(0))?;
    let reader = ReaderBuilder::new(Arc::new(schema))
        .with_header(true)
        .with_batch_size(BATCH_SIZE)
        .build(file)?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;

    let column_types: Vec<ColumnType> = columns
        .iter()
        .enumerate()
        .map(|(idx, name)| match types.and_then(|t| t.get(name)) {
            Some(column_type) => *column_type,
            None => infer_column_type(
                batches
                    .iter()
                    .flat_map(|batch| batch.column(idx).as_string::<i32>().iter().flatten()),
            ),
        })
        .collect();

    let mut records = Vec::new();
    for batch in &batches {
        let cells: Vec<&StringArray> = batch.columns().iter().map(|c| c.as_string::<i32>()).collect();

        for row in 0..batch.num_rows() {
            let time_col = cells[time_idx];
            let raw_time = (!time_col.is_null(row)).then(|| time_col.value(row));
            let timestamp = raw_time.and_then(parse_timestamp_str).ok_or_else(|| {
                Error::schema(
                    &layout.time_field,
                    format!(
                        "cannot read '{}' as a timestamp in row {}",
                        raw_time.unwrap_or_default(),
                        records.len() + 1
                    ),
                )
            })?;

            let mut fields = JsonObject::new();
            for (idx, name) in columns.iter().enumerate() {
                if idx == time_idx {
                    continue;
                }
                let col = cells[idx];
                let cell = (!col.is_null(row)).then(|| col.value(row));
                fields.insert(name.clone(), parse_cell(cell, column_types[idx]));
            }

            records.push(Record::new(timestamp, fields));
        }
    }

    Ok(records)
}
