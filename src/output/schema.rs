//! Arrow schema inference and record to Arrow conversion
//!
//! Datasets are written through an Arrow [`RecordBatch`]. The timestamp
//! column leads, the identifier follows, and every other column is
//! ordered by name so files diff cleanly between runs.

use crate::error::{Error, Result};
use crate::page::{Record, RecordLayout};
use crate::types::{format_timestamp, JsonValue};
use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Column names for `records`: time field, id field, then the rest sorted
pub fn column_order(records: &[Record], layout: &RecordLayout) -> Vec<String> {
    let mut rest: BTreeSet<&str> = BTreeSet::new();
    for record in records {
        rest.extend(record.fields.keys().map(String::as_str));
    }
    rest.remove(layout.time_field.as_str());
    rest.remove(layout.id_field.as_str());

    let mut columns = vec![layout.time_field.clone(), layout.id_field.clone()];
    columns.extend(rest.into_iter().map(str::to_string));
    columns
}

/// How the values of one persisted column are read back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Int,
    Float,
    Bool,
    /// Plain strings, kept verbatim
    Text,
    /// Arrays and objects stored as JSON text
    Json,
}

impl ColumnType {
    /// Type of a single non-null value
    fn of(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Null => None,
            JsonValue::Bool(_) => Some(Self::Bool),
            JsonValue::Number(n) if n.is_i64() => Some(Self::Int),
            JsonValue::Number(_) => Some(Self::Float),
            JsonValue::String(_) => Some(Self::Text),
            JsonValue::Array(_) | JsonValue::Object(_) => Some(Self::Json),
        }
    }

    /// Widen two column types to one both fit in
    fn merge(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (Self::Int, Self::Float) | (Self::Float, Self::Int) => Self::Float,
            _ => Self::Text,
        }
    }

    /// Arrow type used when writing the column
    pub fn data_type(self) -> DataType {
        match self {
            Self::Int => DataType::Int64,
            Self::Float => DataType::Float64,
            Self::Bool => DataType::Boolean,
            Self::Text | Self::Json => DataType::Utf8,
        }
    }
}

/// Column types of every non-time column in `records`
///
/// Columns with no non-null value are text.
pub fn column_types(records: &[Record], layout: &RecordLayout) -> BTreeMap<String, ColumnType> {
    let mut seen: BTreeMap<&str, ColumnType> = BTreeMap::new();

    for record in records {
        for (key, value) in &record.fields {
            if let Some(inferred) = ColumnType::of(value) {
                seen.entry(key.as_str())
                    .and_modify(|existing| *existing = existing.merge(inferred))
                    .or_insert(inferred);
            }
        }
    }

    column_order(records, layout)
        .into_iter()
        .filter(|name| name != &layout.time_field)
        .map(|name| {
            let column_type = seen.get(name.as_str()).copied().unwrap_or(ColumnType::Text);
            (name, column_type)
        })
        .collect()
}

/// Infer an Arrow schema for `records`
///
/// The time column is always text in the persisted timestamp format.
pub fn infer_schema(records: &[Record], layout: &RecordLayout) -> Schema {
    let types = column_types(records, layout);

    let fields: Vec<Field> = column_order(records, layout)
        .into_iter()
        .map(|name| {
            let dtype = types
                .get(&name)
                .map_or(DataType::Utf8, |column_type| column_type.data_type());
            Field::new(name, dtype, true)
        })
        .collect();

    Schema::new(fields)
}

/// Convert records to an Arrow RecordBatch
pub fn records_to_batch(records: &[Record], layout: &RecordLayout) -> Result<RecordBatch> {
    let schema = Arc::new(infer_schema(records, layout));

    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        if field.name() == &layout.time_field {
            let arr: StringArray = records
                .iter()
                .map(|r| Some(format_timestamp(&r.timestamp)))
                .collect();
            columns.push(Arc::new(arr));
            continue;
        }

        let values: Vec<Option<&JsonValue>> = records
            .iter()
            .map(|r| r.fields.get(field.name()))
            .collect();
        columns.push(build_array(&values, field.data_type()));
    }

    RecordBatch::try_new(schema, columns)
        .map_err(|e| Error::output(format!("Failed to create RecordBatch: {e}")))
}

/// Build an Arrow array from JSON values
fn build_array(values: &[Option<&JsonValue>], data_type: &DataType) -> ArrayRef {
    match data_type {
        DataType::Boolean => {
            let arr: BooleanArray = values
                .iter()
                .map(|v| v.and_then(JsonValue::as_bool))
                .collect();
            Arc::new(arr)
        }

        DataType::Int64 => {
            let arr: Int64Array = values.iter().map(|v| v.and_then(JsonValue::as_i64)).collect();
            Arc::new(arr)
        }

        DataType::Float64 => {
            let arr: Float64Array = values.iter().map(|v| v.and_then(JsonValue::as_f64)).collect();
            Arc::new(arr)
        }

        _ => {
            let arr: StringArray = values
                .iter()
                .map(|v| match v {
                    None | Some(JsonValue::Null) => None,
                    Some(JsonValue::String(s)) => Some(s.clone()),
                    Some(other) => Some(other.to_string()),
                })
                .collect();
            Arc::new(arr)
        }
    }
}

/// Guess a column's type from its persisted cells
///
/// Used for files written without a column type sidecar. A column only
/// reads as numeric or boolean when every non-empty cell does.
pub fn infer_column_type<'a>(cells: impl IntoIterator<Item = &'a str>) -> ColumnType {
    let mut candidate: Option<ColumnType> = None;

    for text in cells.into_iter().filter(|c| !c.is_empty()) {
        let cell_type = if text.parse::<i64>().is_ok() {
            ColumnType::Int
        } else if text.parse::<f64>().is_ok() {
            ColumnType::Float
        } else if text == "true" || text == "false" {
            ColumnType::Bool
        } else if (text.starts_with('[') || text.starts_with('{'))
            && serde_json::from_str::<JsonValue>(text).is_ok()
        {
            ColumnType::Json
        } else {
            return ColumnType::Text;
        };

        candidate = Some(match candidate {
            Some(existing) => existing.merge(cell_type),
            None => cell_type,
        });
        if candidate == Some(ColumnType::Text) {
            return ColumnType::Text;
        }
    }

    candidate.unwrap_or(ColumnType::Text)
}

/// Parse one CSV cell of a `column_type` column back into a JSON value
///
/// Empty cells are null. A cell that does not read as its column type is
/// kept as a string.
pub fn parse_cell(cell: Option<&str>, column_type: ColumnType) -> JsonValue {
    let Some(text) = cell.filter(|c| !c.is_empty()) else {
        return JsonValue::Null;
    };

    let parsed = match column_type {
        ColumnType::Int => text.parse::<i64>().ok().map(JsonValue::from),
        ColumnType::Float => text
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(JsonValue::Number),
        ColumnType::Bool => match text {
            "true" => Some(JsonValue::Bool(true)),
            "false" => Some(JsonValue::Bool(false)),
            _ => None,
        },
        ColumnType::Json => serde_json::from_str::<JsonValue>(text).ok(),
        ColumnType::Text => None,
    };

    parsed.unwrap_or_else(|| JsonValue::String(text.to_string()))
}

/// Split a CSV header line into column names
pub(crate) fn parse_header(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.trim_end_matches(['\r', '\n']).chars().peekable();

    while let Some(c) = chars.next() {
        if c == '"' {
            if in_quotes {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                in_quotes = true;
            }
        } else if c == ',' && !in_quotes {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }

    fields.push(current);
    fields
}
