//! Tests for output module

use super::*;
use crate::dataset::Dataset;
use crate::error::Error;
use crate::page::{decode_raw_page, normalize, Record, RecordLayout};
use crate::types::parse_timestamp;
use arrow::datatypes::DataType;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::tempdir;
use test_case::test_case;

fn records(body: Value) -> Vec<Record> {
    normalize(decode_raw_page(body).unwrap(), "start_time")
        .unwrap()
        .into_records()
}

fn sample_dataset() -> Dataset {
    Dataset::from_records(records(json!([
        {"match_id": 3, "start_time": 1_700_000_300, "radiant_team_id": 30, "dire_team_id": 31,
         "league_name": "Major, Finals", "radiant_win": true, "picks": [1, 2]},
        {"match_id": 2, "start_time": 1_700_000_200, "radiant_team_id": null, "dire_team_id": 21,
         "league_name": "Qualifier", "radiant_win": false, "picks": null},
        {"match_id": 1, "start_time": 1_700_000_100, "radiant_team_id": 10.0, "dire_team_id": 11,
         "league_name": "Say \"hi\"", "radiant_win": null, "picks": []}
    ])))
    .unwrap()
}

// ============================================================================
// Schema Tests
// ============================================================================

#[test]
fn test_column_order() {
    let ds = sample_dataset();
    let columns = column_order(ds.records(), &RecordLayout::default());

    assert_eq!(
        columns,
        vec![
            "start_time",
            "match_id",
            "dire_team_id",
            "league_name",
            "picks",
            "radiant_team_id",
            "radiant_win"
        ]
    );
}

#[test]
fn test_infer_schema_types() {
    let ds = sample_dataset();
    let schema = infer_schema(ds.records(), &RecordLayout::default());

    let dtype = |name: &str| schema.field_with_name(name).unwrap().data_type().clone();
    assert_eq!(dtype("start_time"), DataType::Utf8);
    assert_eq!(dtype("match_id"), DataType::Int64);
    assert_eq!(dtype("radiant_team_id"), DataType::Float64);
    assert_eq!(dtype("radiant_win"), DataType::Boolean);
    assert_eq!(dtype("picks"), DataType::Utf8);
}

#[test]
fn test_infer_schema_empty() {
    let schema = infer_schema(&[], &RecordLayout::default());
    assert_eq!(schema.fields().len(), 2);
    assert_eq!(schema.field(0).name(), "start_time");
    assert_eq!(schema.field(1).name(), "match_id");
}

#[test]
fn test_records_to_batch() {
    let ds = sample_dataset();
    let batch = records_to_batch(ds.records(), &RecordLayout::default()).unwrap();

    assert_eq!(batch.num_rows(), 3);
    assert_eq!(batch.num_columns(), 7);
}

#[test]
fn test_column_types() {
    let ds = sample_dataset();
    let types = column_types(ds.records(), &RecordLayout::default());

    assert_eq!(types["match_id"], ColumnType::Int);
    assert_eq!(types["radiant_team_id"], ColumnType::Float);
    assert_eq!(types["radiant_win"], ColumnType::Bool);
    assert_eq!(types["league_name"], ColumnType::Text);
    assert_eq!(types["picks"], ColumnType::Json);
    assert!(!types.contains_key("start_time"));
}

#[test]
fn test_column_types_mixed_values_widen_to_text() {
    let ds = Dataset::from_records(records(json!([
        {"match_id": 2, "start_time": 20, "tag": 7, "notes": null},
        {"match_id": 1, "start_time": 10, "tag": "007", "notes": null}
    ])))
    .unwrap();
    let types = column_types(ds.records(), &RecordLayout::default());

    assert_eq!(types["tag"], ColumnType::Text);
    assert_eq!(types["notes"], ColumnType::Text);
}

#[test_case(None, ColumnType::Int, Value::Null ; "missing")]
#[test_case(Some(""), ColumnType::Text, Value::Null ; "empty")]
#[test_case(Some("42"), ColumnType::Int, json!(42) ; "integer")]
#[test_case(Some("1.5"), ColumnType::Float, json!(1.5) ; "float")]
#[test_case(Some("true"), ColumnType::Bool, json!(true) ; "boolean")]
#[test_case(Some("[1,2]"), ColumnType::Json, json!([1, 2]) ; "array")]
#[test_case(Some("{\"a\":1}"), ColumnType::Json, json!({"a": 1}) ; "object")]
#[test_case(Some("[not json"), ColumnType::Json, json!("[not json") ; "bracketed text")]
#[test_case(Some("007"), ColumnType::Text, json!("007") ; "numeric text")]
#[test_case(Some("true"), ColumnType::Text, json!("true") ; "boolean text")]
#[test_case(Some("Navi"), ColumnType::Int, json!("Navi") ; "text in integer column")]
fn test_parse_cell(cell: Option<&str>, column_type: ColumnType, expected: Value) {
    assert_eq!(parse_cell(cell, column_type), expected);
}

#[test_case(&["1", "", "42"], ColumnType::Int ; "integers")]
#[test_case(&["1", "2.5"], ColumnType::Float ; "integers and floats")]
#[test_case(&["true", "false"], ColumnType::Bool ; "booleans")]
#[test_case(&["[1]", "{}"], ColumnType::Json ; "nested")]
#[test_case(&["007", "Navi"], ColumnType::Text ; "one text cell")]
#[test_case(&["1", "true"], ColumnType::Text ; "numbers and booleans")]
#[test_case(&["", ""], ColumnType::Text ; "all empty")]
fn test_infer_column_type(cells: &[&str], expected: ColumnType) {
    assert_eq!(infer_column_type(cells.iter().copied()), expected);
}

// ============================================================================
// Store Tests
// ============================================================================

#[test]
fn test_derived_paths() {
    let store = DatasetStore::new("data/matches.csv", RecordLayout::default());

    assert_eq!(store.path(), std::path::Path::new("data/matches.csv"));
    assert_eq!(store.clean_path(), std::path::Path::new("data/clean_matches.csv"));
    assert_eq!(
        store.parquet_path(),
        std::path::Path::new("data/clean_matches.parquet")
    );
    assert_eq!(store.lock_path(), std::path::Path::new("data/matches.csv.lock"));
    assert_eq!(
        store.types_path(),
        std::path::Path::new("data/matches.csv.types.json")
    );
}

#[test]
fn test_save_and_load_round_trip() {
    let dir = tempdir().unwrap();
    let store = DatasetStore::new(dir.path().join("matches.csv"), RecordLayout::default());
    let ds = sample_dataset();

    assert!(!store.exists());
    assert_eq!(store.save(&ds).unwrap(), 3);
    assert!(store.exists());

    let loaded = store.load().unwrap();
    assert_eq!(loaded.len(), 3);
    assert_eq!(loaded.time_range(), ds.time_range());

    let first = &loaded.records()[0];
    assert_eq!(first.fields["match_id"], json!(1));
    assert_eq!(first.fields["league_name"], json!("Say \"hi\""));
    assert_eq!(first.fields["radiant_win"], Value::Null);
    assert_eq!(first.fields["picks"], json!([]));

    let last = &loaded.records()[2];
    assert_eq!(last.fields["league_name"], json!("Major, Finals"));
    assert_eq!(last.fields["picks"], json!([1, 2]));
    assert_eq!(last.fields["radiant_win"], json!(true));
}

#[test]
fn test_saved_file_format() {
    let dir = tempdir().unwrap();
    let store = DatasetStore::new(dir.path().join("matches.csv"), RecordLayout::default());
    store.save(&sample_dataset()).unwrap();

    let text = std::fs::read_to_string(store.path()).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next().unwrap(),
        "start_time,match_id,dire_team_id,league_name,picks,radiant_team_id,radiant_win"
    );
    assert!(lines.next().unwrap().starts_with("2023-11-14 22:15:00,1,"));
}

#[test]
fn test_save_empty_dataset() {
    let dir = tempdir().unwrap();
    let store = DatasetStore::new(dir.path().join("empty.csv"), RecordLayout::default());

    assert_eq!(store.save(&Dataset::new()).unwrap(), 0);
    assert!(store.load().unwrap().is_empty());
}

#[test]
fn test_load_missing_dataset() {
    let dir = tempdir().unwrap();
    let store = DatasetStore::new(dir.path().join("none.csv"), RecordLayout::default());

    let err = store.load().unwrap_err();
    assert!(matches!(err, Error::MissingDataset { .. }));
}

#[test]
fn test_load_rejects_unsorted_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("unsorted.csv");
    std::fs::write(
        &path,
        "start_time,match_id\n2024-01-02 00:00:00,2\n2024-01-01 00:00:00,1\n",
    )
    .unwrap();

    let err = DatasetStore::new(&path, RecordLayout::default())
        .load()
        .unwrap_err();
    assert!(matches!(err, Error::OrderingViolation { position: 1, .. }));
}

#[test]
fn test_load_rejects_bad_timestamp() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.csv");
    std::fs::write(&path, "start_time,match_id\nyesterday,1\n").unwrap();

    let err = DatasetStore::new(&path, RecordLayout::default())
        .load()
        .unwrap_err();
    assert!(matches!(err, Error::Schema { ref field, .. } if field == "start_time"));
}

#[test]
fn test_load_requires_time_column() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("no_time.csv");
    std::fs::write(&path, "match_id\n1\n").unwrap();

    let err = DatasetStore::new(&path, RecordLayout::default())
        .load()
        .unwrap_err();
    assert!(matches!(err, Error::Schema { .. }));
}

#[test]
fn test_save_leaves_no_temp_file() {
    let dir = tempdir().unwrap();
    let store = DatasetStore::new(dir.path().join("matches.csv"), RecordLayout::default());
    store.save(&sample_dataset()).unwrap();

    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["matches.csv", "matches.csv.types.json"]);
}

#[test]
fn test_text_fields_survive_repeated_round_trips() {
    let dir = tempdir().unwrap();
    let store = DatasetStore::new(dir.path().join("matches.csv"), RecordLayout::default());
    let ds = Dataset::from_records(records(json!([
        {"match_id": 2, "start_time": 20, "name": "Team Spirit", "league": "false", "patch": "7.35"},
        {"match_id": 1, "start_time": 10, "name": "007", "league": "true", "patch": "7.34"}
    ])))
    .unwrap();

    store.save(&ds).unwrap();
    let once = store.load().unwrap();
    assert_eq!(once, ds);

    store.save(&once).unwrap();
    let twice = store.load().unwrap();
    assert_eq!(twice, ds);
    assert_eq!(twice.records()[0].fields["name"], json!("007"));
    assert_eq!(twice.records()[0].fields["league"], json!("true"));
    assert_eq!(twice.records()[1].fields["patch"], json!("7.35"));
}

#[test]
fn test_single_text_row_survives_round_trip() {
    let dir = tempdir().unwrap();
    let store = DatasetStore::new(dir.path().join("one.csv"), RecordLayout::default());
    let ds = Dataset::from_records(records(json!([
        {"match_id": 1, "start_time": 10, "name": "007", "league": "true"}
    ])))
    .unwrap();

    store.save(&ds).unwrap();

    assert_eq!(store.load().unwrap(), ds);
}

#[test]
fn test_load_without_types_file_infers_per_column() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("external.csv");
    std::fs::write(
        &path,
        "start_time,match_id,tag,score,won\n\
         2024-01-01 00:00:00,1,007,1,true\n\
         2024-01-02 00:00:00,2,OG,2.5,false\n",
    )
    .unwrap();

    let loaded = DatasetStore::new(&path, RecordLayout::default()).load().unwrap();

    let first = &loaded.records()[0].fields;
    assert_eq!(first["match_id"], json!(1));
    assert_eq!(first["tag"], json!("007"));
    assert_eq!(first["score"], json!(1.0));
    assert_eq!(first["won"], json!(true));
}

// ============================================================================
// Clean Projection Tests
// ============================================================================

#[test]
fn test_clean_projection_drops_and_coerces() {
    let store = DatasetStore::new("matches.csv", RecordLayout::default());
    let clean = store.clean_projection(&sample_dataset()).unwrap();

    // Row 2 has no radiant team
    let ids: Vec<i64> = clean.iter().map(|r| r.id("match_id").unwrap()).collect();
    assert_eq!(ids, vec![1, 3]);
    assert_eq!(clean[0].fields["radiant_team_id"], json!(10));
    assert!(clean[0].fields["radiant_team_id"].is_i64());
}

#[test]
fn test_clean_projection_rejects_non_integer() {
    let ds = Dataset::from_records(records(json!([
        {"match_id": 1, "start_time": 100, "radiant_team_id": "navi", "dire_team_id": 2}
    ])))
    .unwrap();
    let store = DatasetStore::new("matches.csv", RecordLayout::default());

    let err = store.clean_projection(&ds).unwrap_err();
    assert!(matches!(err, Error::Schema { ref field, .. } if field == "radiant_team_id"));
}

#[test]
fn test_custom_required_fields() {
    let store = DatasetStore::new("matches.csv", RecordLayout::default())
        .with_required_int_fields(vec!["dire_team_id".to_string()]);
    let clean = store.clean_projection(&sample_dataset()).unwrap();

    assert_eq!(clean.len(), 3);
    assert_eq!(store.required_int_fields(), ["dire_team_id".to_string()]);
}

#[test]
fn test_save_clean_writes_integer_columns() {
    let dir = tempdir().unwrap();
    let store = DatasetStore::new(dir.path().join("matches.csv"), RecordLayout::default());

    assert_eq!(store.save_clean(&sample_dataset()).unwrap(), 2);

    let text = std::fs::read_to_string(store.clean_path()).unwrap();
    let rows: Vec<&str> = text.lines().skip(1).collect();
    assert_eq!(rows.len(), 2);
    // radiant_team_id 10.0 is written as 10
    assert!(rows[0].contains(",10,"));
    assert!(!store.parquet_path().exists());
}

#[test]
fn test_save_clean_parquet_export() {
    let dir = tempdir().unwrap();
    let store = DatasetStore::new(dir.path().join("matches.csv"), RecordLayout::default())
        .with_parquet_export(Some(ParquetWriterConfig::default()));

    store.save_clean(&sample_dataset()).unwrap();

    let file = std::fs::File::open(store.parquet_path()).unwrap();
    let reader = parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder::try_new(file)
        .unwrap()
        .build()
        .unwrap();
    let rows: usize = reader.map(|b| b.unwrap().num_rows()).sum();
    assert_eq!(rows, 2);
}

// ============================================================================
// Lock Tests
// ============================================================================

#[test]
fn test_lock_contention() {
    let dir = tempdir().unwrap();
    let store = DatasetStore::new(dir.path().join("nested/matches.csv"), RecordLayout::default());

    let lock = store.lock().unwrap();
    assert!(lock.path().exists());

    let err = store.lock().unwrap_err();
    assert!(matches!(err, Error::DatasetLocked { .. }));

    drop(lock);
    assert!(!store.lock_path().exists());
    assert!(store.lock().is_ok());
}

#[test]
fn test_timestamps_survive_round_trip() {
    let dir = tempdir().unwrap();
    let store = DatasetStore::new(dir.path().join("t.csv"), RecordLayout::default());
    let ds = Dataset::from_records(records(json!([
        {"match_id": 1, "start_time": "2024-03-01 12:34:56"}
    ])))
    .unwrap();

    store.save(&ds).unwrap();
    let loaded = store.load().unwrap();

    assert_eq!(
        loaded.records()[0].timestamp,
        parse_timestamp(&json!(1_709_296_496)).unwrap()
    );
}
