use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    StringArray, StringBuilder,
};
use arrow::datatypes::{DataType, Field, Schema as ArrowSchema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{AttributeValue, Catalog, CatalogRow};
use crate::schema::Schema;

const CODE_COLUMNS: &[&str] = &["code", "row_id"];
const LABEL_COLUMNS: &[&str] = &["label", "row_label"];
const CONCEPT_COLUMNS: &[&str] = &["concept", "row_concept"];

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load the catalog of schema `S` from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row, `code` column plus one column per attribute
/// * `.json`    – `[{ "code": "...", "sex": "male", "age": 20, ... }, ...]`
/// * `.parquet` – same columns as the CSV, nulls for undefined cells
///
/// Columns that are not attributes of `S` are ignored.
pub fn load_catalog<S: Schema>(path: &Path) -> Result<Catalog> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let rows = match ext.as_str() {
        "csv" => load_csv::<S>(path),
        "json" => load_json::<S>(path),
        "parquet" | "pq" => load_parquet::<S>(path),
        other => bail!("Unsupported catalog extension: .{other}"),
    }
    .with_context(|| format!("loading {} catalog {}", S::NAME, path.display()))?;

    let catalog = Catalog::from_rows(rows)?;
    log::info!(
        "Loaded {} {} variables from {}",
        catalog.len(),
        S::NAME,
        path.display()
    );
    Ok(catalog)
}

/// Write a catalog as CSV or Parquet, chosen by extension.
pub fn write_catalog<S: Schema>(catalog: &Catalog, path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" => write_csv::<S>(catalog, path),
        "parquet" | "pq" => write_parquet::<S>(catalog, path),
        other => bail!("Unsupported catalog extension for writing: .{other}"),
    }
}

/// Canonical attribute name for a column header, if the column is one.
fn attribute_column<S: Schema>(header: &str) -> Option<&'static str> {
    S::attribute(header).map(|a| a.name)
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

fn load_csv<S: Schema>(path: &Path) -> Result<Vec<CatalogRow>> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let position = |names: &[&str]| headers.iter().position(|h| names.contains(&h.as_str()));
    let code_idx = position(CODE_COLUMNS).context("CSV missing 'code' column")?;
    let label_idx = position(LABEL_COLUMNS);
    let concept_idx = position(CONCEPT_COLUMNS);
    let attr_cols: Vec<(usize, &'static str)> = headers
        .iter()
        .enumerate()
        .filter_map(|(i, h)| attribute_column::<S>(h).map(|name| (i, name)))
        .collect();

    let mut rows = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;

        let code = record.get(code_idx).unwrap_or("").trim();
        if code.is_empty() {
            bail!("CSV row {row_no}: empty code");
        }
        let text = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let mut attributes = BTreeMap::new();
        for &(col_idx, name) in &attr_cols {
            let value = AttributeValue::parse(record.get(col_idx).unwrap_or(""));
            attributes.insert(name.to_string(), value);
        }

        rows.push(CatalogRow {
            code: code.to_string(),
            label: text(label_idx),
            concept: text(concept_idx),
            attributes,
        });
    }

    Ok(rows)
}

fn write_csv<S: Schema>(catalog: &Catalog, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;

    let mut header = vec!["code", "label", "concept"];
    header.extend(S::ATTRIBUTES.iter().map(|a| a.name));
    writer.write_record(&header).context("writing CSV header")?;

    for row in catalog.rows() {
        let mut record = vec![
            row.code.clone(),
            row.label.clone().unwrap_or_default(),
            row.concept.clone().unwrap_or_default(),
        ];
        for attr in S::ATTRIBUTES {
            record.push(match row.attribute(attr.name) {
                AttributeValue::Undefined => String::new(),
                other => other.to_string(),
            });
        }
        writer
            .write_record(&record)
            .with_context(|| format!("writing CSV row {}", row.code))?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// Records-oriented JSON, `null` or a missing key for undefined cells:
///
/// ```json
/// [
///   { "code": "PCT012A023", "sex": "male", "age": 20, "race": "white" },
///   ...
/// ]
/// ```
fn load_json<S: Schema>(path: &Path) -> Result<Vec<CatalogRow>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut rows = Vec::with_capacity(records.len());

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let field = |names: &[&str]| {
            names
                .iter()
                .find_map(|n| obj.get(*n))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        let code = field(CODE_COLUMNS).with_context(|| format!("Row {i}: missing 'code'"))?;

        let mut attributes = BTreeMap::new();
        for (key, val) in obj {
            if let Some(name) = attribute_column::<S>(key) {
                attributes.insert(name.to_string(), json_to_attribute(val));
            }
        }

        rows.push(CatalogRow {
            code,
            label: field(LABEL_COLUMNS),
            concept: field(CONCEPT_COLUMNS),
            attributes,
        });
    }

    Ok(rows)
}

fn json_to_attribute(val: &JsonValue) -> AttributeValue {
    match val {
        JsonValue::Null => AttributeValue::Undefined,
        JsonValue::Bool(b) => AttributeValue::Bool(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Integer(i),
            None => AttributeValue::parse(&n.to_string()),
        },
        JsonValue::String(s) => AttributeValue::parse(s),
        other => AttributeValue::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

/// Load a Parquet catalog. String, integer, float and boolean columns are
/// understood; nulls are undefined. Works with files written by Pandas,
/// Polars or [`write_catalog`].
fn load_parquet<S: Schema>(path: &Path) -> Result<Vec<CatalogRow>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        let n_rows = batch.num_rows();

        let index_of = |names: &[&str]| names.iter().find_map(|n| schema.index_of(n).ok());
        let code_idx = index_of(CODE_COLUMNS).context("Parquet file missing 'code' column")?;
        let label_idx = index_of(LABEL_COLUMNS);
        let concept_idx = index_of(CONCEPT_COLUMNS);

        let attr_cols: Vec<(usize, &'static str)> = schema
            .fields()
            .iter()
            .enumerate()
            .filter_map(|(i, f)| attribute_column::<S>(f.name()).map(|name| (i, name)))
            .collect();

        for row in 0..n_rows {
            let code = extract_text(batch.column(code_idx), row)
                .with_context(|| format!("Row {row}: null code"))?;
            let text = |idx: Option<usize>| idx.and_then(|i| extract_text(batch.column(i), row));

            let mut attributes = BTreeMap::new();
            for (col_idx, name) in &attr_cols {
                let value = extract_value(batch.column(*col_idx), row);
                attributes.insert(name.to_string(), value);
            }

            rows.push(CatalogRow {
                code,
                label: text(label_idx),
                concept: text(concept_idx),
                attributes,
            });
        }
    }

    Ok(rows)
}

/// Raw text of a cell, for code/label/concept columns.
fn extract_text(col: &ArrayRef, row: usize) -> Option<String> {
    if col.is_null(row) {
        return None;
    }
    match col.data_type() {
        DataType::Utf8 => col
            .as_any()
            .downcast_ref::<StringArray>()
            .map(|s| s.value(row).to_string()),
        DataType::LargeUtf8 => Some(col.as_string::<i64>().value(row).to_string()),
        _ => match extract_value(col, row) {
            AttributeValue::Undefined => None,
            value => Some(value.to_string()),
        },
    }
    .filter(|s| !s.is_empty())
}

/// Extract a single catalog cell from an Arrow column at a given row.
fn extract_value(col: &ArrayRef, row: usize) -> AttributeValue {
    if col.is_null(row) {
        return AttributeValue::Undefined;
    }
    match col.data_type() {
        DataType::Utf8 => col
            .as_any()
            .downcast_ref::<StringArray>()
            .map(|s| AttributeValue::parse(s.value(row)))
            .unwrap_or(AttributeValue::Undefined),
        DataType::LargeUtf8 => AttributeValue::parse(col.as_string::<i64>().value(row)),
        DataType::Int32 => col
            .as_any()
            .downcast_ref::<Int32Array>()
            .map(|a| AttributeValue::Integer(i64::from(a.value(row))))
            .unwrap_or(AttributeValue::Undefined),
        DataType::Int64 => col
            .as_any()
            .downcast_ref::<Int64Array>()
            .map(|a| AttributeValue::Integer(a.value(row)))
            .unwrap_or(AttributeValue::Undefined),
        // Pandas stores integer columns with gaps as floats
        DataType::Float32 => col
            .as_any()
            .downcast_ref::<Float32Array>()
            .map(|a| float_to_attribute(f64::from(a.value(row))))
            .unwrap_or(AttributeValue::Undefined),
        DataType::Float64 => col
            .as_any()
            .downcast_ref::<Float64Array>()
            .map(|a| float_to_attribute(a.value(row)))
            .unwrap_or(AttributeValue::Undefined),
        DataType::Boolean => col
            .as_any()
            .downcast_ref::<BooleanArray>()
            .map(|a| AttributeValue::Bool(a.value(row)))
            .unwrap_or(AttributeValue::Undefined),
        other => AttributeValue::Text(format!("{other:?}")),
    }
}

fn float_to_attribute(v: f64) -> AttributeValue {
    if v.is_nan() {
        AttributeValue::Undefined
    } else {
        AttributeValue::parse(&v.to_string())
    }
}

/// Every column is written as nullable text; readers parse cells back the
/// same way they parse CSV.
fn write_parquet<S: Schema>(catalog: &Catalog, path: &Path) -> Result<()> {
    let mut names = vec!["code", "label", "concept"];
    names.extend(S::ATTRIBUTES.iter().map(|a| a.name));

    let mut builders: Vec<StringBuilder> = names.iter().map(|_| StringBuilder::new()).collect();
    for row in catalog.rows() {
        builders[0].append_value(&row.code);
        builders[1].append_option(row.label.as_deref());
        builders[2].append_option(row.concept.as_deref());
        for (i, attr) in S::ATTRIBUTES.iter().enumerate() {
            match row.attribute(attr.name) {
                AttributeValue::Undefined => builders[3 + i].append_null(),
                value => builders[3 + i].append_value(value.to_string()),
            }
        }
    }

    let schema = Arc::new(ArrowSchema::new(
        names
            .iter()
            .map(|n| Field::new(*n, DataType::Utf8, *n != "code"))
            .collect::<Vec<_>>(),
    ));
    let columns: Vec<ArrayRef> = builders
        .iter_mut()
        .map(|b| Arc::new(b.finish()) as ArrayRef)
        .collect();
    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;

    let file = std::fs::File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Household, Population};

    fn sample_catalog() -> Catalog {
        Catalog::from_rows(vec![
            CatalogRow::new("P038001"),
            CatalogRow {
                label: Some("Husband-wife family: With own children under 18 years".into()),
                concept: Some("PRESENCE OF OWN CHILDREN (ASIAN ALONE HOUSEHOLDER)".into()),
                ..CatalogRow::new("P038D003")
                    .with("type", "husband_wife")
                    .with("has_children", true)
                    .with("race", "asian")
            },
        ])
        .unwrap()
    }

    fn assert_same_rows(expected: &Catalog, actual: &Catalog) {
        assert_eq!(expected.len(), actual.len());
        for (e, a) in expected.rows().iter().zip(actual.rows()) {
            assert_eq!(e.code, a.code);
            assert_eq!(e.label, a.label);
            assert_eq!(e.concept, a.concept);
            for attr in Household::ATTRIBUTES {
                assert_eq!(e.attribute(attr.name), a.attribute(attr.name), "{} {}", e.code, attr.name);
            }
        }
    }

    #[test]
    fn test_csv_with_legacy_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("population.csv");
        std::fs::write(
            &path,
            "row_id,row_label,row_concept,sex,age,race,hispanic_latino_origin\n\
             PCT012001,Total,SEX BY AGE,,,,\n\
             PCT012A025,Male: 22 years,SEX BY AGE (WHITE ALONE),male,22,white,\n\
             PCT012H131,Female: 24 years,SEX BY AGE (HISPANIC OR LATINO),female,24.0,,True\n",
        )
        .unwrap();

        let catalog = load_catalog::<Population>(&path).unwrap();
        assert_eq!(catalog.len(), 3);

        let total = catalog.get("PCT012001").unwrap();
        assert_eq!(total.label.as_deref(), Some("Total"));
        assert!(total.attribute("sex").is_undefined());

        let white = catalog.get("PCT012A025").unwrap();
        assert_eq!(white.attribute("age"), &AttributeValue::Integer(22));
        assert_eq!(white.attribute("race"), &AttributeValue::from("white"));

        let hispanic = catalog.get("PCT012H131").unwrap();
        assert_eq!(hispanic.attribute("age"), &AttributeValue::Integer(24));
        assert_eq!(hispanic.attribute("hispanic_origin"), &AttributeValue::Bool(true));
    }

    #[test]
    fn test_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("household.csv");
        let catalog = sample_catalog();
        write_catalog::<Household>(&catalog, &path).unwrap();
        let loaded = load_catalog::<Household>(&path).unwrap();
        assert_same_rows(&catalog, &loaded);
    }

    #[test]
    fn test_parquet_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("household.parquet");
        let catalog = sample_catalog();
        write_catalog::<Household>(&catalog, &path).unwrap();
        let loaded = load_catalog::<Household>(&path).unwrap();
        assert_same_rows(&catalog, &loaded);
    }

    #[test]
    fn test_json_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("household.json");
        std::fs::write(
            &path,
            r#"[
                {"code": "P038001", "type": null},
                {"code": "P038B004", "type": "husband_wife", "has_children": true,
                 "children_age": "under_6", "race": "black", "unrelated": 3}
            ]"#,
        )
        .unwrap();

        let catalog = load_catalog::<Household>(&path).unwrap();
        let row = catalog.get("P038B004").unwrap();
        assert_eq!(row.attribute("has_children"), &AttributeValue::Bool(true));
        assert_eq!(row.attribute("children_age"), &AttributeValue::from("under_6"));
        assert!(row.attributes.get("unrelated").is_none());
        assert!(catalog.get("P038001").unwrap().attribute("type").is_undefined());
    }

    #[test]
    fn test_unsupported_extension_and_missing_code() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("population.xlsx");
        std::fs::write(&path, "").unwrap();
        assert!(load_catalog::<Population>(&path).is_err());

        let path = dir.path().join("population.csv");
        std::fs::write(&path, "sex,age\nmale,3\n").unwrap();
        let err = load_catalog::<Population>(&path).unwrap_err();
        assert!(format!("{err:#}").contains("'code'"));
    }
}
