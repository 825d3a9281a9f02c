use std::fmt;
use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Builder, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema as ArrowSchema};
use arrow::record_batch::RecordBatch;

use crate::error::CensusError;
use crate::geo::spec::{GeoDimension, GeoSpec};
use crate::geo::states::GeoLookup;
use crate::source::RawTable;

// ---------------------------------------------------------------------------
// Result table
// ---------------------------------------------------------------------------

/// One geography cell in a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum GeoValue {
    Text(String),
    /// County codes, coerced so `001` and `1` compare equal.
    Number(i64),
}

impl fmt::Display for GeoValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeoValue::Text(s) => write!(f, "{s}"),
            GeoValue::Number(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    /// Sum of the matched variable counts for this geography.
    pub total: f64,
    /// One value per requested geography column, in request order.
    pub geography: Vec<GeoValue>,
}

/// The final table: the aggregate column followed by the requested
/// geography columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    pub aggregate: String,
    pub geography: Vec<GeoDimension>,
    pub rows: Vec<ResultRow>,
}

impl ResultTable {
    /// A correctly-shaped table with no rows.
    pub fn empty(aggregate: &str, geo: &GeoSpec) -> Self {
        ResultTable {
            aggregate: aggregate.to_string(),
            geography: geo.dimensions(),
            rows: Vec::new(),
        }
    }

    /// Column names, aggregate first.
    pub fn columns(&self) -> Vec<&str> {
        std::iter::once(self.aggregate.as_str())
            .chain(self.geography.iter().map(|d| d.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Totals column as a plain vector.
    pub fn totals(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.total).collect()
    }

    /// Convert to an Arrow record batch: `Float64` aggregate, `Int64` county
    /// codes and `Utf8` for every other geography column.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut fields = vec![Field::new(self.aggregate.as_str(), DataType::Float64, false)];
        let mut columns: Vec<ArrayRef> = vec![Arc::new(Float64Array::from(self.totals()))];

        for (i, dim) in self.geography.iter().enumerate() {
            let numeric = *dim == GeoDimension::County;
            if numeric {
                let mut builder = Int64Builder::new();
                for row in &self.rows {
                    match &row.geography[i] {
                        GeoValue::Number(n) => builder.append_value(*n),
                        GeoValue::Text(_) => builder.append_null(),
                    }
                }
                fields.push(Field::new(dim.as_str(), DataType::Int64, true));
                columns.push(Arc::new(builder.finish()));
            } else {
                let mut builder = StringBuilder::new();
                for row in &self.rows {
                    builder.append_value(row.geography[i].to_string());
                }
                fields.push(Field::new(dim.as_str(), DataType::Utf8, false));
                columns.push(Arc::new(builder.finish()));
            }
        }

        RecordBatch::try_new(Arc::new(ArrowSchema::new(fields)), columns)
            .context("building result record batch")
    }

    /// Write as CSV with a header row.
    pub fn write_csv<W: Write>(&self, out: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(out);
        writer
            .write_record(self.columns())
            .context("writing CSV header")?;
        for row in &self.rows {
            let mut record = vec![row.total.to_string()];
            record.extend(row.geography.iter().map(|g| g.to_string()));
            writer.write_record(&record).context("writing CSV row")?;
        }
        writer.flush().context("flushing CSV")?;
        Ok(())
    }
}

impl fmt::Display for ResultTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let batch = self.to_record_batch().map_err(|_| fmt::Error)?;
        let pretty = arrow::util::pretty::pretty_format_batches(&[batch]).map_err(|_| fmt::Error)?;
        write!(f, "{pretty}")
    }
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Turn raw per-variable rows into the final table.
///
/// * `state` codes become postal abbreviations (unknown codes are kept)
/// * `county` codes become numbers
/// * every column starting with `code_prefix` is summed into `aggregate`;
///   missing or non-numeric cells count as zero
/// * only the requested geography columns survive, in request order
pub fn assemble(
    raw: &RawTable,
    geo: &GeoSpec,
    aggregate: &str,
    code_prefix: &str,
    lookup: &impl GeoLookup,
) -> Result<ResultTable, CensusError> {
    let mut table = ResultTable::empty(aggregate, geo);
    if raw.is_empty() {
        return Ok(table);
    }
    if let Some((i, row)) = raw
        .rows
        .iter()
        .enumerate()
        .find(|(_, row)| row.len() != raw.columns.len())
    {
        return Err(CensusError::data_source(format!(
            "row {i} has {} cells but the header has {}",
            row.len(),
            raw.columns.len()
        )));
    }

    let geo_columns: Vec<(GeoDimension, usize)> = table
        .geography
        .iter()
        .map(|dim| {
            raw.column_index(dim.as_str())
                .map(|idx| (*dim, idx))
                .ok_or_else(|| {
                    CensusError::data_source(format!("response has no `{dim}` column"))
                })
        })
        .collect::<Result<_, _>>()?;

    let value_columns: Vec<usize> = raw
        .columns
        .iter()
        .enumerate()
        .filter(|(_, name)| name.starts_with(code_prefix))
        .map(|(i, _)| i)
        .collect();

    for row in &raw.rows {
        let total: f64 = value_columns
            .iter()
            .filter_map(|&i| row[i].as_deref())
            .filter_map(|cell| cell.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .sum();

        let geography = geo_columns
            .iter()
            .map(|&(dim, idx)| display_value(dim, row[idx].as_deref().unwrap_or(""), lookup))
            .collect();

        table.rows.push(ResultRow { total, geography });
    }

    Ok(table)
}

fn display_value(dim: GeoDimension, raw: &str, lookup: &impl GeoLookup) -> GeoValue {
    match dim {
        GeoDimension::State => match lookup.abbr_of(raw) {
            Some(abbr) => GeoValue::Text(abbr.to_string()),
            None => {
                log::warn!("No abbreviation for state code '{raw}'");
                GeoValue::Text(raw.to_string())
            }
        },
        GeoDimension::County => match raw.trim().parse::<i64>() {
            Ok(n) => GeoValue::Number(n),
            Err(_) => GeoValue::Text(raw.to_string()),
        },
        _ => GeoValue::Text(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::states::StateTable;
    use serde_json::json;

    fn geo(pairs: &[(&str, &str)]) -> GeoSpec {
        GeoSpec::from_pairs(pairs.iter().copied()).unwrap()
    }

    #[test]
    fn test_empty_input_keeps_shape() {
        let table = assemble(
            &RawTable::default(),
            &geo(&[("state", "*"), ("county", "*")]),
            "population",
            "PCT",
            &StateTable,
        )
        .unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns(), ["population", "state", "county"]);

        let batch = table.to_record_batch().unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.num_columns(), 3);
    }

    #[test]
    fn test_sums_matching_columns_and_projects_in_request_order() {
        let raw = RawTable::from_json(&json!([
            ["PCT012A023", "PCT012D023", "NAME", "state", "county"],
            ["100", "7", "Adams County", "39", "001"],
            ["5", "bad", "Allen County", "39", "003"],
            [null, null, "Ashland County", "39", "005"]
        ]))
        .unwrap();

        let table = assemble(
            &raw,
            &geo(&[("county", "*"), ("state", "OH")]),
            "population",
            "PCT",
            &StateTable,
        )
        .unwrap();

        assert_eq!(table.columns(), ["population", "county", "state"]);
        assert_eq!(table.totals(), [107.0, 5.0, 0.0]);
        assert_eq!(
            table.rows[0].geography,
            [GeoValue::Number(1), GeoValue::Text("OH".into())]
        );
        assert_eq!(table.rows[2].geography[0], GeoValue::Number(5));
    }

    #[test]
    fn test_household_prefix_ignores_other_tables() {
        let raw = RawTable::from_json(&json!([
            ["P038B004", "P038D004", "PCT012001", "state"],
            ["3", "4", "1000", "06"]
        ]))
        .unwrap();
        let table = assemble(&raw, &geo(&[("state", "CA")]), "households", "P038", &StateTable)
            .unwrap();
        assert_eq!(table.totals(), [7.0]);
        assert_eq!(table.rows[0].geography, [GeoValue::Text("CA".into())]);
    }

    #[test]
    fn test_missing_geography_column_is_a_source_error() {
        let raw = RawTable::from_json(&json!([["P038001", "state"], ["3", "06"]])).unwrap();
        let err = assemble(
            &raw,
            &geo(&[("state", "*"), ("county", "*")]),
            "households",
            "P038",
            &StateTable,
        )
        .unwrap_err();
        assert!(matches!(err, CensusError::DataSource(_)));
    }

    #[test]
    fn test_ragged_row_is_a_source_error() {
        let raw = RawTable {
            columns: vec!["PCT012002".into(), "state".into()],
            rows: vec![vec![Some("5".into())]],
        };
        let err = assemble(&raw, &geo(&[("state", "OH")]), "population", "PCT", &StateTable)
            .unwrap_err();
        assert!(matches!(err, CensusError::DataSource(_)));
    }

    #[test]
    fn test_csv_and_pretty_output() {
        let table = ResultTable {
            aggregate: "households".into(),
            geography: vec![GeoDimension::State, GeoDimension::County],
            rows: vec![ResultRow {
                total: 12.0,
                geography: vec![GeoValue::Text("OH".into()), GeoValue::Number(49)],
            }],
        };

        let mut out = Vec::new();
        table.write_csv(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "households,state,county\n12,OH,49\n");

        let pretty = table.to_string();
        assert!(pretty.contains("households"));
        assert!(pretty.contains("OH"));
    }
}
