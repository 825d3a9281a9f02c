//! Data source layer: where raw per-variable counts come from.
//!
//! ```text
//!   variable codes + Endpoint
//!        │
//!        ▼
//!   ┌──────────────┐
//!   │ CensusSource  │  HttpSource in production, in-memory tables in tests
//!   └──────────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │ RawTable  │  header row + string cells, geo columns named by dimension
//!   └──────────┘
//! ```

pub mod http;

use std::collections::HashMap;

use serde_json::Value as JsonValue;

use crate::error::CensusError;
use crate::geo::dispatch::Endpoint;
use crate::geo::spec::GeoDimension;

pub use http::HttpSource;

// ---------------------------------------------------------------------------
// CensusSource
// ---------------------------------------------------------------------------

/// Anything that can answer "these variables, at this geography".
pub trait CensusSource {
    /// Fetch one row per geography unit, one column per variable code plus
    /// one column per geography dimension of `endpoint`.
    fn fetch(&self, variables: &[String], endpoint: &Endpoint) -> Result<RawTable, CensusError>;
}

impl<T: CensusSource + ?Sized> CensusSource for &T {
    fn fetch(&self, variables: &[String], endpoint: &Endpoint) -> Result<RawTable, CensusError> {
        (**self).fetch(variables, endpoint)
    }
}

// ---------------------------------------------------------------------------
// RawTable
// ---------------------------------------------------------------------------

/// Untyped response table. Cells stay text until the assembler coerces them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>) -> Self {
        RawTable {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row; its width must match the header.
    pub fn push_row(&mut self, row: Vec<Option<String>>) -> Result<(), CensusError> {
        if row.len() != self.columns.len() {
            return Err(CensusError::data_source(format!(
                "row {} has {} cells but the header has {}",
                self.rows.len(),
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column)?.as_deref()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Parse the API's array-of-arrays JSON: the first row is the header,
    /// the rest are data. Geography headers are renamed to dimension names.
    ///
    /// ```json
    /// [["PCT012A023","state","county"],
    ///  ["1534","39","001"]]
    /// ```
    pub fn from_json(root: &JsonValue) -> Result<RawTable, CensusError> {
        let records = root
            .as_array()
            .ok_or_else(|| CensusError::data_source("expected a top-level JSON array"))?;
        let Some((header, data)) = records.split_first() else {
            return Ok(RawTable::default());
        };

        let columns = header
            .as_array()
            .ok_or_else(|| CensusError::data_source("header row is not an array"))?
            .iter()
            .map(|h| {
                let name = json_cell(h).unwrap_or_default();
                match GeoDimension::from_api_header(&name) {
                    Some(d) => d.as_str().to_string(),
                    None => name,
                }
            })
            .collect();

        let mut table = RawTable::new(columns);
        for (i, rec) in data.iter().enumerate() {
            let cells = rec
                .as_array()
                .ok_or_else(|| CensusError::data_source(format!("row {i} is not an array")))?;
            table.push_row(cells.iter().map(json_cell).collect())?;
        }
        Ok(table)
    }

    /// Join the columns of `other` onto `self`, matching rows by the values
    /// of the geography columns both tables share.
    ///
    /// Used to stitch together responses for variable lists the API made us
    /// split across several requests.
    pub fn merge(mut self, other: RawTable) -> Result<RawTable, CensusError> {
        if self.columns.is_empty() {
            return Ok(other);
        }
        if other.columns.is_empty() {
            return Ok(self);
        }

        let key_columns: Vec<&str> = GeoDimension::ALL
            .iter()
            .map(|d| d.as_str())
            .filter(|name| self.column_index(name).is_some() && other.column_index(name).is_some())
            .collect();
        let self_keys: Vec<usize> = key_columns
            .iter()
            .filter_map(|c| self.column_index(c))
            .collect();
        let other_keys: Vec<usize> = key_columns
            .iter()
            .filter_map(|c| other.column_index(c))
            .collect();

        let key_of = |row: &[Option<String>], idx: &[usize]| -> Vec<Option<String>> {
            idx.iter().map(|&i| row[i].clone()).collect()
        };

        let mut by_key: HashMap<Vec<Option<String>>, &Vec<Option<String>>> = HashMap::new();
        for row in &other.rows {
            by_key.insert(key_of(row.as_slice(), &other_keys), row);
        }

        let new_columns: Vec<usize> = (0..other.columns.len())
            .filter(|i| !other_keys.contains(i) && self.column_index(&other.columns[*i]).is_none())
            .collect();

        if self.rows.len() != other.rows.len() {
            return Err(CensusError::data_source(format!(
                "partial responses disagree: {} rows vs {} rows",
                self.rows.len(),
                other.rows.len()
            )));
        }

        for row in &mut self.rows {
            let key = key_of(row.as_slice(), &self_keys);
            let matched = by_key.get(&key).ok_or_else(|| {
                CensusError::data_source(format!("no matching geography {key:?} in partial response"))
            })?;
            row.extend(new_columns.iter().map(|&i| matched[i].clone()));
        }
        self.columns
            .extend(new_columns.iter().map(|&i| other.columns[i].clone()));
        Ok(self)
    }
}

fn json_cell(v: &JsonValue) -> Option<String> {
    match v {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
