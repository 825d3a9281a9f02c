use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use anyhow::{Result, bail};

// ---------------------------------------------------------------------------
// AttributeValue – a single decoded attribute cell
// ---------------------------------------------------------------------------

/// A decoded catalog attribute. `Undefined` is a real value, not a wildcard:
/// it marks variables that do not break down along that attribute.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttributeValue {
    Undefined,
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl AttributeValue {
    /// Interpret a raw text cell the way catalog files spell values.
    ///
    /// * empty → `Undefined`
    /// * `true` / `True` / `false` / `False` → `Bool`
    /// * integral numbers, including `20.0` → `Integer`
    /// * anything else → `Text`
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            return AttributeValue::Undefined;
        }
        match s {
            "true" | "True" => return AttributeValue::Bool(true),
            "false" | "False" => return AttributeValue::Bool(false),
            _ => {}
        }
        if let Ok(i) = s.parse::<i64>() {
            return AttributeValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            if f.is_finite() && f.fract() == 0.0 {
                return AttributeValue::Integer(f as i64);
            }
        }
        AttributeValue::Text(s.to_string())
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, AttributeValue::Undefined)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Text(s) => write!(f, "{s}"),
            AttributeValue::Integer(i) => write!(f, "{i}"),
            AttributeValue::Bool(b) => write!(f, "{b}"),
            AttributeValue::Undefined => write!(f, "<undefined>"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::Text(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::Text(s)
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        AttributeValue::Integer(i)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Bool(b)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(AttributeValue::Undefined)
    }
}

// ---------------------------------------------------------------------------
// CatalogRow – one census variable
// ---------------------------------------------------------------------------

static UNDEFINED: AttributeValue = AttributeValue::Undefined;

/// One census variable code and its decoded attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRow {
    /// Census variable code, e.g. `PCT012A023`.
    pub code: String,
    /// Source label text; only meaningful while building the catalog.
    pub label: Option<String>,
    /// Source concept text; only meaningful while building the catalog.
    pub concept: Option<String>,
    /// Decoded attributes: attribute_name → value. Missing means undefined.
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl CatalogRow {
    pub fn new(code: impl Into<String>) -> Self {
        CatalogRow {
            code: code.into(),
            label: None,
            concept: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter, mostly for tests and the catalog builder.
    pub fn with(mut self, attribute: &str, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(attribute.to_string(), value.into());
        self
    }

    /// Value of `attribute`, `Undefined` when the row has no such cell.
    pub fn attribute(&self, attribute: &str) -> &AttributeValue {
        self.attributes.get(attribute).unwrap_or(&UNDEFINED)
    }
}

// ---------------------------------------------------------------------------
// Catalog – the immutable lookup table
// ---------------------------------------------------------------------------

/// The full variable catalog of one schema with pre-computed value indices.
#[derive(Debug, Clone)]
pub struct Catalog {
    rows: Vec<CatalogRow>,
    /// Ordered list of attribute column names.
    column_names: Vec<String>,
    /// For each attribute column the sorted set of distinct values.
    unique_values: BTreeMap<String, BTreeSet<AttributeValue>>,
}

impl Catalog {
    /// Build the catalog and its column indices. Rows are kept sorted by code;
    /// a repeated code is an error.
    pub fn from_rows(mut rows: Vec<CatalogRow>) -> Result<Self> {
        rows.sort_by(|a, b| a.code.cmp(&b.code));
        if let Some(pair) = rows.windows(2).find(|w| w[0].code == w[1].code) {
            bail!("Duplicate variable code {} in catalog", pair[0].code);
        }

        let mut column_names_set: BTreeSet<String> = BTreeSet::new();
        let mut unique_values: BTreeMap<String, BTreeSet<AttributeValue>> = BTreeMap::new();

        for row in &rows {
            for (col, val) in &row.attributes {
                column_names_set.insert(col.clone());
                unique_values
                    .entry(col.clone())
                    .or_default()
                    .insert(val.clone());
            }
        }

        Ok(Catalog {
            rows,
            column_names: column_names_set.into_iter().collect(),
            unique_values,
        })
    }

    pub fn rows(&self) -> &[CatalogRow] {
        &self.rows
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Distinct values of an attribute column, if the catalog has it.
    pub fn unique_values(&self, column: &str) -> Option<&BTreeSet<AttributeValue>> {
        self.unique_values.get(column)
    }

    pub fn get(&self, code: &str) -> Option<&CatalogRow> {
        self.rows
            .binary_search_by(|r| r.code.as_str().cmp(code))
            .ok()
            .map(|i| &self.rows[i])
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
