use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::CensusError;

// ---------------------------------------------------------------------------
// Geography dimensions
// ---------------------------------------------------------------------------

/// A geography level the data source can break results down by.
///
/// The derived order (state first) is the canonical order used to look up
/// endpoint shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GeoDimension {
    State,
    County,
    Subdivision,
    Tract,
    Place,
    District,
    Msa,
    Csa,
    Zipcode,
}

impl GeoDimension {
    pub const ALL: [GeoDimension; 9] = [
        GeoDimension::State,
        GeoDimension::County,
        GeoDimension::Subdivision,
        GeoDimension::Tract,
        GeoDimension::Place,
        GeoDimension::District,
        GeoDimension::Msa,
        GeoDimension::Csa,
        GeoDimension::Zipcode,
    ];

    /// Column name in geo specs and result tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            GeoDimension::State => "state",
            GeoDimension::County => "county",
            GeoDimension::Subdivision => "subdivision",
            GeoDimension::Tract => "tract",
            GeoDimension::Place => "place",
            GeoDimension::District => "district",
            GeoDimension::Msa => "msa",
            GeoDimension::Csa => "csa",
            GeoDimension::Zipcode => "zipcode",
        }
    }

    /// Geography name the Census Data API uses in `for`/`in` clauses and
    /// response headers.
    pub fn api_name(&self) -> &'static str {
        match self {
            GeoDimension::State => "state",
            GeoDimension::County => "county",
            GeoDimension::Subdivision => "county subdivision",
            GeoDimension::Tract => "tract",
            GeoDimension::Place => "place",
            GeoDimension::District => "congressional district",
            GeoDimension::Msa => "metropolitan statistical area/micropolitan statistical area",
            GeoDimension::Csa => "combined statistical area",
            GeoDimension::Zipcode => "zip code tabulation area",
        }
    }

    /// Map a response header back to its dimension, ignoring the
    /// `(or part)` qualifier and the `place/remainder` spelling.
    pub fn from_api_header(header: &str) -> Option<GeoDimension> {
        let name = header.trim();
        let name = name.strip_suffix(" (or part)").unwrap_or(name);
        if name == "place/remainder" {
            return Some(GeoDimension::Place);
        }
        GeoDimension::ALL.into_iter().find(|d| d.api_name() == name)
    }
}

impl fmt::Display for GeoDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeoDimension {
    type Err = CensusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        GeoDimension::ALL
            .into_iter()
            .find(|d| d.as_str() == key)
            .ok_or_else(|| CensusError::UnsupportedGeography {
                dimensions: vec![s.to_string()],
            })
    }
}

// ---------------------------------------------------------------------------
// GeoSpec
// ---------------------------------------------------------------------------

/// Value meaning "every unit at this level, one row each".
pub const WILDCARD: &str = "*";

/// Caller-ordered geography dimensions and their values.
///
/// Order matters: result tables show geography columns in insertion order.
/// Setting a dimension twice replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoSpec {
    entries: Vec<(GeoDimension, String)>,
}

impl GeoSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, dimension: GeoDimension, value: impl Into<String>) -> Self {
        self.insert(dimension, value);
        self
    }

    pub fn insert(&mut self, dimension: GeoDimension, value: impl Into<String>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(d, _)| *d == dimension) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((dimension, value)),
        }
    }

    /// Build from `(name, value)` pairs; an unknown name fails with
    /// `UnsupportedGeography` naming every supplied key.
    pub fn from_pairs<K, V, I>(pairs: I) -> Result<Self, CensusError>
    where
        K: AsRef<str>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let pairs: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.into()))
            .collect();
        let mut spec = GeoSpec::new();
        for (key, value) in &pairs {
            let dimension = key.parse::<GeoDimension>().map_err(|_| {
                CensusError::UnsupportedGeography {
                    dimensions: pairs.iter().map(|(k, _)| k.clone()).collect(),
                }
            })?;
            spec.insert(dimension, value.clone());
        }
        Ok(spec)
    }

    pub fn get(&self, dimension: GeoDimension) -> Option<&str> {
        self.entries
            .iter()
            .find(|(d, _)| *d == dimension)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, dimension: GeoDimension) -> bool {
        self.get(dimension).is_some()
    }

    /// Dimensions in caller order.
    pub fn dimensions(&self) -> Vec<GeoDimension> {
        self.entries.iter().map(|(d, _)| *d).collect()
    }

    /// Dimensions in canonical order, values ignored.
    pub fn dimension_set(&self) -> BTreeSet<GeoDimension> {
        self.entries.iter().map(|(d, _)| *d).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (GeoDimension, &str)> {
        self.entries.iter().map(|(d, v)| (*d, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for GeoSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(d, v)| format!("{d}={v}")).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_kept_and_replaced_in_place() {
        let geo = GeoSpec::new()
            .with(GeoDimension::County, "*")
            .with(GeoDimension::State, "OH")
            .with(GeoDimension::County, "035");
        assert_eq!(geo.dimensions(), [GeoDimension::County, GeoDimension::State]);
        assert_eq!(geo.get(GeoDimension::County), Some("035"));
        assert_eq!(geo.to_string(), "{county=035, state=OH}");
        assert_eq!(
            geo.dimension_set().into_iter().collect::<Vec<_>>(),
            [GeoDimension::State, GeoDimension::County]
        );
    }

    #[test]
    fn test_from_pairs_rejects_unknown_dimension() {
        let err = GeoSpec::from_pairs([("state", "*"), ("city", "Columbus")]).unwrap_err();
        assert_eq!(
            err,
            CensusError::UnsupportedGeography {
                dimensions: vec!["state".into(), "city".into()]
            }
        );
        let geo = GeoSpec::from_pairs([("State", "*"), ("zipcode", "43210")]).unwrap();
        assert_eq!(geo.dimensions(), [GeoDimension::State, GeoDimension::Zipcode]);
    }

    #[test]
    fn test_api_header_mapping() {
        assert_eq!(GeoDimension::from_api_header("state"), Some(GeoDimension::State));
        assert_eq!(
            GeoDimension::from_api_header("zip code tabulation area (or part)"),
            Some(GeoDimension::Zipcode)
        );
        assert_eq!(
            GeoDimension::from_api_header("place/remainder (or part)"),
            Some(GeoDimension::Place)
        );
        assert_eq!(
            GeoDimension::from_api_header("congressional district"),
            Some(GeoDimension::District)
        );
        assert_eq!(GeoDimension::from_api_header("PCT012001"), None);
        for d in GeoDimension::ALL {
            assert_eq!(GeoDimension::from_api_header(d.api_name()), Some(d));
        }
    }
}
