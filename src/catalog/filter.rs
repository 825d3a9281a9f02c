use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use super::model::{AttributeValue, Catalog, CatalogRow};
use crate::error::CensusError;
use crate::schema::{Attribute, Domain, Schema};

// ---------------------------------------------------------------------------
// Filter values
// ---------------------------------------------------------------------------

/// The accepted values for one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Scalar(AttributeValue),
    Set(BTreeSet<AttributeValue>),
    /// Half-open integer range `start..end`.
    Range { start: i64, end: i64 },
}

impl FilterValue {
    /// Whether a catalog cell satisfies this filter. `Undefined` never does.
    pub fn matches(&self, value: &AttributeValue) -> bool {
        match self {
            FilterValue::Scalar(v) => !value.is_undefined() && v == value,
            FilterValue::Set(set) => !value.is_undefined() && set.contains(value),
            FilterValue::Range { start, end } => value
                .as_i64()
                .is_some_and(|i| *start <= i && i < *end),
        }
    }

    fn members(&self) -> Vec<&AttributeValue> {
        match self {
            FilterValue::Scalar(v) => vec![v],
            FilterValue::Set(set) => set.iter().collect(),
            FilterValue::Range { .. } => Vec::new(),
        }
    }

    /// Reject values outside the attribute's domain.
    pub fn validate(&self, attribute: &Attribute) -> Result<(), CensusError> {
        let invalid = || CensusError::InvalidFilterValue {
            attribute: attribute.name.to_string(),
            value: self.to_string(),
            expected: attribute.domain.describe(),
        };

        match (&attribute.domain, self) {
            // sex takes exactly one of the two literals
            (Domain::Sex, FilterValue::Scalar(v)) if attribute.domain.admits(v) && !v.is_undefined() => {
                Ok(())
            }
            (Domain::Sex, _) => Err(invalid()),
            (Domain::Age, FilterValue::Range { .. }) => Ok(()),
            (_, FilterValue::Range { .. }) => Err(invalid()),
            (domain, value) => {
                let members = value.members();
                if members
                    .iter()
                    .all(|m| !m.is_undefined() && domain.admits(m))
                {
                    Ok(())
                } else {
                    Err(invalid())
                }
            }
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Scalar(v) => write!(f, "{v}"),
            FilterValue::Set(set) => {
                let items: Vec<String> = set.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
            FilterValue::Range { start, end } => write!(f, "{start}..{end}"),
        }
    }
}

/// Command-line spelling: `20..25` is a range, `a,b` a set, anything else a
/// single value interpreted like a catalog cell.
impl FromStr for FilterValue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty filter value".to_string());
        }
        if let Some((lo, hi)) = s.split_once("..") {
            let start = lo.trim().parse::<i64>().map_err(|e| format!("range start `{lo}`: {e}"))?;
            let end = hi.trim().parse::<i64>().map_err(|e| format!("range end `{hi}`: {e}"))?;
            return Ok(FilterValue::Range { start, end });
        }
        if s.contains(',') {
            return Ok(FilterValue::Set(
                s.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(AttributeValue::parse)
                    .collect(),
            ));
        }
        Ok(FilterValue::Scalar(AttributeValue::parse(s)))
    }
}

impl From<AttributeValue> for FilterValue {
    fn from(v: AttributeValue) -> Self {
        FilterValue::Scalar(v)
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        FilterValue::Scalar(s.into())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        FilterValue::Scalar(s.into())
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        FilterValue::Scalar(b.into())
    }
}

impl From<i64> for FilterValue {
    fn from(i: i64) -> Self {
        FilterValue::Scalar(i.into())
    }
}

impl From<Range<i64>> for FilterValue {
    fn from(r: Range<i64>) -> Self {
        FilterValue::Range {
            start: r.start,
            end: r.end,
        }
    }
}

impl<const N: usize> From<[&str; N]> for FilterValue {
    fn from(items: [&str; N]) -> Self {
        FilterValue::Set(items.into_iter().map(AttributeValue::from).collect())
    }
}

impl From<Vec<&str>> for FilterValue {
    fn from(items: Vec<&str>) -> Self {
        FilterValue::Set(items.into_iter().map(AttributeValue::from).collect())
    }
}

impl From<BTreeSet<AttributeValue>> for FilterValue {
    fn from(set: BTreeSet<AttributeValue>) -> Self {
        FilterValue::Set(set)
    }
}

// ---------------------------------------------------------------------------
// Filter spec
// ---------------------------------------------------------------------------

/// Per-query attribute constraints: attribute_name → accepted values.
///
/// An attribute absent from the spec is itself a constraint: only variables
/// whose attribute is undefined pass. Leaving out `race` therefore selects the
/// race-agnostic variables rather than summing every race.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    filters: BTreeMap<String, FilterValue>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, attribute: &str, value: impl Into<FilterValue>) -> Self {
        self.insert(attribute, value);
        self
    }

    pub fn insert(&mut self, attribute: &str, value: impl Into<FilterValue>) {
        self.filters.insert(attribute.to_string(), value.into());
    }

    pub fn get(&self, attribute: &str) -> Option<&FilterValue> {
        self.filters.get(attribute)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FilterValue)> {
        self.filters.iter()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Look up the filter for `attribute` under its name or any alias.
    fn for_attribute(&self, attribute: &Attribute) -> Option<&FilterValue> {
        self.filters
            .iter()
            .find(|(key, _)| attribute.answers_to(key))
            .map(|(_, value)| value)
    }

    /// Check every key names a schema attribute, at most once counting
    /// aliases, and every value is in its domain.
    pub fn validate<S: Schema>(&self) -> Result<(), CensusError> {
        let mut seen: BTreeMap<&'static str, &str> = BTreeMap::new();
        for (key, value) in &self.filters {
            let attribute = S::attribute(key).ok_or_else(|| CensusError::UnknownAttribute {
                schema: S::NAME,
                attribute: key.clone(),
            })?;
            if let Some(first) = seen.insert(attribute.name, key.as_str()) {
                return Err(CensusError::InvalidFilterValue {
                    attribute: attribute.name.to_string(),
                    value: value.to_string(),
                    expected: format!("one filter, but both `{first}` and `{key}` were given"),
                });
            }
            value.validate(attribute)?;
        }
        Ok(())
    }
}

impl<K: AsRef<str>, V: Into<FilterValue>> FromIterator<(K, V)> for FilterSpec {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut spec = FilterSpec::new();
        for (k, v) in iter {
            spec.insert(k.as_ref(), v);
        }
        spec
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Return the catalog rows passing every attribute constraint of `S`.
///
/// A row passes an attribute when:
/// * the attribute is filtered → its value matches the filter
/// * the attribute is not filtered → its value is undefined
///
/// Validation runs first, so a bad filter fails before any row is inspected.
/// An empty result is not an error.
pub fn resolve<'c, S: Schema>(
    catalog: &'c Catalog,
    filters: &FilterSpec,
) -> Result<Vec<&'c CatalogRow>, CensusError> {
    filters.validate::<S>()?;

    let constraints: Vec<(&Attribute, Option<&FilterValue>)> = S::ATTRIBUTES
        .iter()
        .map(|attr| (attr, filters.for_attribute(attr)))
        .collect();

    Ok(catalog
        .rows()
        .iter()
        .filter(|row| {
            constraints.iter().all(|(attr, filter)| {
                let value = row.attribute(attr.name);
                match filter {
                    Some(filter) => filter.matches(value),
                    None => value.is_undefined(),
                }
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Household, Population};

    fn population_catalog() -> Catalog {
        let mut rows = vec![
            CatalogRow::new("PCT012001"),
            CatalogRow::new("PCT012002").with("sex", "male"),
            CatalogRow::new("PCT012106").with("sex", "female"),
        ];
        for (letter, race) in [("", None), ("A", Some("white")), ("D", Some("asian"))] {
            for age in 0..30i64 {
                rows.push(
                    CatalogRow::new(format!("PCT012{letter}{:03}", age + 3))
                        .with("sex", "male")
                        .with("age", age)
                        .with("race", race),
                );
                rows.push(
                    CatalogRow::new(format!("PCT012{letter}{:03}", age + 107))
                        .with("sex", "female")
                        .with("age", age)
                        .with("race", race),
                );
            }
        }
        rows.push(
            CatalogRow::new("PCT012H023")
                .with("sex", "male")
                .with("age", 20i64)
                .with("hispanic_origin", true),
        );
        Catalog::from_rows(rows).unwrap()
    }

    fn codes(rows: &[&CatalogRow]) -> Vec<String> {
        rows.iter().map(|r| r.code.clone()).collect()
    }

    #[test]
    fn test_empty_spec_selects_only_fully_undefined_rows() {
        let catalog = population_catalog();
        let rows = resolve::<Population>(&catalog, &FilterSpec::new()).unwrap();
        assert_eq!(codes(&rows), ["PCT012001"]);
    }

    #[test]
    fn test_male_twenty_to_twenty_five_asian_or_white() {
        let catalog = population_catalog();
        let spec = FilterSpec::new()
            .with("sex", "male")
            .with("age", 20..25)
            .with("race", ["asian", "white"]);
        let rows = resolve::<Population>(&catalog, &spec).unwrap();

        assert_eq!(rows.len(), 10);
        for row in &rows {
            assert_eq!(row.attribute("sex"), &AttributeValue::from("male"));
            let age = row.attribute("age").as_i64().unwrap();
            assert!((20..25).contains(&age));
            assert!(matches!(row.attribute("race").as_str(), Some("asian" | "white")));
            assert!(row.attribute("hispanic_origin").is_undefined());
        }
        // PCT012H023 is hispanic-specific and must not leak in
        assert!(!codes(&rows).contains(&"PCT012H023".to_string()));
    }

    #[test]
    fn test_range_is_half_open() {
        let catalog = population_catalog();
        let spec = FilterSpec::new().with("sex", "female").with("age", 24..25);
        let rows = resolve::<Population>(&catalog, &spec).unwrap();
        assert_eq!(codes(&rows), ["PCT012131"]);

        let spec = FilterSpec::new().with("sex", "female").with("age", 25..25);
        assert!(resolve::<Population>(&catalog, &spec).unwrap().is_empty());
    }

    #[test]
    fn test_scalar_age_and_alias_key() {
        let catalog = population_catalog();
        let spec = FilterSpec::new()
            .with("sex", "male")
            .with("age", 20i64)
            .with("hispanic_latino_origin", true);
        let rows = resolve::<Population>(&catalog, &spec).unwrap();
        assert_eq!(codes(&rows), ["PCT012H023"]);
    }

    #[test]
    fn test_attribute_and_alias_together_rejected() {
        let catalog = population_catalog();
        let spec = FilterSpec::new()
            .with("sex", "male")
            .with("hispanic_origin", true)
            .with("hispanic_latino_origin", false);
        let err = resolve::<Population>(&catalog, &spec).unwrap_err();
        assert!(matches!(
            err,
            CensusError::InvalidFilterValue { ref attribute, .. } if attribute == "hispanic_origin"
        ));
    }

    #[test]
    fn test_narrowing_a_set_never_grows_the_result() {
        let catalog = population_catalog();
        let wide = FilterSpec::new()
            .with("sex", "male")
            .with("age", 0..30)
            .with("race", ["asian", "white"]);
        let narrow = wide.clone().with("race", ["asian"]);
        let narrower = narrow.clone().with("age", 5..6);

        let wide = codes(&resolve::<Population>(&catalog, &wide).unwrap());
        let narrow = codes(&resolve::<Population>(&catalog, &narrow).unwrap());
        let narrower = codes(&resolve::<Population>(&catalog, &narrower).unwrap());

        assert!(narrow.len() <= wide.len());
        assert!(narrower.len() <= narrow.len());
        assert!(narrow.iter().all(|c| wide.contains(c)));
        assert!(narrower.iter().all(|c| narrow.contains(c)));
    }

    #[test]
    fn test_sex_accepts_only_male_or_female() {
        let catalog = population_catalog();
        for bad in [
            FilterValue::from("both"),
            FilterValue::from(["male", "female"]),
            FilterValue::from(true),
        ] {
            let spec = FilterSpec::new().with("sex", bad);
            let err = resolve::<Population>(&catalog, &spec).unwrap_err();
            assert!(matches!(err, CensusError::InvalidFilterValue { ref attribute, .. } if attribute == "sex"));
        }
    }

    #[test]
    fn test_out_of_domain_values_rejected() {
        let catalog = population_catalog();
        let spec = FilterSpec::new().with("race", ["asian", "martian"]);
        assert!(matches!(
            resolve::<Population>(&catalog, &spec),
            Err(CensusError::InvalidFilterValue { .. })
        ));

        let spec = FilterSpec::new().with("race", 1..3);
        assert!(matches!(
            resolve::<Population>(&catalog, &spec),
            Err(CensusError::InvalidFilterValue { .. })
        ));

        let spec = FilterSpec::new().with("type", "husband_wife");
        assert!(matches!(
            resolve::<Population>(&catalog, &spec),
            Err(CensusError::UnknownAttribute { schema: "population", .. })
        ));
    }

    #[test]
    fn test_household_filters() {
        let catalog = Catalog::from_rows(vec![
            CatalogRow::new("P038001"),
            CatalogRow::new("P038B004")
                .with("type", "husband_wife")
                .with("has_children", true)
                .with("children_age", "under_6")
                .with("race", "black"),
            CatalogRow::new("P038D004")
                .with("type", "husband_wife")
                .with("has_children", true)
                .with("children_age", "under_6")
                .with("race", "asian"),
            CatalogRow::new("P038D003")
                .with("type", "husband_wife")
                .with("has_children", true)
                .with("race", "asian"),
        ])
        .unwrap();

        let spec = FilterSpec::new()
            .with("type", "husband_wife")
            .with("has_children", true)
            .with("children_age", "under_6")
            .with("race", ["black", "asian"]);
        let rows = resolve::<Household>(&catalog, &spec).unwrap();
        assert_eq!(codes(&rows), ["P038B004", "P038D004"]);
    }

    #[test]
    fn test_parse_filter_values() {
        assert_eq!("20..25".parse::<FilterValue>().unwrap(), FilterValue::from(20..25));
        assert_eq!(
            "asian, white".parse::<FilterValue>().unwrap(),
            FilterValue::from(["white", "asian"])
        );
        assert_eq!("true".parse::<FilterValue>().unwrap(), FilterValue::from(true));
        assert_eq!("42".parse::<FilterValue>().unwrap(), FilterValue::from(42i64));
        assert_eq!("male".parse::<FilterValue>().unwrap(), FilterValue::from("male"));
        assert!("".parse::<FilterValue>().is_err());
        assert!("a..25".parse::<FilterValue>().is_err());
    }
}
