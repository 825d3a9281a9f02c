use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Result, bail};
use clap::ValueEnum;

use crate::catalog::decode;
use crate::catalog::model::{AttributeValue, Catalog};

// ---------------------------------------------------------------------------
// Attribute domains
// ---------------------------------------------------------------------------

pub const RACES: &[&str] = &[
    "white",
    "black",
    "indian_alaskan",
    "asian",
    "hawaii_pacific",
    "other_alone",
    "two_or_more",
];

pub const SEXES: &[&str] = &["male", "female"];

pub const HOUSEHOLD_TYPES: &[&str] = &["husband_wife", "female_householder", "male_householder"];

pub const CHILDREN_AGES: &[&str] = &["under_6", "under_6_and_6_to_17", "6_to_17"];

/// What a filterable attribute may hold, besides `Undefined`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// `male` or `female`, and only as a single value.
    Sex,
    /// Non-negative integer ages.
    Age,
    /// One of an enumerated set of text values.
    Choice(&'static [&'static str]),
    /// A boolean flag.
    Flag,
}

impl Domain {
    /// Whether a catalog cell is a legal decoding for this domain.
    pub fn admits(&self, value: &AttributeValue) -> bool {
        match (self, value) {
            (_, AttributeValue::Undefined) => true,
            (Domain::Sex, AttributeValue::Text(s)) => SEXES.contains(&s.as_str()),
            (Domain::Age, AttributeValue::Integer(i)) => *i >= 0,
            (Domain::Choice(choices), AttributeValue::Text(s)) => choices.contains(&s.as_str()),
            (Domain::Flag, AttributeValue::Bool(_)) => true,
            _ => false,
        }
    }

    /// Human description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Domain::Sex => "`male` or `female`".to_string(),
            Domain::Age => "an age, a set of ages or a range such as 20..25".to_string(),
            Domain::Choice(choices) => format!("one or more of {}", choices.join(", ")),
            Domain::Flag => "true or false".to_string(),
        }
    }
}

/// One filterable attribute column of a schema.
#[derive(Debug, Clone, Copy)]
pub struct Attribute {
    pub name: &'static str,
    pub domain: Domain,
    /// Older column / filter spellings accepted for this attribute.
    pub aliases: &'static [&'static str],
}

impl Attribute {
    const fn new(name: &'static str, domain: Domain) -> Self {
        Attribute {
            name,
            domain,
            aliases: &[],
        }
    }

    pub fn answers_to(&self, key: &str) -> bool {
        self.name == key || self.aliases.contains(&key)
    }
}

const RACE: Attribute = Attribute::new("race", Domain::Choice(RACES));

const HISPANIC_ORIGIN: Attribute = Attribute {
    name: "hispanic_origin",
    domain: Domain::Flag,
    aliases: &["hispanic_latino_origin"],
};

// ---------------------------------------------------------------------------
// Schema – one census table family
// ---------------------------------------------------------------------------

/// Decoded attribute cells of one variable.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// A census table family the readers know how to query.
pub trait Schema: Send + Sync + 'static {
    /// Schema name, also the catalog file stem.
    const NAME: &'static str;
    /// Name of the summed output column.
    const AGGREGATE: &'static str;
    /// Prefix shared by every variable code column in a response.
    const CODE_PREFIX: &'static str;
    /// Table id the catalog builder selects variables by.
    const TABLE: &'static str;
    /// Filterable attributes, in filter order.
    const ATTRIBUTES: &'static [Attribute];

    /// Decode a variable's attributes from its code, label and concept.
    fn decode(code: &str, label: &str, concept: &str) -> Attributes;

    fn attribute(key: &str) -> Option<&'static Attribute> {
        Self::ATTRIBUTES.iter().find(|a| a.answers_to(key))
    }
}

/// Sex by single year of age (SF1 `PCT012*`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Population;

impl Schema for Population {
    const NAME: &'static str = "population";
    const AGGREGATE: &'static str = "population";
    const CODE_PREFIX: &'static str = "PCT";
    const TABLE: &'static str = "PCT012";
    const ATTRIBUTES: &'static [Attribute] = &[
        Attribute::new("sex", Domain::Sex),
        Attribute::new("age", Domain::Age),
        RACE,
        HISPANIC_ORIGIN,
    ];

    fn decode(code: &str, _label: &str, concept: &str) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("sex".into(), decode::population_sex(code).into());
        attrs.insert("age".into(), decode::population_age(code).into());
        attrs.insert("race".into(), decode::race(concept).into());
        attrs.insert("hispanic_origin".into(), decode::hispanic_origin(concept).into());
        attrs
    }
}

/// Households by type and presence of own children (SF1 `P038*`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Household;

impl Schema for Household {
    const NAME: &'static str = "household";
    const AGGREGATE: &'static str = "households";
    const CODE_PREFIX: &'static str = "P038";
    const TABLE: &'static str = "P038";
    const ATTRIBUTES: &'static [Attribute] = &[
        Attribute::new("type", Domain::Choice(HOUSEHOLD_TYPES)),
        Attribute::new("has_children", Domain::Flag),
        Attribute::new("children_age", Domain::Choice(CHILDREN_AGES)),
        RACE,
        HISPANIC_ORIGIN,
    ];

    fn decode(_code: &str, label: &str, concept: &str) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("type".into(), decode::household_type(label).into());
        attrs.insert("has_children".into(), decode::has_children(label).into());
        attrs.insert("children_age".into(), decode::children_age(label).into());
        attrs.insert("race".into(), decode::race(concept).into());
        attrs.insert("hispanic_origin".into(), decode::hispanic_origin(concept).into());
        attrs
    }
}

/// Check that every decoded cell of the catalog lies in its attribute's domain.
pub fn validate_catalog<S: Schema>(catalog: &Catalog) -> Result<()> {
    for row in catalog.rows() {
        for attr in S::ATTRIBUTES {
            let value = row.attribute(attr.name);
            if !attr.domain.admits(value) {
                bail!(
                    "{} catalog row {}: `{value}` is not a valid {} (expected {})",
                    S::NAME,
                    row.code,
                    attr.name,
                    attr.domain.describe()
                );
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Runtime schema selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SchemaKind {
    Population,
    Household,
}

impl SchemaKind {
    pub fn name(&self) -> &'static str {
        match self {
            SchemaKind::Population => Population::NAME,
            SchemaKind::Household => Household::NAME,
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::model::CatalogRow;

    #[test]
    fn test_attribute_lookup_honours_aliases() {
        assert_eq!(
            Population::attribute("hispanic_latino_origin").map(|a| a.name),
            Some("hispanic_origin")
        );
        assert_eq!(Household::attribute("type").map(|a| a.name), Some("type"));
        assert!(Population::attribute("type").is_none());
        assert!(Household::attribute("sex").is_none());
    }

    #[test]
    fn test_domain_admits() {
        assert!(Domain::Sex.admits(&"female".into()));
        assert!(!Domain::Sex.admits(&"both".into()));
        assert!(Domain::Age.admits(&AttributeValue::Integer(104)));
        assert!(!Domain::Age.admits(&AttributeValue::Integer(-1)));
        assert!(Domain::Choice(RACES).admits(&"hawaii_pacific".into()));
        assert!(!Domain::Flag.admits(&"yes".into()));
        assert!(Domain::Flag.admits(&AttributeValue::Undefined));
    }

    #[test]
    fn test_validate_catalog_rejects_out_of_domain_cells() {
        let good = Catalog::from_rows(vec![
            CatalogRow::new("P038001"),
            CatalogRow::new("P038002").with("type", "husband_wife").with("has_children", true),
        ])
        .unwrap();
        assert!(validate_catalog::<Household>(&good).is_ok());

        let bad = Catalog::from_rows(vec![CatalogRow::new("P038003").with("type", "roommates")])
            .unwrap();
        let err = validate_catalog::<Household>(&bad).unwrap_err();
        assert!(err.to_string().contains("P038003"));
    }

    #[test]
    fn test_population_decode_uses_code_and_concept() {
        let attrs = Population::decode(
            "PCT012B027",
            "Male: 24 years",
            "SEX BY AGE (BLACK OR AFRICAN AMERICAN ALONE)",
        );
        assert_eq!(attrs["sex"], AttributeValue::from("male"));
        assert_eq!(attrs["age"], AttributeValue::Integer(24));
        assert_eq!(attrs["race"], AttributeValue::from("black"));
        assert!(attrs["hispanic_origin"].is_undefined());
    }
}
