use std::time::Duration;

// ---------------------------------------------------------------------------
// Query-time error taxonomy
// ---------------------------------------------------------------------------

/// Everything that can abort a single `read`.
///
/// The first four variants are raised while resolving filters and geography,
/// before any request leaves the process. `Timeout` and `DataSource` come from
/// the data source itself and are never retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CensusError {
    /// A filter value lies outside the attribute's accepted domain.
    #[error("invalid value {value} for filter `{attribute}`: expected {expected}")]
    InvalidFilterValue {
        attribute: String,
        value: String,
        expected: String,
    },

    /// A filter key the schema does not know about.
    #[error("`{attribute}` is not a {schema} filter attribute")]
    UnknownAttribute {
        schema: &'static str,
        attribute: String,
    },

    /// The geography dimensions match none of the supported endpoint shapes.
    #[error("unsupported geography combination {{{}}}", .dimensions.join(", "))]
    UnsupportedGeography { dimensions: Vec<String> },

    /// A state name or abbreviation that resolves to no FIPS code.
    #[error("unknown state `{0}`")]
    UnknownState(String),

    #[error("census API request timed out after {0:?}")]
    Timeout(Duration),

    /// Network, HTTP status, authentication or response-shape failure.
    #[error("census data source error: {0}")]
    DataSource(String),
}

impl CensusError {
    /// Build a `DataSource` error from anything printable.
    pub fn data_source(msg: impl std::fmt::Display) -> Self {
        CensusError::DataSource(msg.to_string())
    }
}
