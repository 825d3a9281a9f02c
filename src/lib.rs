//! Query translator for the 2010 Census SF1 dataset.
//!
//! A query names a geography and a set of demographic filters. The filters
//! pick variable codes out of a schema's attribute catalog, the geography
//! picks one of ten API endpoint shapes, and the per-variable counts that
//! come back are summed into one total per geography unit.
//!
//! ```text
//!   FilterSpec ──▶ catalog::filter::resolve ──▶ variable codes ─┐
//!                                                              ├─▶ CensusSource ──▶ assemble ──▶ ResultTable
//!   GeoSpec ────▶ geo::dispatch::dispatch ───▶ Endpoint ───────┘
//! ```

pub mod assemble;
pub mod catalog;
pub mod config;
pub mod error;
pub mod geo;
pub mod reader;
pub mod schema;
pub mod source;

pub use assemble::{GeoValue, ResultRow, ResultTable};
pub use catalog::filter::{FilterSpec, FilterValue};
pub use catalog::model::{AttributeValue, Catalog, CatalogRow};
pub use config::Config;
pub use error::CensusError;
pub use geo::dispatch::{Endpoint, StateScope};
pub use geo::spec::{GeoDimension, GeoSpec};
pub use reader::{CensusRead, HouseholdReader, PopulationReader, QueryPlan, Reader, data_reader};
pub use schema::{Household, Population, Schema, SchemaKind};
pub use source::{CensusSource, HttpSource, RawTable};
