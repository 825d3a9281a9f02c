use std::marker::PhantomData;

use anyhow::Result;

use crate::assemble::{ResultTable, assemble};
use crate::catalog::filter::{FilterSpec, resolve};
use crate::catalog::loader::load_catalog;
use crate::catalog::model::Catalog;
use crate::config::Config;
use crate::error::CensusError;
use crate::geo::dispatch::{Endpoint, dispatch};
use crate::geo::spec::{GeoDimension, GeoSpec};
use crate::geo::states::StateTable;
use crate::schema::{Household, Population, Schema, SchemaKind, validate_catalog};
use crate::source::{CensusSource, HttpSource};

// ---------------------------------------------------------------------------
// Query plan
// ---------------------------------------------------------------------------

/// Everything a read decides before touching the network.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    /// Matched variable codes, in catalog order.
    pub variables: Vec<String>,
    pub endpoint: Endpoint,
    /// Output geography columns, in request order.
    pub geography: Vec<GeoDimension>,
    /// Output aggregate column name.
    pub aggregate: &'static str,
}

// ---------------------------------------------------------------------------
// Reader facade
// ---------------------------------------------------------------------------

/// Query facade for one schema.
///
/// Holds only the catalog and the data source; every per-query value lives
/// on the stack of `read`, so one reader can serve concurrent callers.
pub struct Reader<S: Schema, C: CensusSource = HttpSource> {
    catalog: Catalog,
    source: C,
    states: StateTable,
    _schema: PhantomData<S>,
}

pub type PopulationReader<C = HttpSource> = Reader<Population, C>;
pub type HouseholdReader<C = HttpSource> = Reader<Household, C>;

impl<S: Schema> Reader<S, HttpSource> {
    /// Load `S`'s catalog from `config.catalog_dir` and connect to the Census
    /// Data API with `api_key`.
    pub fn new(api_key: Option<&str>, config: &Config) -> Result<Self> {
        let path = config.catalog_path(S::NAME)?;
        let catalog = load_catalog::<S>(&path)?;
        let source = HttpSource::new(api_key, config)?;
        Self::with_source(catalog, source)
    }
}

impl<S: Schema, C: CensusSource> Reader<S, C> {
    /// Build a reader over an already loaded catalog and any data source.
    pub fn with_source(catalog: Catalog, source: C) -> Result<Self> {
        validate_catalog::<S>(&catalog)?;
        Ok(Reader {
            catalog,
            source,
            states: StateTable,
            _schema: PhantomData,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn source(&self) -> &C {
        &self.source
    }

    /// Resolve filters and geography without any network access.
    pub fn plan(&self, geo: &GeoSpec, filters: &FilterSpec) -> Result<QueryPlan, CensusError> {
        let variables: Vec<String> = resolve::<S>(&self.catalog, filters)?
            .into_iter()
            .map(|row| row.code.clone())
            .collect();
        let endpoint = dispatch(geo, &self.states)?;

        log::info!(
            "{} query matched {} variables: {:?}",
            S::NAME,
            variables.len(),
            variables
        );

        Ok(QueryPlan {
            variables,
            endpoint,
            geography: geo.dimensions(),
            aggregate: S::AGGREGATE,
        })
    }

    /// Run one query: resolve, fetch, assemble.
    ///
    /// All resolution errors surface before the data source is called. When
    /// no variable matches, the data source is not called at all and an
    /// empty table with the right columns comes back.
    pub fn read(&self, geo: &GeoSpec, filters: &FilterSpec) -> Result<ResultTable, CensusError> {
        let plan = self.plan(geo, filters)?;
        if plan.variables.is_empty() {
            log::info!("No {} variables match {filters:?}; skipping request", S::NAME);
            return Ok(ResultTable::empty(S::AGGREGATE, geo));
        }

        let raw = self.source.fetch(&plan.variables, &plan.endpoint)?;
        let table = assemble(&raw, geo, S::AGGREGATE, S::CODE_PREFIX, &self.states)?;
        log::info!("{} query returned {} rows", S::NAME, table.len());
        Ok(table)
    }
}

// ---------------------------------------------------------------------------
// Runtime-selected readers
// ---------------------------------------------------------------------------

/// Object-safe view of a reader, for choosing the schema at runtime.
pub trait CensusRead: Send + Sync {
    fn schema(&self) -> SchemaKind;
    fn catalog(&self) -> &Catalog;
    fn plan(&self, geo: &GeoSpec, filters: &FilterSpec) -> Result<QueryPlan, CensusError>;
    fn read(&self, geo: &GeoSpec, filters: &FilterSpec) -> Result<ResultTable, CensusError>;
}

macro_rules! impl_census_read {
    ($schema:ty, $kind:expr) => {
        impl<C: CensusSource + Send + Sync> CensusRead for Reader<$schema, C> {
            fn schema(&self) -> SchemaKind {
                $kind
            }

            fn catalog(&self) -> &Catalog {
                Reader::catalog(self)
            }

            fn plan(&self, geo: &GeoSpec, filters: &FilterSpec) -> Result<QueryPlan, CensusError> {
                Reader::plan(self, geo, filters)
            }

            fn read(&self, geo: &GeoSpec, filters: &FilterSpec) -> Result<ResultTable, CensusError> {
                Reader::read(self, geo, filters)
            }
        }
    };
}

impl_census_read!(Population, SchemaKind::Population);
impl_census_read!(Household, SchemaKind::Household);

/// Open the reader for `kind` against the Census Data API.
pub fn data_reader(
    kind: SchemaKind,
    api_key: Option<&str>,
    config: &Config,
) -> Result<Box<dyn CensusRead>> {
    Ok(match kind {
        SchemaKind::Population => Box::new(PopulationReader::new(api_key, config)?),
        SchemaKind::Household => Box::new(HouseholdReader::new(api_key, config)?),
    })
}
