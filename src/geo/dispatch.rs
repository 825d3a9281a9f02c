use std::fmt;

use super::spec::{GeoDimension, GeoSpec, WILDCARD};
use super::states::GeoLookup;
use crate::error::CensusError;

// ---------------------------------------------------------------------------
// State scope
// ---------------------------------------------------------------------------

/// The state parameter every endpoint shape carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateScope {
    /// `*`: every state, passed through to the data source as-is.
    All,
    /// A resolved two-digit FIPS code.
    Fips(String),
}

impl StateScope {
    pub fn as_str(&self) -> &str {
        match self {
            StateScope::All => WILDCARD,
            StateScope::Fips(code) => code,
        }
    }
}

impl fmt::Display for StateScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Endpoint shapes
// ---------------------------------------------------------------------------

/// One of the fixed geography query shapes, with its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    State {
        state: StateScope,
    },
    StateCounty {
        state: StateScope,
        county: String,
    },
    StateCountySubdivision {
        state: StateScope,
        county: String,
        subdivision: String,
    },
    StateCountyTract {
        state: StateScope,
        county: String,
        tract: String,
    },
    StatePlace {
        state: StateScope,
        place: String,
    },
    StateDistrict {
        state: StateScope,
        district: String,
    },
    StateMsa {
        state: StateScope,
        msa: String,
    },
    StateCsa {
        state: StateScope,
        csa: String,
    },
    StateDistrictPlace {
        state: StateScope,
        district: String,
        place: String,
    },
    StateZipcode {
        state: StateScope,
        zipcode: String,
    },
}

impl Endpoint {
    /// Shape name, e.g. `state_county_tract`.
    pub fn shape(&self) -> &'static str {
        match self {
            Endpoint::State { .. } => "state",
            Endpoint::StateCounty { .. } => "state_county",
            Endpoint::StateCountySubdivision { .. } => "state_county_subdivision",
            Endpoint::StateCountyTract { .. } => "state_county_tract",
            Endpoint::StatePlace { .. } => "state_place",
            Endpoint::StateDistrict { .. } => "state_district",
            Endpoint::StateMsa { .. } => "state_msa",
            Endpoint::StateCsa { .. } => "state_csa",
            Endpoint::StateDistrictPlace { .. } => "state_district_place",
            Endpoint::StateZipcode { .. } => "state_zipcode",
        }
    }

    pub fn state(&self) -> &StateScope {
        match self {
            Endpoint::State { state }
            | Endpoint::StateCounty { state, .. }
            | Endpoint::StateCountySubdivision { state, .. }
            | Endpoint::StateCountyTract { state, .. }
            | Endpoint::StatePlace { state, .. }
            | Endpoint::StateDistrict { state, .. }
            | Endpoint::StateMsa { state, .. }
            | Endpoint::StateCsa { state, .. }
            | Endpoint::StateDistrictPlace { state, .. }
            | Endpoint::StateZipcode { state, .. } => state,
        }
    }

    /// Geography parameters in the shape's positional order, state first.
    pub fn params(&self) -> Vec<&str> {
        let state = self.state().as_str();
        match self {
            Endpoint::State { .. } => vec![state],
            Endpoint::StateCounty { county, .. } => vec![state, county.as_str()],
            Endpoint::StateCountySubdivision {
                county,
                subdivision,
                ..
            } => vec![state, county.as_str(), subdivision.as_str()],
            Endpoint::StateCountyTract { county, tract, .. } => {
                vec![state, county.as_str(), tract.as_str()]
            }
            Endpoint::StatePlace { place, .. } => vec![state, place.as_str()],
            Endpoint::StateDistrict { district, .. } => vec![state, district.as_str()],
            Endpoint::StateMsa { msa, .. } => vec![state, msa.as_str()],
            Endpoint::StateCsa { csa, .. } => vec![state, csa.as_str()],
            Endpoint::StateDistrictPlace {
                district, place, ..
            } => vec![state, district.as_str(), place.as_str()],
            Endpoint::StateZipcode { zipcode, .. } => vec![state, zipcode.as_str()],
        }
    }

    /// The API `for` clause: the finest geography level and its value.
    pub fn for_clause(&self) -> String {
        match self {
            Endpoint::State { state } => format!("state:{state}"),
            Endpoint::StateCounty { county, .. } => format!("county:{county}"),
            Endpoint::StateCountySubdivision { subdivision, .. } => {
                format!("county subdivision:{subdivision}")
            }
            Endpoint::StateCountyTract { tract, .. } => format!("tract:{tract}"),
            Endpoint::StatePlace { place, .. } => format!("place:{place}"),
            Endpoint::StateDistrict { district, .. } => {
                format!("congressional district:{district}")
            }
            Endpoint::StateMsa { msa, .. } => format!(
                "metropolitan statistical area/micropolitan statistical area (or part):{msa}"
            ),
            Endpoint::StateCsa { csa, .. } => format!("combined statistical area (or part):{csa}"),
            Endpoint::StateDistrictPlace { place, .. } => {
                format!("place/remainder (or part):{place}")
            }
            Endpoint::StateZipcode { zipcode, .. } => {
                format!("zip code tabulation area (or part):{zipcode}")
            }
        }
    }

    /// The API `in` clause: the enclosing geographies, if any.
    pub fn in_clause(&self) -> Option<String> {
        let state = self.state();
        match self {
            Endpoint::State { .. } => None,
            Endpoint::StateCountySubdivision { county, .. }
            | Endpoint::StateCountyTract { county, .. } => {
                Some(format!("state:{state} county:{county}"))
            }
            Endpoint::StateDistrictPlace { district, .. } => {
                Some(format!("state:{state} congressional district:{district}"))
            }
            _ => Some(format!("state:{state}")),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.shape(), self.params().join(", "))
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Pick the endpoint shape whose dimension set equals `geo`'s exactly and
/// resolve its state parameter.
///
/// The key set is checked before the state value, so an unsupported shape
/// is reported even when the state is also bad.
pub fn dispatch(geo: &GeoSpec, lookup: &impl GeoLookup) -> Result<Endpoint, CensusError> {
    use GeoDimension::*;

    let dims: Vec<GeoDimension> = geo.dimension_set().into_iter().collect();
    let shape = match dims.as_slice() {
        [State] => Shape::State,
        [State, County] => Shape::StateCounty,
        [State, County, Subdivision] => Shape::StateCountySubdivision,
        [State, County, Tract] => Shape::StateCountyTract,
        [State, Place] => Shape::StatePlace,
        [State, District] => Shape::StateDistrict,
        [State, Msa] => Shape::StateMsa,
        [State, Csa] => Shape::StateCsa,
        [State, Place, District] => Shape::StateDistrictPlace,
        [State, Zipcode] => Shape::StateZipcode,
        _ => {
            return Err(CensusError::UnsupportedGeography {
                dimensions: geo.dimensions().iter().map(|d| d.to_string()).collect(),
            })
        }
    };

    let state = resolve_state(geo.get(State).unwrap_or(WILDCARD), lookup)?;
    // every dimension of the matched shape is present in `geo`
    let value = |d: GeoDimension| geo.get(d).unwrap_or(WILDCARD).to_string();

    let endpoint = match shape {
        Shape::State => Endpoint::State { state },
        Shape::StateCounty => Endpoint::StateCounty {
            state,
            county: value(County),
        },
        Shape::StateCountySubdivision => Endpoint::StateCountySubdivision {
            state,
            county: value(County),
            subdivision: value(Subdivision),
        },
        Shape::StateCountyTract => Endpoint::StateCountyTract {
            state,
            county: value(County),
            tract: value(Tract),
        },
        Shape::StatePlace => Endpoint::StatePlace {
            state,
            place: value(Place),
        },
        Shape::StateDistrict => Endpoint::StateDistrict {
            state,
            district: value(District),
        },
        Shape::StateMsa => Endpoint::StateMsa {
            state,
            msa: value(Msa),
        },
        Shape::StateCsa => Endpoint::StateCsa {
            state,
            csa: value(Csa),
        },
        Shape::StateDistrictPlace => Endpoint::StateDistrictPlace {
            state,
            district: value(District),
            place: value(Place),
        },
        Shape::StateZipcode => Endpoint::StateZipcode {
            state,
            zipcode: value(Zipcode),
        },
    };

    log::info!("Geography {geo} dispatched to {endpoint}");
    Ok(endpoint)
}

#[derive(Debug, Clone, Copy)]
enum Shape {
    State,
    StateCounty,
    StateCountySubdivision,
    StateCountyTract,
    StatePlace,
    StateDistrict,
    StateMsa,
    StateCsa,
    StateDistrictPlace,
    StateZipcode,
}

fn resolve_state(value: &str, lookup: &impl GeoLookup) -> Result<StateScope, CensusError> {
    if value.trim() == WILDCARD {
        return Ok(StateScope::All);
    }
    lookup
        .resolve_state(value)
        .map(|fips| StateScope::Fips(fips.to_string()))
        .ok_or_else(|| CensusError::UnknownState(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::states::StateTable;

    fn geo(pairs: &[(&str, &str)]) -> GeoSpec {
        GeoSpec::from_pairs(pairs.iter().copied()).unwrap()
    }

    #[test]
    fn test_wildcard_state_passes_through() {
        let endpoint = dispatch(&geo(&[("state", "*")]), &StateTable).unwrap();
        assert_eq!(endpoint, Endpoint::State { state: StateScope::All });
        assert_eq!(endpoint.params(), ["*"]);
    }

    #[test]
    fn test_state_abbreviation_resolves_to_fips() {
        let endpoint = dispatch(&geo(&[("state", "OH")]), &StateTable).unwrap();
        assert_eq!(endpoint.state(), &StateScope::Fips("39".into()));
    }

    #[test]
    fn test_unknown_state() {
        let err = dispatch(&geo(&[("state", "ZZ")]), &StateTable).unwrap_err();
        assert_eq!(err, CensusError::UnknownState("ZZ".into()));
    }

    #[test]
    fn test_every_supported_shape() {
        let cases: &[(&[(&str, &str)], &str, &[&str])] = &[
            (&[("state", "*")], "state", &["*"]),
            (&[("state", "*"), ("county", "*")], "state_county", &["*", "*"]),
            (
                &[("state", "OH"), ("county", "049"), ("subdivision", "*")],
                "state_county_subdivision",
                &["39", "049", "*"],
            ),
            (
                &[("tract", "*"), ("county", "049"), ("state", "OH")],
                "state_county_tract",
                &["39", "049", "*"],
            ),
            (&[("state", "OH"), ("place", "18000")], "state_place", &["39", "18000"]),
            (&[("state", "OH"), ("district", "*")], "state_district", &["39", "*"]),
            (&[("state", "OH"), ("msa", "18140")], "state_msa", &["39", "18140"]),
            (&[("state", "OH"), ("csa", "198")], "state_csa", &["39", "198"]),
            (
                &[("state", "OH"), ("place", "18000"), ("district", "03")],
                "state_district_place",
                &["39", "03", "18000"],
            ),
            (&[("state", "OH"), ("zipcode", "43210")], "state_zipcode", &["39", "43210"]),
        ];
        for (pairs, shape, params) in cases {
            let endpoint = dispatch(&geo(pairs), &StateTable).unwrap();
            assert_eq!(endpoint.shape(), *shape);
            assert_eq!(endpoint.params(), *params, "params of {shape}");
        }
    }

    #[test]
    fn test_unsupported_key_sets() {
        let cases: &[&[(&str, &str)]] = &[
            &[],
            &[("county", "*")],
            &[("state", "*"), ("tract", "*")],
            &[("state", "*"), ("county", "*"), ("place", "*")],
            &[("state", "*"), ("county", "*"), ("tract", "*"), ("subdivision", "*")],
            &[("state", "*"), ("msa", "*"), ("csa", "*")],
        ];
        for pairs in cases {
            let err = dispatch(&geo(pairs), &StateTable).unwrap_err();
            assert!(
                matches!(err, CensusError::UnsupportedGeography { .. }),
                "{pairs:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_shape_checked_before_state() {
        let err = dispatch(&geo(&[("state", "ZZ"), ("county", "*"), ("place", "*")]), &StateTable)
            .unwrap_err();
        assert!(matches!(err, CensusError::UnsupportedGeography { .. }));
    }

    #[test]
    fn test_api_clauses() {
        let endpoint = dispatch(
            &geo(&[("state", "OH"), ("county", "049"), ("tract", "*")]),
            &StateTable,
        )
        .unwrap();
        assert_eq!(endpoint.for_clause(), "tract:*");
        assert_eq!(endpoint.in_clause().as_deref(), Some("state:39 county:049"));

        let endpoint = dispatch(&geo(&[("state", "*")]), &StateTable).unwrap();
        assert_eq!(endpoint.for_clause(), "state:*");
        assert_eq!(endpoint.in_clause(), None);

        let endpoint = dispatch(
            &geo(&[("state", "OH"), ("district", "03"), ("place", "*")]),
            &StateTable,
        )
        .unwrap();
        assert_eq!(endpoint.for_clause(), "place/remainder (or part):*");
        assert_eq!(
            endpoint.in_clause().as_deref(),
            Some("state:39 congressional district:03")
        );
        assert_eq!(endpoint.to_string(), "state_district_place(39, 03, *)");
    }
}
