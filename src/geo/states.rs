// ---------------------------------------------------------------------------
// State FIPS lookup
// ---------------------------------------------------------------------------

/// Name/abbreviation ⟷ FIPS resolution used by the dispatcher and assembler.
pub trait GeoLookup {
    /// Two-digit FIPS code for a state name, abbreviation or FIPS code.
    fn resolve_state(&self, name_or_abbr: &str) -> Option<&str>;

    /// Two-letter postal abbreviation for a FIPS code.
    fn abbr_of(&self, fips: &str) -> Option<&str>;
}

/// (fips, abbreviation, name)
const STATES: &[(&str, &str, &str)] = &[
    ("01", "AL", "Alabama"),
    ("02", "AK", "Alaska"),
    ("04", "AZ", "Arizona"),
    ("05", "AR", "Arkansas"),
    ("06", "CA", "California"),
    ("08", "CO", "Colorado"),
    ("09", "CT", "Connecticut"),
    ("10", "DE", "Delaware"),
    ("11", "DC", "District of Columbia"),
    ("12", "FL", "Florida"),
    ("13", "GA", "Georgia"),
    ("15", "HI", "Hawaii"),
    ("16", "ID", "Idaho"),
    ("17", "IL", "Illinois"),
    ("18", "IN", "Indiana"),
    ("19", "IA", "Iowa"),
    ("20", "KS", "Kansas"),
    ("21", "KY", "Kentucky"),
    ("22", "LA", "Louisiana"),
    ("23", "ME", "Maine"),
    ("24", "MD", "Maryland"),
    ("25", "MA", "Massachusetts"),
    ("26", "MI", "Michigan"),
    ("27", "MN", "Minnesota"),
    ("28", "MS", "Mississippi"),
    ("29", "MO", "Missouri"),
    ("30", "MT", "Montana"),
    ("31", "NE", "Nebraska"),
    ("32", "NV", "Nevada"),
    ("33", "NH", "New Hampshire"),
    ("34", "NJ", "New Jersey"),
    ("35", "NM", "New Mexico"),
    ("36", "NY", "New York"),
    ("37", "NC", "North Carolina"),
    ("38", "ND", "North Dakota"),
    ("39", "OH", "Ohio"),
    ("40", "OK", "Oklahoma"),
    ("41", "OR", "Oregon"),
    ("42", "PA", "Pennsylvania"),
    ("44", "RI", "Rhode Island"),
    ("45", "SC", "South Carolina"),
    ("46", "SD", "South Dakota"),
    ("47", "TN", "Tennessee"),
    ("48", "TX", "Texas"),
    ("49", "UT", "Utah"),
    ("50", "VT", "Vermont"),
    ("51", "VA", "Virginia"),
    ("53", "WA", "Washington"),
    ("54", "WV", "West Virginia"),
    ("55", "WI", "Wisconsin"),
    ("56", "WY", "Wyoming"),
    ("72", "PR", "Puerto Rico"),
];

/// Built-in table of the 50 states, the District of Columbia and Puerto Rico,
/// the units SF1 publishes.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateTable;

impl StateTable {
    /// Every FIPS code in the table.
    pub fn fips_codes(&self) -> impl Iterator<Item = &'static str> {
        STATES.iter().map(|(fips, _, _)| *fips)
    }
}

impl GeoLookup for StateTable {
    fn resolve_state(&self, name_or_abbr: &str) -> Option<&str> {
        let key = name_or_abbr.trim();
        // accept "1" as well as "01"
        let padded = format!("{key:0>2}");
        STATES
            .iter()
            .find(|(fips, abbr, name)| {
                *fips == padded || abbr.eq_ignore_ascii_case(key) || name.eq_ignore_ascii_case(key)
            })
            .map(|(fips, _, _)| *fips)
    }

    fn abbr_of(&self, fips: &str) -> Option<&str> {
        let padded = format!("{:0>2}", fips.trim());
        STATES
            .iter()
            .find(|(code, _, _)| *code == padded)
            .map(|(_, abbr, _)| *abbr)
    }
}
