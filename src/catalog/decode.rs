//! Heuristics that turn SF1 variable metadata into catalog attributes.
//!
//! Only the offline catalog builder calls these; query-time code never looks
//! at label or concept text.

/// Trailing three-digit cell number of a variable code (`PCT012A027` → 27).
fn cell_number(code: &str) -> Option<u32> {
    let start = code.len().checked_sub(3)?;
    code.get(start..)?.parse().ok()
}

/// PCT012 cells 2..=105 are male, 106..=209 female; cell 1 is the total.
pub fn population_sex(code: &str) -> Option<&'static str> {
    match cell_number(code)? {
        0 | 1 => None,
        2..=105 => Some("male"),
        _ => Some("female"),
    }
}

/// Cells 3..=105 are male ages 0.., 107..=209 female ages 0..; the rest are subtotals.
pub fn population_age(code: &str) -> Option<i64> {
    match cell_number(code)? {
        n @ 3..=105 => Some(i64::from(n) - 3),
        n @ 107..=209 => Some(i64::from(n) - 107),
        _ => None,
    }
}

pub fn household_type(label: &str) -> Option<&'static str> {
    let label = label.to_lowercase();
    if label.contains("husband-wife") {
        Some("husband_wife")
    } else if label.contains("female householder") {
        Some("female_householder")
    } else if label.contains("male householder") {
        Some("male_householder")
    } else {
        None
    }
}

pub fn has_children(label: &str) -> Option<bool> {
    let label = label.to_lowercase();
    if label.contains("with own children") {
        Some(true)
    } else if label.contains("no own children") {
        Some(false)
    } else {
        None
    }
}

pub fn children_age(label: &str) -> Option<&'static str> {
    let label = label.to_lowercase();
    if label.contains("under 6 years only") {
        Some("under_6")
    } else if label.contains("under 6 years and") {
        Some("under_6_and_6_to_17")
    } else if label.contains("6 to 17 years only") {
        Some("6_to_17")
    } else {
        None
    }
}

/// First race keyword found in the concept, in census table iteration order.
pub fn race(concept: &str) -> Option<&'static str> {
    const KEYWORDS: &[(&str, &str)] = &[
        ("white", "white"),
        ("black", "black"),
        ("indian", "indian_alaskan"),
        ("asian", "asian"),
        ("hawaii", "hawaii_pacific"),
        ("other", "other_alone"),
        ("two", "two_or_more"),
    ];
    let concept = concept.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(keyword, _)| concept.contains(keyword))
        .map(|(_, race)| *race)
}

pub fn hispanic_origin(concept: &str) -> Option<bool> {
    let concept = concept.to_lowercase();
    if concept.contains("(hispanic or latino)") {
        Some(true)
    } else if concept.contains("not hispanic or latino") {
        Some(false)
    } else {
        None
    }
}
