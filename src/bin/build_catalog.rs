//! Build a schema's attribute catalog from the dataset's `variables.json`.
//!
//! Usage: build_catalog --schema population [--output catalog/population.parquet]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Deserialize;

use census_reader::catalog::loader::write_catalog;
use census_reader::schema::validate_catalog;
use census_reader::{Catalog, CatalogRow, Config, Household, Population, Schema, SchemaKind};

#[derive(Parser, Debug)]
#[command(name = "build_catalog", version, about)]
struct Args {
    #[arg(long, value_enum)]
    schema: SchemaKind,

    /// Output file (.csv or .parquet); defaults to `<catalog_dir>/<schema>.csv`
    #[arg(long)]
    output: Option<PathBuf>,

    /// Dataset endpoint whose `variables.json` is read
    #[arg(long)]
    base_url: Option<String>,
}

/// `variables.json` body: `{"variables": {"PCT012A001": {"label": ..., "concept": ...}}}`
#[derive(Debug, Deserialize)]
struct VariableList {
    variables: BTreeMap<String, VariableInfo>,
}

#[derive(Debug, Deserialize)]
struct VariableInfo {
    #[serde(default)]
    label: String,
    #[serde(default)]
    concept: String,
}

fn fetch_variables(base_url: &str, config: &Config) -> Result<VariableList> {
    let url = format!("{}/variables.json", base_url.trim_end_matches('/'));
    log::info!("Fetching {url}");

    let client = reqwest::blocking::Client::builder()
        .timeout(config.timeout)
        .build()
        .context("Failed to create HTTP client")?;
    let response = client
        .get(&url)
        .send()
        .with_context(|| format!("GET {url}"))?
        .error_for_status()
        .with_context(|| format!("GET {url}"))?;
    response
        .json::<VariableList>()
        .context("Failed to parse variables.json")
}

/// Decode every variable of `S`'s table into a catalog row.
fn build<S: Schema>(list: &VariableList) -> Result<Catalog> {
    let rows: Vec<CatalogRow> = list
        .variables
        .iter()
        .filter(|(code, _)| code.starts_with(S::TABLE))
        .map(|(code, info)| {
            let mut row = CatalogRow::new(code.as_str());
            row.label = Some(info.label.clone()).filter(|s| !s.is_empty());
            row.concept = Some(info.concept.clone()).filter(|s| !s.is_empty());
            row.attributes = S::decode(code, &info.label, &info.concept);
            row
        })
        .collect();

    if rows.is_empty() {
        bail!("No {} variables found in variables.json", S::TABLE);
    }

    let catalog = Catalog::from_rows(rows)?;
    validate_catalog::<S>(&catalog)?;
    Ok(catalog)
}

fn run<S: Schema>(list: &VariableList, output: &Path) -> Result<()> {
    let catalog = build::<S>(list)?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    write_catalog::<S>(&catalog, output)?;
    println!(
        "Wrote {} {} variables to {}",
        catalog.len(),
        S::NAME,
        output.display()
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = Config::from_env()?;
    let base_url = args.base_url.as_deref().unwrap_or(&config.base_url);
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| config.catalog_dir.join(format!("{}.csv", args.schema.name())));

    let list = fetch_variables(base_url, &config)?;
    log::info!("variables.json lists {} variables", list.variables.len());

    match args.schema {
        SchemaKind::Population => run::<Population>(&list, &output),
        SchemaKind::Household => run::<Household>(&list, &output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use census_reader::AttributeValue;

    fn sample() -> VariableList {
        serde_json::from_str(
            r#"{"variables": {
                "for": {"label": "Census API FIPS 'for' clause", "concept": "Census API Geography Specification"},
                "PCT012001": {"label": "Total", "concept": "SEX BY AGE [209]"},
                "PCT012003": {"label": "Male:!!Under 1 year", "concept": "SEX BY AGE [209]"},
                "PCT012D025": {"label": "Male:!!22 years", "concept": "SEX BY AGE (ASIAN ALONE) [209]"},
                "P038001": {"label": "Total", "concept": "FAMILY TYPE BY PRESENCE AND AGE OF OWN CHILDREN [20]"}
            }}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_build_selects_table_and_decodes() {
        let catalog = build::<Population>(&sample()).unwrap();
        assert_eq!(catalog.len(), 3);

        let row = catalog.get("PCT012D025").unwrap();
        assert_eq!(row.attribute("sex"), &AttributeValue::from("male"));
        assert_eq!(row.attribute("age"), &AttributeValue::Integer(22));
        assert_eq!(row.attribute("race"), &AttributeValue::from("asian"));

        let total = catalog.get("PCT012001").unwrap();
        assert!(total.attribute("sex").is_undefined());
        assert!(total.attribute("age").is_undefined());
    }

    #[test]
    fn test_build_fails_without_table_variables() {
        let list: VariableList =
            serde_json::from_str(r#"{"variables": {"H001001": {"label": "Total"}}}"#).unwrap();
        assert!(build::<Household>(&list).is_err());
    }

    #[test]
    fn test_run_writes_loadable_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("nested").join("population.csv");
        run::<Population>(&sample(), &output).unwrap();

        let loaded = census_reader::catalog::loader::load_catalog::<Population>(&output).unwrap();
        assert_eq!(loaded.len(), 3);
    }
}
