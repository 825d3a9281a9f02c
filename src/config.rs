use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};

pub const DEFAULT_BASE_URL: &str = "https://api.census.gov/data/2010/dec/sf1";

/// Catalog file extensions tried, in order, when locating a schema's catalog.
pub const CATALOG_EXTENSIONS: &[&str] = &["csv", "parquet", "json"];

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Runtime settings shared by the readers and the catalog builder.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Dataset endpoint, without a trailing slash.
    pub base_url: String,
    /// Per-request timeout; exceeding it fails the read with `Timeout`.
    pub timeout: Duration,
    /// Directory holding `population.*` and `household.*` catalogs.
    pub catalog_dir: PathBuf,
    /// Largest `get=` list sent in one request.
    pub max_variables_per_request: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            catalog_dir: PathBuf::from("catalog"),
            max_variables_per_request: 50,
        }
    }
}

impl Config {
    /// Defaults overridden by `CENSUS_API_URL`, `CENSUS_TIMEOUT_SECS`,
    /// `CENSUS_CATALOG_DIR` and `CENSUS_MAX_VARIABLES`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Config::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(url) = lookup("CENSUS_API_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = lookup("CENSUS_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .with_context(|| format!("CENSUS_TIMEOUT_SECS: '{secs}' is not a number of seconds"))?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(dir) = lookup("CENSUS_CATALOG_DIR") {
            config.catalog_dir = PathBuf::from(dir);
        }
        if let Some(max) = lookup("CENSUS_MAX_VARIABLES") {
            let max: usize = max
                .trim()
                .parse()
                .with_context(|| format!("CENSUS_MAX_VARIABLES: '{max}' is not a count"))?;
            if max == 0 {
                bail!("CENSUS_MAX_VARIABLES must be at least 1");
            }
            config.max_variables_per_request = max;
        }

        Ok(config)
    }

    /// First existing `<catalog_dir>/<name>.{csv,parquet,json}`.
    pub fn catalog_path(&self, name: &str) -> Result<PathBuf> {
        find_catalog(&self.catalog_dir, name)
    }
}

fn find_catalog(dir: &Path, name: &str) -> Result<PathBuf> {
    let candidates: Vec<PathBuf> = CATALOG_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{name}.{ext}")))
        .collect();
    match candidates.iter().find(|p| p.is_file()) {
        Some(path) => Ok(path.clone()),
        None => bail!(
            "No {name} catalog found (tried {}); build one with `build_catalog --schema {name}`",
            candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}
