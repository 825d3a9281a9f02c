use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use census_reader::{Config, FilterSpec, FilterValue, GeoSpec, SchemaKind, data_reader};

/// Query 2010 Census SF1 population and household counts.
#[derive(Parser, Debug)]
#[command(name = "census-reader", version, about)]
struct Cli {
    /// Census Data API key
    #[arg(long, env = "CENSUS_API_KEY", global = true, hide_env_values = true)]
    api_key: Option<String>,

    /// Directory holding population.* and household.* catalogs
    #[arg(long, global = true)]
    catalog_dir: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Dataset endpoint
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch counts and print one row per geography unit
    Read {
        #[command(flatten)]
        query: QueryArgs,

        #[arg(long, value_enum, default_value_t = Format::Table)]
        format: Format,
    },
    /// Show the variables and endpoint a query resolves to, without fetching
    Plan {
        #[command(flatten)]
        query: QueryArgs,
    },
    /// List the values each catalog attribute takes
    Values {
        #[arg(value_enum)]
        schema: SchemaKind,
    },
}

#[derive(Args, Debug)]
struct QueryArgs {
    #[arg(value_enum)]
    schema: SchemaKind,

    /// Geography as name=value, e.g. `--geo state=OH --geo county=*`
    #[arg(long = "geo", value_parser = parse_pair, required = true)]
    geo: Vec<(String, String)>,

    /// Filter as name=value; values may be `a,b` sets or `20..25` ranges
    #[arg(long = "filter", value_parser = parse_pair)]
    filters: Vec<(String, String)>,
}

impl QueryArgs {
    fn geo(&self) -> Result<GeoSpec> {
        Ok(GeoSpec::from_pairs(
            self.geo.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        )?)
    }

    fn filters(&self) -> Result<FilterSpec> {
        let mut spec = FilterSpec::new();
        for (key, raw) in &self.filters {
            let value: FilterValue = raw
                .parse()
                .map_err(|e| anyhow::anyhow!("filter `{key}`: {e}"))?;
            spec.insert(key, value);
        }
        Ok(spec)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Table,
    Csv,
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.trim().to_string())),
        _ => Err(format!("expected name=value, got '{s}'")),
    }
}

fn config(cli: &Cli) -> Result<Config> {
    let mut config = Config::from_env()?;
    if let Some(dir) = &cli.catalog_dir {
        config.catalog_dir = dir.clone();
    }
    if let Some(secs) = cli.timeout_secs {
        config.timeout = Duration::from_secs(secs);
    }
    if let Some(url) = &cli.base_url {
        config.base_url = url.trim_end_matches('/').to_string();
    }
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = config(&cli)?;
    let api_key = cli.api_key.as_deref();

    match &cli.command {
        Command::Read { query, format } => {
            let reader = data_reader(query.schema, api_key, &config)?;
            let table = reader.read(&query.geo()?, &query.filters()?)?;
            match format {
                Format::Table => println!("{table}"),
                Format::Csv => table.write_csv(io::stdout().lock())?,
            }
        }
        Command::Plan { query } => {
            let reader = data_reader(query.schema, api_key, &config)?;
            let plan = reader.plan(&query.geo()?, &query.filters()?)?;
            println!("endpoint:  {}", plan.endpoint);
            println!("for:       {}", plan.endpoint.for_clause());
            if let Some(clause) = plan.endpoint.in_clause() {
                println!("in:        {clause}");
            }
            println!("aggregate: {}", plan.aggregate);
            println!("variables: {}", plan.variables.len());
            for code in &plan.variables {
                println!("  {code}");
            }
        }
        Command::Values { schema } => {
            let reader = data_reader(*schema, api_key, &config)?;
            let catalog = reader.catalog();
            println!("{schema}: {} variables", catalog.len());
            for column in catalog.column_names() {
                let values = catalog
                    .unique_values(column)
                    .with_context(|| format!("no values indexed for `{column}`"))?;
                let shown: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                println!("  {column}: {}", shown.join(", "));
            }
        }
    }

    Ok(())
}
