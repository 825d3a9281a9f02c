//! Census Data API client
//!
//! Blocking HTTP client for the 2010 SF1 dataset. One `fetch` issues one GET
//! per chunk of at most `max_variables_per_request` variables; the API
//! refuses longer `get=` lists.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde_json::Value as JsonValue;

use super::{CensusSource, RawTable};
use crate::config::Config;
use crate::error::CensusError;
use crate::geo::dispatch::Endpoint;

/// Census Data API client
pub struct HttpSource {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    chunk_size: usize,
}

impl HttpSource {
    /// Create a client for `config.base_url`, optionally authenticated.
    pub fn new(api_key: Option<&str>, config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("census-reader/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(str::to_string).filter(|k| !k.is_empty()),
            timeout: config.timeout,
            chunk_size: config.max_variables_per_request.max(1),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Query pairs for one request.
    fn query(&self, variables: &[String], endpoint: &Endpoint) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("get", variables.join(",")),
            ("for", endpoint.for_clause()),
        ];
        if let Some(clause) = endpoint.in_clause() {
            query.push(("in", clause));
        }
        if let Some(key) = &self.api_key {
            query.push(("key", key.clone()));
        }
        query
    }

    fn fetch_chunk(&self, variables: &[String], endpoint: &Endpoint) -> Result<RawTable, CensusError> {
        let query = self.query(variables, endpoint);
        log::debug!("GET {} {:?}", self.base_url, query);

        let response = self
            .http
            .get(&self.base_url)
            .query(&query)
            .send()
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(RawTable::default());
        }
        let body = response.text().map_err(|e| self.transport_error(e))?;
        if !status.is_success() {
            return Err(CensusError::data_source(format!(
                "census API error {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        // an invalid key yields an HTML page with status 200
        let root: JsonValue = serde_json::from_str(&body).map_err(|e| {
            CensusError::data_source(format!(
                "unparseable response ({e}): {}",
                body.chars().take(200).collect::<String>()
            ))
        })?;
        RawTable::from_json(&root)
    }

    fn transport_error(&self, err: reqwest::Error) -> CensusError {
        if err.is_timeout() {
            CensusError::Timeout(self.timeout)
        } else {
            CensusError::data_source(err)
        }
    }
}

/// Merge per-chunk responses, returning the merged table and how many
/// chunks came back without rows.
fn merge_chunks(parts: Vec<RawTable>) -> Result<(RawTable, usize), CensusError> {
    let mut table = RawTable::default();
    let mut empty = 0;
    for part in parts {
        if part.columns.is_empty() {
            empty += 1;
            continue;
        }
        table = table.merge(part)?;
    }
    Ok((table, empty))
}

impl CensusSource for HttpSource {
    fn fetch(&self, variables: &[String], endpoint: &Endpoint) -> Result<RawTable, CensusError> {
        let parts = variables
            .chunks(self.chunk_size)
            .map(|chunk| self.fetch_chunk(chunk, endpoint))
            .collect::<Result<Vec<_>, _>>()?;
        let chunks = parts.len();
        let (table, empty) = merge_chunks(parts)?;
        if empty > 0 && !table.columns.is_empty() {
            log::warn!(
                "{empty} of {chunks} requests for {} returned no content; their variables count as zero",
                endpoint.shape()
            );
        }
        log::info!(
            "Fetched {} rows for {} variables from {}",
            table.len(),
            variables.len(),
            endpoint.shape()
        );
        Ok(table)
    }
}
