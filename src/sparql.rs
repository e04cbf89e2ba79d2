// 🌐 SPARQL transport
// Sends SELECT queries to the data platform and turns the JSON results into
// tables. Dates are typed on the way in; everything else stays text.

use crate::config::Settings;
use crate::dates;
use crate::error::{Error, Result};
use crate::queries::{self, Category, House};
use crate::table::{Table, Value};
use serde::Deserialize;
use std::collections::HashMap;

const XML_DATE: &str = "http://www.w3.org/2001/XMLSchema#date";
const XML_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";

// ============================================================================
// RAW SOURCE
// ============================================================================

/// Supplier of raw, unfiltered rows for a record category
pub trait RawSource {
    fn fetch_raw(&self, category: Category, house: Option<House>) -> Result<Table>;
}

// ============================================================================
// RESPONSE FORMAT
// ============================================================================

#[derive(Debug, Deserialize)]
struct SelectResponse {
    head: Head,
    results: Results,
}

#[derive(Debug, Deserialize)]
struct Head {
    vars: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Results {
    bindings: Vec<HashMap<String, Binding>>,
}

#[derive(Debug, Deserialize)]
struct Binding {
    value: String,
    #[serde(default)]
    datatype: Option<String>,
}

impl Binding {
    fn to_value(&self) -> Result<Value> {
        match self.datatype.as_deref() {
            Some(XML_DATE) => dates::parse_platform_date(&self.value).map(Value::Date),
            Some(XML_INTEGER) => Ok(self
                .value
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .unwrap_or_else(|_| Value::from(self.value.trim()))),
            _ => Ok(Value::from(self.value.trim())),
        }
    }
}

/// Decode a `application/sparql-results+json` body into a table.
///
/// Columns follow `head.vars`; unbound variables become `Null`.
pub fn parse_select_response(body: &str) -> Result<Table> {
    let response: SelectResponse = serde_json::from_str(body)?;

    let rows = response
        .results
        .bindings
        .iter()
        .map(|record| {
            response
                .head
                .vars
                .iter()
                .map(|var| match record.get(var) {
                    Some(binding) => binding.to_value(),
                    None => Ok(Value::Null),
                })
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    Table::new(response.head.vars, rows)
}

// ============================================================================
// CLIENT
// ============================================================================

pub struct SparqlClient {
    settings: Settings,
    http: reqwest::blocking::Client,
}

impl SparqlClient {
    pub fn new(settings: Settings) -> Self {
        SparqlClient {
            settings,
            http: reqwest::blocking::Client::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Send a query and return the raw response
    pub fn request(&self, query: &str) -> Result<reqwest::blocking::Response> {
        let response = self
            .http
            .post(self.settings.api_url())
            .header(reqwest::header::CONTENT_TYPE, "application/sparql-query")
            .header(reqwest::header::ACCEPT, "application/sparql-results+json")
            .body(query.to_string())
            .send()?;
        Ok(response)
    }

    /// Send a SELECT query and return the results as a table.
    ///
    /// A non-success status is a `Request` error carrying the server's text.
    pub fn select(&self, query: &str) -> Result<Table> {
        let response = self.request(query)?;
        let status = response.status();
        let body = response.text()?;

        if !status.is_success() {
            return Err(Error::Request { response: body });
        }

        parse_select_response(&body)
    }

    /// Whether the endpoint answers a trivial query
    pub fn check_api(&self) -> bool {
        match self.request(queries::probe_query()) {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!("API check failed: {}", e);
                false
            }
        }
    }
}

impl RawSource for SparqlClient {
    fn fetch_raw(&self, category: Category, house: Option<House>) -> Result<Table> {
        tracing::info!(
            "Fetching {} ({}) from {}",
            category,
            house.map_or("both houses", |h| h.name()),
            self.settings.api_url()
        );
        let table = self.select(&queries::build_query(category, house))?;
        tracing::info!("Fetched {} rows of {}", table.len(), category);
        Ok(table)
    }
}
