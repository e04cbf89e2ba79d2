// ⚠️ Error taxonomy
// Every failure in the engine is local and synchronous: nothing is retried,
// nothing is partially applied.

use chrono::NaiveDate;
use thiserror::Error;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The remote endpoint reported a failure; carries the raw server message
    #[error("The server responded with the following message: {response}")]
    Request { response: String },

    /// A date string did not match `YYYY-MM-DD`
    #[error("Could not parse '{date_str}' as a date: use format 'YYYY-MM-DD'")]
    DateFormat { date_str: String },

    /// A value that is neither absent, a date, nor a date string
    #[error("{value} is not a valid date or date string")]
    InvalidDateValue { value: String },

    /// A required column is not present in a table
    #[error("Could not find a column called '{column}'")]
    MissingColumn { column: String },

    /// The lower bound of a date range is after the upper bound
    #[error("to_date ({to}) is before from_date ({from})")]
    InvalidDateRange { from: NaiveDate, to: NaiveDate },

    /// A table does not have the shape an operation requires
    #[error("Structure error: {0}")]
    Structure(String),

    /// The election calendar breaks its ordering invariants
    #[error("Invalid election calendar: {0}")]
    InvalidCalendar(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn missing_column(column: &str) -> Self {
        Error::MissingColumn {
            column: column.to_string(),
        }
    }
}
