//! Tracker error types
//!
//! Errors caused by user input. None of them leave state partially mutated.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    /// A required input field was empty
    #[error("{0} is required")]
    MissingField(&'static str),

    /// The wallet address is already in the registry
    #[error("This wallet address is already added: {0}")]
    DuplicateAddress(String),

    #[error("Dev not found: {0}")]
    DevNotFound(String),

    #[error("Token not found: {0}")]
    TokenNotFound(String),

    /// Import payload was unreadable or failed validation
    #[error("Invalid import: {0}")]
    InvalidImport(String),

    #[error("Unknown panel: {0}")]
    UnknownPanel(String),

    #[error("Unknown chart provider: {0}")]
    UnknownChartProvider(String),

    /// Filter bounds are inverted or negative
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Operation needs a live feed connection
    #[error("Not connected to the feed")]
    NotConnected,
}

impl TrackerError {
    /// Short machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            TrackerError::MissingField(_) => "MISSING_FIELD",
            TrackerError::DuplicateAddress(_) => "DUPLICATE_ADDRESS",
            TrackerError::DevNotFound(_) => "DEV_NOT_FOUND",
            TrackerError::TokenNotFound(_) => "TOKEN_NOT_FOUND",
            TrackerError::InvalidImport(_) => "INVALID_IMPORT",
            TrackerError::UnknownPanel(_) => "UNKNOWN_PANEL",
            TrackerError::UnknownChartProvider(_) => "UNKNOWN_CHART_PROVIDER",
            TrackerError::InvalidFilter(_) => "INVALID_FILTER",
            TrackerError::NotConnected => "NOT_CONNECTED",
        }
    }
}

pub type TrackerResult<T> = Result<T, TrackerError>;
