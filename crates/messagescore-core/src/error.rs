//! Error type for the configuration-loading surface.
//!
//! This is the only `Result`-returning surface in the crate: once a
//! [`crate::config::ScoringConfig`] has been validated, aggregation itself
//! never fails in the `Result` sense (see the module docs on
//! [`crate::metric_result`] for the logged-and-dropped dispositions it uses
//! instead).

use thiserror::Error;

/// Errors that can occur while loading or validating a [`crate::config::ScoringConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read scoring config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse scoring config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("duplicate symbol definition: {0}")]
    DuplicateSymbol(String),

    #[error("duplicate group definition: {0}")]
    DuplicateGroup(String),

    #[error("symbol {symbol} references undeclared group {group}")]
    UnknownGroup { symbol: String, group: String },

    #[error("group {0} has a non-finite max_score")]
    NonFiniteGroupScore(String),

    #[error("action thresholds are not monotonically decreasing in severity order: {0} >= {1}")]
    NonMonotonicActions(String, String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
