//! Per-message symbol-score aggregation and verdict selection.
//!
//! This crate implements the scoring core of a content-filtering pipeline:
//! given a validated [`ScoringConfig`], a [`Task`] accumulates symbol hits
//! for one message (weights, n-shots multiplicity, per-group caps,
//! grow-factor amplification, passthrough overrides) and produces a final
//! [`Action`] verdict. It does not parse messages, run symbol checks, or
//! talk to any network service — those are external collaborators (see the
//! `FrequencyCache`-shaped hook points documented on [`Task`]).

pub mod action;
pub mod config;
mod ema;
mod metric_result;
mod option_set;
mod passthrough;
mod symbol_result;
pub mod task;

pub use action::Action;
pub use config::{FrequencyCache, GroupDef, ScoringConfig, SymbolDef};
pub use error::{ConfigError, ConfigResult};
pub use metric_result::{InsertFlags, MetricResult};
pub use passthrough::PassthroughResult;
pub use symbol_result::SymbolResult;
pub use task::{ProcessedStages, SettingsOverrides, Task};

mod error;
