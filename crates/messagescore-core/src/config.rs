//! Immutable, read-only configuration view consumed by the aggregator.
//!
//! A [`ScoringConfig`] is loaded once (typically from TOML, mirroring how the
//! rest of the pipeline loads its own typed configuration) and then shared,
//! read-only, across every [`crate::task::Task`] it backs. The aggregator
//! never mutates it and never needs to know how it was produced.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::action::Action;
use crate::error::{ConfigError, ConfigResult};

/// A single named symbol check.
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolDef {
    pub name: String,
    /// Static weight multiplied against the per-hit weight passed to `insert`.
    pub weight: f64,
    /// Groups this symbol contributes to.
    #[serde(default)]
    pub groups: Vec<String>,
    /// Multiplicity cap ("n-shots"). Zero or negative means uncapped.
    #[serde(default)]
    pub nshots: i64,
    /// One-parameter symbols may only ever carry a single option.
    #[serde(default)]
    pub one_param: bool,
}

/// A named bucket of symbols with an optional aggregate score ceiling.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupDef {
    pub name: String,
    /// Maximum aggregate contribution through this group. Zero or negative
    /// means uncapped.
    #[serde(default)]
    pub max_score: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct ActionThreshold {
    action: Action,
    /// Absent means "no threshold configured for this action".
    score: Option<f64>,
}

/// Raw, on-disk shape of a scoring configuration document.
#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    #[serde(default)]
    grow_factor: f64,
    #[serde(default = "default_max_shots")]
    default_max_shots: i64,
    #[serde(default)]
    symbols: Vec<SymbolDef>,
    #[serde(default)]
    groups: Vec<GroupDef>,
    #[serde(default)]
    actions: Vec<ActionThreshold>,
}

fn default_max_shots() -> i64 {
    1
}

/// External symbol-execution scheduler hook (§6, out of scope for this
/// crate): notified once per successful insertion so the scheduler can bias
/// future symbol ordering toward what actually fires. The core never reads
/// back from it.
pub trait FrequencyCache: Send + Sync {
    fn inc_frequency(&self, symbol: &str);
}

/// Immutable, validated configuration view.
///
/// Always reached through [`ScoringConfig::from_toml_str`], [`ScoringConfig::load`],
/// or [`ScoringConfig::validate`] — there is no public constructor that skips
/// validation, so every `Arc<ScoringConfig>` handed to a [`crate::task::Task`]
/// is known-consistent.
#[derive(Clone)]
pub struct ScoringConfig {
    symbols: HashMap<String, Arc<SymbolDef>>,
    groups: HashMap<String, GroupDef>,
    action_limits: HashMap<Action, f64>,
    pub grow_factor: f64,
    pub default_max_shots: i64,
    frequency_cache: Option<Arc<dyn FrequencyCache>>,
}

impl std::fmt::Debug for ScoringConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringConfig")
            .field("symbols", &self.symbols.len())
            .field("groups", &self.groups.len())
            .field("action_limits", &self.action_limits)
            .field("grow_factor", &self.grow_factor)
            .field("default_max_shots", &self.default_max_shots)
            .field("frequency_cache", &self.frequency_cache.is_some())
            .finish()
    }
}

impl ScoringConfig {
    /// Validate a raw, programmatically-assembled configuration.
    pub fn validate(
        symbols: Vec<SymbolDef>,
        groups: Vec<GroupDef>,
        action_limits: HashMap<Action, f64>,
        grow_factor: f64,
        default_max_shots: i64,
    ) -> ConfigResult<Self> {
        let mut group_map = HashMap::with_capacity(groups.len());
        for group in groups {
            if !group.max_score.is_finite() {
                return Err(ConfigError::NonFiniteGroupScore(group.name));
            }
            if group_map.contains_key(&group.name) {
                return Err(ConfigError::DuplicateGroup(group.name));
            }
            group_map.insert(group.name.clone(), group);
        }

        let mut symbol_map = HashMap::with_capacity(symbols.len());
        for symbol in symbols {
            for group in &symbol.groups {
                if !group_map.contains_key(group) {
                    return Err(ConfigError::UnknownGroup {
                        symbol: symbol.name.clone(),
                        group: group.clone(),
                    });
                }
            }
            let name = symbol.name.clone();
            if symbol_map.insert(name.clone(), Arc::new(symbol)).is_some() {
                return Err(ConfigError::DuplicateSymbol(name));
            }
        }

        let mut prev: Option<(Action, f64)> = None;
        for action in Action::ALL_BY_SEVERITY {
            if let Some(&threshold) = action_limits.get(&action) {
                if let Some((prev_action, prev_threshold)) = prev {
                    if prev_threshold <= threshold {
                        return Err(ConfigError::NonMonotonicActions(
                            prev_action.to_string(),
                            action.to_string(),
                        ));
                    }
                }
                prev = Some((action, threshold));
            }
        }

        Ok(Self {
            symbols: symbol_map,
            groups: group_map,
            action_limits,
            grow_factor,
            default_max_shots,
            frequency_cache: None,
        })
    }

    /// Attach a frequency-cache collaborator (§6). Not itself part of the
    /// on-disk configuration format — wired in by the caller after loading.
    pub fn with_frequency_cache(mut self, cache: Arc<dyn FrequencyCache>) -> Self {
        self.frequency_cache = Some(cache);
        self
    }

    /// Best-effort notification after a successful insertion (§4.4). Never
    /// fails: a missing cache handle is simply a no-op.
    pub(crate) fn notify_frequency(&self, symbol: &str) {
        if let Some(cache) = &self.frequency_cache {
            cache.inc_frequency(symbol);
        }
    }

    /// Parse and validate a configuration from a TOML document.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let raw: RawConfig = toml::from_str(content)?;
        let mut action_limits = HashMap::with_capacity(raw.actions.len());
        for entry in raw.actions {
            if let Some(score) = entry.score {
                action_limits.insert(entry.action, score);
            }
        }
        Self::validate(
            raw.symbols,
            raw.groups,
            action_limits,
            raw.grow_factor,
            raw.default_max_shots,
        )
    }

    /// Load and validate a configuration from a TOML file on disk.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn symbol(&self, name: &str) -> Option<&Arc<SymbolDef>> {
        self.symbols.get(name)
    }

    pub fn group(&self, name: &str) -> Option<&GroupDef> {
        self.groups.get(name)
    }

    pub fn action_threshold(&self, action: Action) -> Option<f64> {
        self.action_limits.get(&action).copied()
    }

    /// Copy of the configured thresholds, in severity order, for seeding a
    /// fresh `MetricResult::action_limits`.
    pub fn action_limits(&self) -> HashMap<Action, f64> {
        self.action_limits.clone()
    }
}
