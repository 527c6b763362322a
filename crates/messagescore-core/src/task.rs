//! The per-message handle that owns a [`MetricResult`] and its backing arena
//! (§6 "Task handle").
//!
//! A `Task` is the unit of work a caller drives through one message's
//! lifetime: it is created with a borrowed arena and a shared, already
//! validated [`ScoringConfig`], accumulates symbol hits through repeated
//! `insert` calls, and is finally asked for a verdict via `check_action`.

use std::collections::HashMap;
use std::sync::Arc;

use bumpalo::Bump;

use crate::action::Action;
use crate::config::ScoringConfig;
use crate::ema;
use crate::metric_result::{InsertFlags, MetricResult};
use crate::passthrough::PassthroughResult;
use crate::symbol_result::SymbolResult;

/// Processing-stage bitmask (§6). Each bit is a phase the task has already
/// gone through; `insert` calls arriving after the action has been finalized
/// are phase-guard rejected rather than silently re-scoring a closed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessedStages(u32);

impl ProcessedStages {
    pub const NONE: Self = Self(0);
    pub const FILTERS: Self = Self(1 << 0);
    pub const ACTION_FINALIZED: Self = Self(1 << 1);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

/// External per-task corrections to a symbol's configured weight (§4.9 /
/// §6). Keyed by symbol name; looked up once per `insert` call.
pub type SettingsOverrides = HashMap<String, f64>;

/// Per-message aggregation handle.
///
/// Does not own its arena: the caller allocates a [`Bump`] per message and
/// hands a reference in, so the arena's lifetime is driven by whatever loop
/// is processing messages rather than by this type itself.
pub struct Task<'arena> {
    arena: &'arena Bump,
    config: Arc<ScoringConfig>,
    message_id: String,
    settings: SettingsOverrides,
    stages: ProcessedStages,
    result: Option<MetricResult<'arena>>,
}

impl<'arena> Task<'arena> {
    pub fn new(arena: &'arena Bump, config: Arc<ScoringConfig>, message_id: impl Into<String>) -> Self {
        Self {
            arena,
            config,
            message_id: message_id.into(),
            settings: SettingsOverrides::new(),
            stages: ProcessedStages::NONE,
            result: None,
        }
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Register a per-task weight correction, consulted by every later
    /// `insert` call for the named symbol (§4.9).
    pub fn set_override(&mut self, symbol: impl Into<String>, weight: f64) {
        self.settings.insert(symbol.into(), weight);
    }

    /// Lazily create the backing [`MetricResult`], sized from the
    /// process-wide EMA of symbols-per-message (§4.1).
    pub fn result(&mut self) -> &mut MetricResult<'arena> {
        let config = Arc::clone(&self.config);
        self.result
            .get_or_insert_with(|| MetricResult::new(&config, ema::capacity_hint(8)))
    }

    /// Record a symbol hit (§4.4). Silently ignored once the task's action
    /// has already been finalized, mirroring the original's phase guard
    /// rather than panicking on a logic error in the caller.
    pub fn insert(
        &mut self,
        symbol: &str,
        weight: f64,
        opt: Option<&str>,
        flags: InsertFlags,
    ) -> Option<&SymbolResult<'arena>> {
        if self.stages.contains(ProcessedStages::ACTION_FINALIZED) {
            tracing::warn!(
                message_id = %self.message_id,
                symbol,
                "insert called after action was finalized, ignoring"
            );
            return None;
        }
        self.stages.insert(ProcessedStages::FILTERS);

        let arena = self.arena;
        let config = &self.config;
        let settings = &self.settings;
        let result = self
            .result
            .get_or_insert_with(|| MetricResult::new(config, ema::capacity_hint(8)));
        result.insert(arena, config, Some(settings), symbol, weight, opt, flags)
    }

    /// Register a passthrough override (§4.2).
    pub fn add_passthrough(&mut self, pr: PassthroughResult) {
        self.result().add_passthrough(pr);
    }

    /// Finalize the task and return its verdict (§4.7). Idempotent: calling
    /// this more than once simply re-derives the same action from the
    /// now-frozen score, it does not re-run threshold selection against a
    /// moving target.
    pub fn check_action(&mut self) -> Action {
        let action = self.result().check_action();
        if !self.stages.contains(ProcessedStages::ACTION_FINALIZED) {
            tracing::info!(
                message_id = %self.message_id,
                action = %action,
                score = self.result.as_ref().map(|r| r.score()).unwrap_or(0.0),
                symbol_count = self.result.as_ref().map(|r| r.symbol_count()).unwrap_or(0),
                "action finalized"
            );
        }
        self.stages.insert(ProcessedStages::ACTION_FINALIZED);
        action
    }
}

impl<'arena> Drop for Task<'arena> {
    /// Fold this task's symbol count into the process-wide EMA at teardown
    /// (§4.1, §4.11), mirroring the original's `rspamd_metric_result_dtor`
    /// rather than the point at which a verdict happens to be read. Runs
    /// whether or not `check_action` was ever called, and whether or not a
    /// `MetricResult` was ever created (a task with no hits records zero).
    fn drop(&mut self) {
        let symbol_count = self.result.as_ref().map(|r| r.symbol_count()).unwrap_or(0);
        ema::record_symbol_count(symbol_count, 0.5);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GroupDef, SymbolDef};
    use std::collections::HashMap as StdHashMap;

    fn config() -> Arc<ScoringConfig> {
        Arc::new(
            ScoringConfig::validate(
                vec![SymbolDef {
                    name: "BAD_HEADER".into(),
                    weight: 3.0,
                    groups: vec![],
                    nshots: 0,
                    one_param: false,
                }],
                vec![GroupDef {
                    name: "g".into(),
                    max_score: 0.0,
                }],
                {
                    let mut m = StdHashMap::new();
                    m.insert(Action::Reject, 10.0);
                    m
                },
                0.0,
                1,
            )
            .unwrap(),
        )
    }

    #[test]
    fn insert_after_finalized_is_ignored() {
        let arena = Bump::new();
        let cfg = config();
        let mut task = Task::new(&arena, cfg, "msg-1");
        task.insert("BAD_HEADER", 1.0, None, InsertFlags::NONE);
        task.check_action();
        assert!(task.insert("BAD_HEADER", 1.0, None, InsertFlags::NONE).is_none());
    }

    #[test]
    fn settings_override_changes_contribution() {
        let arena = Bump::new();
        let cfg = config();
        let mut task = Task::new(&arena, cfg, "msg-2");
        task.set_override("BAD_HEADER", 10.0);
        task.insert("BAD_HEADER", 1.0, None, InsertFlags::NONE);
        assert_eq!(task.result().score(), 10.0);
    }
}
