//! The scoring aggregator (§4.4) and the container it mutates (§3 "MetricResult").
//!
//! `MetricResult::insert` is the centerpiece of this crate: it unifies base
//! score computation, per-task settings overrides, n-shots multiplicity,
//! single-shot replacement, the grow-factor amplification, and per-group
//! score clamping into one call. Every arithmetic corner case (`NaN`
//! weights, group caps, duplicate options) is handled by logging and
//! dropping the offending contribution — this module never returns `Err`.

use std::collections::HashMap;
use std::sync::Arc;

use bumpalo::Bump;

use crate::action::Action;
use crate::config::{ScoringConfig, SymbolDef};
use crate::option_set;
use crate::passthrough::{self, PassthroughResult};
use crate::symbol_result::SymbolResult;

/// Flags controlling a single `insert` call.
///
/// A thin bitset rather than the `bitflags` crate: only two bits are ever
/// meaningful, and the task's own `processed_stages` bitmask (§6) is
/// similarly hand-rolled, so this stays consistent with that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InsertFlags(u8);

impl InsertFlags {
    pub const NONE: Self = Self(0);
    /// Keep only the largest-magnitude same-sign contribution instead of summing.
    pub const SINGLE: Self = Self(1 << 0);
    /// Treat an unknown symbol's weight as if it had a static weight of 1.0
    /// instead of contributing zero.
    pub const ENFORCE: Self = Self(1 << 1);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for InsertFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Internal outcome of the group-clamping helper (§4.5, §9 design note):
/// `NaN` is the original's drop sentinel, never exposed past this module.
enum Clamp {
    Apply(f64),
    Drop,
}

fn clamp_group_contribution(group_score: f64, max_score: f64, w: f64) -> Clamp {
    if max_score <= 0.0 || w <= 0.0 {
        return Clamp::Apply(w);
    }
    if group_score >= max_score {
        return Clamp::Drop;
    }
    if group_score + w > max_score {
        Clamp::Apply(max_score - group_score)
    } else {
        Clamp::Apply(w)
    }
}

/// Ensure every group a symbol belongs to has a ledger entry, independent of
/// whether this particular insert ends up contributing anything (§4.4).
fn ensure_group_entries(group_scores: &mut HashMap<String, f64>, groups: &[String]) {
    for group in groups {
        group_scores.entry(group.clone()).or_insert(0.0);
    }
}

/// Clamp `diff` through every group the symbol belongs to, applying the most
/// restrictive group's headroom (§4.5's "iteration policy"). Returns `None`
/// if any group's cap has been fully exhausted.
fn clamp_across_groups(
    group_scores: &mut HashMap<String, f64>,
    config: &ScoringConfig,
    symbol: &str,
    groups: &[String],
    mut diff: f64,
) -> Option<f64> {
    for group_name in groups {
        let max_score = config.group(group_name).map(|g| g.max_score).unwrap_or(0.0);
        let entry = group_scores.entry(group_name.clone()).or_insert(0.0);
        match clamp_group_contribution(*entry, max_score, diff) {
            Clamp::Drop => {
                tracing::info!(
                    symbol,
                    group = group_name.as_str(),
                    max_score,
                    "maximum group score reached, ignoring symbol"
                );
                return None;
            }
            Clamp::Apply(cur_diff) => {
                *entry += cur_diff;
                if cur_diff < diff {
                    diff = cur_diff;
                }
            }
        }
    }
    Some(diff)
}

/// Grow-factor step (§4.6). Returns `(possibly amplified x, next grow factor)`;
/// the caller decides whether to commit `next grow factor` (only when the
/// contribution actually lands — see open question O2 in `SPEC_FULL.md`).
fn grow_factor_step(current_gf: f64, configured_gf: f64, x: f64) -> (f64, f64) {
    if current_gf > 0.0 && x > 0.0 {
        (x * current_gf, current_gf * configured_gf)
    } else if x > 0.0 {
        (x, configured_gf)
    } else {
        (x, 1.0)
    }
}

fn sanitize_weight(symbol: &str, weight: f64) -> f64 {
    if !weight.is_finite() {
        tracing::warn!(
            symbol,
            kind = if weight.is_nan() { "NaN" } else { "infinity" },
            "detected non-finite score, replacing with zero"
        );
        0.0
    } else {
        weight
    }
}

/// The per-message aggregator state (§3).
pub struct MetricResult<'arena> {
    symbols: HashMap<&'arena str, SymbolResult<'arena>>,
    group_scores: HashMap<String, f64>,
    passthroughs: Vec<PassthroughResult>,
    score: f64,
    grow_factor: f64,
    positive_score: f64,
    negative_score: f64,
    npositive: u64,
    nnegative: u64,
    action_limits: HashMap<Action, f64>,
}

impl<'arena> MetricResult<'arena> {
    pub(crate) fn new(config: &ScoringConfig, capacity_hint: usize) -> Self {
        Self {
            symbols: HashMap::with_capacity(capacity_hint),
            group_scores: HashMap::new(),
            passthroughs: Vec::new(),
            score: 0.0,
            grow_factor: 0.0,
            positive_score: 0.0,
            negative_score: 0.0,
            npositive: 0,
            nnegative: 0,
            action_limits: config.action_limits(),
        }
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn grow_factor(&self) -> f64 {
        self.grow_factor
    }

    pub fn positive_score(&self) -> f64 {
        self.positive_score
    }

    pub fn negative_score(&self) -> f64 {
        self.negative_score
    }

    pub fn npositive(&self) -> u64 {
        self.npositive
    }

    pub fn nnegative(&self) -> u64 {
        self.nnegative
    }

    pub fn group_score(&self, group: &str) -> Option<f64> {
        self.group_scores.get(group).copied()
    }

    /// §4.8 "find_symbol".
    pub fn find_symbol(&self, name: &str) -> Option<&SymbolResult<'arena>> {
        self.symbols.get(name)
    }

    /// §4.8 "foreach_symbol". Iteration order is unspecified.
    pub fn foreach_symbol<F: FnMut(&str, &SymbolResult<'arena>)>(&self, mut f: F) {
        for (name, result) in &self.symbols {
            f(name, result);
        }
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// §4.2.
    pub fn add_passthrough(&mut self, pr: PassthroughResult) {
        passthrough::add_passthrough(&mut self.passthroughs, pr);
    }

    pub fn passthroughs(&self) -> &[PassthroughResult] {
        &self.passthroughs
    }

    /// The scoring aggregator's centerpiece (§4.4). `symbol` and `opt` are
    /// borrowed only for the duration of the call; anything retained is
    /// interned into `arena` first.
    ///
    /// Returns `None` only when the symbol has never been seen by this
    /// result (which cannot actually happen here, since both branches
    /// insert an entry before returning) — kept `Option` to match the
    /// original's "may return nothing" surface and to compose with the
    /// phase guard in `Task::insert`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn insert(
        &mut self,
        arena: &'arena Bump,
        config: &Arc<ScoringConfig>,
        settings: Option<&HashMap<String, f64>>,
        symbol: &str,
        weight: f64,
        opt: Option<&str>,
        flags: InsertFlags,
    ) -> Option<&SymbolResult<'arena>> {
        let weight = sanitize_weight(symbol, weight);
        let definition = config.symbol(symbol).cloned();

        let mut base = match &definition {
            Some(def) => {
                ensure_group_entries(&mut self.group_scores, &def.groups);
                def.weight * weight
            }
            None if flags.contains(InsertFlags::ENFORCE) => weight,
            None => 0.0,
        };

        if let Some(settings) = settings {
            if let Some(&corr) = settings.get(symbol) {
                tracing::debug!(symbol, old = base, new = corr * weight, "settings override");
                base = corr * weight;
            }
        }

        let final_score = base;
        let one_param = definition.as_ref().is_some_and(|d| d.one_param);

        if self.symbols.contains_key(symbol) {
            self.insert_repeat(config, &definition, final_score, opt, flags, one_param, arena, symbol);
        } else {
            let interned: &'arena str = arena.alloc_str(symbol);
            self.insert_first(arena, config, definition, interned, final_score, opt, one_param);
        }

        config.notify_frequency(symbol);
        self.symbols.get(symbol)
    }

    #[allow(clippy::too_many_arguments)]
    fn insert_repeat(
        &mut self,
        config: &Arc<ScoringConfig>,
        definition: &Option<Arc<SymbolDef>>,
        final_score: f64,
        opt: Option<&str>,
        flags: InsertFlags,
        one_param: bool,
        arena: &'arena Bump,
        symbol: &str,
    ) {
        let current_nshots = self.symbols.get(symbol).expect("checked by caller").nshots;
        let mut single = flags.contains(InsertFlags::SINGLE);
        let max_shots = if single {
            1
        } else if let Some(def) = definition {
            def.nshots
        } else {
            config.default_max_shots
        };
        if !single && max_shots > 0 && (current_nshots as i64) >= max_shots {
            single = true;
        }

        // Option handling (§4.4 "repeat-hit branch"), intentionally
        // asymmetric: recording a genuinely new option does NOT by itself
        // bump `nshots`, matching the original's control flow exactly (a
        // duplicate option, or no option at all, does). See DESIGN.md.
        {
            let sym = self.symbols.get_mut(symbol).expect("checked by caller");
            let has_options = sym.options.is_some();
            match opt {
                Some(o) if has_options && sym.options.as_ref().unwrap().contains(o) => {
                    sym.nshots += 1;
                }
                Some(o) if has_options => {
                    let interned: &str = arena.alloc_str(o);
                    option_set::add_option(&mut sym.options, one_param, config.default_max_shots, Some(interned));
                }
                Some(o) => {
                    sym.nshots += 1;
                    let interned: &str = arena.alloc_str(o);
                    option_set::add_option(&mut sym.options, one_param, config.default_max_shots, Some(interned));
                }
                None => {
                    sym.nshots += 1;
                }
            }
        }

        let current_score = self.symbols.get(symbol).expect("checked by caller").score;
        let diff = if !single {
            final_score
        } else if current_score.abs() < final_score.abs()
            && current_score.is_sign_negative() == final_score.is_sign_negative()
        {
            final_score - current_score
        } else {
            0.0
        };

        if diff == 0.0 {
            return;
        }

        let (amplified, next_gf) = grow_factor_step(self.grow_factor, config.grow_factor, diff);

        let outcome = match definition {
            Some(def) => clamp_across_groups(&mut self.group_scores, config, symbol, &def.groups, amplified),
            None => Some(amplified),
        };

        if let Some(applied) = outcome {
            self.score += applied;
            self.grow_factor = next_gf;
            let sym = self.symbols.get_mut(symbol).expect("checked by caller");
            if single {
                sym.score = final_score;
            } else {
                sym.score += applied;
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn insert_first(
        &mut self,
        arena: &'arena Bump,
        config: &Arc<ScoringConfig>,
        definition: Option<Arc<SymbolDef>>,
        interned: &'arena str,
        final_score: f64,
        opt: Option<&str>,
        one_param: bool,
    ) {
        let mut sym = SymbolResult::new(interned, definition.clone());

        let (amplified, next_gf) = grow_factor_step(self.grow_factor, config.grow_factor, final_score);

        let outcome = match &definition {
            Some(def) => clamp_across_groups(&mut self.group_scores, config, interned, &def.groups, amplified),
            None => Some(amplified),
        };

        match outcome {
            None => {
                sym.score = 0.0;
            }
            Some(f) => {
                self.score += f;
                self.grow_factor = next_gf;
                sym.score = f;
                if f > f64::EPSILON {
                    self.npositive += 1;
                    self.positive_score += f;
                } else if f < -f64::EPSILON {
                    self.nnegative += 1;
                    self.negative_score += f.abs();
                }
            }
        }

        let interned_opt: Option<&'arena str> = match opt {
            Some(o) => {
                let s: &'arena str = arena.alloc_str(o);
                Some(s)
            }
            None => None,
        };
        option_set::add_option(&mut sym.options, one_param, config.default_max_shots, interned_opt);

        self.symbols.insert(interned, sym);
    }

    /// The action selector (§4.7).
    pub fn check_action(&mut self) -> Action {
        if let Some(pr) = self.passthroughs.first() {
            let action = pr.action;
            if let Some(target) = pr.target_score {
                if action == Action::NoAction {
                    self.score = target.min(self.score);
                } else {
                    self.score = target;
                }
            }
            return action;
        }

        // Iterate most-severe-first; among qualifying slots keep the one
        // with the largest threshold (O3: empty qualifying set returns
        // `NoAction` directly, no intermediate flag).
        let mut selected: Option<(Action, f64)> = None;
        for action in Action::ALL_BY_SEVERITY {
            let Some(threshold) = self.action_limits.get(&action).copied() else {
                continue;
            };
            if self.score >= threshold {
                let should_replace = match selected {
                    Some((_, best)) => threshold > best,
                    None => true,
                };
                if should_replace {
                    selected = Some((action, threshold));
                }
            }
        }

        selected.map(|(action, _)| action).unwrap_or(Action::NoAction)
    }
}
