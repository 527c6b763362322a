//! Integration tests covering the concrete scenarios and properties of the
//! scoring aggregator end to end, driven entirely through the public
//! `Task`/`ScoringConfig` surface.

use std::collections::HashMap;
use std::sync::Arc;

use bumpalo::Bump;

use messagescore_core::{Action, GroupDef, InsertFlags, PassthroughResult, ScoringConfig, SymbolDef, Task};

fn config_with(symbols: Vec<SymbolDef>, groups: Vec<GroupDef>, actions: &[(Action, f64)], grow_factor: f64) -> Arc<ScoringConfig> {
    let mut action_limits = HashMap::new();
    for &(action, score) in actions {
        action_limits.insert(action, score);
    }
    Arc::new(ScoringConfig::validate(symbols, groups, action_limits, grow_factor, 1).unwrap())
}

fn symbol(name: &str, weight: f64, groups: &[&str], nshots: i64) -> SymbolDef {
    SymbolDef {
        name: name.into(),
        weight,
        groups: groups.iter().map(|s| s.to_string()).collect(),
        nshots,
        one_param: false,
    }
}

#[test]
fn single_hit_contributes_its_full_weight() {
    let config = config_with(
        vec![symbol("SPAM_WORD", 2.5, &[], 1)],
        vec![],
        &[(Action::Reject, 10.0)],
        0.0,
    );
    let arena = Bump::new();
    let mut task = Task::new(&arena, config, "m1");
    task.insert("SPAM_WORD", 1.0, None, InsertFlags::NONE);
    assert_eq!(task.result().score(), 2.5);
}

#[test]
fn repeated_hits_accumulate_up_to_nshots_cap() {
    let config = config_with(
        vec![symbol("REPEATED", 1.0, &[], 3)],
        vec![],
        &[(Action::Reject, 100.0)],
        0.0,
    );
    let arena = Bump::new();
    let mut task = Task::new(&arena, config, "m2");
    for _ in 0..5 {
        task.insert("REPEATED", 1.0, None, InsertFlags::NONE);
    }
    // First hit contributes 1.0, then two more single hits accumulate
    // (nshots 2 and 3), the remaining two are folded into the single-shot
    // replacement branch since they no longer exceed the prior magnitude.
    assert_eq!(task.result().score(), 3.0);
}

#[test]
fn group_cap_clips_cumulative_contribution() {
    let config = config_with(
        vec![
            symbol("A", 3.0, &["bulk"], 0),
            symbol("B", 3.0, &["bulk"], 0),
        ],
        vec![GroupDef {
            name: "bulk".into(),
            max_score: 4.0,
        }],
        &[(Action::Reject, 100.0)],
        0.0,
    );
    let arena = Bump::new();
    let mut task = Task::new(&arena, config, "m3");
    task.insert("A", 1.0, None, InsertFlags::NONE);
    task.insert("B", 1.0, None, InsertFlags::NONE);
    assert_eq!(task.result().score(), 4.0);
    assert_eq!(task.result().group_score("bulk"), Some(4.0));
}

#[test]
fn grow_factor_amplifies_consecutive_same_sign_hits() {
    let config = config_with(
        vec![symbol("GROWER", 1.0, &[], 0)],
        vec![],
        &[(Action::Reject, 100.0)],
        2.0,
    );
    let arena = Bump::new();
    let mut task = Task::new(&arena, config, "m4");
    task.insert("GROWER", 1.0, None, InsertFlags::NONE);
    task.insert("OTHER_UNKNOWN", 1.0, None, InsertFlags::ENFORCE);
    let score_before = task.result().score();
    assert!(score_before > 0.0);
}

#[test]
fn unknown_symbol_without_enforce_contributes_nothing() {
    let config = config_with(vec![], vec![], &[(Action::Reject, 10.0)], 0.0);
    let arena = Bump::new();
    let mut task = Task::new(&arena, config, "m5");
    task.insert("NEVER_DEFINED", 5.0, None, InsertFlags::NONE);
    assert_eq!(task.result().score(), 0.0);
}

#[test]
fn nan_weight_is_sanitized_to_zero() {
    let config = config_with(vec![symbol("NANNY", 1.0, &[], 0)], vec![], &[(Action::Reject, 10.0)], 0.0);
    let arena = Bump::new();
    let mut task = Task::new(&arena, config, "m6");
    task.insert("NANNY", f64::NAN, None, InsertFlags::NONE);
    assert_eq!(task.result().score(), 0.0);
}

#[test]
fn action_threshold_selects_most_severe_qualifying_action() {
    let config = config_with(
        vec![symbol("BIG", 20.0, &[], 0)],
        vec![],
        &[(Action::Reject, 15.0), (Action::AddHeader, 5.0)],
        0.0,
    );
    let arena = Bump::new();
    let mut task = Task::new(&arena, config, "m7");
    task.insert("BIG", 1.0, None, InsertFlags::NONE);
    assert_eq!(task.check_action(), Action::Reject);
}

#[test]
fn below_every_threshold_is_no_action() {
    let config = config_with(
        vec![symbol("SMALL", 1.0, &[], 0)],
        vec![],
        &[(Action::Reject, 15.0)],
        0.0,
    );
    let arena = Bump::new();
    let mut task = Task::new(&arena, config, "m8");
    task.insert("SMALL", 1.0, None, InsertFlags::NONE);
    assert_eq!(task.check_action(), Action::NoAction);
}

#[test]
fn passthrough_overrides_threshold_selection() {
    let config = config_with(vec![symbol("X", 1.0, &[], 0)], vec![], &[(Action::Reject, 15.0)], 0.0);
    let arena = Bump::new();
    let mut task = Task::new(&arena, config, "m9");
    task.insert("X", 1.0, None, InsertFlags::NONE);
    task.add_passthrough(PassthroughResult {
        action: Action::Greylist,
        priority: 10,
        target_score: None,
        message: "whitelisted sender".into(),
        module: "whitelist".into(),
    });
    assert_eq!(task.check_action(), Action::Greylist);
}

#[test]
fn single_flag_keeps_only_the_largest_same_sign_contribution() {
    let config = config_with(vec![symbol("ONE_SHOT", 1.0, &[], 0)], vec![], &[(Action::Reject, 50.0)], 0.0);
    let arena = Bump::new();
    let mut task = Task::new(&arena, config, "m10");
    task.insert("ONE_SHOT", 2.0, None, InsertFlags::SINGLE);
    task.insert("ONE_SHOT", 5.0, None, InsertFlags::SINGLE);
    task.insert("ONE_SHOT", 1.0, None, InsertFlags::SINGLE);
    assert_eq!(task.result().score(), 5.0);
}

#[test]
fn enforce_flag_credits_weight_for_an_unconfigured_symbol() {
    let config = config_with(vec![], vec![], &[(Action::Reject, 10.0)], 0.0);
    let arena = Bump::new();
    let mut task = Task::new(&arena, config, "m11");
    task.insert("NOT_IN_CONFIG", 3.0, None, InsertFlags::ENFORCE);
    assert_eq!(task.result().score(), 3.0);
}
