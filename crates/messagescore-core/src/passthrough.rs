//! Priority-ordered override channel (§4.2).

use crate::action::Action;

/// An override verdict that can bypass threshold-based action selection.
#[derive(Debug, Clone)]
pub struct PassthroughResult {
    pub action: Action,
    pub priority: u32,
    /// `None` means "use the accumulated score" (the C original's `NaN`
    /// sentinel, never leaked past this boundary).
    pub target_score: Option<f64>,
    pub message: String,
    pub module: String,
}

/// Append `pr` and re-sort by priority descending, stable on ties (I5).
///
/// No deduplication: the channel is an append-only log of every override any
/// symbol check registered, not a set.
pub fn add_passthrough(passthroughs: &mut Vec<PassthroughResult>, pr: PassthroughResult) {
    if let Some(score) = pr.target_score {
        tracing::info!(
            action = %pr.action,
            priority = pr.priority,
            module = %pr.module,
            message = %pr.message,
            target_score = score,
            "set pre-result"
        );
    } else {
        tracing::info!(
            action = %pr.action,
            priority = pr.priority,
            module = %pr.module,
            message = %pr.message,
            "set pre-result (no score)"
        );
    }

    passthroughs.push(pr);
    passthroughs.sort_by(|a, b| b.priority.cmp(&a.priority));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pr(action: Action, priority: u32) -> PassthroughResult {
        PassthroughResult {
            action,
            priority,
            target_score: None,
            message: "m".into(),
            module: "mod".into(),
        }
    }

    #[test]
    fn head_always_has_maximal_priority() {
        let mut passthroughs = Vec::new();
        add_passthrough(&mut passthroughs, pr(Action::Reject, 10));
        add_passthrough(&mut passthroughs, pr(Action::NoAction, 20));
        add_passthrough(&mut passthroughs, pr(Action::Greylist, 5));
        assert_eq!(passthroughs[0].priority, 20);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut passthroughs = Vec::new();
        add_passthrough(&mut passthroughs, pr(Action::Reject, 10));
        add_passthrough(&mut passthroughs, pr(Action::AddHeader, 10));
        assert_eq!(passthroughs[0].action, Action::Reject);
        assert_eq!(passthroughs[1].action, Action::AddHeader);
    }
}
