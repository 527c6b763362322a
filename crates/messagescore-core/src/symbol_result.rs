//! Accumulated per-symbol state (§3 "SymbolResult").

use std::sync::Arc;

use crate::config::SymbolDef;
use crate::option_set::SymbolOptions;

/// The accumulated state for one symbol hit within a single message's
/// [`crate::metric_result::MetricResult`].
#[derive(Debug)]
pub struct SymbolResult<'arena> {
    pub(crate) name: &'arena str,
    pub(crate) definition: Option<Arc<SymbolDef>>,
    pub(crate) score: f64,
    pub(crate) nshots: u32,
    pub(crate) options: Option<SymbolOptions<'arena>>,
}

impl<'arena> SymbolResult<'arena> {
    pub(crate) fn new(name: &'arena str, definition: Option<Arc<SymbolDef>>) -> Self {
        Self {
            name,
            definition,
            score: 0.0,
            nshots: 1,
            options: None,
        }
    }

    pub fn name(&self) -> &'arena str {
        self.name
    }

    pub fn definition(&self) -> Option<&Arc<SymbolDef>> {
        self.definition.as_ref()
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn nshots(&self) -> u32 {
        self.nshots
    }

    pub fn options(&self) -> Option<&[&'arena str]> {
        self.options.as_ref().map(|o| o.as_slice())
    }
}
