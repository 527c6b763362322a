//! Process-wide exponentially-weighted mean of per-message symbol cardinality.
//!
//! Pure sizing advice: the value seeds the initial capacity of the next
//! message's symbol map so its `HashMap` doesn't have to grow by doubling on
//! every message. Staleness is benign — nothing downstream of this module
//! observes the EMA directly, it only ever feeds `HashMap::with_capacity`.

use std::sync::Mutex;

use once_cell::sync::Lazy;

#[derive(Debug, Clone, Copy)]
struct CounterData {
    mean: f64,
}

static SYMBOLS_COUNT: Lazy<Mutex<CounterData>> =
    Lazy::new(|| Mutex::new(CounterData { mean: 0.0 }));

/// Fold `sample` into the running mean with the given decay factor.
///
/// Mirrors the C original's `rspamd_set_counter_ema`: `mean := mean +
/// alpha * (sample - mean)`, clamped to a one-shot seed on the very first
/// observation so the mean doesn't start at zero and bias downward forever.
pub fn record_symbol_count(sample: usize, alpha: f64) {
    let mut guard = SYMBOLS_COUNT.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if guard.mean == 0.0 {
        guard.mean = sample as f64;
    } else {
        guard.mean += alpha * (sample as f64 - guard.mean);
    }
}

/// Best-effort capacity hint for a fresh message's symbol map.
pub fn capacity_hint(floor: usize) -> usize {
    let guard = SYMBOLS_COUNT.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    (guard.mean.round() as usize).max(floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_seeds_the_mean() {
        record_symbol_count(12, 0.5);
        assert!(capacity_hint(0) >= 1);
    }

    #[test]
    fn capacity_hint_never_drops_below_floor() {
        assert!(capacity_hint(4) >= 4);
    }
}
