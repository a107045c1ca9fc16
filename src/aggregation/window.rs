/// Largest supported lookback, in aggregated candles
///
/// At 45-minute candles this is a little over four years of history per
/// evaluation, and keeps every fetch size well inside `i64`.
pub const MAX_LOOKBACK: usize = 50_000;

/// Number of aggregated candles the stop-loss evaluator wants for a lookback
///
/// `lookback` candles for the averaging window, plus the previous candle
/// used by the directional gate, plus the latest candle.
pub fn evaluation_window(lookback: usize) -> usize {
    lookback.saturating_add(2)
}

/// How many 1-minute candles to fetch so aggregation yields a full window
///
/// Adds two extra buckets of margin so a partial first or last bucket never
/// leaves the evaluator short.
pub fn required_base_count(lookback: usize, interval_minutes: usize) -> usize {
    evaluation_window(lookback)
        .saturating_add(2)
        .saturating_mul(interval_minutes)
}

/// Keep only the most recent `needed` aggregated candles
///
/// Shorter input is passed through unchanged; the evaluator decides what to
/// do with too little history.
pub fn trim<T>(mut aggregated: Vec<T>, needed: usize) -> Vec<T> {
    if aggregated.len() > needed {
        aggregated.drain(..aggregated.len() - needed);
    }
    aggregated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_base_count() {
        // (3 + 2) * 15 + 2 * 15
        assert_eq!(required_base_count(3, 15), 105);
        // (2 + 2) * 5 + 2 * 5
        assert_eq!(required_base_count(2, 5), 30);
        assert_eq!(required_base_count(1, 45), 225);
    }

    #[test]
    fn test_required_base_count_covers_window() {
        for interval in [5, 15, 30, 45] {
            for lookback in 1..10 {
                let base = required_base_count(lookback, interval);
                // Even with both edge buckets partial, enough full buckets remain
                assert!(base / interval >= evaluation_window(lookback) + 1);
            }
        }
    }

    #[test]
    fn test_huge_lookback_saturates_instead_of_wrapping() {
        assert_eq!(evaluation_window(usize::MAX), usize::MAX);
        assert_eq!(required_base_count(usize::MAX, 45), usize::MAX);
        assert!(required_base_count(MAX_LOOKBACK, 45) < i64::MAX as usize);
    }

    #[test]
    fn test_trim_keeps_most_recent() {
        let trimmed = trim(vec![1, 2, 3, 4, 5, 6], 4);
        assert_eq!(trimmed, vec![3, 4, 5, 6]);
    }

    #[test]
    fn test_trim_passes_short_input_through() {
        assert_eq!(trim(vec![1, 2], 4), vec![1, 2]);
        assert_eq!(trim(vec![1, 2, 3, 4], 4), vec![1, 2, 3, 4]);
        assert!(trim(Vec::<i32>::new(), 3).is_empty());
    }
}
