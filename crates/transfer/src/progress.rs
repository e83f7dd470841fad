/// Percentage of `expected` covered by `received`, floored and capped at 100.
///
/// A declared size of zero or less means nothing further is expected, so
/// any state of such a transfer reports 100.
pub fn percent(received: u64, expected: i64) -> u8 {
    if expected <= 0 {
        return 100;
    }
    let pct = u128::from(received) * 100 / expected as u128;
    pct.min(100) as u8
}

/// Progress of a transfer after a chunk has been written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub received_size: u64,
    pub expected_size: i64,
    pub percent: u8,
}

impl Progress {
    pub fn new(received_size: u64, expected_size: i64) -> Self {
        Self {
            received_size,
            expected_size,
            percent: percent(received_size, expected_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floors_fractional_percentages() {
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 66);
        assert_eq!(percent(999, 1000), 99);
    }

    #[test]
    fn exact_completion_is_100() {
        assert_eq!(percent(10, 10), 100);
        assert_eq!(percent(0, 10), 0);
    }

    #[test]
    fn overshoot_is_capped() {
        assert_eq!(percent(25, 10), 100);
    }

    #[test]
    fn non_positive_expected_size_reports_100() {
        assert_eq!(percent(0, 0), 100);
        assert_eq!(percent(5, 0), 100);
        assert_eq!(percent(5, -10), 100);
    }

    #[test]
    fn large_sizes_do_not_overflow() {
        let expected = i64::MAX;
        assert_eq!(percent(u64::MAX, expected), 100);
        assert_eq!(percent(expected as u64 / 2, expected), 49);
    }

    #[test]
    fn monotonic_over_chunk_sequence() {
        let expected = 1000;
        let chunks = [1u64, 7, 92, 300, 100, 250, 250];
        let mut received = 0;
        let mut last = 0;
        for chunk in chunks {
            received += chunk;
            let p = Progress::new(received, expected);
            assert!(p.percent >= last);
            last = p.percent;
        }
        assert_eq!(received, 1000);
        assert_eq!(last, 100);
    }
}
