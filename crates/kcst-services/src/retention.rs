//! Size-based retention.
//!
//! Small files live long, large files live short. The TTL falls from `max_ttl`
//! for an empty file to `min_ttl` at `max_file_size`, following `1 - sqrt(ratio)`
//! so that most of the drop happens for small sizes.

use std::time::Duration;

use kcst_core::RetentionConfig;

/// The TTL formula, detached from the rest of the retention settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    min_ttl: Duration,
    max_ttl: Duration,
    max_file_size: u64,
}

impl RetentionPolicy {
    pub fn new(min_ttl: Duration, max_ttl: Duration, max_file_size: u64) -> Self {
        Self {
            min_ttl,
            max_ttl,
            max_file_size,
        }
    }

    pub fn min_ttl(&self) -> Duration {
        self.min_ttl
    }

    pub fn max_ttl(&self) -> Duration {
        self.max_ttl
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Time to live for an object of `size` bytes. Non-increasing in `size`.
    pub fn ttl(&self, size: u64) -> Duration {
        if size == 0 {
            return self.max_ttl;
        }
        if size >= self.max_file_size {
            return self.min_ttl;
        }

        let ratio = size as f64 / self.max_file_size as f64;
        let factor = 1.0 - ratio.sqrt();
        let span = self.max_ttl.saturating_sub(self.min_ttl);

        self.min_ttl.saturating_add(span.mul_f64(factor))
    }
}

impl From<&RetentionConfig> for RetentionPolicy {
    fn from(config: &RetentionConfig) -> Self {
        Self::new(config.min_ttl, config.max_ttl, config.max_file_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const HOUR: Duration = Duration::from_secs(3600);
    const MIB: u64 = 1024 * 1024;

    fn default_policy() -> RetentionPolicy {
        RetentionPolicy::new(HOUR, HOUR * 672, 100 * MIB)
    }

    #[test]
    fn test_boundaries() {
        let policy = default_policy();
        assert_eq!(policy.ttl(0), HOUR * 672);
        assert_eq!(policy.ttl(100 * MIB), HOUR);
        assert_eq!(policy.ttl(100 * MIB + 1), HOUR);
        assert_eq!(policy.ttl(u64::MAX), HOUR);
    }

    #[test]
    fn test_quarter_size_gets_half_the_span() {
        let policy = default_policy();
        // sqrt(0.25) = 0.5, so 1h + 0.5 * 671h
        assert_eq!(policy.ttl(25 * MIB), Duration::from_secs(3600 * 3365 / 10));
    }

    #[test]
    fn test_one_byte_is_close_to_max() {
        let policy = default_policy();
        let ttl = policy.ttl(1);
        assert!(ttl < HOUR * 672);
        assert!(ttl > HOUR * 671);
    }

    #[test]
    fn test_min_equal_max_is_constant() {
        let policy = RetentionPolicy::new(HOUR, HOUR, 10);
        for size in 0..=20 {
            assert_eq!(policy.ttl(size), HOUR);
        }
    }

    #[test]
    fn test_from_config() {
        let config = RetentionConfig::default();
        let policy = RetentionPolicy::from(&config);
        assert_eq!(policy.min_ttl(), config.min_ttl);
        assert_eq!(policy.max_ttl(), config.max_ttl);
        assert_eq!(policy.max_file_size(), config.max_file_size);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(512))]

        #[test]
        fn ttl_is_non_increasing(a in 1u64..100 * MIB, b in 1u64..100 * MIB) {
            let policy = default_policy();
            let (small, large) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(policy.ttl(small) >= policy.ttl(large));
        }

        #[test]
        fn ttl_stays_within_bounds(size in any::<u64>()) {
            let policy = default_policy();
            let ttl = policy.ttl(size);
            prop_assert!(ttl >= policy.min_ttl());
            prop_assert!(ttl <= policy.max_ttl());
        }
    }
}
