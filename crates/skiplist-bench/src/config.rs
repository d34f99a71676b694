use std::time::Duration;

use crate::error::ConfigError;

/// How a worker picks the next key to operate on, within its assigned `[start, end)` range
/// (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyStrategy {
    /// Uniform random in the assigned range.
    Random,
    /// `(prev + 1) mod range + start`.
    Linear,
    /// A Fisher–Yates shuffle of the assigned range, traversed once; the worker stops when
    /// exhausted.
    ShuffledUnique,
}

/// Whether each worker's assigned key range overlaps another worker's.
///
/// Disjoint ranges make the shadow oracle an exact per-key reference model (spec §4.6, §9);
/// overlapping ranges make it a lower-bound validator only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeLayout {
    /// Workers partition `[start_range, end_range)` into equal, non-overlapping sub-ranges.
    Disjoint,
    /// Every worker is assigned the full `[start_range, end_range)`.
    Overlapping,
}

/// The percentage mix of operation kinds a worker draws from (spec §4.6); always sums to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationMix {
    pub insert_pct:   u8,
    pub delete_pct:   u8,
    pub contains_pct: u8,
}

impl OperationMix {
    fn validate(self) -> Result<(), ConfigError> {
        let sum = u16::from(self.insert_pct) + u16::from(self.delete_pct) + u16::from(self.contains_pct);
        if sum == 100 {
            Ok(())
        } else {
            Err(ConfigError::PercentagesDontSumToHundred {
                insert:   self.insert_pct,
                delete:   self.delete_pct,
                contains: self.contains_pct,
                sum,
            })
        }
    }
}

/// Validated inputs to [`crate::harness::bench`] (spec §6's harness surface).
///
/// Constructed only through [`BenchConfig::new`], which enforces every precondition the harness
/// otherwise assumes: the operation mix sums to 100, the key range is non-empty, there is at
/// least one worker thread, and the prefill count fits the range.
#[derive(Debug, Clone, Copy)]
pub struct BenchConfig {
    pub(crate) variant:         skiplist::Variant,
    pub(crate) num_threads:     u32,
    pub(crate) runtime:         Duration,
    pub(crate) mix:             OperationMix,
    pub(crate) start_range:     i64,
    pub(crate) end_range:       i64,
    pub(crate) range_layout:    RangeLayout,
    pub(crate) strategy:        KeyStrategy,
    pub(crate) prefill_count:   u64,
    pub(crate) basic_testing:   bool,
    pub(crate) seed:            u64,
}

impl BenchConfig {
    /// Validate and build a harness configuration.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if `mix`'s percentages don't sum to 100, the key range is empty
    /// or inverted, `num_threads` is zero, or `prefill_count` exceeds the range's size.
    #[expect(clippy::too_many_arguments, reason = "mirrors spec §6's harness surface directly")]
    pub fn new(
        variant:       skiplist::Variant,
        num_threads:   u32,
        runtime:       Duration,
        mix:           OperationMix,
        start_range:   i64,
        end_range:     i64,
        range_layout:  RangeLayout,
        strategy:      KeyStrategy,
        prefill_count: u64,
        basic_testing: bool,
        seed:          u64,
    ) -> Result<Self, ConfigError> {
        mix.validate()?;

        if start_range >= end_range {
            return Err(ConfigError::EmptyKeyRange { start: start_range, end: end_range });
        }
        if num_threads == 0 {
            return Err(ConfigError::NoThreads);
        }

        // Safe: `start_range < end_range` was just checked, so this range fits in `u64`.
        let range_size = (end_range - start_range) as u64;
        if prefill_count > range_size {
            return Err(ConfigError::PrefillExceedsRange { prefill_count, range_size });
        }

        Ok(Self {
            variant,
            num_threads,
            runtime,
            mix,
            start_range,
            end_range,
            range_layout,
            strategy,
            prefill_count,
            basic_testing,
            seed,
        })
    }

    #[must_use]
    pub fn num_threads(&self) -> u32 {
        self.num_threads
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_mix() -> OperationMix {
        OperationMix { insert_pct: 10, delete_pct: 10, contains_pct: 80 }
    }

    #[test]
    fn rejects_bad_percentages() {
        let mix = OperationMix { insert_pct: 10, delete_pct: 10, contains_pct: 10 };
        let err = BenchConfig::new(
            skiplist::Variant::Coarse, 1, Duration::from_secs(1), mix, 0, 100,
            RangeLayout::Disjoint, KeyStrategy::Random, 0, false, 1,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::PercentagesDontSumToHundred { .. }));
    }

    #[test]
    fn rejects_empty_range() {
        let err = BenchConfig::new(
            skiplist::Variant::Coarse, 1, Duration::from_secs(1), valid_mix(), 100, 100,
            RangeLayout::Disjoint, KeyStrategy::Random, 0, false, 1,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyKeyRange { .. }));
    }

    #[test]
    fn rejects_zero_threads() {
        let err = BenchConfig::new(
            skiplist::Variant::Coarse, 0, Duration::from_secs(1), valid_mix(), 0, 100,
            RangeLayout::Disjoint, KeyStrategy::Random, 0, false, 1,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::NoThreads));
    }

    #[test]
    fn rejects_oversized_prefill() {
        let err = BenchConfig::new(
            skiplist::Variant::Coarse, 1, Duration::from_secs(1), valid_mix(), 0, 10,
            RangeLayout::Disjoint, KeyStrategy::Random, 11, false, 1,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::PrefillExceedsRange { .. }));
    }

    #[test]
    fn accepts_well_formed_config() {
        let config = BenchConfig::new(
            skiplist::Variant::Coarse, 4, Duration::from_secs(1), valid_mix(), 0, 100_000,
            RangeLayout::Disjoint, KeyStrategy::Random, 0, true, 42,
        )
        .unwrap();
        assert_eq!(config.num_threads(), 4);
    }
}
