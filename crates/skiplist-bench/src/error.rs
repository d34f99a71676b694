use thiserror::Error;

/// Rejections raised while validating a [`crate::BenchConfig`].
///
/// These are the only fallible outcomes in this crate: once a `BenchConfig` exists, running it
/// cannot fail (spec §7 — "no panics, no fatal errors, and no exceptions").
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `insert_pct + delete_pct + contains_pct` did not sum to 100.
    #[error("operation-mix percentages must sum to 100, got {insert} + {delete} + {contains} = {sum}")]
    PercentagesDontSumToHundred {
        insert:  u8,
        delete:  u8,
        contains: u8,
        sum:     u16,
    },
    /// The configured key range was empty or inverted.
    #[error("start_range ({start}) must be strictly less than end_range ({end})")]
    EmptyKeyRange { start: i64, end: i64 },
    /// `num_threads` was zero.
    #[error("num_threads must be at least 1")]
    NoThreads,
    /// `prefill_count` exceeded the number of keys in `[start_range, end_range)`.
    #[error("prefill_count ({prefill_count}) exceeds the key range size ({range_size})")]
    PrefillExceedsRange { prefill_count: u64, range_size: u64 },
}
