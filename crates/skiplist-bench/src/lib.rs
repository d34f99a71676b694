mod config;
mod error;
mod harness;
mod oracle;
mod result;
mod worker;

pub use self::config::{BenchConfig, KeyStrategy, OperationMix, RangeLayout};
pub use self::error::ConfigError;
pub use self::harness::bench;
pub use self::oracle::ShadowOracle;
pub use self::result::{BenchResult, WorkerSummary};
pub use self::worker::OperationCounters;
