// TODO: document the time complexity of each variant's operations.

mod coarse;
mod interface;
mod lazy;
mod level;
mod lockfree;
mod sequential;

pub use self::coarse::CoarseSkipSet;
pub use self::interface::{build, ConcurrentSkipSet, SkipSet, Variant};
pub use self::lazy::LazySkipSet;
pub use self::level::{set_thread_identifier, LevelGenerator, MAX_LEVEL};
pub use self::lockfree::LockFreeSkipSet;
pub use self::sequential::SequentialSkipSet;
