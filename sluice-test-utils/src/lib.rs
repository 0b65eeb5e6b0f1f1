//! Utilities for standing up mock collaborators that exercise sluice
//! end-to-end flows.

pub mod clock;
pub mod feed;
pub mod history;
pub mod perf;
pub mod strategy;

pub use clock::SimClock;
pub use feed::{FeedHandle, ScriptedFeed};
pub use history::StaticHistory;
pub use perf::StaticPerf;
pub use strategy::{Journal, RecordingState, RecordingStrategy};
