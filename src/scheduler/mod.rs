//! Periodic execution of poll cycles

/// Interval-driven scheduler with cancellation and an overlap guard
pub mod poll_scheduler;

pub use crate::monitoring::CycleOutcome;
pub use poll_scheduler::PollScheduler;
