//! Async synchronization primitives

pub mod wait_queue;

pub use wait_queue::{WaitGuard, WaitQueue};
