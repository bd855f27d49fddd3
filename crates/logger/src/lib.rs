//! Shared tracing setup for the pingsaver binaries.

mod subscriber;

pub use subscriber::{init, init_with_level};
