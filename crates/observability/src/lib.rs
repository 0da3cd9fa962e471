//! Process-wide tracing setup shared by every binary.

pub mod subscriber;

pub use subscriber::{DEFAULT_FILTER, init, init_with_default};
