//! Configuration models for the host and per-operation timeouts.

pub mod options;

pub use options::{HostOptions, TimeoutProfile};
