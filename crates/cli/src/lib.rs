//! Library half of the `chorebot` binary: runtime wiring shared by the
//! commands and the integration tests.

pub mod runtime;

pub use runtime::{CliResult, Runtime};
