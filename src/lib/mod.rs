//! Shared library modules providing error types, file utilities, path discovery and telemetry.

pub mod errors;
pub mod fs;
pub mod paths;
pub mod telemetry;
