//! Utility types shared across the actor core.

pub mod logging;

pub use logging::LogLevel;
