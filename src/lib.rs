// Re-export modules so they can be used from the binaries and tests
pub mod aws;
pub mod cache;
pub mod cli;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod publisher;
pub mod sampler;

/// Crate version, part of every cache signature
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
