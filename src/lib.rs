//! qwho lookup-client library
// (c) 2025 Ross Younger

mod cli;
pub use cli::cli;
/// Configuration file handling
pub mod config;
/// TCP connection establishment
pub mod net;
/// Server selection
pub mod resolver;
/// Utilities
pub mod util;
