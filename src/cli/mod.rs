/// Command Line Interface for qwho
/// (c) 2025 Ross Younger
mod args;
mod cli_main;
pub(crate) mod styles;
pub use cli_main::cli;
