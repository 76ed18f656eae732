// qwho top-level command-line arguments
// (c) 2025 Ross Younger

use std::path::PathBuf;

use clap::Parser;

/// Options that switch us into another mode i.e. which don't require a query
const MODE_OPTIONS: &[&str] = &["show_config", "config_files"];

#[derive(Debug, Parser, Clone)]
#[command(
    author,
    version(env!("QWHO_VERSION_STRING")),
    about,
    before_help = "e.g.   qwho example.com",
    infer_long_args(true)
)]
#[command(help_template(
    "\
{name} version {version}
{about-with-newline}
{usage-heading} {usage}
{before-help}
{all-args}{after-help}
"
))]
#[command(styles=super::styles::CLAP_STYLES)]
#[allow(clippy::struct_excessive_bools)]
pub(crate) struct CliArgs {
    // MODE SELECTION ======================================================================
    /// Prints the configuration as the program sees it, then exits
    #[arg(long, help_heading("Modes"), conflicts_with("config_files"))]
    pub show_config: bool,

    /// Lists the places configuration may be read from, then exits
    #[arg(long, help_heading("Modes"))]
    pub config_files: bool,

    // LOOKUP OPTIONS ======================================================================
    /// Reads the given configuration file instead of searching the usual places
    #[arg(short = 'c', long, value_name("FILE"))]
    pub config: Option<PathBuf>,

    /// Enables verbose output
    #[arg(short, long, action, conflicts_with("debug"))]
    pub verbose: bool,

    /// Queries the given server, skipping server selection.
    ///
    /// You can also force a server for one query by appending `@HOST` to it.
    #[arg(short = 'H', long, value_name("HOST"), help_heading("Connection"))]
    pub host: Option<String>,

    /// Connects to the given TCP port [default: the server's configured port, or the whois service]
    #[arg(short = 'p', long, value_name("PORT"), help_heading("Connection"))]
    pub port: Option<u16>,

    /// Reports which server would be queried, without connecting
    #[arg(short = 'n', long, action, help_heading("Connection"))]
    pub dry_run: bool,

    // DEBUG ----------------------------
    /// Enable detailed debug output
    ///
    /// This has the same effect as setting `RUST_LOG=qwho=trace` in the environment.
    /// If present, `RUST_LOG` overrides this option.
    #[arg(short, long, action, help_heading("Debug"))]
    pub debug: bool,
    /// Log to a file
    ///
    /// By default the log receives everything printed to stderr.
    /// To override this behaviour, set the environment variable `RUST_LOG_FILE_DETAIL` (same semantics as `RUST_LOG`).
    #[arg(short('l'), long, action, help_heading("Debug"), value_name("FILE"))]
    pub log_file: Option<String>,

    // POSITIONAL ARGUMENTS ================================================================
    /// The object to look up. Multiple words are joined with single spaces.
    ///
    /// Append `@HOST` to query a particular server; escape a literal `@` with a backslash.
    #[arg(conflicts_with_all(MODE_OPTIONS), required = true, value_name = "QUERY")]
    pub query: Vec<String>,
}

impl CliArgs {
    /// The default tracing level for this invocation
    pub(crate) fn trace_level(&self) -> &'static str {
        if self.debug {
            "trace"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}
