// (c) 2025 Ross Younger
//! # Configuration management
//!
//! qwho reads a single configuration file. The locations considered, in
//! order:
//! 1. The file given on the command line (`--config`), which must exist
//! 2. The user's configuration file (typically `~/.qwho.conf`)
//! 3. The system-wide configuration file (typically `/etc/qwho.conf`)
//!
//! Running without any configuration file is legal, but then qwho can only
//! connect to servers given explicitly (`--host` or `query@host`).
//! To see the paths in effect, run `qwho --config-files`.
//!
//! ## File format
//!
//! A configuration file is a tree of named blocks containing `key = value;`
//! settings. Blocks nest; a setting is identified by the `|`-joined path of
//! the blocks around it, rooted at the implicit `qwho` namespace. `#` starts
//! a comment. Values (and block names) may be double-quoted; inside quotes,
//! backslash escapes the next character and newlines are allowed.
//!
//! ### Example
//!
//! ```text
//! # Try each pattern in turn, top to bottom.
//! connect-timeout = 30;
//!
//! server-options {
//!     ".*\\.(com|net)$" {
//!         whois-server = whois.verisign-grs.com;
//!     }
//!     ".*\\.de$" {
//!         whois-server = whois.denic.de;
//!         port = 43;
//!     }
//! }
//! ```
//!
//! Block names under `server-options` are regular expressions, matched
//! case-insensitively against the query; the first match in file order wins.
//! See [crate::resolver] for how the winning block's settings are used.
//!
//! `qwho --show-config` prints every setting the file produced, with the
//! source line each came from.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use tabled::{settings::Style, Table, Tabled};
use tracing::{debug, warn};

mod file;
pub use file::Parser;

mod lex;

/// The implicit root of every setting's domain path
pub const ROOT_DOMAIN: &str = env!("CARGO_PKG_NAME");

/// Joins the block names making up a domain path
pub const DOMAIN_SEPARATOR: char = '|';

/// Domain path of the block holding per-server settings
pub(crate) const SERVER_OPTIONS_PATH: &str = concat!(env!("CARGO_PKG_NAME"), "|server-options");

pub(crate) const BASE_CONFIG_FILENAME: &str = concat!(env!("CARGO_PKG_NAME"), ".conf");

// DATA MODEL ////////////////////////////////////////////////////////////////////////////////////////////////

/// A single configuration setting
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    /// `|`-joined path of the blocks this setting appeared under
    pub domain: String,
    /// Setting name (the token before `=`)
    pub key: String,
    /// Setting value (the token before `;`)
    pub value: String,
    /// 1-based source line of the terminating `;`
    pub line: usize,
}

/// Parsed configuration data: settings in file order, plus one iteration
/// cursor.
///
/// All lookups compare ASCII case-insensitively. The cursor is shared by
/// [`next_exact`](Store::next_exact) and [`next_prefix`](Store::next_prefix);
/// start a fresh iteration with [`rewind`](Store::rewind). (The `&mut`
/// receivers mean the compiler rules out two interleaved iterations, so
/// there is no way to confuse yourself.) [`get_one`](Store::get_one) does
/// not use or disturb the cursor.
#[derive(Debug, Default)]
pub struct Store {
    entries: Vec<Entry>,
    cursor: usize,
}

impl Store {
    /// New, empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry, preserving insertion order
    pub fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    /// Discards every entry; the store is empty and reusable
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }

    /// Repositions the iteration cursor at the first entry
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// The first entry matching `domain` and `key` exactly, in insertion
    /// order. Ignores the cursor.
    #[must_use]
    pub fn get_one(&self, domain: &str, key: &str) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|e| e.domain.eq_ignore_ascii_case(domain) && e.key.eq_ignore_ascii_case(key))
    }

    /// Advances the cursor to the next entry whose domain matches `domain`
    /// exactly, and returns it; None once the store is exhausted.
    pub fn next_exact(&mut self, domain: &str) -> Option<&Entry> {
        self.scan(|e| e.domain.eq_ignore_ascii_case(domain))
    }

    /// As [`next_exact`](Store::next_exact), but matches any entry whose
    /// domain begins with `prefix`.
    pub fn next_prefix(&mut self, prefix: &str) -> Option<&Entry> {
        self.scan(|e| domain_starts_with(&e.domain, prefix))
    }

    // Every entry the cursor passes is consumed, matching or not.
    fn scan<F>(&mut self, accept: F) -> Option<&Entry>
    where
        F: Fn(&Entry) -> bool,
    {
        while self.cursor < self.entries.len() {
            let i = self.cursor;
            self.cursor += 1;
            if accept(&self.entries[i]) {
                return Some(&self.entries[i]);
            }
        }
        None
    }

    /// All entries, in insertion order
    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Number of entries held
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the store holds nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// Byte-wise prefix compare, so a multi-byte character on the boundary cannot
// cause a mid-character slicing panic.
fn domain_starts_with(domain: &str, prefix: &str) -> bool {
    domain
        .as_bytes()
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix.as_bytes()))
}

// PRETTY PRINT SUPPORT //////////////////////////////////////////////////////////////////////////////////////

#[derive(Tabled)]
struct PrettyEntry {
    line: usize,
    domain: String,
    key: String,
    value: String,
}

impl From<&Entry> for PrettyEntry {
    fn from(entry: &Entry) -> Self {
        Self {
            line: entry.line,
            domain: entry.domain.clone(),
            key: entry.key.clone(),
            value: entry.value.clone(),
        }
    }
}

impl Display for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            Table::new(self.entries.iter().map(PrettyEntry::from)).with(Style::sharp())
        )
    }
}

// PATHS /////////////////////////////////////////////////////////////////////////////////////////////////////

/// Path to the user's configuration file (`~/.qwho.conf`), if the home
/// directory can be determined
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    // ~/.<filename> for now
    let mut d = dirs::home_dir()?;
    d.push(format!(".{BASE_CONFIG_FILENAME}"));
    Some(d)
}

/// Path to the system-wide configuration file (`/etc/qwho.conf`)
#[must_use]
pub fn system_config_path() -> PathBuf {
    // /etc/<filename> for now
    let mut p = PathBuf::new();
    p.push("/etc");
    p.push(BASE_CONFIG_FILENAME);
    p
}

/// The candidate configuration files, in the order they are considered
#[must_use]
pub fn config_files() -> Vec<String> {
    [user_config_path(), Some(system_config_path())]
        .into_iter()
        .flatten()
        .map(|p| p.into_os_string().to_string_lossy().into())
        .collect()
}

/// Locates the configuration file to read.
///
/// An explicitly-given path must exist; otherwise the first candidate path
/// that exists is used, and finding nothing is not an error.
pub fn find_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(p) = explicit {
        anyhow::ensure!(p.exists(), "configuration file {} not found", p.display());
        return Ok(Some(p.to_path_buf()));
    }
    Ok(user_config_path()
        .filter(|p| p.exists())
        .or_else(|| Some(system_config_path()).filter(|p| p.exists())))
}

/// Reads the applicable configuration file into a [`Store`].
///
/// With no configuration file present, the store is simply empty.
pub fn load(explicit: Option<&Path>) -> Result<Store> {
    match find_config_file(explicit)? {
        Some(path) => {
            debug!("configuration file: {}", path.display());
            Parser::for_path(&path, ROOT_DOMAIN)?.parse()
        }
        None => {
            debug!("no configuration file found");
            Ok(Store::new())
        }
    }
}

// SETTINGS //////////////////////////////////////////////////////////////////////////////////////////////////

/// How long we will wait for each candidate address during connection,
/// unless the configuration says otherwise
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(75);

/// The `connect-timeout` setting, in whole seconds. Missing means the
/// default; a value that does not parse warns and means the default.
#[must_use]
pub fn connect_timeout(store: &Store) -> Duration {
    let Some(entry) = store.get_one(ROOT_DOMAIN, "connect-timeout") else {
        return DEFAULT_CONNECT_TIMEOUT;
    };
    match entry.value.parse::<u64>() {
        Ok(secs) => Duration::from_secs(secs),
        Err(_) => {
            warn!(
                "invalid connect-timeout \"{}\" at line {}; using {}s",
                entry.value,
                entry.line,
                DEFAULT_CONNECT_TIMEOUT.as_secs()
            );
            DEFAULT_CONNECT_TIMEOUT
        }
    }
}

///////////////////////////////////////////////////////////////////////////////////////
