//! Server selection
// (c) 2025 Ross Younger
//!
//! Which whois server should answer for a given name? The configuration's
//! `server-options` block holds one sub-block per server, named by a
//! regular expression; the first block (in file order) whose pattern
//! matches the query owns it.

use regex::RegexBuilder;
use tracing::{debug, warn};

use crate::config::{Store, DOMAIN_SEPARATOR, SERVER_OPTIONS_PATH};

/// Finds the server block applicable to `hostname`, returning its full
/// domain path for use with [`Store::get_one`].
///
/// Patterns are matched case-insensitively and unanchored; write `^`/`$` in
/// the pattern if you mean them. The first match in file order wins. A
/// pattern that does not compile aborts the whole search (with a warning):
/// better no answer than an answer the broken configuration did not intend.
pub fn server_domain_path(store: &mut Store, hostname: &str) -> Option<String> {
    store.rewind();
    while let Some(entry) = store.next_prefix(SERVER_OPTIONS_PATH) {
        let Some(pattern) = pattern_of(&entry.domain) else {
            // a stray setting directly in server-options, not a server block
            continue;
        };
        let re = match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(re) => re,
            Err(e) => {
                warn!(
                    "bad server pattern \"{pattern}\" at line {}: {e}",
                    entry.line
                );
                return None;
            }
        };
        if re.is_match(hostname) {
            debug!("{hostname} matched server pattern \"{pattern}\"");
            return Some(entry.domain.clone());
        }
    }
    None
}

/// Looks up one setting (`key`) in the server block applicable to `hostname`
pub fn server_option(store: &mut Store, hostname: &str, key: &str) -> Option<String> {
    let domain = server_domain_path(store, hostname)?;
    store.get_one(&domain, key).map(|e| e.value.clone())
}

// The pattern is whatever follows `server-options|`. It may itself contain
// the separator (regex alternation), so only the leading prefix is stripped.
fn pattern_of(domain: &str) -> Option<&str> {
    domain
        .get(SERVER_OPTIONS_PATH.len()..)
        .and_then(|rest| rest.strip_prefix(DOMAIN_SEPARATOR))
}

///////////////////////////////////////////////////////////////////////////////////////
