//! Query-string helpers
// (c) 2025 Ross Younger

/// Joins the command line's query words into a single query string,
/// separated by single spaces.
#[must_use]
pub fn join_query(words: &[String]) -> String {
    words.join(" ")
}

/// Splits a forced server out of a `query@host` argument.
///
/// The first unescaped `@` splits; `\@` does not, and the backslash stays
/// in the query for the server to deal with. Returns `(query, host)`.
#[must_use]
pub fn split_host_from_query(query: &str) -> Option<(&str, &str)> {
    let at = query.find('@')?;
    if query[..at].ends_with('\\') {
        return None;
    }
    Some((&query[..at], &query[at + 1..]))
}

///////////////////////////////////////////////////////////////////////////
