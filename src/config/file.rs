//! Configuration file parsing internals
// (c) 2025 Ross Younger

use std::{fs::File, io::Read, path::Path};

use anyhow::{bail, Context, Result};
use tracing::warn;

use super::lex::Scanner;
use super::{Entry, Store, DOMAIN_SEPARATOR};

/// The business end of reading a configuration file.
///
/// Blocks (`name { ... }`) nest; each entry (`key = value;`) is committed
/// under the `|`-joined path of the blocks enclosing it, prefixed with the
/// root namespace the parser was constructed with. Entries keep their order
/// and the line number of their terminating `;`.
///
/// # Note
/// You can only use this struct once. If for some reason you want to re-parse
/// a file, you must create a fresh `Parser` to do so.
#[derive(Debug)]
pub struct Parser<R>
where
    R: Read,
{
    reader: R,
    source: String,
    root: String,
}

impl Parser<File> {
    /// Parser over a file on disk. `root` is the namespace segment all
    /// committed domains start from (normally [`super::ROOT_DOMAIN`]).
    pub fn for_path<P>(path: P, root: &str) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        Ok(Self::for_reader(
            file,
            path.to_string_lossy().to_string(),
            root,
        ))
    }
}

impl<'a> Parser<&'a [u8]> {
    /// Parser over an in-memory source (mostly for tests)
    #[must_use]
    pub fn for_str(s: &'a str, root: &str) -> Self {
        Self::for_reader(s.as_bytes(), "<string>".into(), root)
    }
}

impl<R: Read> Parser<R> {
    fn for_reader(reader: R, source: String, root: &str) -> Self {
        Self {
            reader,
            source,
            root: root.to_string(),
        }
    }

    /// Reads and parses the whole source, producing a fresh [`Store`].
    /// This consumes the `Parser`.
    pub fn parse(mut self) -> Result<Store> {
        let mut text = String::new();
        let _ = self
            .reader
            .read_to_string(&mut text)
            .with_context(|| format!("reading {}", self.source))?;
        self.parse_text(&text)
            .with_context(|| format!("parsing {}", self.source))
    }

    fn parse_text(&self, text: &str) -> Result<Store> {
        let mut scanner = Scanner::new(text);
        let mut store = Store::new();
        let mut segments: Vec<String> = Vec::new();
        let mut token: Option<String> = None;
        let mut key: Option<String> = None;

        while let Some(ch) = scanner.skip_whitespace() {
            let line = scanner.line();
            match ch {
                '#' => scanner.skip_line(),
                '"' => {
                    let _ = scanner.advance();
                    // A fresh token always replaces the pending one
                    token = Some(scanner.read_quoted()?);
                }
                '{' => {
                    let _ = scanner.advance();
                    match token.take() {
                        Some(name) => segments.push(name),
                        None => bail!("block with no name at line {line}"),
                    }
                }
                '}' => {
                    let _ = scanner.advance();
                    if segments.pop().is_none() {
                        warn!("{}: unmatched '}}' at line {line}", self.source);
                    }
                    // A closing brace may be terminated `};`, but only if the
                    // semicolon follows immediately.
                    let _ = scanner.eat(';');
                }
                '=' => {
                    let _ = scanner.advance();
                    if key.is_some() {
                        warn!("{}: multiple keys at line {line}", self.source);
                    }
                    match &token {
                        // Copied, not consumed: `k = ;` commits the value "k"
                        Some(t) => key = Some(t.clone()),
                        None => bail!("'=' with no key at line {line}"),
                    }
                }
                ';' => {
                    let _ = scanner.advance();
                    let Some(k) = key.take() else {
                        bail!("missing key at line {line}");
                    };
                    let value = token.take().unwrap_or_default();
                    store.push(Entry {
                        domain: domain_path(&self.root, &segments),
                        key: k,
                        value,
                        line,
                    });
                }
                _ => token = Some(scanner.read_unquoted()?),
            }
        }

        if key.is_some() || token.is_some() {
            warn!("{}: discarding incomplete entry at end of file", self.source);
        }
        if !segments.is_empty() {
            warn!(
                "{}: {} unclosed block(s) at end of file",
                self.source,
                segments.len()
            );
        }
        Ok(store)
    }
}

fn domain_path(root: &str, segments: &[String]) -> String {
    let mut path = root.to_string();
    for s in segments {
        if !path.is_empty() {
            path.push(DOMAIN_SEPARATOR);
        }
        path.push_str(s);
    }
    path
}

///////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod test {
    use anyhow::{anyhow, Context, Result};
    use assertables::{assert_contains, assert_contains_as_result, assert_eq_as_result};

    use super::{Entry, Parser};
    use crate::util::make_test_tempfile;

    fn entry(domain: &str, key: &str, value: &str, line: usize) -> Entry {
        Entry {
            domain: domain.into(),
            key: key.into(),
            value: value.into(),
            line,
        }
    }

    fn parse(s: &str, root: &str) -> Result<Vec<Entry>> {
        Ok(Parser::for_str(s, root).parse()?.entries().to_vec())
    }

    #[test]
    fn round_trip() {
        let entries = parse(r#"root { a { k = "v"; } }"#, "").unwrap();
        assert_eq!(entries, vec![entry("root|a", "k", "v", 1)]);
    }

    #[test]
    fn entries_in_file_order() -> Result<()> {
        for (input, expected) in [
            ("k = v;\n", vec![entry("ns", "k", "v", 1)]),
            (
                "a = 1;\nb = 2;\nc = 3;\n",
                vec![
                    entry("ns", "a", "1", 1),
                    entry("ns", "b", "2", 2),
                    entry("ns", "c", "3", 3),
                ],
            ),
            (
                // nesting unwinds correctly on both sides
                "outer {\n inner {\n x = 1;\n }\n y = 2;\n}\nz = 3;\n",
                vec![
                    entry("ns|outer|inner", "x", "1", 3),
                    entry("ns|outer", "y", "2", 5),
                    entry("ns", "z", "3", 7),
                ],
            ),
            (
                "a { x = 1; }\nb { x = 2; }\n",
                vec![entry("ns|a", "x", "1", 1), entry("ns|b", "x", "2", 2)],
            ),
        ] {
            let msg = || format!("input \"{input}\" failed");
            assert_eq_as_result!(parse(input, "ns").with_context(msg)?, expected)
                .map_err(|e| anyhow!(e))
                .with_context(msg)?;
        }
        Ok(())
    }

    #[test]
    fn comments_and_whitespace() {
        let entries = parse(
            "# leading comment\n  a   =\t1pad\"med\" ;  # trailing\n# k = ignored;\nb=2;\n",
            "ns",
        )
        .unwrap();
        // the quoted token replaced the unquoted one before the commit
        assert_eq!(
            entries,
            vec![entry("ns", "a", "med", 2), entry("ns", "b", "2", 4)]
        );
    }

    #[test]
    fn quoting_and_escapes() -> Result<()> {
        for (input, expected) in [
            (r#"k = "a\"b";"#, vec![entry("ns", "k", "a\"b", 1)]),
            (r#"k = "a\\b";"#, vec![entry("ns", "k", r"a\b", 1)]),
            (r"k = a\;b;", vec![entry("ns", "k", "a;b", 1)]),
            (
                "k = \"two\nlines\";",
                vec![entry("ns", "k", "two\nlines", 2)],
            ),
            (
                r#""spaced name" { k = "v w"; }"#,
                vec![entry("ns|spaced name", "k", "v w", 1)],
            ),
        ] {
            let msg = || format!("input \"{input}\" failed");
            assert_eq_as_result!(parse(input, "ns").with_context(msg)?, expected)
                .map_err(|e| anyhow!(e))
                .with_context(msg)?;
        }
        Ok(())
    }

    #[test]
    fn block_terminators() {
        // `};` is accepted; the semicolon is part of the block close
        let entries = parse("a { k = 1; };\nb = 2;\n", "ns").unwrap();
        assert_eq!(
            entries,
            vec![entry("ns|a", "k", "1", 1), entry("ns", "b", "2", 2)]
        );
    }

    #[test]
    fn multiple_keys_last_wins() {
        let entries = parse("a = b = v;\n", "ns").unwrap();
        assert_eq!(entries, vec![entry("ns", "b", "v", 1)]);
    }

    #[test]
    fn unmatched_close_is_tolerated() {
        let entries = parse("a { k = 1; } }\nb = 2;\n", "ns").unwrap();
        assert_eq!(
            entries,
            vec![entry("ns|a", "k", "1", 1), entry("ns", "b", "2", 2)]
        );
    }

    #[test]
    fn incomplete_trailing_entry_is_dropped() {
        let entries = parse("a = 1;\nb = 2\n", "ns").unwrap();
        assert_eq!(entries, vec![entry("ns", "a", "1", 1)]);
    }

    #[test]
    fn parse_errors() -> Result<()> {
        for (input, expected_msg) in [
            (r#"k = "oops;"#, "end of file looking for closing '\"'"),
            ("k = v", "unexpected end of file"),
            ("a = 1; ;", "missing key"),
            ("} ;", "missing key"), // the `};` shorthand does not allow a gap
            ("{ k = 1; }", "block with no name"),
            ("= v;", "'=' with no key"),
        ] {
            let err = parse(input, "ns").unwrap_err();
            assert_contains_as_result!(err.root_cause().to_string(), expected_msg)
                .map_err(|e| anyhow!(e))
                .with_context(|| format!("input \"{input}\" failed"))?;
        }
        Ok(())
    }

    #[test]
    fn unterminated_quote_yields_no_entries() {
        // the error propagates; no partial store escapes
        let result = parse("a = 1;\nb = \"unfinished\n", "ns");
        assert!(result.is_err());
    }

    #[test]
    fn empty_root_namespace() {
        let entries = parse("k = v;\n", "").unwrap();
        assert_eq!(entries, vec![entry("", "k", "v", 1)]);
    }

    #[test]
    fn line_numbers_follow_embedded_newlines() {
        let entries = parse("a = \"1\n2\n3\";\nb = 4;\n", "ns").unwrap();
        assert_eq!(
            entries,
            vec![entry("ns", "a", "1\n2\n3", 3), entry("ns", "b", "4", 4)]
        );
    }

    #[test]
    fn read_real_file() {
        let (path, _dir) = make_test_tempfile(
            r#"
            server-options {
                ".*\\.example\\.com$" {
                    whois-server = whois.example.com;
                }
            }
            "#,
            "test.conf",
        );
        let store = Parser::for_path(path, "ns").unwrap().parse().unwrap();
        assert_eq!(
            store.entries(),
            vec![entry(
                r"ns|server-options|.*\.example\.com$",
                "whois-server",
                "whois.example.com",
                4
            )]
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Parser::for_path(dir.path().join("nonexistent.conf"), "ns").unwrap_err();
        assert_contains!(err.to_string(), "opening");
    }
}
