//! Replayable token sources feeding the benchmark.
//!
//! A [`TokenSource`] hands out a fresh token iterator on every call to
//! [`tokens`](TokenSource::tokens), so the same stream can be consumed once
//! per pass. Closures returning any `IntoIterator` of string-like items are
//! sources; [`LogFile`] re-reads a log from disk and yields one IP address
//! per line that contains one.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::error::{Error, Result};

/// Shortest span considered as an address
const MIN_SPAN: usize = 3;

/// Runs of characters that may form an IPv4 or IPv6 address
static IP_CANDIDATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9A-Fa-f:.]{3,}").expect("IP candidate pattern is valid"));

/// Source of a token stream that can be replayed from the start.
pub trait TokenSource {
    type Token: AsRef<str>;
    type Tokens: Iterator<Item = Self::Token>;

    /// Start a new pass over the tokens
    fn tokens(&self) -> Result<Self::Tokens>;
}

impl<F, I> TokenSource for F
where
    F: Fn() -> I,
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    type Token = I::Item;
    type Tokens = I::IntoIter;

    fn tokens(&self) -> Result<Self::Tokens> {
        Ok(self().into_iter())
    }
}

/// Log file yielding the first IP address found on each line.
#[derive(Debug, Clone)]
pub struct LogFile {
    path: PathBuf,
}

impl LogFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenSource for LogFile {
    type Token = String;
    type Tokens = IpTokens<BufReader<File>>;

    fn tokens(&self) -> Result<Self::Tokens> {
        let file = File::open(&self.path).map_err(|source| Error::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(IpTokens::new(BufReader::new(file)))
    }
}

/// Iterator over the IP addresses of a line-oriented reader.
///
/// Lines without an address are skipped. Invalid UTF-8 is replaced rather
/// than rejected. A read error ends the stream.
pub struct IpTokens<R> {
    reader: R,
    line: Vec<u8>,
}

impl<R: BufRead> IpTokens<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
        }
    }
}

impl<R: BufRead> Iterator for IpTokens<R> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            self.line.clear();
            match self.reader.read_until(b'\n', &mut self.line) {
                Ok(0) => return None,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&self.line);
                    if let Some(ip) = extract_ip(line.trim()) {
                        return Some(ip.to_owned());
                    }
                }
                Err(err) => {
                    warn!(%err, "token stream ended on read error");
                    return None;
                }
            }
        }
    }
}

/// Return the first valid IPv4 or IPv6 address found anywhere in `line`.
///
/// A candidate is a span of at least three hex digits, dots and colons that
/// is not glued to a word character or a colon on either side. Within a run
/// of such characters the leftmost start wins, then the longest span; a
/// shorter span is taken when the longest one ends glued, e.g. `10.0.0.1`
/// out of `10.0.0.1.x`.
pub fn extract_ip(line: &str) -> Option<&str> {
    IP_CANDIDATE
        .find_iter(line)
        .flat_map(|run| Spans {
            line,
            start: run.start(),
            end: run.end(),
        })
        .find(|token| token.parse::<IpAddr>().is_ok())
}

/// Non-overlapping candidate spans inside one run of `[0-9A-Fa-f:.]`.
struct Spans<'a> {
    line: &'a str,
    /// Next start position to try
    start: usize,
    /// End of the run
    end: usize,
}

impl<'a> Iterator for Spans<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        // the run is ASCII, so every offset inside it is a char boundary
        while self.start + MIN_SPAN <= self.end {
            let start = self.start;
            if self.line[..start].chars().next_back().is_some_and(is_glue) {
                self.start += 1;
                continue;
            }
            let found = (start + MIN_SPAN..=self.end)
                .rev()
                .find(|&end| !self.line[end..].chars().next().is_some_and(is_glue));
            match found {
                Some(end) => {
                    self.start = end;
                    return Some(&self.line[start..end]);
                }
                None => self.start += 1,
            }
        }
        None
    }
}

#[inline]
fn is_glue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == ':'
}
