use std::cell::RefCell;

use regex::bytes::Regex;

use crate::errors::{ScanError, ScanResult};
use crate::matcher::WildcardMatch;

thread_local! {
    // compiled form of the last pattern this thread matched against
    static CACHE: RefCell<Option<(String, Regex)>> = RefCell::new(None);
}

/// Matcher that translates the wildcard pattern into an anchored regex.
///
/// Translation escapes every literal, so the resulting expression always
/// compiles; `validate` still surfaces engine limits (pattern size) as an
/// `InvalidPattern` error. The compiled regex is cached per thread keyed by
/// the last pattern seen, which keeps a shared instance safe across
/// consumer threads.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexMatch;

/// `*` becomes `.*`, `?` becomes `.`, everything else is escaped. The
/// expression is anchored and compiled with Unicode off so `.` matches any
/// single byte of a non-UTF-8 line.
fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push_str("(?s-u)^");

    let mut literal = String::new();
    for ch in pattern.chars() {
        match ch {
            '*' | '?' => {
                if !literal.is_empty() {
                    out.push_str(&regex::escape(&literal));
                    literal.clear();
                }
                out.push_str(if ch == '*' { ".*" } else { "." });
            }
            other => literal.push(other),
        }
    }
    if !literal.is_empty() {
        out.push_str(&regex::escape(&literal));
    }

    out.push('$');
    out
}

fn with_compiled<R>(pattern: &str, f: impl FnOnce(&Regex) -> R) -> R {
    CACHE.with(|cell| {
        let mut cache = cell.borrow_mut();
        if let Some((cached, compiled)) = &*cache {
            if cached == pattern {
                return f(compiled);
            }
        }
        let compiled =
            Regex::new(&wildcard_to_regex(pattern)).expect("wildcard pattern validated before use");
        let result = f(&compiled);
        *cache = Some((pattern.to_owned(), compiled));
        result
    })
}

impl WildcardMatch for RegexMatch {
    fn is_match_impl(&self, line: &[u8], pattern: &str) -> bool {
        with_compiled(pattern, |compiled| compiled.is_match(line))
    }

    fn validate(&self, pattern: &str) -> ScanResult<()> {
        Regex::new(&wildcard_to_regex(pattern))
            .map(|_| ())
            .map_err(|e| ScanError::invalid_pattern(format!("{pattern}: {e}")))
    }
}
