use std::cell::RefCell;

use glob::Pattern;

use crate::errors::{ScanError, ScanResult};
use crate::matcher::WildcardMatch;

thread_local! {
    // compiled form of the last pattern this thread matched against
    static CACHE: RefCell<Option<(String, Pattern)>> = RefCell::new(None);
}

/// Matcher backed by the `glob` crate.
///
/// Plays the role POSIX `fnmatch` played in C: a system-style glob engine to
/// compare the hand-rolled matcher against. Compilation is cached per thread
/// keyed by the last pattern seen, so sharing one instance across consumer
/// threads is safe without any locking.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobPatternMatch;

fn with_compiled<R>(pattern: &str, f: impl FnOnce(&Pattern) -> R) -> R {
    CACHE.with(|cell| {
        let mut cache = cell.borrow_mut();
        if let Some((cached, compiled)) = &*cache {
            if cached == pattern {
                return f(compiled);
            }
        }
        let compiled = Pattern::new(pattern).expect("wildcard pattern validated before use");
        let result = f(&compiled);
        *cache = Some((pattern.to_owned(), compiled));
        result
    })
}

impl WildcardMatch for GlobPatternMatch {
    fn is_match_impl(&self, line: &[u8], pattern: &str) -> bool {
        // glob matches str, so non-UTF-8 bytes go through a lossy view
        let text = String::from_utf8_lossy(line);
        with_compiled(pattern, |compiled| compiled.matches(&text))
    }

    fn validate(&self, pattern: &str) -> ScanResult<()> {
        Pattern::new(pattern)
            .map(|_| ())
            .map_err(|e| ScanError::invalid_pattern(format!("{pattern}: {e}")))
    }
}
