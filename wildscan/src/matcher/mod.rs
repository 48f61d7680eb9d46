//! Wildcard matchers behind one contract.
//!
//! A pattern is a byte string where `*` matches any run of bytes (including
//! an empty one) and `?` matches exactly one byte. Three implementations
//! exist so the scan strategies can be measured against matchers with very
//! different cost profiles: a hand-rolled backtracking matcher, the `glob`
//! crate, and a glob-to-regex translation.

pub mod backtrack;
pub mod globpat;
pub mod regex;

use crate::errors::ScanResult;

pub use backtrack::BacktrackMatch;
pub use globpat::GlobPatternMatch;
pub use regex::RegexMatch;

/// Wildcard match predicate over raw line bytes.
///
/// The provided `is_match` normalizes the two degenerate cases the same way
/// for every implementation (and the same way `grep` treats them): an empty
/// pattern matches everything, and empty text is matched only by a pattern
/// that is a single `*`.
pub trait WildcardMatch: Send + Sync {
    fn is_match(&self, line: &[u8], pattern: &str) -> bool {
        if pattern.is_empty() {
            return true;
        }
        if line.is_empty() {
            return pattern == "*";
        }
        self.is_match_impl(line, pattern)
    }

    fn is_match_impl(&self, line: &[u8], pattern: &str) -> bool;

    /// Eagerly checks that `pattern` compiles. Implementations that compile
    /// lazily inside `is_match` treat an unvalidated bad pattern as a
    /// programming error, so callers run this once up front.
    fn validate(&self, pattern: &str) -> ScanResult<()> {
        let _ = pattern;
        Ok(())
    }
}
