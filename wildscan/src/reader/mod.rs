//! Line-reading backends behind one contract.
//!
//! A reader either copies lines into caller-supplied scratch memory
//! ([`BufferedReader`]) or returns spans into a shared backing it owns for
//! the whole run ([`MmapReader`]). Strategies only see the
//! [`LineReader`] trait and the [`NextLine`] result.

pub mod buffered;
pub mod mmap;

use std::ops::{Deref, DerefMut};
use std::path::Path;

use crate::block::{LineSpan, SharedBytes};
use crate::errors::ScanResult;

pub use buffered::BufferedReader;
pub use mmap::MmapReader;

/// Outcome of one `read_line` call.
#[derive(Debug, PartialEq, Eq)]
pub enum NextLine {
    /// The line was copied into the caller's scratch slice; holds its length.
    Copied(usize),
    /// The line lives in the reader's shared backing at this span.
    View(LineSpan),
    /// End of stream.
    Eof,
}

/// One-file line source.
///
/// Lines are returned with the trailing `\n` stripped, along with an
/// optional `\r` right before it. A line longer than the scratch window is
/// returned in window-sized pieces.
pub trait LineReader {
    /// Opens `path`. An empty path or an OS-level failure is an error.
    /// Opening an already-open reader is a no-op.
    fn open(&mut self, path: &Path) -> ScanResult<()>;

    /// Closes the underlying file. Idempotent.
    fn close(&mut self);

    /// True when the caller must supply scratch memory for each line.
    fn needs_buffer(&self) -> bool;

    /// Reads the next line. Buffered readers fill `scratch` and return
    /// [`NextLine::Copied`]; view readers ignore `scratch` and return
    /// [`NextLine::View`] spans into [`LineReader::shared`].
    fn read_line(&mut self, scratch: &mut [u8]) -> ScanResult<NextLine>;

    /// Shared backing for [`NextLine::View`] spans, if this reader has one.
    fn shared(&self) -> Option<SharedBytes>;
}

/// RAII open/close for a [`LineReader`]: the file is closed on every exit
/// path out of a strategy's `execute`, including errors.
pub struct ScopedOpen<'a, R: LineReader> {
    reader: &'a mut R,
}

impl<'a, R: LineReader> ScopedOpen<'a, R> {
    pub fn new(reader: &'a mut R, path: &Path) -> ScanResult<Self> {
        reader.open(path)?;
        Ok(Self { reader })
    }
}

impl<R: LineReader> Drop for ScopedOpen<'_, R> {
    fn drop(&mut self) {
        self.reader.close();
    }
}

impl<R: LineReader> Deref for ScopedOpen<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        self.reader
    }
}

impl<R: LineReader> DerefMut for ScopedOpen<'_, R> {
    fn deref_mut(&mut self) -> &mut R {
        self.reader
    }
}
