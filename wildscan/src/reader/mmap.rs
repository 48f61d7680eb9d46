use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::block::SharedBytes;
use crate::errors::{open_error, ScanError, ScanResult};
use crate::reader::{LineReader, NextLine};

/// Memory-mapped file reader that returns spans into the map instead of
/// copying line bytes.
///
/// The map is held behind [`SharedBytes`], so blocks that still reference it
/// keep it alive even after `close`.
#[derive(Debug, Default)]
pub struct MmapReader {
    map: Option<SharedBytes>,
    pos: usize,
}

impl MmapReader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LineReader for MmapReader {
    fn open(&mut self, path: &Path) -> ScanResult<()> {
        if path.as_os_str().is_empty() {
            return Err(ScanError::config_error("input file name is empty"));
        }
        if self.map.is_some() {
            return Ok(());
        }

        let file = File::open(path).map_err(|e| open_error(e, path))?;
        let len = file.metadata().map_err(ScanError::IoError)?.len();

        // zero-length files cannot be mapped; an empty backing behaves the
        // same to the read loop
        let map = if len == 0 {
            SharedBytes::new(Vec::new())
        } else {
            // SAFETY: the file is opened read-only and mapped privately
            let map = unsafe { Mmap::map(&file) }.map_err(ScanError::IoError)?;
            SharedBytes::new(map)
        };

        self.map = Some(map);
        self.pos = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.map = None;
        self.pos = 0;
    }

    fn needs_buffer(&self) -> bool {
        false
    }

    fn read_line(&mut self, _scratch: &mut [u8]) -> ScanResult<NextLine> {
        let map = self.map.as_ref().expect("read_line before open");
        let bytes = map.as_slice();
        if self.pos >= bytes.len() {
            return Ok(NextLine::Eof);
        }

        let rest = &bytes[self.pos..];
        let (line_len, skip) = match rest.iter().position(|&b| b == b'\n') {
            // a \r is stripped only when a newline follows it
            Some(newline) if newline > 0 && rest[newline - 1] == b'\r' => (newline - 1, newline + 1),
            Some(newline) => (newline, newline + 1),
            None => (rest.len(), rest.len()),
        };

        let span = self.pos..self.pos + line_len;
        self.pos += skip;
        Ok(NextLine::View(span))
    }

    fn shared(&self) -> Option<SharedBytes> {
        self.map.clone()
    }
}
