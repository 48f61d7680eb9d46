use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::block::SharedBytes;
use crate::errors::{open_error, ScanError, ScanResult};
use crate::reader::{LineReader, NextLine};

const BUFFER_CAPACITY: usize = 65536;

/// Buffered file reader that copies each line into the caller's scratch
/// window.
#[derive(Debug, Default)]
pub struct BufferedReader {
    inner: Option<BufReader<File>>,
}

impl BufferedReader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LineReader for BufferedReader {
    fn open(&mut self, path: &Path) -> ScanResult<()> {
        if path.as_os_str().is_empty() {
            return Err(ScanError::config_error("input file name is empty"));
        }
        if self.inner.is_some() {
            return Ok(());
        }

        let file = File::open(path).map_err(|e| open_error(e, path))?;
        self.inner = Some(BufReader::with_capacity(BUFFER_CAPACITY, file));
        Ok(())
    }

    fn close(&mut self) {
        self.inner = None;
    }

    fn needs_buffer(&self) -> bool {
        true
    }

    fn read_line(&mut self, scratch: &mut [u8]) -> ScanResult<NextLine> {
        let reader = self.inner.as_mut().expect("read_line before open");
        let mut written = 0;

        loop {
            let available = reader.fill_buf().map_err(ScanError::IoError)?;
            if available.is_empty() {
                // end of stream; an unterminated final line keeps its bytes
                return if written == 0 {
                    Ok(NextLine::Eof)
                } else {
                    Ok(NextLine::Copied(written))
                };
            }

            let space = scratch.len() - written;
            if space == 0 {
                // over-long line: hand back a window-sized piece, the rest
                // becomes the next line
                return Ok(NextLine::Copied(written));
            }

            match available.iter().position(|&b| b == b'\n') {
                Some(newline) => {
                    let take = newline.min(space);
                    scratch[written..written + take].copy_from_slice(&available[..take]);
                    written += take;
                    if take < newline {
                        reader.consume(take);
                        return Ok(NextLine::Copied(written));
                    }
                    reader.consume(newline + 1);
                    if written > 0 && scratch[written - 1] == b'\r' {
                        written -= 1;
                    }
                    return Ok(NextLine::Copied(written));
                }
                None => {
                    let take = available.len().min(space);
                    scratch[written..written + take].copy_from_slice(&available[..take]);
                    written += take;
                    reader.consume(take);
                }
            }
        }
    }

    fn shared(&self) -> Option<SharedBytes> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn reader_for(contents: &[u8]) -> (BufferedReader, NamedTempFile) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        let mut reader = BufferedReader::new();
        reader.open(file.path()).unwrap();
        (reader, file)
    }

    fn collect_lines(reader: &mut BufferedReader, window: usize) -> Vec<Vec<u8>> {
        let mut scratch = vec![0u8; window];
        let mut out = Vec::new();
        loop {
            match reader.read_line(&mut scratch).unwrap() {
                NextLine::Copied(len) => out.push(scratch[..len].to_vec()),
                NextLine::View(_) => unreachable!("buffered reader returned a view"),
                NextLine::Eof => return out,
            }
        }
    }

    #[test]
    fn test_reads_lines_and_strips_newlines() {
        let (mut reader, _file) = reader_for(b"apple\nbanana\napricot\n");
        let lines = collect_lines(&mut reader, 64);
        assert_eq!(lines, vec![b"apple".to_vec(), b"banana".to_vec(), b"apricot".to_vec()]);
    }

    #[test]
    fn test_strips_carriage_return() {
        let (mut reader, _file) = reader_for(b"one\r\ntwo\r\n");
        let lines = collect_lines(&mut reader, 64);
        assert_eq!(lines, vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[test]
    fn test_last_line_without_newline() {
        let (mut reader, _file) = reader_for(b"one\ntwo");
        let lines = collect_lines(&mut reader, 64);
        assert_eq!(lines, vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[test]
    fn test_empty_lines_count() {
        let (mut reader, _file) = reader_for(b"\n\nx\n");
        let lines = collect_lines(&mut reader, 64);
        assert_eq!(lines, vec![b"".to_vec(), b"".to_vec(), b"x".to_vec()]);
    }

    #[test]
    fn test_empty_file() {
        let (mut reader, _file) = reader_for(b"");
        let lines = collect_lines(&mut reader, 64);
        assert!(lines.is_empty());
    }

    #[test]
    fn test_long_line_is_split_at_window_size() {
        let (mut reader, _file) = reader_for(b"abcdefgh\nxy\n");
        let lines = collect_lines(&mut reader, 3);
        assert_eq!(
            lines,
            vec![
                b"abc".to_vec(),
                b"def".to_vec(),
                b"gh".to_vec(),
                b"xy".to_vec()
            ]
        );
    }

    #[test]
    fn test_open_empty_path_is_config_error() {
        let mut reader = BufferedReader::new();
        let err = reader.open(Path::new("")).unwrap_err();
        assert!(matches!(err, ScanError::ConfigError(_)));
    }

    #[test]
    fn test_open_missing_file_maps_to_not_found() {
        let mut reader = BufferedReader::new();
        let err = reader.open(Path::new("no/such/file.txt")).unwrap_err();
        assert!(matches!(err, ScanError::FileNotFound(_)));
    }

    #[test]
    fn test_reopen_is_a_no_op() {
        let (mut reader, file) = reader_for(b"one\n");
        reader.open(file.path()).unwrap();
        let lines = collect_lines(&mut reader, 64);
        assert_eq!(lines.len(), 1);
    }
}
