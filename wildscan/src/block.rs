use std::ops::Range;
use std::sync::Arc;

/// Size of the scratch window handed to a buffered reader for one line.
pub const DEFAULT_SUB_BLOCK: usize = 2 * 1024;

/// Byte range of one line inside a block buffer or a shared backing.
pub type LineSpan = Range<usize>;

/// Shared read-only backing for line spans produced by view readers.
///
/// Cloning is an `Arc` bump; the backing stays alive as long as any block
/// still references it, which is what makes span validity structural for the
/// memory-mapped reader.
#[derive(Clone)]
pub struct SharedBytes(Arc<dyn AsRef<[u8]> + Send + Sync>);

impl SharedBytes {
    pub fn new(bytes: impl AsRef<[u8]> + Send + Sync + 'static) -> Self {
        Self(Arc::new(bytes))
    }

    pub fn as_slice(&self) -> &[u8] {
        (*self.0).as_ref()
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

impl std::fmt::Debug for SharedBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedBytes").field("len", &self.len()).finish()
    }
}

/// Reusable container for a bounded batch of line spans plus an optional
/// owned byte buffer backing them.
///
/// A block is in exactly one place at a time: the pool, the producer, a
/// queue, or a consumer. The hand-off protocols move blocks by value, which
/// transfers a few pointer-sized words and never touches buffer contents.
#[derive(Debug)]
pub struct LinesBlock {
    buf: Vec<u8>,
    lines: Vec<LineSpan>,
    shared: Option<SharedBytes>,
    max_lines: usize,
    sub_block: usize,
}

impl LinesBlock {
    pub fn new(max_lines: usize, sub_block: usize, with_buffer: bool) -> Self {
        debug_assert!(max_lines > 0);
        debug_assert!(sub_block > 0);

        let mut block = Self {
            buf: Vec::new(),
            lines: Vec::with_capacity(max_lines),
            shared: None,
            max_lines,
            sub_block,
        };
        if with_buffer {
            block.ensure_buffer();
        }
        block
    }

    /// (Re)sizes the owned buffer to `max_lines * sub_block` bytes, reusing
    /// existing storage when it is already large enough.
    pub fn ensure_buffer(&mut self) {
        self.buf.resize(self.max_lines * self.sub_block, 0);
    }

    pub fn has_buffer(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Clears the line list and detaches any shared backing. Buffer storage
    /// is kept for reuse.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.shared = None;
    }

    pub fn set_shared(&mut self, shared: Option<SharedBytes>) {
        self.shared = shared;
    }

    /// Scratch window for the next line, starting at `offset` into the owned
    /// buffer. Offsets are linear and append-only: each line starts right
    /// after the previous line's end, which keeps the lines of one block on
    /// adjacent cache lines.
    pub fn scratch(&mut self, offset: usize) -> &mut [u8] {
        debug_assert!(offset + self.sub_block <= self.buf.len());
        &mut self.buf[offset..offset + self.sub_block]
    }

    pub fn push_line(&mut self, span: LineSpan) {
        debug_assert!(self.lines.len() < self.max_lines);
        if self.shared.is_none() {
            debug_assert!(span.end <= self.buf.len());
        }
        self.lines.push(span);
    }

    pub fn lines(&self) -> &[LineSpan] {
        &self.lines
    }

    /// Resolves a span against the block's backing storage.
    pub fn line_bytes(&self, span: &LineSpan) -> &[u8] {
        match &self.shared {
            Some(shared) => &shared.as_slice()[span.clone()],
            None => &self.buf[span.clone()],
        }
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    pub fn sub_block(&self) -> usize {
        self.sub_block
    }
}

/// Fixed-size free-list of blocks, allocated once and reused across runs.
///
/// The pool itself is not locked: every strategy hands blocks across threads
/// through its queue primitives, so `alloc`/`free` only run before the
/// worker threads start and after they join.
#[derive(Debug)]
pub struct BlockPool {
    free: Vec<LinesBlock>,
    capacity: usize,
    max_lines: usize,
}

impl BlockPool {
    pub fn new(num_blocks: usize, max_lines: usize, sub_block: usize) -> Self {
        debug_assert!(num_blocks > 0);
        debug_assert!(max_lines > 0);

        let free = (0..num_blocks)
            .map(|_| LinesBlock::new(max_lines, sub_block, false))
            .collect();
        Self {
            free,
            capacity: num_blocks,
            max_lines,
        }
    }

    /// Clears every pooled block's line list and, when `needs_buffer` is
    /// set, (re)allocates its backing buffer. Existing storage is reused.
    /// Blocks still outstanding are untouched; their owner resets them.
    pub fn reset(&mut self, needs_buffer: bool) {
        for block in &mut self.free {
            block.clear();
            if needs_buffer {
                block.ensure_buffer();
            }
        }
    }

    /// Takes a free block out of the pool. The pool is sized so that a
    /// correctly written strategy never sees `None`.
    pub fn alloc(&mut self) -> Option<LinesBlock> {
        self.free.pop()
    }

    pub fn free(&mut self, block: LinesBlock) {
        debug_assert!(self.free.len() < self.capacity);
        self.free.push(block);
    }

    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_buffer_reuse() {
        let mut block = LinesBlock::new(4, 16, true);
        assert_eq!(block.scratch(0).len(), 16);
        let capacity_before = block.buf.capacity();

        block.clear();
        block.ensure_buffer();
        assert_eq!(block.buf.len(), 4 * 16);
        assert_eq!(block.buf.capacity(), capacity_before);
    }

    #[test]
    fn test_block_owned_spans() {
        let mut block = LinesBlock::new(4, 16, true);
        block.scratch(0)[..5].copy_from_slice(b"apple");
        block.push_line(0..5);
        block.scratch(5)[..6].copy_from_slice(b"banana");
        block.push_line(5..11);

        assert_eq!(block.lines().len(), 2);
        assert_eq!(block.line_bytes(&block.lines()[0].clone()), b"apple");
        assert_eq!(block.line_bytes(&block.lines()[1].clone()), b"banana");
    }

    #[test]
    fn test_block_shared_spans() {
        let shared = SharedBytes::new(b"apple\nbanana".to_vec());
        let mut block = LinesBlock::new(4, 16, false);
        block.set_shared(Some(shared));
        block.push_line(0..5);
        block.push_line(6..12);

        assert_eq!(block.line_bytes(&block.lines()[0].clone()), b"apple");
        assert_eq!(block.line_bytes(&block.lines()[1].clone()), b"banana");

        block.clear();
        assert!(block.lines().is_empty());
    }

    #[test]
    fn test_pool_alloc_free_cycle() {
        let mut pool = BlockPool::new(3, 8, 32);
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.capacity(), 3);

        let a = pool.alloc().unwrap();
        let b = pool.alloc().unwrap();
        assert_eq!(pool.len(), 1);

        pool.free(a);
        pool.free(b);
        assert_eq!(pool.len(), 3);

        pool.reset(true);
        let block = pool.alloc().unwrap();
        assert!(block.has_buffer());
        assert!(block.lines().is_empty());
    }

    #[test]
    fn test_pool_exhaustion_returns_none() {
        let mut pool = BlockPool::new(1, 8, 32);
        let block = pool.alloc().unwrap();
        assert!(pool.alloc().is_none());
        pool.free(block);
        assert!(pool.alloc().is_some());
    }

    #[test]
    fn test_pool_reset_without_buffers() {
        let mut pool = BlockPool::new(2, 8, 32);
        pool.reset(false);
        let block = pool.alloc().unwrap();
        assert!(!block.has_buffer());
    }
}
