use std::cell::UnsafeCell;

/// Cursor position meaning "this consumer holds no claim".
const NULL_POS: u64 = u64::MAX;

/// Cursor bookkeeping for a single-producer, multi-consumer ring.
///
/// Positions are monotonically increasing `u64`s; a position maps to slot
/// `pos % capacity`. Three cursors move forward:
///
/// - `tail`: next position the producer will write; advanced by
///   `enqueue_commit`, so a prepared-but-uncommitted slot is invisible to
///   consumers.
/// - `fhead`: next unclaimed position; advanced by `dequeue_prepare`.
/// - `head`: reclaim boundary, recomputed on every `dequeue_commit` as the
///   minimum still-claimed position (or `fhead` when nothing is claimed).
///   The producer may reuse slots strictly below `head`.
///
/// The split prepare/commit protocol is what lets a claimed slot be filled
/// or filtered without holding the external lock: the slot is not
/// reclaimable until its claim is committed.
#[derive(Debug)]
pub struct Cursors {
    consumer_heads: Vec<u64>,
    head: u64,
    fhead: u64,
    tail: u64,
    capacity: usize,
}

impl Cursors {
    pub fn new(capacity: usize, max_consumers: usize) -> Self {
        debug_assert!(capacity > 1);
        debug_assert!(max_consumers > 0);
        Self {
            consumer_heads: vec![NULL_POS; max_consumers],
            head: 0,
            fhead: 0,
            tail: 0,
            capacity,
        }
    }

    pub fn reset(&mut self) {
        self.head = 0;
        self.fhead = 0;
        self.tail = 0;
        self.consumer_heads.fill(NULL_POS);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        (self.tail - self.head) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.fhead == self.tail
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity
    }

    /// Claims the next write slot and returns its index. Visible to
    /// consumers only after `enqueue_commit`.
    pub fn enqueue_prepare(&mut self) -> usize {
        assert!(!self.is_full());
        (self.tail % self.capacity as u64) as usize
    }

    pub fn enqueue_commit(&mut self) {
        self.tail += 1;
    }

    /// Claims the next unread slot for `consumer` and returns its index.
    /// The slot stays claimed (and its storage unreclaimable) until
    /// `dequeue_commit`.
    pub fn dequeue_prepare(&mut self, consumer: usize) -> usize {
        assert!(consumer < self.consumer_heads.len());
        assert_eq!(self.consumer_heads[consumer], NULL_POS);
        assert!(!self.is_empty());

        let idx = (self.fhead % self.capacity as u64) as usize;
        self.fhead += 1;
        self.consumer_heads[consumer] = self.fhead;
        idx
    }

    /// Releases `consumer`'s claim and advances the reclaim boundary to the
    /// minimum position any consumer still holds.
    pub fn dequeue_commit(&mut self, consumer: usize) {
        assert!(consumer < self.consumer_heads.len());
        assert_ne!(self.consumer_heads[consumer], NULL_POS);

        self.consumer_heads[consumer] = NULL_POS;
        let min_pos = self.min_consumer_pos();

        debug_assert!(min_pos == NULL_POS || min_pos > self.head);
        self.head = if min_pos == NULL_POS {
            self.fhead
        } else {
            min_pos - 1
        };
    }

    fn min_consumer_pos(&self) -> u64 {
        self.consumer_heads.iter().copied().min().unwrap_or(NULL_POS)
    }
}

/// Slot storage for the disruptor ring.
///
/// The payloads live outside the external mutex so that a claimed slot can
/// be processed while other threads use the queue; exclusivity comes from
/// the `Cursors` protocol, not from a lock around the storage.
pub struct DisruptorRing<T> {
    slots: Box<[UnsafeCell<T>]>,
}

// Each slot is accessed by at most one thread at a time per the cursor
// protocol; values themselves cross threads.
unsafe impl<T: Send> Sync for DisruptorRing<T> {}

impl<T> DisruptorRing<T> {
    pub fn new(slots: Vec<T>) -> Self {
        debug_assert!(slots.len() > 1);
        Self {
            slots: slots.into_iter().map(UnsafeCell::new).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the slot claimed through `Cursors`.
    ///
    /// # Safety
    ///
    /// The caller must hold an uncommitted claim on `idx` (from
    /// `enqueue_prepare` or `dequeue_prepare`), which guarantees no other
    /// thread touches the slot until the matching commit.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn claimed(&self, idx: usize) -> &mut T {
        &mut *self.slots[idx].get()
    }

    /// Applies `f` to every slot. Exclusive access, for between-run resets.
    pub fn apply(&mut self, mut f: impl FnMut(&mut T)) {
        for slot in self.slots.iter_mut() {
            f(slot.get_mut());
        }
    }
}
