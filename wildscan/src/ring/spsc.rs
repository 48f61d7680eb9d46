use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

/// Wait-free bounded ring for exactly one producer thread and exactly one
/// consumer thread.
///
/// A ring with capacity C is stored as C+1 slots so that full and empty can
/// be told apart by cursor comparison alone, with no shared size counter.
/// `push` and `pop` never block; callers spin or yield on failure. The two
/// cursors live on separate cache lines so the producer and consumer do not
/// invalidate each other's line on every operation.
pub struct SpscRing<T> {
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    /// Next slot to read. Written only by the consumer.
    head: CachePadded<AtomicUsize>,
    /// Next slot to write. Written only by the producer.
    tail: CachePadded<AtomicUsize>,
}

// The ring hands each value from one thread to exactly one other thread.
unsafe impl<T: Send> Sync for SpscRing<T> {}

impl<T> SpscRing<T> {
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0);
        let slots = (0..capacity + 1)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect();
        Self {
            slots,
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len() - 1
    }

    /// Producer side. Returns the value back when the ring is full.
    pub fn push(&self, value: T) -> Result<(), T> {
        let tail = self.tail.load(Ordering::Relaxed);
        let next = self.advance(tail);
        if next == self.head.load(Ordering::Acquire) {
            return Err(value); // full
        }
        // SAFETY: `tail` is owned by the single producer and the slot at
        // `tail` is outside the consumer's visible range until the store
        // below publishes it.
        unsafe { (*self.slots[tail].get()).write(value) };
        self.tail.store(next, Ordering::Release);
        Ok(())
    }

    /// Consumer side. Returns `None` when the ring is empty.
    pub fn pop(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        if head == self.tail.load(Ordering::Acquire) {
            return None; // empty
        }
        // SAFETY: the acquire load above proves the producer initialized the
        // slot at `head`, and only the single consumer reads it.
        let value = unsafe { (*self.slots[head].get()).assume_init_read() };
        self.head.store(self.advance(head), Ordering::Release);
        Some(value)
    }

    fn advance(&self, idx: usize) -> usize {
        (idx + 1) % self.slots.len()
    }
}

impl<T> Drop for SpscRing<T> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}
