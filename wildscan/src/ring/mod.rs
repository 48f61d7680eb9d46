//! Bounded FIFO queue backends with different concurrency contracts.
//!
//! All three rings hold a fixed number of slots chosen at construction and
//! never reallocate. They differ in who synchronizes access:
//!
//! - [`SwapRing`] has no synchronization of its own and is driven under an
//!   external mutex; hand-off is by value swap so buffer contents are never
//!   copied.
//! - [`SpscRing`] is wait-free for exactly one producer and one consumer,
//!   using only atomic cursors.
//! - [`DisruptorRing`] tracks per-consumer read cursors so a slot can be
//!   processed outside the external lock and reclaimed only once every
//!   claiming consumer has committed.

pub mod disruptor;
pub mod spsc;
pub mod swap;

pub use disruptor::{Cursors, DisruptorRing};
pub use spsc::SpscRing;
pub use swap::SwapRing;
