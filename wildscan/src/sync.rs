use parking_lot::{Condvar, Mutex};

/// Counting semaphore built on a mutex and condition variable.
///
/// `std` has no counting semaphore, and nothing in the queue family needs
/// more than acquire/release plus a reset between runs, so this stays small.
#[derive(Debug)]
pub struct Semaphore {
    permits: Mutex<usize>,
    cv: Condvar,
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            cv: Condvar::new(),
        }
    }

    /// Blocks until a permit is available, then takes it.
    pub fn acquire(&self) {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            self.cv.wait(&mut permits);
        }
        *permits -= 1;
    }

    /// Returns one permit and wakes one waiter.
    pub fn release(&self) {
        let mut permits = self.permits.lock();
        *permits += 1;
        self.cv.notify_one();
    }

    /// Sets the permit count back to `permits`.
    ///
    /// Only valid while no thread is blocked in `acquire`.
    pub fn reset(&self, permits: usize) {
        *self.permits.lock() = permits;
    }

    pub fn available(&self) -> usize {
        *self.permits.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_acquire_release() {
        let sem = Semaphore::new(2);
        sem.acquire();
        sem.acquire();
        assert_eq!(sem.available(), 0);
        sem.release();
        assert_eq!(sem.available(), 1);
    }

    #[test]
    fn test_reset() {
        let sem = Semaphore::new(0);
        sem.reset(3);
        assert_eq!(sem.available(), 3);
    }

    #[test]
    fn test_acquire_blocks_until_release() {
        let sem = Arc::new(Semaphore::new(0));
        let sem2 = Arc::clone(&sem);

        let waiter = thread::spawn(move || {
            sem2.acquire();
            true
        });

        // give the waiter time to park on the empty semaphore
        thread::sleep(Duration::from_millis(50));
        assert!(!waiter.is_finished());

        sem.release();
        assert!(waiter.join().unwrap());
        assert_eq!(sem.available(), 0);
    }
}
