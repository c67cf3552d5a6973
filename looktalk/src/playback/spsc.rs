//! Lock-free single-producer single-consumer ring of owned items.
//!
//! The slot array is allocated once at construction, so the depth is a
//! runtime value taken from the startup config.
//!
//! # Safety Contract
//!
//! - At most ONE context at a time calls [`push()`](SpscRing::push).
//! - At most ONE context at a time calls [`pop()`](SpscRing::pop).
//! - The two sides may run concurrently on different cores.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Lamport queue with `capacity + 1` slots; one slot stays empty so that
/// `head == tail` always means empty.
pub struct SpscRing<T> {
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    /// Next slot to fill. Advanced only by the producer.
    head: AtomicUsize,
    /// Next slot to drain. Advanced only by the consumer.
    tail: AtomicUsize,
}

// SAFETY: items move between contexts, hence `T: Send`. Each index is
// written by exactly one side, and the Release store of an index publishes
// the slot contents to the Acquire load on the other side.
unsafe impl<T: Send> Sync for SpscRing<T> {}
unsafe impl<T: Send> Send for SpscRing<T> {}

impl<T> SpscRing<T> {
    /// Ring holding up to `capacity` items. A zero capacity is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let slots: Vec<UnsafeCell<MaybeUninit<T>>> = (0..capacity.max(1) + 1)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect();
        SpscRing {
            slots: slots.into_boxed_slice(),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    fn wrap(&self, index: usize) -> usize {
        (index + 1) % self.slots.len()
    }

    /// Producer side. Hands the item back if the ring is full.
    pub fn push(&self, item: T) -> Result<(), T> {
        let head = self.head.load(Ordering::Relaxed);
        let next = self.wrap(head);
        if next == self.tail.load(Ordering::Acquire) {
            return Err(item);
        }
        // SAFETY: only the producer writes at `head`, and `next != tail`
        // means the consumer is not reading this slot.
        unsafe {
            (*self.slots[head].get()).write(item);
        }
        self.head.store(next, Ordering::Release);
        Ok(())
    }

    /// Consumer side.
    pub fn pop(&self) -> Option<T> {
        let tail = self.tail.load(Ordering::Relaxed);
        if tail == self.head.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: only the consumer reads at `tail`, and `tail != head`
        // means the producer has published this slot.
        let item = unsafe { (*self.slots[tail].get()).assume_init_read() };
        self.tail.store(self.wrap(tail), Ordering::Release);
        Some(item)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len() - 1
    }

    pub fn len(&self) -> usize {
        let n = self.slots.len();
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        (head + n - tail) % n
    }

    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    pub fn is_full(&self) -> bool {
        self.wrap(self.head.load(Ordering::Acquire)) == self.tail.load(Ordering::Acquire)
    }
}

impl<T> Drop for SpscRing<T> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::sync::Arc;

    #[test]
    fn fills_to_capacity() {
        let q = SpscRing::with_capacity(3);
        assert_eq!(q.capacity(), 3);
        q.push(1).unwrap();
        q.push(2).unwrap();
        q.push(3).unwrap();
        assert!(q.is_full());
        assert_eq!(q.push(4), Err(4));
        assert_eq!(q.len(), 3);
        assert_eq!(q.pop(), Some(1));
        q.push(4).unwrap();
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(3));
        assert_eq!(q.pop(), Some(4));
        assert!(q.is_empty());
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn zero_capacity_still_holds_one() {
        let q = SpscRing::with_capacity(0);
        assert_eq!(q.capacity(), 1);
        q.push('a').unwrap();
        assert_eq!(q.push('b'), Err('b'));
    }

    #[test]
    fn drop_releases_queued_items() {
        let item = Arc::new(());
        {
            let q = SpscRing::with_capacity(4);
            q.push(Arc::clone(&item)).unwrap();
            q.push(Arc::clone(&item)).unwrap();
            assert_eq!(Arc::strong_count(&item), 3);
        }
        assert_eq!(Arc::strong_count(&item), 1);
    }

    #[test]
    fn cross_thread_order_is_preserved() {
        let q = Arc::new(SpscRing::with_capacity(8));
        let producer = {
            let q = Arc::clone(&q);
            std::thread::spawn(move || {
                for i in 0..10_000u32 {
                    let mut item = i;
                    while let Err(back) = q.push(item) {
                        item = back;
                        std::thread::yield_now();
                    }
                }
            })
        };
        let mut expected = 0u32;
        while expected < 10_000 {
            match q.pop() {
                Some(v) => {
                    assert_eq!(v, expected);
                    expected += 1;
                }
                None => std::thread::yield_now(),
            }
        }
        producer.join().unwrap();
    }
}
