// Lock-free SPSC queue implementation
//
// Single-producer single-consumer queue used to move messages between the
// engine's pipeline stages without locks. Atomic operations use carefully
// chosen memory orderings to ensure correctness while minimizing
// synchronization overhead.

use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A lock-free single-producer single-consumer (SPSC) queue.
///
/// This queue is designed for scenarios where one thread produces data
/// and another thread consumes it, such as handing messages from a
/// router thread to a per-shard processor thread.
///
/// # Type Parameters
/// - `T`: The type of elements stored in the queue
/// - `N`: The capacity of the queue (must be a power of 2)
///
/// # Memory Ordering
/// - Producer uses Release ordering when updating tail
/// - Consumer uses Acquire ordering when reading tail
/// - Consumer uses Release ordering when updating head
/// - Producer uses Acquire ordering when reading head
///
/// # Safety
/// - Only one thread may call `push` (the producer)
/// - Only one thread may call `pop`/`pop_batch` (the consumer)
/// - Multiple readers of `len`, `is_empty`, `is_full`, `capacity` are safe
pub struct LFQueue<T, const N: usize> {
    /// The storage buffer using UnsafeCell for interior mutability.
    /// MaybeUninit is used because slots may be uninitialized.
    buffer: UnsafeCell<[MaybeUninit<T>; N]>,

    /// Tail index where the producer writes next. Cache-line padded and
    /// separated from `head` to prevent false sharing between the two
    /// threads.
    tail: CachePadded<AtomicUsize>,

    /// Head index where the consumer reads next.
    head: CachePadded<AtomicUsize>,
}

// SAFETY: LFQueue is Send if T is Send because we transfer ownership
// of T values between threads through the queue.
unsafe impl<T: Send, const N: usize> Send for LFQueue<T, N> {}

// SAFETY: LFQueue is Sync if T is Send because:
// - Only one thread writes to tail (producer)
// - Only one thread writes to head (consumer)
// - The atomic operations provide the necessary synchronization
unsafe impl<T: Send, const N: usize> Sync for LFQueue<T, N> {}

impl<T, const N: usize> LFQueue<T, N> {
    /// The mask used for efficient modulo operation (N - 1).
    const MASK: usize = N - 1;

    /// Creates a new empty queue.
    ///
    /// # Panics
    /// Panics if N is not a power of 2 or if N is 0.
    pub fn new() -> Self {
        assert!(N > 0 && N.is_power_of_two(), "Capacity must be a power of 2");

        Self {
            // SAFETY: MaybeUninit doesn't require initialization
            buffer: UnsafeCell::new(unsafe {
                MaybeUninit::<[MaybeUninit<T>; N]>::uninit().assume_init()
            }),
            tail: CachePadded::new(AtomicUsize::new(0)),
            head: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Attempts to push an item onto the queue.
    ///
    /// # Safety
    /// This method must only be called from the producer thread.
    #[inline]
    pub fn push(&self, item: T) -> Result<(), T> {
        // Load current tail with Relaxed ordering - only we modify it
        let tail = self.tail.load(Ordering::Relaxed);

        // Load head with Acquire ordering to synchronize with consumer's Release
        let head = self.head.load(Ordering::Acquire);

        if tail.wrapping_sub(head) >= N {
            return Err(item);
        }

        let index = tail & Self::MASK;

        // SAFETY: slot at `index` is not owned by the consumer because
        // tail - head < N, so it is either free or already ours to write.
        unsafe {
            let buffer = &mut *self.buffer.get();
            buffer[index].write(item);
        }

        self.tail.store(tail.wrapping_add(1), Ordering::Release);

        Ok(())
    }

    /// Attempts to pop an item from the queue.
    ///
    /// # Safety
    /// This method must only be called from the consumer thread.
    #[inline]
    pub fn pop(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);

        if head == tail {
            return None;
        }

        let index = head & Self::MASK;

        // SAFETY: the producer has already released this slot (tail > head)
        // and won't overwrite it until we release the new head.
        let item = unsafe {
            let buffer = &*self.buffer.get();
            buffer[index].assume_init_read()
        };

        self.head.store(head.wrapping_add(1), Ordering::Release);

        Some(item)
    }

    /// Pops up to `max` items into `out`, returning how many were popped.
    ///
    /// Draining in a batch amortizes the Acquire load of `tail` across
    /// several items instead of paying it once per element.
    ///
    /// # Safety
    /// This method must only be called from the consumer thread.
    pub fn pop_batch(&self, out: &mut Vec<T>, max: usize) -> usize {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);

        let available = tail.wrapping_sub(head);
        let count = available.min(max);

        for i in 0..count {
            let index = (head.wrapping_add(i)) & Self::MASK;
            // SAFETY: same reasoning as `pop`, extended to a contiguous run
            // of `count` slots already released by the producer.
            let item = unsafe {
                let buffer = &*self.buffer.get();
                buffer[index].assume_init_read()
            };
            out.push(item);
        }

        if count > 0 {
            self.head.store(head.wrapping_add(count), Ordering::Release);
        }

        count
    }

    /// Returns the current number of items in the queue.
    ///
    /// Note: This is an approximation in a concurrent context as the
    /// value may change immediately after reading.
    #[inline]
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Relaxed);
        tail.wrapping_sub(head)
    }

    /// Returns true if the queue is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the queue is full.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() >= N
    }

    /// Returns the capacity of the queue.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<T, const N: usize> Default for LFQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Drop for LFQueue<T, N> {
    fn drop(&mut self) {
        // Drop any remaining items in the queue
        while self.pop().is_some() {}
    }
}
