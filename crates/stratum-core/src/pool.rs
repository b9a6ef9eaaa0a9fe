//! Object pooling for per-request records.
//!
//! A [`Pool`] hands out [`Pooled`] guards. Items are reset when they are
//! acquired and again when the guard drops, so a recycled item never leaks
//! data from the request that used it before.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use stratum_core::pool::{Pool, Recycle};
//!
//! #[derive(Default)]
//! struct Scratch(Vec<u8>);
//!
//! impl Recycle for Scratch {
//!     fn reset(&mut self) {
//!         self.0.clear();
//!     }
//! }
//!
//! let pool = Arc::new(Pool::<Scratch>::new(8));
//! {
//!     let mut item = pool.acquire();
//!     item.0.extend_from_slice(b"hello");
//! }
//! assert_eq!(pool.idle(), 1);
//! assert!(pool.acquire().0.is_empty());
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::Mutex;

/// Default number of idle items a pool retains.
pub const DEFAULT_POOL_CAPACITY: usize = 1024;

/// An item that can be returned to a [`Pool`].
pub trait Recycle: Default + Send + 'static {
    /// Clears all per-use state, keeping allocations where useful.
    fn reset(&mut self);
}

/// A bounded free list of reusable items.
#[derive(Debug)]
pub struct Pool<T: Recycle> {
    idle: Mutex<Vec<T>>,
    capacity: usize,
}

impl<T: Recycle> Pool<T> {
    /// Creates a pool that retains at most `capacity` idle items.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            capacity,
        }
    }

    /// Takes an idle item, or allocates a fresh one.
    pub fn acquire(self: &Arc<Self>) -> Pooled<T> {
        let mut item = self.idle.lock().pop().unwrap_or_default();
        item.reset();
        Pooled {
            item: Some(item),
            pool: Arc::clone(self),
        }
    }

    /// Returns the number of idle items.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }

    fn release(&self, mut item: T) {
        item.reset();
        let mut idle = self.idle.lock();
        if idle.len() < self.capacity {
            idle.push(item);
        }
    }
}

impl<T: Recycle> Default for Pool<T> {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}

/// Exclusive handle to a pooled item; returns it to the pool on drop.
pub struct Pooled<T: Recycle> {
    item: Option<T>,
    pool: Arc<Pool<T>>,
}

impl<T: Recycle> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Only `drop` takes the item.
        self.item.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl<T: Recycle> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl<T: Recycle> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.release(item);
        }
    }
}

impl<T: Recycle + std::fmt::Debug> std::fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Pooled").field(&self.item).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Counter {
        hits: u32,
        resets: u32,
    }

    impl Recycle for Counter {
        fn reset(&mut self) {
            self.hits = 0;
            self.resets += 1;
        }
    }

    #[test]
    fn test_acquire_allocates_when_empty() {
        let pool = Arc::new(Pool::<Counter>::new(4));
        assert_eq!(pool.idle(), 0);
        let item = pool.acquire();
        assert_eq!(item.hits, 0);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_drop_returns_item() {
        let pool = Arc::new(Pool::<Counter>::new(4));
        {
            let mut item = pool.acquire();
            item.hits = 7;
        }
        assert_eq!(pool.idle(), 1);

        let item = pool.acquire();
        assert_eq!(item.hits, 0);
        // reset on first acquire, on release, and on second acquire
        assert_eq!(item.resets, 3);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_capacity_bounds_idle_items() {
        let pool = Arc::new(Pool::<Counter>::new(2));
        let items: Vec<_> = (0..5).map(|_| pool.acquire()).collect();
        drop(items);
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn test_concurrent_use() {
        let pool = Arc::new(Pool::<Counter>::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let mut item = pool.acquire();
                        assert_eq!(item.hits, 0);
                        item.hits += 1;
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(pool.idle() <= 8);
    }
}
