//! Striped key locks that serialize conflicting resolutions.
//!
//! A resolution holds the stripes for its blocking key and each of its
//! identifiers from candidate search until the entity is written. Two
//! requests that could match each other therefore never both see "no
//! candidates" and both create.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Fixed table of mutex stripes addressed by key hash.
#[derive(Debug)]
pub struct KeyLocks {
    stripes: Vec<Mutex<()>>,
}

/// Held stripes; released on drop.
#[derive(Debug)]
#[must_use = "the stripes are released as soon as the guard is dropped"]
pub struct KeyGuard<'a> {
    stripes: Vec<usize>,
    _guards: Vec<MutexGuard<'a, ()>>,
}

impl KeyGuard<'_> {
    /// Stripe indices held, ascending.
    #[must_use]
    pub fn stripes(&self) -> &[usize] {
        &self.stripes
    }
}

impl KeyLocks {
    /// Creates a table with `stripes` locks (at least one).
    #[must_use]
    pub fn new(stripes: usize) -> Self {
        Self {
            stripes: (0..stripes.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Number of stripes.
    #[must_use]
    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    /// Stripe index for a key; stable across processes and runs.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn stripe_of(&self, key: &str) -> usize {
        let hash = blake3::hash(key.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&hash.as_bytes()[..8]);
        (u64::from_le_bytes(prefix) % self.stripes.len() as u64) as usize
    }

    /// Locks every stripe the keys map to, in ascending stripe order.
    ///
    /// Acquiring in a global order keeps two overlapping key sets from
    /// deadlocking. A poisoned stripe guards no data and is simply reused.
    pub fn acquire<I, S>(&self, keys: I) -> KeyGuard<'_>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let stripes: BTreeSet<usize> = keys
            .into_iter()
            .map(|k| self.stripe_of(k.as_ref()))
            .collect();

        let guards = stripes
            .iter()
            .map(|&i| self.stripes[i].lock().unwrap_or_else(PoisonError::into_inner))
            .collect();

        KeyGuard {
            stripes: stripes.into_iter().collect(),
            _guards: guards,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn stripe_of_is_stable_and_in_range() {
        let locks = KeyLocks::new(16);
        let a = locks.stripe_of("id:person:ssn=123");
        assert_eq!(a, locks.stripe_of("id:person:ssn=123"));
        assert!(a < 16);
        assert_eq!(KeyLocks::new(0).stripe_count(), 1);
    }

    #[test]
    fn duplicate_keys_lock_one_stripe() {
        let locks = KeyLocks::new(8);
        let guard = locks.acquire(["k", "k", "k"]);
        assert_eq!(guard.stripes().len(), 1);
    }

    #[test]
    fn stripes_are_sorted() {
        let locks = KeyLocks::new(64);
        let keys: Vec<String> = (0..20).map(|i| format!("key-{i}")).collect();
        let guard = locks.acquire(&keys);
        assert!(guard.stripes().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn same_key_is_mutually_exclusive() {
        let locks = Arc::new(KeyLocks::new(4));
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_seen = Arc::clone(&max_seen);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let _g = locks.acquire(["block:person:jan"]);
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn overlapping_key_sets_do_not_deadlock() {
        let locks = Arc::new(KeyLocks::new(32));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let locks = Arc::clone(&locks);
                thread::spawn(move || {
                    for i in 0..200 {
                        let keys = if (t + i) % 2 == 0 { ["a", "b", "c"] } else { ["c", "b", "a"] };
                        let _g = locks.acquire(keys);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }
}
