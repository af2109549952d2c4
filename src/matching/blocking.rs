//! Blocking keys and the shared blocking index.

use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};

use crate::entity::EntityId;

/// First `size` characters of a standardized name.
#[must_use]
pub fn blocking_key(standardized_name: &str, size: usize) -> String {
    standardized_name.chars().take(size).collect::<String>().to_lowercase()
}

/// Two keys share a block when identical or, at equal length, when they
/// differ in at most one position.
#[must_use]
pub fn shares_block(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }

    let (a, b): (Vec<char>, Vec<char>) = (a.chars().collect(), b.chars().collect());
    a.len() == b.len() && a.iter().zip(&b).filter(|(x, y)| x != y).count() <= 1
}

/// Keeps the items whose key shares a block with `query_key`.
///
/// When that would leave fewer than 10% of the pool, the whole pool is
/// returned unchanged.
pub fn apply_blocking<T>(query_key: &str, pool: Vec<T>, key_of: impl Fn(&T) -> String) -> Vec<T> {
    if query_key.is_empty() {
        return pool;
    }

    let total = pool.len();
    let (kept, dropped): (Vec<T>, Vec<T>) = pool
        .into_iter()
        .partition(|item| shares_block(query_key, &key_of(item)));

    if kept.len() * 10 < total {
        tracing::debug!(kept = kept.len(), total, "blocking bypassed");
        let mut all = kept;
        all.extend(dropped);
        return all;
    }
    kept
}

/// Keys under which one entity is indexed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexKeys {
    /// Blocking key of the standardized name.
    pub name_key: String,
    /// Standardized phone; empty when absent.
    pub phone: String,
    /// Standardized email; empty when absent.
    pub email: String,
}

#[derive(Debug, Default)]
struct IndexState {
    by_name: HashMap<String, BTreeSet<EntityId>>,
    by_phone: HashMap<String, BTreeSet<EntityId>>,
    by_email: HashMap<String, BTreeSet<EntityId>>,
    keys: HashMap<EntityId, IndexKeys>,
}

fn add(map: &mut HashMap<String, BTreeSet<EntityId>>, key: &str, id: EntityId) {
    if !key.is_empty() {
        map.entry(key.to_string()).or_default().insert(id);
    }
}

fn remove(map: &mut HashMap<String, BTreeSet<EntityId>>, key: &str, id: EntityId) {
    if let Some(set) = map.get_mut(key) {
        set.remove(&id);
        if set.is_empty() {
            map.remove(key);
        }
    }
}

/// Name-block, phone and email index over known entities.
///
/// One lock guards all three maps; every operation leaves them consistent,
/// so a poisoned lock is recovered rather than propagated.
#[derive(Debug, Default)]
pub struct BlockingIndex {
    state: RwLock<IndexState>,
}

impl BlockingIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes `id`, replacing whatever keys it was indexed under before.
    pub fn upsert(&self, id: EntityId, keys: IndexKeys) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(old) = state.keys.remove(&id) {
            remove(&mut state.by_name, &old.name_key, id);
            remove(&mut state.by_phone, &old.phone, id);
            remove(&mut state.by_email, &old.email, id);
        }

        add(&mut state.by_name, &keys.name_key, id);
        add(&mut state.by_phone, &keys.phone, id);
        add(&mut state.by_email, &keys.email, id);
        state.keys.insert(id, keys);
    }

    /// IDs sharing a name block, the exact phone or the exact email.
    #[must_use]
    pub fn lookup(&self, keys: &IndexKeys) -> BTreeSet<EntityId> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut out = BTreeSet::new();

        if !keys.name_key.is_empty() {
            for (key, ids) in &state.by_name {
                if shares_block(&keys.name_key, key) {
                    out.extend(ids.iter().copied());
                }
            }
        }
        if let Some(ids) = state.by_phone.get(&keys.phone) {
            out.extend(ids.iter().copied());
        }
        if let Some(ids) = state.by_email.get(&keys.email) {
            out.extend(ids.iter().copied());
        }

        out
    }

    /// Number of indexed entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().unwrap_or_else(PoisonError::into_inner).keys.len()
    }

    /// Returns true when nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn keys(name: &str, phone: &str, email: &str) -> IndexKeys {
        IndexKeys {
            name_key: name.to_string(),
            phone: phone.to_string(),
            email: email.to_string(),
        }
    }

    #[test]
    fn test_blocking_key() {
        assert_eq!(blocking_key("acme corp", 3), "acm");
        assert_eq!(blocking_key("jo", 3), "jo");
        assert_eq!(blocking_key("", 3), "");
    }

    #[test]
    fn test_shares_block_tolerance() {
        assert!(shares_block("jon", "jon"));
        assert!(shares_block("jon", "jan"));
        assert!(!shares_block("jon", "jam"));
        assert!(!shares_block("jo", "jon"));
        assert!(!shares_block("", ""));
    }

    #[test]
    fn test_apply_blocking_filters() {
        let pool = vec!["acm", "acn", "xyz", "acm"];
        let kept = apply_blocking("acm", pool, |k| (*k).to_string());
        assert_eq!(kept, vec!["acm", "acn", "acm"]);
    }

    #[test]
    fn test_apply_blocking_bypass_under_ten_percent() {
        let mut pool: Vec<&str> = vec!["zzz"; 19];
        pool.push("acm");
        // 1 of 20 is 5%, so the full pool is scored.
        assert_eq!(apply_blocking("acm", pool, |k| (*k).to_string()).len(), 20);

        let mut pool: Vec<&str> = vec!["zzz"; 9];
        pool.push("acm");
        // 1 of 10 is exactly 10%: blocking applies.
        assert_eq!(apply_blocking("acm", pool, |k| (*k).to_string()), vec!["acm"]);
    }

    #[test]
    fn test_index_lookup_by_each_key() {
        let index = BlockingIndex::new();
        let a = EntityId::new();
        let b = EntityId::new();
        index.upsert(a, keys("jon", "+1 (555) 123-4567", ""));
        index.upsert(b, keys("xyz", "", "b@x.com"));

        assert!(index.lookup(&keys("jan", "", "")).contains(&a));
        assert!(index.lookup(&keys("", "+1 (555) 123-4567", "")).contains(&a));
        let by_email = index.lookup(&keys("", "", "b@x.com"));
        assert_eq!(by_email.len(), 1);
        assert!(by_email.contains(&b));
        assert!(index.lookup(&keys("", "", "")).is_empty());
    }

    #[test]
    fn test_upsert_replaces_stale_keys() {
        let index = BlockingIndex::new();
        let id = EntityId::new();
        index.upsert(id, keys("old", "", "old@x.com"));
        index.upsert(id, keys("new", "", "new@x.com"));

        assert_eq!(index.len(), 1);
        assert!(index.lookup(&keys("", "", "old@x.com")).is_empty());
        assert!(index.lookup(&keys("new", "", "")).contains(&id));
    }

    #[test]
    fn test_concurrent_upserts() {
        let index = Arc::new(BlockingIndex::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let index = Arc::clone(&index);
                thread::spawn(move || {
                    for _ in 0..50 {
                        index.upsert(EntityId::new(), keys("abc", "", ""));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(index.len(), 400);
        assert_eq!(index.lookup(&keys("abc", "", "")).len(), 400);
    }
}
