// Exclusive claims over server-side ids shared by concurrent workers
use std::collections::HashSet;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

/// Process-wide claim set. The critical section is test-and-insert only.
#[derive(Debug)]
pub struct ClaimRegistry<K> {
    inner: Arc<Mutex<HashSet<K>>>,
}

impl<K> Clone for ClaimRegistry<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: Eq + Hash + Clone> ClaimRegistry<K> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<K>> {
        // A panicking holder cannot leave the set half-updated
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns false if someone else already holds `id`
    pub fn claim(&self, id: &K) -> bool {
        self.lock().insert(id.clone())
    }

    /// Always succeeds, releasing an unclaimed id is a no-op
    pub fn release(&self, id: &K) {
        self.lock().remove(id);
    }

    pub fn is_claimed(&self, id: &K) -> bool {
        self.lock().contains(id)
    }
}

impl<K: Eq + Hash + Clone> Default for ClaimRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}
