use crate::*;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Serializable copy of the registry, keyed by poll id
pub type RegistrySnapshot = BTreeMap<String, BTreeSet<VoterToken>>;

/// Per-poll sets of voter tokens that have already voted.
///
/// Pure in-memory state: dropping the registry loses double-vote protection unless the
/// caller persists a snapshot.
#[derive(Default)]
pub struct VoterRegistry {
    used: Mutex<HashMap<String, HashSet<VoterToken>>>,
}

impl VoterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from a snapshot
    pub fn restore(snapshot: RegistrySnapshot) -> Self {
        let used = snapshot
            .into_iter()
            .map(|(poll_id, tokens)| (poll_id, tokens.into_iter().collect()))
            .collect();
        VoterRegistry {
            used: Mutex::new(used),
        }
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.lock()
            .iter()
            .map(|(poll_id, tokens)| (poll_id.clone(), tokens.iter().cloned().collect()))
            .collect()
    }

    pub fn has_voted(&self, poll_id: &str, token: &VoterToken) -> bool {
        self.lock()
            .get(poll_id)
            .map_or(false, |tokens| tokens.contains(token))
    }

    /// Idempotent insert
    pub fn register(&self, poll_id: &str, token: &VoterToken) {
        self.register_if_absent(poll_id, token);
    }

    /// Insert the token, returning false if it was already registered for this poll.
    ///
    /// The check and the insert happen under one lock.
    pub fn register_if_absent(&self, poll_id: &str, token: &VoterToken) -> bool {
        self.lock()
            .entry(poll_id.to_owned())
            .or_default()
            .insert(token.clone())
    }

    /// Remove a token, undoing a registration whose vote could not be recorded
    pub fn unregister(&self, poll_id: &str, token: &VoterToken) -> bool {
        self.lock()
            .get_mut(poll_id)
            .map_or(false, |tokens| tokens.remove(token))
    }

    pub fn count(&self, poll_id: &str) -> usize {
        self.lock().get(poll_id).map_or(0, HashSet::len)
    }

    /// Drop every token for a poll
    pub fn clear(&self, poll_id: &str) {
        self.lock().remove(poll_id);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, HashSet<VoterToken>>> {
        self.used.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_register() {
        let registry = VoterRegistry::new();
        let token = derive_token("alice", "p1");

        assert!(!registry.has_voted("p1", &token));
        assert_eq!(registry.count("p1"), 0);

        registry.register("p1", &token);
        assert!(registry.has_voted("p1", &token));
        assert_eq!(registry.count("p1"), 1);

        // Idempotent
        registry.register("p1", &token);
        assert_eq!(registry.count("p1"), 1);

        // Polls are independent
        assert!(!registry.has_voted("p2", &token));
        assert_eq!(registry.count("p2"), 0);
    }

    #[test]
    fn test_register_if_absent() {
        let registry = VoterRegistry::new();
        let token = derive_token("alice", "p1");

        assert!(registry.register_if_absent("p1", &token));
        assert!(!registry.register_if_absent("p1", &token));
        assert_eq!(registry.count("p1"), 1);

        assert!(registry.unregister("p1", &token));
        assert!(!registry.unregister("p1", &token));
        assert!(!registry.has_voted("p1", &token));
    }

    #[test]
    fn test_clear() {
        let registry = VoterRegistry::new();
        registry.register("p1", &derive_token("alice", "p1"));
        registry.register("p1", &derive_token("bob", "p1"));
        registry.register("p2", &derive_token("alice", "p2"));
        assert_eq!(registry.count("p1"), 2);

        registry.clear("p1");
        assert_eq!(registry.count("p1"), 0);
        assert_eq!(registry.count("p2"), 1);

        // Clearing an unknown poll is a no-op
        registry.clear("p3");
    }

    #[test]
    fn test_snapshot_restore() {
        let registry = VoterRegistry::new();
        let alice = derive_token("alice", "p1");
        registry.register("p1", &alice);
        registry.register("p2", &derive_token("bob", "p2"));

        let snapshot = registry.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored = VoterRegistry::restore(serde_json::from_str(&json).unwrap());

        assert!(restored.has_voted("p1", &alice));
        assert_eq!(restored.count("p2"), 1);
        assert_eq!(restored.snapshot(), snapshot);
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(VoterRegistry::new());
        let token = derive_token("alice", "p1");

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                let token = token.clone();
                thread::spawn(move || registry.register_if_absent("p1", &token))
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|admitted| *admitted)
            .count();

        assert_eq!(admitted, 1);
        assert_eq!(registry.count("p1"), 1);
    }
}
