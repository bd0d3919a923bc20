//! Registry of inversion change callbacks.

use std::collections::HashMap;

/// Receives the new inversion reason, `None` when the screen is not inverted.
pub type InversionCallback = Box<dyn FnMut(Option<&str>) + Send>;

#[derive(Default)]
pub struct SubscriberRegistry {
    entries: HashMap<String, InversionCallback>,
    next_id: u64,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `callback` under `key`, replacing any previous entry.
    ///
    /// Without a key a fresh `subscriber-N` key is generated. The key in use is returned.
    pub fn insert(&mut self, key: Option<&str>, callback: InversionCallback) -> String {
        let key = match key {
            Some(key) => key.to_string(),
            None => loop {
                self.next_id += 1;
                let candidate = format!("subscriber-{}", self.next_id);
                if !self.entries.contains_key(&candidate) {
                    break candidate;
                }
            },
        };
        self.entries.insert(key.clone(), callback);
        key
    }

    /// Returns whether an entry was removed.
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn notify_all(&mut self, reason: Option<&str>) {
        for callback in self.entries.values_mut() {
            callback(reason);
        }
    }

    pub fn notify_one(&mut self, key: &str, reason: Option<&str>) {
        if let Some(callback) = self.entries.get_mut(key) {
            callback(reason);
        }
    }
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<Option<String>>>>, InversionCallback) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: InversionCallback =
            Box::new(move |reason| sink.lock().unwrap().push(reason.map(str::to_string)));
        (seen, callback)
    }

    #[test]
    fn test_generated_keys_are_unique() {
        let mut registry = SubscriberRegistry::new();
        let a = registry.insert(None, Box::new(|_| {}));
        let b = registry.insert(None, Box::new(|_| {}));
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_generated_key_skips_taken_name() {
        let mut registry = SubscriberRegistry::new();
        registry.insert(Some("subscriber-1"), Box::new(|_| {}));
        let generated = registry.insert(None, Box::new(|_| {}));
        assert_eq!(generated, "subscriber-2");
    }

    #[test]
    fn test_same_key_overwrites() {
        let mut registry = SubscriberRegistry::new();
        let (first, cb1) = recorder();
        let (second, cb2) = recorder();
        registry.insert(Some("bar"), cb1);
        registry.insert(Some("bar"), cb2);
        registry.notify_all(Some("user"));

        assert!(first.lock().unwrap().is_empty());
        assert_eq!(*second.lock().unwrap(), vec![Some("user".to_string())]);
    }

    #[test]
    fn test_removed_entry_is_not_called() {
        let mut registry = SubscriberRegistry::new();
        let (seen, callback) = recorder();
        registry.insert(Some("panel"), callback);
        assert!(registry.remove("panel"));
        assert!(!registry.remove("panel"));

        registry.notify_all(None);
        registry.notify_one("panel", None);
        assert!(seen.lock().unwrap().is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_notify_one_targets_single_entry() {
        let mut registry = SubscriberRegistry::new();
        let (a, cb_a) = recorder();
        let (b, cb_b) = recorder();
        registry.insert(Some("a"), cb_a);
        registry.insert(Some("b"), cb_b);

        registry.notify_one("a", Some("movie"));
        assert_eq!(a.lock().unwrap().len(), 1);
        assert!(b.lock().unwrap().is_empty());
    }
}
