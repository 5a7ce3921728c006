//! Keys excluded from detection

use indexmap::IndexSet;

use crate::keys::KeyName;

/// Set of blocked key names, in the order they were blocked.
///
/// Checked before any press or release is applied. Blocking a key that is
/// already down does not release it.
#[derive(Debug, Clone, Default)]
pub struct Blocklist {
    keys: IndexSet<KeyName>,
}

impl Blocklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block `key`. Returns false if it was already blocked.
    pub fn block(&mut self, key: &str) -> bool {
        self.keys.insert(key.to_string())
    }

    /// Unblock `key`. Returns false if it was not blocked.
    pub fn unblock(&mut self, key: &str) -> bool {
        self.keys.shift_remove(key)
    }

    pub fn is_blocked(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn keys(&self) -> Vec<KeyName> {
        self.keys.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_and_unblock() {
        let mut blocklist = Blocklist::new();
        assert!(blocklist.block("a"));
        assert!(!blocklist.block("a"), "Blocking twice reports no change");
        assert!(blocklist.is_blocked("a"));

        assert!(blocklist.unblock("a"));
        assert!(!blocklist.unblock("a"));
        assert!(!blocklist.is_blocked("a"));
        assert!(blocklist.is_empty());
    }

    #[test]
    fn test_keys_keep_block_order() {
        let mut blocklist = Blocklist::new();
        blocklist.block("escape");
        blocklist.block("tab");
        blocklist.block("a");
        blocklist.unblock("tab");

        assert_eq!(blocklist.keys(), vec!["escape", "a"]);
        assert_eq!(blocklist.len(), 2);
    }
}
