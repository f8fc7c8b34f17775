// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Key naming for a collection's state on the backing store. All keys share
//! the namespace prefix so one collection's keys can be enumerated with a
//! glob; names and list ids must not contain the separator.

/// The namespace prefix all collection keys live under.
pub const NAMESPACE: &str = "silo";

/// Returns true for a string usable as a collection name or list id.
pub fn valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(':')
}

/// Derives the key names belonging to one collection.
#[derive(Debug, Clone)]
pub struct KeySpace {
    collection: String,
}

impl KeySpace {
    /// The caller is responsible for having validated the collection name.
    pub fn new(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The status record, a hash of counters and policy fields.
    pub fn status(&self) -> Vec<u8> {
        format!("{}:S:{}", NAMESPACE, self.collection).into_bytes()
    }

    /// The queue index, a sorted set of list ids scored by each list's
    /// oldest data time.
    pub fn queue(&self) -> Vec<u8> {
        format!("{}:Q:{}", NAMESPACE, self.collection).into_bytes()
    }

    /// The data map of one list: data id to data bytes.
    pub fn data(&self, list: &[u8]) -> Vec<u8> {
        let mut key = format!("{}:D:{}:", NAMESPACE, self.collection).into_bytes();
        key.extend_from_slice(list);
        key
    }

    /// The time index of one list: data id scored by data time. Exists only
    /// while the list holds two or more items.
    pub fn time(&self, list: &[u8]) -> Vec<u8> {
        let mut key = format!("{}:T:{}:", NAMESPACE, self.collection).into_bytes();
        key.extend_from_slice(list);
        key
    }

    pub fn data_glob(&self) -> Vec<u8> {
        format!("{}:D:{}:*", NAMESPACE, self.collection).into_bytes()
    }

    pub fn time_glob(&self) -> Vec<u8> {
        format!("{}:T:{}:*", NAMESPACE, self.collection).into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_names() {
        let keys = KeySpace::new("jobs");
        assert_eq!(keys.status(), b"silo:S:jobs".to_vec());
        assert_eq!(keys.queue(), b"silo:Q:jobs".to_vec());
        assert_eq!(keys.data(b"L1"), b"silo:D:jobs:L1".to_vec());
        assert_eq!(keys.time(b"L1"), b"silo:T:jobs:L1".to_vec());
        assert_eq!(keys.data_glob(), b"silo:D:jobs:*".to_vec());
    }

    #[test]
    fn name_validation() {
        assert!(valid_name("jobs"));
        assert!(valid_name("L1"));
        assert!(!valid_name(""));
        assert!(!valid_name("a:b"));
    }
}
