// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Memory pressure detection against the backing store's ceiling.

use silo_store::Store;

/// Decides whether the store is under memory pressure, given the configured
/// ceiling and a collection's reserve coefficient.
#[derive(Debug, Clone, Copy)]
pub struct MemoryProbe {
    ceiling: u64,
    coef: f64,
}

impl MemoryProbe {
    /// Captures the ceiling at construction. A zero ceiling means no
    /// pressure: the coefficient is zero and `tight` is never true.
    pub fn new(store: &Store, memory_reserve: f64) -> Self {
        let ceiling = store.maxmemory();
        let coef = if ceiling > 0 {
            1.0 + memory_reserve
        } else {
            0.0
        };
        Self { ceiling, coef }
    }

    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }

    /// True when used memory, inflated by the reserve coefficient, reaches
    /// the ceiling.
    pub fn tight(&self, used: u64) -> bool {
        self.coef != 0.0 && (used as f64) * self.coef >= self.ceiling as f64
    }
}

/// Extracts `used_memory` from the backing store's info report.
pub fn parse_used_memory(info: &str) -> Option<u64> {
    for line in info.lines() {
        if let Some(value) = line.strip_prefix("used_memory:") {
            return value.trim().parse().ok();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_ceiling_means_no_pressure() {
        let store = Store::builder().build();
        let probe = MemoryProbe::new(&store, 0.25);
        assert!(!probe.tight(u64::MAX));
    }

    #[test]
    fn reserve_inflates_usage() {
        let store = Store::builder().maxmemory(1000).build();
        let probe = MemoryProbe::new(&store, 0.25);
        // 800 * 1.25 == 1000: the reserve makes 800 bytes tight
        assert!(probe.tight(800));
        assert!(!probe.tight(700));
    }

    #[test]
    fn info_report() {
        let info = "# Memory\r\nused_memory:12345\r\nmaxmemory:0\r\n";
        assert_eq!(parse_used_memory(info), Some(12345));
        assert_eq!(parse_used_memory("# Memory\r\n"), None);
    }
}
