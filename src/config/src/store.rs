// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use serde::{Deserialize, Serialize};

// constants to define default values
const MAXMEMORY: u64 = 0;
const MAXMEMORY_POLICY: &str = "noeviction";

// helper functions
fn maxmemory() -> u64 {
    MAXMEMORY
}

fn maxmemory_policy() -> String {
    MAXMEMORY_POLICY.to_string()
}

// struct definitions
#[derive(Serialize, Deserialize, Debug)]
pub struct Store {
    /// Memory ceiling in bytes. Zero means unlimited.
    #[serde(default = "maxmemory")]
    maxmemory: u64,
    /// What to do when `maxmemory` is reached. Only `noeviction` is
    /// compatible with capped collections; other values cause clients to
    /// refuse to operate.
    #[serde(default = "maxmemory_policy")]
    maxmemory_policy: String,
}

// implementation
impl Store {
    pub fn maxmemory(&self) -> u64 {
        self.maxmemory
    }

    pub fn maxmemory_policy(&self) -> &str {
        &self.maxmemory_policy
    }
}

// trait implementations
impl Default for Store {
    fn default() -> Self {
        Self {
            maxmemory: maxmemory(),
            maxmemory_policy: maxmemory_policy(),
        }
    }
}

pub trait StoreConfig {
    fn store(&self) -> &Store;
}
