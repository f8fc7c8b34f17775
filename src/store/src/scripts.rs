// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::Store;
use protocol_resp::Message;
use sha2::{Digest, Sha256};

use std::collections::HashMap;
use std::sync::Arc;

/// A transaction handler registered into the store. Handlers run with
/// exclusive access to the store, so everything a handler does is atomic
/// with respect to every other command.
pub type ScriptFn = Arc<dyn Fn(&mut Store, &[Vec<u8>], &[Vec<u8>]) -> Message + Send + Sync>;

pub(crate) struct ScriptEntry {
    pub(crate) handler: ScriptFn,
    // a script becomes resident via SCRIPT LOAD and stays resident until
    // SCRIPT FLUSH; EVALSHA refuses non-resident digests
    pub(crate) resident: bool,
}

#[derive(Default)]
pub(crate) struct ScriptRegistry {
    by_digest: HashMap<String, ScriptEntry>,
}

impl ScriptRegistry {
    /// Registers a handler under the digest of its source descriptor,
    /// returning the digest. The script is not yet resident.
    pub(crate) fn register(&mut self, source: &str, handler: ScriptFn) -> String {
        let digest = script_digest(source.as_bytes());
        self.by_digest.insert(
            digest.clone(),
            ScriptEntry {
                handler,
                resident: false,
            },
        );
        digest
    }

    /// Marks the script with this source resident and returns its digest, or
    /// `None` if no handler was registered for it.
    pub(crate) fn load(&mut self, source: &[u8]) -> Option<String> {
        let digest = script_digest(source);
        let entry = self.by_digest.get_mut(&digest)?;
        entry.resident = true;
        Some(digest)
    }

    pub(crate) fn exists(&self, digest: &[u8]) -> bool {
        core::str::from_utf8(digest)
            .ok()
            .and_then(|d| self.by_digest.get(d))
            .map(|e| e.resident)
            .unwrap_or(false)
    }

    pub(crate) fn flush(&mut self) {
        for entry in self.by_digest.values_mut() {
            entry.resident = false;
        }
    }

    /// The handler for a resident script.
    pub(crate) fn resident_handler(&self, digest: &[u8]) -> Option<ScriptFn> {
        core::str::from_utf8(digest)
            .ok()
            .and_then(|d| self.by_digest.get(d))
            .filter(|e| e.resident)
            .map(|e| e.handler.clone())
    }
}

pub fn script_digest(source: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source);
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}
