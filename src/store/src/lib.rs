// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! An in-memory backing store exposing hashes, sorted sets, key enumeration,
//! memory accounting against a configurable `maxmemory` ceiling, and an
//! atomic script registry. Commands arrive as [`protocol_resp::Request`]
//! values and produce [`protocol_resp::Message`] replies; registered scripts
//! run with exclusive access to the store, which is what makes every script
//! invocation atomic with respect to every other command.
//!
//! Not designed for concurrent access: callers wrap the store in their own
//! lock (the server holds one lock across each command).

#[macro_use]
extern crate log;

use metriken::{metric, Counter, Gauge};
use protocol_common::Execute;
use protocol_resp::{fmt_score, Message, Request};

use std::collections::HashMap;

mod error;
mod glob;
mod scripts;
mod sorted_set;

pub use error::StoreError;
pub use scripts::{script_digest, ScriptFn};
pub use sorted_set::SortedSet;

use glob::glob_match;
use scripts::ScriptRegistry;

#[metric(name = "store_command", description = "number of commands executed")]
pub static STORE_COMMAND: Counter = Counter::new();

#[metric(name = "store_script_run", description = "number of script invocations")]
pub static STORE_SCRIPT_RUN: Counter = Counter::new();

#[metric(
    name = "store_oom_refused",
    description = "number of writes refused for memory pressure"
)]
pub static STORE_OOM_REFUSED: Counter = Counter::new();

#[metric(
    name = "store_used_memory",
    description = "approximate bytes of keys, fields, and values"
)]
pub static STORE_USED_MEMORY: Gauge = Gauge::new();

// per-entry accounting overheads, approximating allocator and index cost
const KEY_OVERHEAD: usize = 48;
const HASH_ENTRY_OVERHEAD: usize = 32;
const ZSET_ENTRY_OVERHEAD: usize = 48;

const POLICY_NOEVICTION: &str = "noeviction";

#[derive(Debug)]
enum Object {
    Hash(HashMap<Vec<u8>, Vec<u8>>),
    SortedSet(SortedSet),
}

impl Object {
    fn bytes(&self) -> usize {
        match self {
            Object::Hash(hash) => hash
                .iter()
                .map(|(f, v)| HASH_ENTRY_OVERHEAD + f.len() + v.len())
                .sum(),
            Object::SortedSet(set) => set
                .range(0, -1)
                .iter()
                .map(|(m, _)| ZSET_ENTRY_OVERHEAD + m.len())
                .sum(),
        }
    }
}

/// Returns a new `Builder` which is used to configure and construct a
/// `Store` instance.
#[derive(Default)]
pub struct Builder {
    maxmemory: u64,
    maxmemory_policy: Option<String>,
}

impl Builder {
    /// Memory ceiling in bytes. Zero means unlimited.
    pub fn maxmemory(mut self, bytes: u64) -> Self {
        self.maxmemory = bytes;
        self
    }

    pub fn maxmemory_policy(mut self, policy: &str) -> Self {
        self.maxmemory_policy = Some(policy.to_string());
        self
    }

    pub fn build(self) -> Store {
        Store {
            data: HashMap::new(),
            used_memory: 0,
            maxmemory: self.maxmemory,
            maxmemory_policy: self
                .maxmemory_policy
                .unwrap_or_else(|| POLICY_NOEVICTION.to_string()),
            scripts: ScriptRegistry::default(),
        }
    }
}

pub struct Store {
    data: HashMap<Vec<u8>, Object>,
    used_memory: usize,
    maxmemory: u64,
    maxmemory_policy: String,
    scripts: ScriptRegistry,
}

impl Store {
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub fn used_memory(&self) -> u64 {
        self.used_memory as u64
    }

    pub fn maxmemory(&self) -> u64 {
        self.maxmemory
    }

    pub fn set_maxmemory(&mut self, bytes: u64) {
        self.maxmemory = bytes;
    }

    pub fn maxmemory_policy(&self) -> &str {
        &self.maxmemory_policy
    }

    pub fn set_maxmemory_policy(&mut self, policy: &str) {
        self.maxmemory_policy = policy.to_string();
    }

    fn charge(&mut self, delta: usize) -> Result<(), StoreError> {
        if self.maxmemory > 0
            && self.maxmemory_policy == POLICY_NOEVICTION
            && (self.used_memory + delta) as u64 > self.maxmemory
        {
            STORE_OOM_REFUSED.increment();
            return Err(StoreError::OutOfMemory);
        }
        self.used_memory += delta;
        STORE_USED_MEMORY.set(self.used_memory as i64);
        Ok(())
    }

    // overwrites of existing entries are never refused, so bookkeeping
    // writes keep working while the store is over its ceiling
    fn charge_unchecked(&mut self, delta: usize) {
        self.used_memory += delta;
        STORE_USED_MEMORY.set(self.used_memory as i64);
    }

    fn refund(&mut self, delta: usize) {
        self.used_memory = self.used_memory.saturating_sub(delta);
        STORE_USED_MEMORY.set(self.used_memory as i64);
    }

    // generic key commands

    pub fn exists(&self, key: &[u8]) -> bool {
        self.data.contains_key(key)
    }

    pub fn del(&mut self, key: &[u8]) -> bool {
        if let Some(object) = self.data.remove(key) {
            let bytes = object.bytes() + KEY_OVERHEAD + key.len();
            self.refund(bytes);
            true
        } else {
            false
        }
    }

    pub fn keys_matching(&self, pattern: &[u8]) -> Vec<Vec<u8>> {
        let mut keys: Vec<Vec<u8>> = self
            .data
            .keys()
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub fn flush_all(&mut self) {
        self.data.clear();
        self.used_memory = 0;
        STORE_USED_MEMORY.set(0);
    }

    // hash commands

    fn hash(&self, key: &[u8]) -> Result<Option<&HashMap<Vec<u8>, Vec<u8>>>, StoreError> {
        match self.data.get(key) {
            Some(Object::Hash(hash)) => Ok(Some(hash)),
            Some(_) => Err(StoreError::WrongType),
            None => Ok(None),
        }
    }

    pub fn hget(&self, key: &[u8], field: &[u8]) -> Result<Option<&[u8]>, StoreError> {
        Ok(self.hash(key)?.and_then(|h| h.get(field)).map(|v| &v[..]))
    }

    pub fn hexists(&self, key: &[u8], field: &[u8]) -> Result<bool, StoreError> {
        Ok(self.hash(key)?.map(|h| h.contains_key(field)).unwrap_or(false))
    }

    pub fn hlen(&self, key: &[u8]) -> Result<usize, StoreError> {
        Ok(self.hash(key)?.map(|h| h.len()).unwrap_or(0))
    }

    /// Field/value pairs ordered by field for deterministic replies.
    pub fn hgetall(&self, key: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let mut pairs: Vec<_> = self
            .hash(key)?
            .map(|h| h.iter().map(|(f, v)| (f.clone(), v.clone())).collect())
            .unwrap_or_default();
        pairs.sort();
        Ok(pairs)
    }

    pub fn hvals(&self, key: &[u8]) -> Result<Vec<Vec<u8>>, StoreError> {
        Ok(self.hgetall(key)?.into_iter().map(|(_, v)| v).collect())
    }

    /// Sets one field. Returns true if the field was newly created.
    pub fn hset(&mut self, key: &[u8], field: &[u8], value: &[u8]) -> Result<bool, StoreError> {
        let existing = match self.data.get(key) {
            Some(Object::Hash(hash)) => Some(hash.get(field).map(|v| v.len())),
            Some(_) => return Err(StoreError::WrongType),
            None => None,
        };

        match existing {
            // overwrites are never refused
            Some(Some(old_len)) => {
                if value.len() > old_len {
                    self.charge_unchecked(value.len() - old_len);
                } else {
                    self.refund(old_len - value.len());
                }
            }
            Some(None) => {
                self.charge(HASH_ENTRY_OVERHEAD + field.len() + value.len())?;
            }
            None => {
                self.charge(
                    KEY_OVERHEAD + key.len() + HASH_ENTRY_OVERHEAD + field.len() + value.len(),
                )?;
            }
        }

        let object = self
            .data
            .entry(key.to_vec())
            .or_insert_with(|| Object::Hash(HashMap::new()));
        match object {
            Object::Hash(hash) => Ok(hash.insert(field.to_vec(), value.to_vec()).is_none()),
            _ => Err(StoreError::WrongType),
        }
    }

    /// Deletes one field, removing the key entirely when the hash empties.
    pub fn hdel(&mut self, key: &[u8], field: &[u8]) -> Result<bool, StoreError> {
        let (removed, empty) = match self.data.get_mut(key) {
            Some(Object::Hash(hash)) => match hash.remove(field) {
                Some(value) => {
                    let bytes = HASH_ENTRY_OVERHEAD + field.len() + value.len();
                    (Some(bytes), hash.is_empty())
                }
                None => (None, false),
            },
            Some(_) => return Err(StoreError::WrongType),
            None => (None, false),
        };

        if let Some(bytes) = removed {
            self.refund(bytes);
            if empty {
                self.data.remove(key);
                self.refund(KEY_OVERHEAD + key.len());
            }
            Ok(true)
        } else {
            Ok(false)
        }
    }

    // sorted set commands

    fn sorted_set(&self, key: &[u8]) -> Result<Option<&SortedSet>, StoreError> {
        match self.data.get(key) {
            Some(Object::SortedSet(set)) => Ok(Some(set)),
            Some(_) => Err(StoreError::WrongType),
            None => Ok(None),
        }
    }

    /// Adds a member or updates its score. Returns true if the member was new.
    pub fn zadd(&mut self, key: &[u8], member: &[u8], score: f64) -> Result<bool, StoreError> {
        let existing = match self.data.get(key) {
            Some(Object::SortedSet(set)) => Some(set.score(member).is_some()),
            Some(_) => return Err(StoreError::WrongType),
            None => None,
        };

        match existing {
            // score updates do not grow the set
            Some(true) => {}
            Some(false) => {
                self.charge(ZSET_ENTRY_OVERHEAD + member.len())?;
            }
            None => {
                self.charge(KEY_OVERHEAD + key.len() + ZSET_ENTRY_OVERHEAD + member.len())?;
            }
        }

        let object = self
            .data
            .entry(key.to_vec())
            .or_insert_with(|| Object::SortedSet(SortedSet::new()));
        match object {
            Object::SortedSet(set) => Ok(set.insert(member, score)),
            _ => Err(StoreError::WrongType),
        }
    }

    /// Removes a member, removing the key entirely when the set empties.
    pub fn zrem(&mut self, key: &[u8], member: &[u8]) -> Result<bool, StoreError> {
        let (removed, empty) = match self.data.get_mut(key) {
            Some(Object::SortedSet(set)) => {
                if set.remove(member) {
                    (true, set.is_empty())
                } else {
                    (false, false)
                }
            }
            Some(_) => return Err(StoreError::WrongType),
            None => (false, false),
        };

        if removed {
            self.refund(ZSET_ENTRY_OVERHEAD + member.len());
            if empty {
                self.data.remove(key);
                self.refund(KEY_OVERHEAD + key.len());
            }
        }
        Ok(removed)
    }

    pub fn zscore(&self, key: &[u8], member: &[u8]) -> Result<Option<f64>, StoreError> {
        Ok(self.sorted_set(key)?.and_then(|s| s.score(member)))
    }

    pub fn zcard(&self, key: &[u8]) -> Result<usize, StoreError> {
        Ok(self.sorted_set(key)?.map(|s| s.len()).unwrap_or(0))
    }

    /// The member with the lowest score, with its score.
    pub fn zhead(&self, key: &[u8]) -> Result<Option<(Vec<u8>, f64)>, StoreError> {
        Ok(self
            .sorted_set(key)?
            .and_then(|s| s.first())
            .map(|(m, score)| (m.to_vec(), score)))
    }

    pub fn zrange(
        &self,
        key: &[u8],
        start: i64,
        stop: i64,
    ) -> Result<Vec<(Vec<u8>, f64)>, StoreError> {
        Ok(self
            .sorted_set(key)?
            .map(|s| {
                s.range(start, stop)
                    .into_iter()
                    .map(|(m, score)| (m.to_vec(), score))
                    .collect()
            })
            .unwrap_or_default())
    }

    // scripting

    /// Registers a transaction handler under the digest of `source`,
    /// returning the digest. Registration makes the script known; it becomes
    /// resident through `SCRIPT LOAD`.
    pub fn register_script(&mut self, source: &str, handler: ScriptFn) -> String {
        self.scripts.register(source, handler)
    }

    pub fn script_load(&mut self, source: &[u8]) -> Option<String> {
        self.scripts.load(source)
    }

    pub fn script_exists(&self, digest: &[u8]) -> bool {
        self.scripts.exists(digest)
    }

    pub fn script_flush(&mut self) {
        self.scripts.flush()
    }

    pub fn evalsha(&mut self, digest: &[u8], keys: &[Vec<u8>], args: &[Vec<u8>]) -> Message {
        match self.scripts.resident_handler(digest) {
            Some(handler) => {
                STORE_SCRIPT_RUN.increment();
                handler(self, keys, args)
            }
            None => Message::error("NOSCRIPT No matching script. Please use SCRIPT LOAD."),
        }
    }

    fn info(&self) -> String {
        format!(
            "# Memory\r\nused_memory:{}\r\nmaxmemory:{}\r\nmaxmemory_policy:{}\r\n",
            self.used_memory, self.maxmemory, self.maxmemory_policy
        )
    }

    fn config_get(&self, parameter: &str) -> Message {
        match parameter {
            "maxmemory" => Message::array(vec![
                Message::bulk_string(b"maxmemory"),
                Message::bulk_string(self.maxmemory.to_string().as_bytes()),
            ]),
            "maxmemory-policy" => Message::array(vec![
                Message::bulk_string(b"maxmemory-policy"),
                Message::bulk_string(self.maxmemory_policy.as_bytes()),
            ]),
            _ => Message::array(Vec::new()),
        }
    }

    fn config_set(&mut self, parameter: &str, value: &str) -> Message {
        match parameter {
            "maxmemory" => match value.parse::<u64>() {
                Ok(bytes) => {
                    self.set_maxmemory(bytes);
                    Message::simple_string("OK")
                }
                Err(_) => Message::error("ERR argument couldn't be parsed into an integer"),
            },
            "maxmemory-policy" => {
                self.set_maxmemory_policy(value);
                Message::simple_string("OK")
            }
            _ => Message::error(format!("ERR Unknown CONFIG parameter '{}'", parameter)),
        }
    }
}

fn reply<T, F: FnOnce(T) -> Message>(result: Result<T, StoreError>, f: F) -> Message {
    match result {
        Ok(value) => f(value),
        Err(e) => Message::error(e.to_string()),
    }
}

impl Execute<Request, Message> for Store {
    fn execute(&mut self, request: &Request) -> Message {
        STORE_COMMAND.increment();
        trace!("execute: {:?}", request);

        match request {
            Request::Ping => Message::simple_string("PONG"),
            Request::FlushAll => {
                self.flush_all();
                Message::simple_string("OK")
            }
            Request::Exists { key } => Message::integer(self.exists(key) as i64),
            Request::Del { keys } => {
                let deleted = keys.iter().filter(|k| self.del(k)).count();
                Message::integer(deleted as i64)
            }
            Request::Keys { pattern } => Message::array(
                self.keys_matching(pattern)
                    .iter()
                    .map(|k| Message::bulk_string(k))
                    .collect(),
            ),
            Request::HGet { key, field } => reply(self.hget(key, field), |value| match value {
                Some(v) => Message::bulk_string(v),
                None => Message::null(),
            }),
            Request::HSet { key, pairs } => {
                let mut created = 0;
                for (field, value) in pairs {
                    match self.hset(key, field, value) {
                        Ok(true) => created += 1,
                        Ok(false) => {}
                        Err(e) => return Message::error(e.to_string()),
                    }
                }
                Message::integer(created)
            }
            Request::HDel { key, fields } => {
                let mut deleted = 0;
                for field in fields {
                    match self.hdel(key, field) {
                        Ok(true) => deleted += 1,
                        Ok(false) => {}
                        Err(e) => return Message::error(e.to_string()),
                    }
                }
                Message::integer(deleted)
            }
            Request::HExists { key, field } => {
                reply(self.hexists(key, field), |b| Message::integer(b as i64))
            }
            Request::HLen { key } => reply(self.hlen(key), |n| Message::integer(n as i64)),
            Request::HGetAll { key } => reply(self.hgetall(key), |pairs| {
                let mut values = Vec::with_capacity(pairs.len() * 2);
                for (field, value) in pairs {
                    values.push(Message::bulk_string(&field));
                    values.push(Message::bulk_string(&value));
                }
                Message::array(values)
            }),
            Request::HVals { key } => reply(self.hvals(key), |vals| {
                Message::array(vals.iter().map(|v| Message::bulk_string(v)).collect())
            }),
            Request::ZAdd { key, members } => {
                let mut added = 0;
                for (score, member) in members {
                    match self.zadd(key, member, *score) {
                        Ok(true) => added += 1,
                        Ok(false) => {}
                        Err(e) => return Message::error(e.to_string()),
                    }
                }
                Message::integer(added)
            }
            Request::ZRem { key, members } => {
                let mut removed = 0;
                for member in members {
                    match self.zrem(key, member) {
                        Ok(true) => removed += 1,
                        Ok(false) => {}
                        Err(e) => return Message::error(e.to_string()),
                    }
                }
                Message::integer(removed)
            }
            Request::ZScore { key, member } => {
                reply(self.zscore(key, member), |score| match score {
                    Some(s) => Message::bulk_string(fmt_score(s).as_bytes()),
                    None => Message::null(),
                })
            }
            Request::ZCard { key } => reply(self.zcard(key), |n| Message::integer(n as i64)),
            Request::ZRange {
                key,
                start,
                stop,
                with_scores,
            } => reply(self.zrange(key, *start, *stop), |entries| {
                let mut values = Vec::new();
                for (member, score) in entries {
                    values.push(Message::bulk_string(&member));
                    if *with_scores {
                        values.push(Message::bulk_string(fmt_score(score).as_bytes()));
                    }
                }
                Message::array(values)
            }),
            Request::ConfigGet { parameter } => self.config_get(parameter),
            Request::ConfigSet { parameter, value } => self.config_set(parameter, value),
            Request::Info => Message::bulk_string(self.info().as_bytes()),
            Request::ScriptLoad { source } => match self.script_load(source) {
                Some(digest) => Message::bulk_string(digest.as_bytes()),
                None => Message::error("ERR unknown script source"),
            },
            Request::ScriptExists { digests } => Message::array(
                digests
                    .iter()
                    .map(|d| Message::integer(self.script_exists(d) as i64))
                    .collect(),
            ),
            Request::ScriptFlush => {
                self.script_flush();
                Message::simple_string("OK")
            }
            Request::EvalSha { digest, keys, args } => self.evalsha(digest, keys, args),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn hash_basics() {
        let mut store = Store::builder().build();
        assert!(store.hset(b"h", b"f1", b"v1").unwrap());
        assert!(!store.hset(b"h", b"f1", b"v2").unwrap());
        assert_eq!(store.hget(b"h", b"f1").unwrap(), Some(&b"v2"[..]));
        assert_eq!(store.hlen(b"h").unwrap(), 1);

        assert!(store.hdel(b"h", b"f1").unwrap());
        // the key vanishes with its last field
        assert!(!store.exists(b"h"));
        assert_eq!(store.used_memory(), 0);
    }

    #[test]
    fn sorted_set_basics() {
        let mut store = Store::builder().build();
        store.zadd(b"z", b"a", 2.0).unwrap();
        store.zadd(b"z", b"b", 1.0).unwrap();
        assert_eq!(store.zhead(b"z").unwrap(), Some((b"b".to_vec(), 1.0)));
        assert_eq!(store.zcard(b"z").unwrap(), 2);

        store.zrem(b"z", b"b").unwrap();
        store.zrem(b"z", b"a").unwrap();
        assert!(!store.exists(b"z"));
        assert_eq!(store.used_memory(), 0);
    }

    #[test]
    fn wrong_type() {
        let mut store = Store::builder().build();
        store.hset(b"k", b"f", b"v").unwrap();
        assert_eq!(store.zadd(b"k", b"m", 1.0), Err(StoreError::WrongType));
        assert_eq!(store.zscore(b"k", b"m"), Err(StoreError::WrongType));
    }

    #[test]
    fn oom_refusal() {
        let mut store = Store::builder().maxmemory(200).build();
        store.hset(b"h", b"f", b"small").unwrap();
        let err = store.hset(b"h", b"g", &[0u8; 256]).unwrap_err();
        assert_eq!(err, StoreError::OutOfMemory);
        // frees are always allowed
        assert!(store.hdel(b"h", b"f").unwrap());
    }

    #[test]
    fn oom_not_enforced_without_ceiling() {
        let mut store = Store::builder().build();
        store.hset(b"h", b"g", &[0u8; 1024]).unwrap();
    }

    #[test]
    fn script_lifecycle() {
        let mut store = Store::builder().build();
        let source = "silo:test:1";
        let digest = store.register_script(
            source,
            Arc::new(|store: &mut Store, _keys: &[Vec<u8>], _args: &[Vec<u8>]| {
                Message::integer(store.exists(b"x") as i64)
            }),
        );

        // not resident until loaded
        assert!(!store.script_exists(digest.as_bytes()));
        let reply = store.evalsha(digest.as_bytes(), &[], &[]);
        assert!(reply.as_error().unwrap().starts_with("NOSCRIPT"));

        let loaded = store.script_load(source.as_bytes()).unwrap();
        assert_eq!(loaded, digest);
        assert!(store.script_exists(digest.as_bytes()));
        assert_eq!(store.evalsha(digest.as_bytes(), &[], &[]), Message::integer(0));

        store.script_flush();
        assert!(!store.script_exists(digest.as_bytes()));
    }

    #[test]
    fn keys_glob() {
        let mut store = Store::builder().build();
        store.hset(b"silo:D:c:L1", b"d", b"v").unwrap();
        store.hset(b"silo:D:c:L2", b"d", b"v").unwrap();
        store.hset(b"silo:T:c:L1", b"d", b"v").unwrap();
        let keys = store.keys_matching(b"silo:D:c:*");
        assert_eq!(keys, vec![b"silo:D:c:L1".to_vec(), b"silo:D:c:L2".to_vec()]);
    }
}
