// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Per-invocation transaction state: the rollback log, the guarded-call
//! wrapper around refused writes, and status record access.

use super::{Status, GUARD_RETRY, GUARD_ROLLBACK};
use crate::keyspace::KeySpace;
use crate::time::{fmt_time, parse_time};

use protocol_resp::Message;
use silo_store::{Store, StoreError};

// status record fields
pub(crate) const FIELD_LISTS: &[u8] = b"lists";
pub(crate) const FIELD_ITEMS: &[u8] = b"items";
pub(crate) const FIELD_OLDER_ALLOWED: &[u8] = b"older_allowed";
pub(crate) const FIELD_ADVANCE_CLEANUP_BYTES: &[u8] = b"advance_cleanup_bytes";
pub(crate) const FIELD_ADVANCE_CLEANUP_NUM: &[u8] = b"advance_cleanup_num";
pub(crate) const FIELD_MEMORY_RESERVE: &[u8] = b"memory_reserve";
pub(crate) const FIELD_DATA_VERSION: &[u8] = b"data_version";
pub(crate) const FIELD_LAST_REMOVED_TIME: &[u8] = b"last_removed_time";

// a refused write is retried after forced cleaning, up to this many times
const GUARD_RETRIES: usize = 2;

/// Aborts a script with a status code and message. The caller replays the
/// rollback log before turning this into the error reply.
#[derive(Debug)]
pub(crate) struct ScriptAbort {
    pub(crate) status: Status,
    pub(crate) message: String,
}

impl ScriptAbort {
    pub(crate) fn new<T: ToString>(status: Status, message: T) -> Self {
        Self {
            status,
            message: message.to_string(),
        }
    }

    pub(crate) fn internal<T: ToString>(error: T) -> Self {
        Self::new(Status::Internal, error)
    }

    pub(crate) fn inconsistent(what: &str) -> Self {
        Self::new(
            Status::MaxMemoryPolicy,
            format!("collection is inconsistent: {}", what),
        )
    }

    pub(crate) fn into_reply(self) -> Message {
        Message::array(vec![
            Message::integer(self.status.code()),
            Message::bulk_string(self.message.as_bytes()),
        ])
    }
}

/// The item a mutation must not let the evictor delete.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Guard<'g> {
    pub(crate) list: &'g [u8],
    pub(crate) data_id: &'g [u8],
}

/// A mutating store command run under the guard.
pub(crate) enum Mutation<'m> {
    HSet {
        key: Vec<u8>,
        field: &'m [u8],
        value: &'m [u8],
    },
    ZAdd {
        key: Vec<u8>,
        member: &'m [u8],
        score: f64,
    },
}

/// An inverse command on the rollback log.
enum Undo {
    HSet {
        key: Vec<u8>,
        field: Vec<u8>,
        value: Vec<u8>,
    },
    HDel {
        key: Vec<u8>,
        field: Vec<u8>,
    },
    ZAdd {
        key: Vec<u8>,
        member: Vec<u8>,
        score: f64,
    },
    ZRem {
        key: Vec<u8>,
        member: Vec<u8>,
    },
    StatusAdd {
        field: &'static [u8],
        delta: i64,
    },
}

/// A parsed status record.
#[derive(Debug, Clone)]
pub(crate) struct StatusRecord {
    pub(crate) lists: u64,
    pub(crate) items: u64,
    pub(crate) older_allowed: bool,
    pub(crate) advance_cleanup_bytes: u64,
    pub(crate) advance_cleanup_num: u64,
    pub(crate) memory_reserve: f64,
    pub(crate) data_version: u64,
    pub(crate) last_removed_time: f64,
}

pub(crate) struct Tx<'a> {
    pub(crate) store: &'a mut Store,
    pub(crate) keys: KeySpace,
    undo: Vec<Undo>,
    pub(crate) cleanings: u64,
}

impl<'a> Tx<'a> {
    pub(crate) fn new(store: &'a mut Store, collection: &str) -> Self {
        Self {
            store,
            keys: KeySpace::new(collection),
            undo: Vec::new(),
            cleanings: 0,
        }
    }

    // rollback log

    pub(crate) fn undo_hdel(&mut self, key: Vec<u8>, field: &[u8]) {
        self.undo.push(Undo::HDel {
            key,
            field: field.to_vec(),
        });
    }

    pub(crate) fn undo_hset(&mut self, key: Vec<u8>, field: &[u8], value: Vec<u8>) {
        self.undo.push(Undo::HSet {
            key,
            field: field.to_vec(),
            value,
        });
    }

    pub(crate) fn undo_zadd(&mut self, key: Vec<u8>, member: &[u8], score: f64) {
        self.undo.push(Undo::ZAdd {
            key,
            member: member.to_vec(),
            score,
        });
    }

    pub(crate) fn undo_zrem(&mut self, key: Vec<u8>, member: &[u8]) {
        self.undo.push(Undo::ZRem {
            key,
            member: member.to_vec(),
        });
    }

    pub(crate) fn undo_status_add(&mut self, field: &'static [u8], delta: i64) {
        self.undo.push(Undo::StatusAdd { field, delta });
    }

    /// Replays the rollback log, last pushed first, undoing every mutation
    /// this invocation had committed. Replay failures are logged and
    /// skipped; the log only holds frees and small overwrites.
    pub(crate) fn rollback(&mut self) {
        if self.undo.is_empty() {
            return;
        }
        GUARD_ROLLBACK.increment();
        warn!(
            "{}: replaying {} inverse commands",
            self.keys.collection(),
            self.undo.len()
        );
        while let Some(op) = self.undo.pop() {
            let result = match op {
                Undo::HSet { key, field, value } => {
                    self.store.hset(&key, &field, &value).map(|_| ())
                }
                Undo::HDel { key, field } => self.store.hdel(&key, &field).map(|_| ()),
                Undo::ZAdd { key, member, score } => {
                    self.store.zadd(&key, &member, score).map(|_| ())
                }
                Undo::ZRem { key, member } => self.store.zrem(&key, &member).map(|_| ()),
                Undo::StatusAdd { field, delta } => self.status_add_raw(field, delta),
            };
            if let Err(e) = result {
                warn!("rollback command failed: {}", e);
            }
        }
    }

    // guarded mutations

    fn apply(&mut self, mutation: &Mutation) -> Result<(), StoreError> {
        match mutation {
            Mutation::HSet { key, field, value } => {
                self.store.hset(key, field, value).map(|_| ())
            }
            Mutation::ZAdd { key, member, score } => {
                self.store.zadd(key, member, *score).map(|_| ())
            }
        }
    }

    /// Runs a mutating command; a memory refusal triggers forced cleaning
    /// and a retry, up to the fixed bound. When the retries are exhausted
    /// the abort carries the last refusal message and the caller replays
    /// the rollback log.
    pub(crate) fn guarded(
        &mut self,
        guard: Guard<'_>,
        mutation: Mutation<'_>,
    ) -> Result<(), ScriptAbort> {
        let mut attempt = 0;
        loop {
            match self.apply(&mutation) {
                Ok(()) => return Ok(()),
                Err(StoreError::OutOfMemory) if attempt < GUARD_RETRIES => {
                    attempt += 1;
                    GUARD_RETRY.increment();
                    debug!(
                        "{}: write refused, forced cleaning (attempt {})",
                        self.keys.collection(),
                        attempt
                    );
                    self.clean(guard, true)?;
                }
                Err(e @ StoreError::OutOfMemory) => {
                    return Err(ScriptAbort::new(Status::MaxMemory, e));
                }
                Err(e) => return Err(ScriptAbort::internal(e)),
            }
        }
    }

    // status record access

    /// Reads and parses the status record. `None` means the collection does
    /// not exist.
    pub(crate) fn read_status(&mut self) -> Result<Option<StatusRecord>, ScriptAbort> {
        let key = self.keys.status();
        if !self.store.exists(&key) {
            return Ok(None);
        }

        let u64_field = |tx: &Self, field: &[u8]| -> Result<u64, ScriptAbort> {
            tx.store
                .hget(&key, field)
                .map_err(ScriptAbort::internal)?
                .and_then(|v| core::str::from_utf8(v).ok())
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| ScriptAbort::internal("corrupt status record"))
        };
        let f64_field = |tx: &Self, field: &[u8]| -> Result<f64, ScriptAbort> {
            tx.store
                .hget(&key, field)
                .map_err(ScriptAbort::internal)?
                .and_then(parse_time)
                .ok_or_else(|| ScriptAbort::internal("corrupt status record"))
        };

        Ok(Some(StatusRecord {
            lists: u64_field(self, FIELD_LISTS)?,
            items: u64_field(self, FIELD_ITEMS)?,
            older_allowed: u64_field(self, FIELD_OLDER_ALLOWED)? != 0,
            advance_cleanup_bytes: u64_field(self, FIELD_ADVANCE_CLEANUP_BYTES)?,
            advance_cleanup_num: u64_field(self, FIELD_ADVANCE_CLEANUP_NUM)?,
            memory_reserve: f64_field(self, FIELD_MEMORY_RESERVE)?,
            data_version: u64_field(self, FIELD_DATA_VERSION)?,
            last_removed_time: f64_field(self, FIELD_LAST_REMOVED_TIME)?,
        }))
    }

    pub(crate) fn set_status(&mut self, field: &[u8], value: &str) -> Result<(), ScriptAbort> {
        let key = self.keys.status();
        match self.store.hset(&key, field, value.as_bytes()) {
            Ok(_) => Ok(()),
            Err(StoreError::OutOfMemory) => Err(ScriptAbort::new(
                Status::MaxMemory,
                StoreError::OutOfMemory,
            )),
            Err(e) => Err(ScriptAbort::internal(e)),
        }
    }

    pub(crate) fn status_time(&mut self, field: &[u8]) -> Result<f64, ScriptAbort> {
        let key = self.keys.status();
        Ok(self
            .store
            .hget(&key, field)
            .map_err(ScriptAbort::internal)?
            .and_then(parse_time)
            .unwrap_or(0.0))
    }

    fn status_add_raw(&mut self, field: &[u8], delta: i64) -> Result<(), StoreError> {
        let key = self.keys.status();
        let current: i64 = self
            .store
            .hget(&key, field)?
            .and_then(|v| core::str::from_utf8(v).ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let next = (current + delta).max(0);
        self.store
            .hset(&key, field, next.to_string().as_bytes())
            .map(|_| ())
    }

    /// Adjusts a status counter, clamping at zero.
    pub(crate) fn status_add(&mut self, field: &[u8], delta: i64) -> Result<(), ScriptAbort> {
        self.status_add_raw(field, delta).map_err(|e| match e {
            StoreError::OutOfMemory => ScriptAbort::new(Status::MaxMemory, e),
            other => ScriptAbort::internal(other),
        })
    }

    pub(crate) fn set_last_removed_time(&mut self, time: f64) -> Result<(), ScriptAbort> {
        self.set_status(FIELD_LAST_REMOVED_TIME, &fmt_time(time))
    }
}
