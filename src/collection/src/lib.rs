// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Capped collections over a memory-bounded backing store.
//!
//! A collection holds many lists of data items, each item keyed by a
//! client-supplied data id and ordered by a client-supplied data time. As
//! the backing store approaches its memory ceiling, the globally oldest
//! items are evicted across all lists: a fleet-wide FIFO age-out driven by
//! memory pressure rather than per-list bounds.
//!
//! The moving parts:
//! * transaction scripts registered into the backing store and dispatched
//!   by digest, each running atomically ([`scripts`]),
//! * the evictor those scripts embed, which walks the queue index of list
//!   heads ordered by oldest data time,
//! * the guarded-write wrapper that retries refused writes after forced
//!   eviction and replays a rollback log when retries are exhausted,
//! * the [`Collection`] handle and its driver, which own the channel,
//!   cache script digests, and classify error replies.

#[macro_use]
extern crate log;

mod channel;
mod client;
mod error;
mod keyspace;
mod params;
mod probe;
pub mod scripts;
mod time;

pub use channel::{Channel, EmbeddedChannel, TcpChannel};
pub use client::{Collection, CollectionClient, OpenOptions};
pub use error::{ErrorKind, SiloError};
pub use keyspace::{valid_name, KeySpace, NAMESPACE};
pub use params::{
    CollectionInfo, CollectionParams, ListInfo, ResizeSpec, DATA_VERSION, MEMORY_RESERVE_MAX,
    MEMORY_RESERVE_MIN,
};
pub use probe::{parse_used_memory, MemoryProbe};
pub use scripts::register_scripts;
pub use time::TimeValue;
