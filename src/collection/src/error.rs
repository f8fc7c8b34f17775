// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The error taxonomy surfaced to callers of this library.

use thiserror::Error;

/// The kind of a [`SiloError`], for callers that branch on error class after
/// catching. The most recent kind is also recorded on the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Argument,
    DataTooLarge,
    Network,
    MaxMemoryLimit,
    MaxMemoryPolicy,
    CollectionDeleted,
    BackingStore,
    DataIdExists,
    OlderThanAllowed,
    NonExistentDataId,
    IncompatibleDataVersion,
    NoReply,
    Unknown,
}

/// Errors returned by collection operations.
#[derive(Error, Debug)]
pub enum SiloError {
    #[error("invalid argument: {0}")]
    Argument(String),
    #[error("data length {size} exceeds the limit of {limit} bytes")]
    DataTooLarge { size: usize, limit: u64 },
    #[error("network error: {source}")]
    Network {
        #[from]
        source: std::io::Error,
    },
    #[error("backing store out of memory: {0}")]
    MaxMemoryLimit(String),
    #[error("incompatible backing store memory policy: {0}")]
    MaxMemoryPolicy(String),
    #[error("collection was deleted")]
    CollectionDeleted,
    #[error("backing store error: {0}")]
    BackingStore(String),
    #[error("data id already exists in the list")]
    DataIdExists,
    #[error("data time is older than the last removed time")]
    OlderThanAllowed,
    #[error("data id does not exist")]
    NonExistentDataId,
    #[error("incompatible data version: stored {stored}, expected {expected}")]
    IncompatibleDataVersion { stored: u64, expected: u64 },
    #[error("no reply where one was expected")]
    NoReply,
    #[error("unknown reply: {0}")]
    Unknown(String),
}

impl SiloError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Argument(_) => ErrorKind::Argument,
            Self::DataTooLarge { .. } => ErrorKind::DataTooLarge,
            Self::Network { .. } => ErrorKind::Network,
            Self::MaxMemoryLimit(_) => ErrorKind::MaxMemoryLimit,
            Self::MaxMemoryPolicy(_) => ErrorKind::MaxMemoryPolicy,
            Self::CollectionDeleted => ErrorKind::CollectionDeleted,
            Self::BackingStore(_) => ErrorKind::BackingStore,
            Self::DataIdExists => ErrorKind::DataIdExists,
            Self::OlderThanAllowed => ErrorKind::OlderThanAllowed,
            Self::NonExistentDataId => ErrorKind::NonExistentDataId,
            Self::IncompatibleDataVersion { .. } => ErrorKind::IncompatibleDataVersion,
            Self::NoReply => ErrorKind::NoReply,
            Self::Unknown(_) => ErrorKind::Unknown,
        }
    }
}
