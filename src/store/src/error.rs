// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use thiserror::Error;

/// Errors returned by the typed store operations. These map onto the wire
/// error replies a client would observe.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum StoreError {
    #[error("OOM command not allowed when used memory > 'maxmemory'.")]
    OutOfMemory,
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,
}

impl StoreError {
    /// The wire marker that prefixes this error's reply.
    pub fn marker(&self) -> &'static str {
        match self {
            Self::OutOfMemory => "OOM",
            Self::WrongType => "WRONGTYPE",
        }
    }
}
