// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! RESP wire protocol support. The [`Message`] enum models the five RESP
//! value types with streaming parsers and composers; the [`Request`] enum is
//! the typed command model for the backing-store surface, composing to wire
//! arrays on the client side and parsing back from them on the server side.

mod message;
mod request;
mod util;

pub(crate) use util::*;

pub use message::{Message, MessageParser};
pub use request::{Request, RequestError};

/// Formats a sorted-set score the way the wire carries it. Plain `Display`
/// round-trips through `str::parse::<f64>()`.
pub fn fmt_score(score: f64) -> String {
    format!("{}", score)
}

/// Parses a wire score back into an `f64`.
pub fn parse_score(bytes: &[u8]) -> Option<f64> {
    core::str::from_utf8(bytes).ok()?.parse().ok()
}
