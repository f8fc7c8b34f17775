// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::time::{SystemTime, UNIX_EPOCH};

/// Data times are client-supplied floats; four decimal places of resolution
/// are carried on the wire and in the status record.
pub type TimeValue = f64;

pub(crate) fn fmt_time(time: TimeValue) -> String {
    format!("{:.4}", time)
}

pub(crate) fn parse_time(bytes: &[u8]) -> Option<TimeValue> {
    core::str::from_utf8(bytes).ok()?.parse().ok()
}

/// The current wall-clock time as seconds since the epoch, at the carried
/// resolution.
pub(crate) fn now() -> TimeValue {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (elapsed.as_secs_f64() * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        assert_eq!(fmt_time(1.0), "1.0000");
        assert_eq!(parse_time(b"1.0000"), Some(1.0));
        assert_eq!(parse_time(b"0"), Some(0.0));
        assert_eq!(parse_time(b"x"), None);
    }
}
