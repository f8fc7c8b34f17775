// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use super::*;
use crate::*;
use protocol_common::{BufMut, Compose};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleString {
    pub(crate) inner: String,
}

impl SimpleString {
    pub fn as_str(&self) -> &str {
        &self.inner
    }
}

impl Compose for SimpleString {
    fn compose(&self, dst: &mut dyn BufMut) -> usize {
        dst.put_slice(b"+");
        dst.put_slice(self.inner.as_bytes());
        dst.put_slice(b"\r\n");
        1 + self.inner.len() + 2
    }
}

pub(crate) fn parse(input: &[u8]) -> IResult<&[u8], SimpleString> {
    let (input, line) = nom::bytes::streaming::take_till(|b| b == b'\r')(input)?;
    let (input, _) = crlf(input)?;
    let inner = core::str::from_utf8(line)
        .map_err(|_| failure(input))?
        .to_string();
    Ok((input, SimpleString { inner }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() {
        assert_eq!(
            message(b"+OK\r\n"),
            Ok((&b""[..], Message::simple_string("OK")))
        );
        assert_eq!(
            message(b"+PONG\r\nextra"),
            Ok((&b"extra"[..], Message::simple_string("PONG")))
        );
    }
}
