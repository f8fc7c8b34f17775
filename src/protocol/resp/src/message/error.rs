// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use super::*;
use crate::*;
use protocol_common::{BufMut, Compose};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub(crate) inner: String,
}

impl Error {
    pub fn as_str(&self) -> &str {
        &self.inner
    }
}

impl Compose for Error {
    fn compose(&self, dst: &mut dyn BufMut) -> usize {
        dst.put_slice(b"-");
        dst.put_slice(self.inner.as_bytes());
        dst.put_slice(b"\r\n");
        1 + self.inner.len() + 2
    }
}

pub(crate) fn parse(input: &[u8]) -> IResult<&[u8], Error> {
    let (input, line) = nom::bytes::streaming::take_till(|b| b == b'\r')(input)?;
    let (input, _) = crlf(input)?;
    let inner = core::str::from_utf8(line)
        .map_err(|_| failure(input))?
        .to_string();
    Ok((input, Error { inner }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() {
        assert_eq!(
            message(b"-ERR unknown command\r\n"),
            Ok((&b""[..], Message::error("ERR unknown command")))
        );
    }
}
