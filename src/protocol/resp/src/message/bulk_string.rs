// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use super::*;
use crate::*;
use protocol_common::{BufMut, Compose};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkString {
    pub(crate) inner: Option<Vec<u8>>,
}

impl BulkString {
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            inner: Some(bytes.to_vec()),
        }
    }
}

impl Compose for BulkString {
    fn compose(&self, dst: &mut dyn BufMut) -> usize {
        if let Some(value) = &self.inner {
            let header = format!("${}\r\n", value.len());
            dst.put_slice(header.as_bytes());
            dst.put_slice(value);
            dst.put_slice(b"\r\n");
            header.len() + value.len() + 2
        } else {
            dst.put_slice(b"$-1\r\n");
            5
        }
    }
}

pub(crate) fn parse(input: &[u8]) -> IResult<&[u8], BulkString> {
    match input.first() {
        Some(b'-') => {
            let (input, _) = take(1usize)(input)?;
            let (input, len) = digit1(input)?;
            if len != b"1" {
                return Err(failure(input));
            }
            let (input, _) = crlf(input)?;
            Ok((input, BulkString { inner: None }))
        }
        Some(_) => {
            let (input, len) = digit1(input)?;
            // digit1 only matches ascii digits
            let len = unsafe { core::str::from_utf8_unchecked(len) };
            let len = len.parse::<usize>().map_err(|_| failure(input))?;
            let (input, _) = crlf(input)?;
            let (input, value) = take(len)(input)?;
            let (input, _) = crlf(input)?;
            Ok((
                input,
                BulkString {
                    inner: Some(value.to_vec()),
                },
            ))
        }
        None => Err(Err::Incomplete(Needed::new(1))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() {
        assert_eq!(message(b"$-1\r\n"), Ok((&b""[..], Message::null())));
        assert_eq!(
            message(b"$0\r\n\r\n"),
            Ok((&b""[..], Message::bulk_string(&[])))
        );
        assert_eq!(
            message(b"$11\r\nHELLO WORLD\r\n"),
            Ok((&b""[..], Message::bulk_string(b"HELLO WORLD")))
        );
    }

    #[test]
    fn parse_incomplete() {
        assert!(matches!(message(b"$11\r\nHELLO"), Err(Err::Incomplete(_))));
    }
}
