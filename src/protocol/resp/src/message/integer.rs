// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use super::*;
use crate::*;
use protocol_common::{BufMut, Compose};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Integer {
    pub(crate) inner: i64,
}

impl Compose for Integer {
    fn compose(&self, dst: &mut dyn BufMut) -> usize {
        let line = format!(":{}\r\n", self.inner);
        dst.put_slice(line.as_bytes());
        line.len()
    }
}

pub(crate) fn parse(input: &[u8]) -> IResult<&[u8], Integer> {
    let (input, inner) = parse_i64(input)?;
    let (input, _) = crlf(input)?;
    Ok((input, Integer { inner }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() {
        assert_eq!(message(b":0\r\n"), Ok((&b""[..], Message::integer(0))));
        assert_eq!(message(b":42\r\n"), Ok((&b""[..], Message::integer(42))));
        assert_eq!(message(b":-1\r\n"), Ok((&b""[..], Message::integer(-1))));
    }
}
