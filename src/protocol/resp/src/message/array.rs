// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use super::*;
use crate::*;
use protocol_common::{BufMut, Compose};

#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    pub(crate) inner: Option<Vec<Message>>,
}

impl Compose for Array {
    fn compose(&self, dst: &mut dyn BufMut) -> usize {
        if let Some(values) = &self.inner {
            let header = format!("*{}\r\n", values.len());
            dst.put_slice(header.as_bytes());
            let mut len = header.len();
            for value in values {
                len += value.compose(dst);
            }
            len
        } else {
            dst.put_slice(b"*-1\r\n");
            5
        }
    }
}

pub(crate) fn parse(input: &[u8]) -> IResult<&[u8], Array> {
    let (input, len) = parse_i64(input)?;
    let (mut input, _) = crlf(input)?;

    if len < 0 {
        return Ok((input, Array { inner: None }));
    }

    let mut values = Vec::with_capacity(len as usize);
    for _ in 0..len {
        let (remaining, value) = message(input)?;
        values.push(value);
        input = remaining;
    }

    Ok((
        input,
        Array {
            inner: Some(values),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() {
        assert_eq!(
            message(b"*2\r\n:0\r\n$5\r\nhello\r\n"),
            Ok((
                &b""[..],
                Message::array(vec![Message::integer(0), Message::bulk_string(b"hello")])
            ))
        );
        assert_eq!(
            message(b"*0\r\n"),
            Ok((&b""[..], Message::array(Vec::new())))
        );
    }

    #[test]
    fn parse_nested() {
        assert_eq!(
            message(b"*1\r\n*1\r\n:7\r\n"),
            Ok((
                &b""[..],
                Message::array(vec![Message::array(vec![Message::integer(7)])])
            ))
        );
    }
}
