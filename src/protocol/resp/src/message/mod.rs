// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::*;
use protocol_common::*;

mod array;
mod bulk_string;
mod error;
mod integer;
mod simple_string;

pub use array::Array;
pub use bulk_string::BulkString;
pub use error::Error;
pub use integer::Integer;
pub use simple_string::SimpleString;

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    SimpleString(SimpleString),
    Error(Error),
    Integer(Integer),
    BulkString(BulkString),
    Array(Array),
}

impl Message {
    pub fn simple_string<T: ToString>(string: T) -> Self {
        Self::SimpleString(SimpleString {
            inner: string.to_string(),
        })
    }

    pub fn error<T: ToString>(string: T) -> Self {
        Self::Error(Error {
            inner: string.to_string(),
        })
    }

    pub fn integer(value: i64) -> Self {
        Self::Integer(Integer { inner: value })
    }

    pub fn null() -> Self {
        Self::BulkString(BulkString { inner: None })
    }

    pub fn bulk_string(value: &[u8]) -> Self {
        Self::BulkString(BulkString {
            inner: Some(value.to_vec()),
        })
    }

    pub fn array(values: Vec<Message>) -> Self {
        Self::Array(Array {
            inner: Some(values),
        })
    }

    /// The error text, if this message is an error reply.
    pub fn as_error(&self) -> Option<&str> {
        match self {
            Self::Error(e) => Some(&e.inner),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(i.inner),
            _ => None,
        }
    }

    /// The payload of a non-null bulk string.
    pub fn as_bulk(&self) -> Option<&[u8]> {
        match self {
            Self::BulkString(s) => s.inner.as_deref(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(
            self,
            Self::BulkString(BulkString { inner: None }) | Self::Array(Array { inner: None })
        )
    }

    pub fn into_array(self) -> Option<Vec<Message>> {
        match self {
            Self::Array(a) => a.inner,
            _ => None,
        }
    }
}

impl Compose for Message {
    fn compose(&self, dst: &mut dyn BufMut) -> usize {
        match self {
            Self::SimpleString(s) => s.compose(dst),
            Self::Error(e) => e.compose(dst),
            Self::Integer(i) => i.compose(dst),
            Self::BulkString(s) => s.compose(dst),
            Self::Array(a) => a.compose(dst),
        }
    }
}

pub(crate) enum MessageType {
    SimpleString,
    Error,
    Integer,
    BulkString,
    Array,
}

pub(crate) fn message_type(input: &[u8]) -> IResult<&[u8], MessageType> {
    let (remaining, token) = take(1usize)(input)?;
    let message_type = match token {
        b"+" => MessageType::SimpleString,
        b"-" => MessageType::Error,
        b":" => MessageType::Integer,
        b"$" => MessageType::BulkString,
        b"*" => MessageType::Array,
        _ => {
            return Err(failure(input));
        }
    };
    Ok((remaining, message_type))
}

pub(crate) fn message(input: &[u8]) -> IResult<&[u8], Message> {
    match message_type(input)? {
        (input, MessageType::SimpleString) => {
            let (input, message) = simple_string::parse(input)?;
            Ok((input, Message::SimpleString(message)))
        }
        (input, MessageType::Error) => {
            let (input, message) = error::parse(input)?;
            Ok((input, Message::Error(message)))
        }
        (input, MessageType::Integer) => {
            let (input, message) = integer::parse(input)?;
            Ok((input, Message::Integer(message)))
        }
        (input, MessageType::BulkString) => {
            let (input, message) = bulk_string::parse(input)?;
            Ok((input, Message::BulkString(message)))
        }
        (input, MessageType::Array) => {
            let (input, message) = array::parse(input)?;
            Ok((input, Message::Array(message)))
        }
    }
}

#[derive(Default)]
pub struct MessageParser {}

impl Parse<Message> for MessageParser {
    fn parse(&self, buffer: &[u8]) -> Result<ParseOk<Message>, ParseError> {
        match message(buffer) {
            Ok((input, message)) => Ok(ParseOk::new(message, buffer.len() - input.len())),
            Err(Err::Incomplete(_)) => Err(ParseError::Incomplete),
            Err(_) => Err(ParseError::Invalid),
        }
    }
}
