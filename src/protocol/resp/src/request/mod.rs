// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The typed command model for the backing-store surface. A `Request`
//! composes to a RESP array of bulk strings on the wire and is recovered
//! from one on the server side.

use crate::*;
use protocol_common::{BufMut, Compose};

use thiserror::Error as ThisError;

mod generic;
mod hash;
mod script;
mod sorted_set;

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Ping,
    FlushAll,
    Exists {
        key: Vec<u8>,
    },
    Del {
        keys: Vec<Vec<u8>>,
    },
    Keys {
        pattern: Vec<u8>,
    },
    HGet {
        key: Vec<u8>,
        field: Vec<u8>,
    },
    HSet {
        key: Vec<u8>,
        pairs: Vec<(Vec<u8>, Vec<u8>)>,
    },
    HDel {
        key: Vec<u8>,
        fields: Vec<Vec<u8>>,
    },
    HExists {
        key: Vec<u8>,
        field: Vec<u8>,
    },
    HLen {
        key: Vec<u8>,
    },
    HGetAll {
        key: Vec<u8>,
    },
    HVals {
        key: Vec<u8>,
    },
    ZAdd {
        key: Vec<u8>,
        members: Vec<(f64, Vec<u8>)>,
    },
    ZRem {
        key: Vec<u8>,
        members: Vec<Vec<u8>>,
    },
    ZScore {
        key: Vec<u8>,
        member: Vec<u8>,
    },
    ZCard {
        key: Vec<u8>,
    },
    ZRange {
        key: Vec<u8>,
        start: i64,
        stop: i64,
        with_scores: bool,
    },
    ConfigGet {
        parameter: String,
    },
    ConfigSet {
        parameter: String,
        value: String,
    },
    Info,
    ScriptLoad {
        source: Vec<u8>,
    },
    ScriptExists {
        digests: Vec<Vec<u8>>,
    },
    ScriptFlush,
    EvalSha {
        digest: Vec<u8>,
        keys: Vec<Vec<u8>>,
        args: Vec<Vec<u8>>,
    },
}

#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct RequestError {
    message: String,
}

impl RequestError {
    pub(crate) fn new<T: ToString>(message: T) -> Self {
        Self {
            message: message.to_string(),
        }
    }

    pub(crate) fn wrong_arguments(command: &str) -> Self {
        Self::new(format!(
            "ERR wrong number of arguments for '{}' command",
            command.to_lowercase()
        ))
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Request {
    /// The wire form of this request: the command words followed by the
    /// arguments, each carried as a bulk string.
    fn parts(&self) -> Vec<Vec<u8>> {
        match self {
            Self::Ping => vec![b"PING".to_vec()],
            Self::FlushAll => vec![b"FLUSHALL".to_vec()],
            Self::Exists { key } => vec![b"EXISTS".to_vec(), key.clone()],
            Self::Del { keys } => {
                let mut parts = vec![b"DEL".to_vec()];
                parts.extend(keys.iter().cloned());
                parts
            }
            Self::Keys { pattern } => vec![b"KEYS".to_vec(), pattern.clone()],
            Self::HGet { key, field } => vec![b"HGET".to_vec(), key.clone(), field.clone()],
            Self::HSet { key, pairs } => {
                let mut parts = vec![b"HSET".to_vec(), key.clone()];
                for (field, value) in pairs {
                    parts.push(field.clone());
                    parts.push(value.clone());
                }
                parts
            }
            Self::HDel { key, fields } => {
                let mut parts = vec![b"HDEL".to_vec(), key.clone()];
                parts.extend(fields.iter().cloned());
                parts
            }
            Self::HExists { key, field } => {
                vec![b"HEXISTS".to_vec(), key.clone(), field.clone()]
            }
            Self::HLen { key } => vec![b"HLEN".to_vec(), key.clone()],
            Self::HGetAll { key } => vec![b"HGETALL".to_vec(), key.clone()],
            Self::HVals { key } => vec![b"HVALS".to_vec(), key.clone()],
            Self::ZAdd { key, members } => {
                let mut parts = vec![b"ZADD".to_vec(), key.clone()];
                for (score, member) in members {
                    parts.push(fmt_score(*score).into_bytes());
                    parts.push(member.clone());
                }
                parts
            }
            Self::ZRem { key, members } => {
                let mut parts = vec![b"ZREM".to_vec(), key.clone()];
                parts.extend(members.iter().cloned());
                parts
            }
            Self::ZScore { key, member } => {
                vec![b"ZSCORE".to_vec(), key.clone(), member.clone()]
            }
            Self::ZCard { key } => vec![b"ZCARD".to_vec(), key.clone()],
            Self::ZRange {
                key,
                start,
                stop,
                with_scores,
            } => {
                let mut parts = vec![
                    b"ZRANGE".to_vec(),
                    key.clone(),
                    start.to_string().into_bytes(),
                    stop.to_string().into_bytes(),
                ];
                if *with_scores {
                    parts.push(b"WITHSCORES".to_vec());
                }
                parts
            }
            Self::ConfigGet { parameter } => vec![
                b"CONFIG".to_vec(),
                b"GET".to_vec(),
                parameter.clone().into_bytes(),
            ],
            Self::ConfigSet { parameter, value } => vec![
                b"CONFIG".to_vec(),
                b"SET".to_vec(),
                parameter.clone().into_bytes(),
                value.clone().into_bytes(),
            ],
            Self::Info => vec![b"INFO".to_vec()],
            Self::ScriptLoad { source } => {
                vec![b"SCRIPT".to_vec(), b"LOAD".to_vec(), source.clone()]
            }
            Self::ScriptExists { digests } => {
                let mut parts = vec![b"SCRIPT".to_vec(), b"EXISTS".to_vec()];
                parts.extend(digests.iter().cloned());
                parts
            }
            Self::ScriptFlush => vec![b"SCRIPT".to_vec(), b"FLUSH".to_vec()],
            Self::EvalSha { digest, keys, args } => {
                let mut parts = vec![
                    b"EVALSHA".to_vec(),
                    digest.clone(),
                    keys.len().to_string().into_bytes(),
                ];
                parts.extend(keys.iter().cloned());
                parts.extend(args.iter().cloned());
                parts
            }
        }
    }
}

impl Compose for Request {
    fn compose(&self, dst: &mut dyn BufMut) -> usize {
        let parts = self.parts();
        let header = format!("*{}\r\n", parts.len());
        dst.put_slice(header.as_bytes());
        let mut len = header.len();
        for part in &parts {
            let part_header = format!("${}\r\n", part.len());
            dst.put_slice(part_header.as_bytes());
            dst.put_slice(part);
            dst.put_slice(b"\r\n");
            len += part_header.len() + part.len() + 2;
        }
        len
    }
}

impl TryFrom<&Message> for Request {
    type Error = RequestError;

    fn try_from(message: &Message) -> Result<Self, RequestError> {
        let frames = match message {
            Message::Array(array) => array
                .inner
                .as_ref()
                .ok_or_else(|| RequestError::new("ERR protocol error: null array"))?,
            _ => {
                return Err(RequestError::new(
                    "ERR protocol error: expected command array",
                ));
            }
        };

        let mut parts = Vec::with_capacity(frames.len());
        for frame in frames {
            parts.push(frame.as_bulk().ok_or_else(|| {
                RequestError::new("ERR protocol error: expected bulk string")
            })?);
        }

        let (command, args) = parts
            .split_first()
            .ok_or_else(|| RequestError::new("ERR protocol error: empty command"))?;

        let command = core::str::from_utf8(command)
            .map_err(|_| RequestError::new("ERR unknown command"))?
            .to_uppercase();

        match command.as_str() {
            "PING" | "FLUSHALL" | "EXISTS" | "DEL" | "KEYS" | "CONFIG" | "INFO" => {
                generic::parse(&command, args)
            }
            "HGET" | "HSET" | "HDEL" | "HEXISTS" | "HLEN" | "HGETALL" | "HVALS" => {
                hash::parse(&command, args)
            }
            "ZADD" | "ZREM" | "ZSCORE" | "ZCARD" | "ZRANGE" => sorted_set::parse(&command, args),
            "SCRIPT" | "EVALSHA" => script::parse(&command, args),
            _ => Err(RequestError::new(format!(
                "ERR unknown command '{}'",
                command.to_lowercase()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol_common::{Parse, ParseError};

    fn roundtrip(request: Request) {
        let mut buffer = Vec::new();
        request.compose(&mut buffer);
        let parser = MessageParser::default();
        let message = parser
            .parse(&buffer)
            .map_err(|_| ParseError::Invalid)
            .expect("composed request parses")
            .into_inner();
        assert_eq!(Request::try_from(&message), Ok(request));
    }

    #[test]
    fn wire_roundtrip() {
        roundtrip(Request::Ping);
        roundtrip(Request::HSet {
            key: b"silo:D:c:L1".to_vec(),
            pairs: vec![(b"d1".to_vec(), b"hello".to_vec())],
        });
        roundtrip(Request::ZRange {
            key: b"silo:Q:c".to_vec(),
            start: 0,
            stop: 0,
            with_scores: true,
        });
        roundtrip(Request::EvalSha {
            digest: b"abc123".to_vec(),
            keys: vec![b"silo:S:c".to_vec()],
            args: vec![b"c".to_vec(), b"L1".to_vec()],
        });
    }

    #[test]
    fn unknown_command() {
        let message = Message::array(vec![Message::bulk_string(b"SUBSCRIBE")]);
        assert!(Request::try_from(&message).is_err());
    }
}
