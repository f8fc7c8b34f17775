// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use super::{Request, RequestError};
use crate::parse_score;

pub(crate) fn parse(command: &str, args: &[&[u8]]) -> Result<Request, RequestError> {
    match command {
        "ZADD" => {
            let (key, rest) = args
                .split_first()
                .ok_or_else(|| RequestError::wrong_arguments(command))?;
            if rest.is_empty() || rest.len() % 2 != 0 {
                return Err(RequestError::wrong_arguments(command));
            }
            let mut members = Vec::with_capacity(rest.len() / 2);
            for pair in rest.chunks_exact(2) {
                let score = parse_score(pair[0])
                    .ok_or_else(|| RequestError::new("ERR value is not a valid float"))?;
                members.push((score, pair[1].to_vec()));
            }
            Ok(Request::ZAdd {
                key: key.to_vec(),
                members,
            })
        }
        "ZREM" => {
            let (key, members) = args
                .split_first()
                .ok_or_else(|| RequestError::wrong_arguments(command))?;
            if members.is_empty() {
                return Err(RequestError::wrong_arguments(command));
            }
            Ok(Request::ZRem {
                key: key.to_vec(),
                members: members.iter().map(|m| m.to_vec()).collect(),
            })
        }
        "ZSCORE" => match args {
            [key, member] => Ok(Request::ZScore {
                key: key.to_vec(),
                member: member.to_vec(),
            }),
            _ => Err(RequestError::wrong_arguments(command)),
        },
        "ZCARD" => match args {
            [key] => Ok(Request::ZCard { key: key.to_vec() }),
            _ => Err(RequestError::wrong_arguments(command)),
        },
        "ZRANGE" => {
            let with_scores = match args {
                [_, _, _] => false,
                [_, _, _, token] if token.eq_ignore_ascii_case(b"WITHSCORES") => true,
                _ => return Err(RequestError::wrong_arguments(command)),
            };
            let start = index_arg(args[1])?;
            let stop = index_arg(args[2])?;
            Ok(Request::ZRange {
                key: args[0].to_vec(),
                start,
                stop,
                with_scores,
            })
        }
        _ => Err(RequestError::new("ERR unknown command")),
    }
}

fn index_arg(bytes: &[u8]) -> Result<i64, RequestError> {
    core::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| RequestError::new("ERR value is not an integer or out of range"))
}
