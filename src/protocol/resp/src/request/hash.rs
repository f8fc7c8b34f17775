// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use super::{Request, RequestError};

pub(crate) fn parse(command: &str, args: &[&[u8]]) -> Result<Request, RequestError> {
    match command {
        "HGET" => match args {
            [key, field] => Ok(Request::HGet {
                key: key.to_vec(),
                field: field.to_vec(),
            }),
            _ => Err(RequestError::wrong_arguments(command)),
        },
        "HSET" => {
            let (key, rest) = args
                .split_first()
                .ok_or_else(|| RequestError::wrong_arguments(command))?;
            if rest.is_empty() || rest.len() % 2 != 0 {
                return Err(RequestError::wrong_arguments(command));
            }
            let pairs = rest
                .chunks_exact(2)
                .map(|pair| (pair[0].to_vec(), pair[1].to_vec()))
                .collect();
            Ok(Request::HSet {
                key: key.to_vec(),
                pairs,
            })
        }
        "HDEL" => {
            let (key, fields) = args
                .split_first()
                .ok_or_else(|| RequestError::wrong_arguments(command))?;
            if fields.is_empty() {
                return Err(RequestError::wrong_arguments(command));
            }
            Ok(Request::HDel {
                key: key.to_vec(),
                fields: fields.iter().map(|f| f.to_vec()).collect(),
            })
        }
        "HEXISTS" => match args {
            [key, field] => Ok(Request::HExists {
                key: key.to_vec(),
                field: field.to_vec(),
            }),
            _ => Err(RequestError::wrong_arguments(command)),
        },
        "HLEN" => match args {
            [key] => Ok(Request::HLen { key: key.to_vec() }),
            _ => Err(RequestError::wrong_arguments(command)),
        },
        "HGETALL" => match args {
            [key] => Ok(Request::HGetAll { key: key.to_vec() }),
            _ => Err(RequestError::wrong_arguments(command)),
        },
        "HVALS" => match args {
            [key] => Ok(Request::HVals { key: key.to_vec() }),
            _ => Err(RequestError::wrong_arguments(command)),
        },
        _ => Err(RequestError::new("ERR unknown command")),
    }
}
