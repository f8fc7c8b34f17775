// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use super::{Request, RequestError};

pub(crate) fn parse(command: &str, args: &[&[u8]]) -> Result<Request, RequestError> {
    match command {
        "PING" => {
            if !args.is_empty() {
                return Err(RequestError::wrong_arguments(command));
            }
            Ok(Request::Ping)
        }
        "FLUSHALL" => {
            if !args.is_empty() {
                return Err(RequestError::wrong_arguments(command));
            }
            Ok(Request::FlushAll)
        }
        "EXISTS" => match args {
            [key] => Ok(Request::Exists { key: key.to_vec() }),
            _ => Err(RequestError::wrong_arguments(command)),
        },
        "DEL" => {
            if args.is_empty() {
                return Err(RequestError::wrong_arguments(command));
            }
            Ok(Request::Del {
                keys: args.iter().map(|k| k.to_vec()).collect(),
            })
        }
        "KEYS" => match args {
            [pattern] => Ok(Request::Keys {
                pattern: pattern.to_vec(),
            }),
            _ => Err(RequestError::wrong_arguments(command)),
        },
        "CONFIG" => match args {
            [subcommand, parameter] if subcommand.eq_ignore_ascii_case(b"GET") => {
                Ok(Request::ConfigGet {
                    parameter: string_arg(parameter)?,
                })
            }
            [subcommand, parameter, value] if subcommand.eq_ignore_ascii_case(b"SET") => {
                Ok(Request::ConfigSet {
                    parameter: string_arg(parameter)?,
                    value: string_arg(value)?,
                })
            }
            _ => Err(RequestError::wrong_arguments(command)),
        },
        "INFO" => Ok(Request::Info),
        _ => Err(RequestError::new("ERR unknown command")),
    }
}

fn string_arg(bytes: &[u8]) -> Result<String, RequestError> {
    core::str::from_utf8(bytes)
        .map(|s| s.to_string())
        .map_err(|_| RequestError::new("ERR invalid argument"))
}
