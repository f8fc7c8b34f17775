// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use super::{Request, RequestError};

pub(crate) fn parse(command: &str, args: &[&[u8]]) -> Result<Request, RequestError> {
    match command {
        "SCRIPT" => {
            let (subcommand, rest) = args
                .split_first()
                .ok_or_else(|| RequestError::wrong_arguments(command))?;
            if subcommand.eq_ignore_ascii_case(b"LOAD") {
                match rest {
                    [source] => Ok(Request::ScriptLoad {
                        source: source.to_vec(),
                    }),
                    _ => Err(RequestError::wrong_arguments(command)),
                }
            } else if subcommand.eq_ignore_ascii_case(b"EXISTS") {
                if rest.is_empty() {
                    return Err(RequestError::wrong_arguments(command));
                }
                Ok(Request::ScriptExists {
                    digests: rest.iter().map(|d| d.to_vec()).collect(),
                })
            } else if subcommand.eq_ignore_ascii_case(b"FLUSH") {
                if !rest.is_empty() {
                    return Err(RequestError::wrong_arguments(command));
                }
                Ok(Request::ScriptFlush)
            } else {
                Err(RequestError::new("ERR unknown SCRIPT subcommand"))
            }
        }
        "EVALSHA" => {
            if args.len() < 2 {
                return Err(RequestError::wrong_arguments(command));
            }
            let digest = args[0].to_vec();
            let numkeys: usize = core::str::from_utf8(args[1])
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| RequestError::new("ERR value is not an integer or out of range"))?;
            let rest = &args[2..];
            if rest.len() < numkeys {
                return Err(RequestError::new("ERR Number of keys can't be greater than number of args"));
            }
            Ok(Request::EvalSha {
                digest,
                keys: rest[..numkeys].iter().map(|k| k.to_vec()).collect(),
                args: rest[numkeys..].iter().map(|a| a.to_vec()).collect(),
            })
        }
        _ => Err(RequestError::new("ERR unknown command")),
    }
}
