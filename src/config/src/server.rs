// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use serde::{Deserialize, Serialize};

use std::net::{SocketAddr, ToSocketAddrs};

// constants to define default values
const HOST: &str = "127.0.0.1";
const PORT: &str = "6650";
const TIMEOUT_MS: u64 = 10_000;

// helper functions
fn host() -> String {
    HOST.to_string()
}

fn port() -> String {
    PORT.to_string()
}

fn timeout_ms() -> u64 {
    TIMEOUT_MS
}

// struct definitions
#[derive(Serialize, Deserialize, Debug)]
pub struct Server {
    #[serde(default = "host")]
    host: String,
    #[serde(default = "port")]
    port: String,
    #[serde(default = "timeout_ms")]
    timeout_ms: u64,
}

// implementation
impl Server {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::io::Error> {
        format!("{}:{}", self.host, self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    "could not resolve socket addr",
                )
            })
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }
}

// trait implementations
impl Default for Server {
    fn default() -> Self {
        Self {
            host: host(),
            port: port(),
            timeout_ms: timeout_ms(),
        }
    }
}

pub trait ServerConfig {
    fn server(&self) -> &Server;
}
