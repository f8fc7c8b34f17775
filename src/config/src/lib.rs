// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

#[macro_use]
extern crate log;

mod debug;
mod server;
mod store;

pub use debug::{Debug, DebugConfig};
pub use server::{Server, ServerConfig};
pub use store::{Store, StoreConfig};

use serde::{Deserialize, Serialize};

use std::io::Read;

/// Top-level configuration for the `silod` server binary. Each section has
/// defaults, so an empty file (or no file at all) produces a usable
/// configuration.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct SilodConfig {
    #[serde(default)]
    server: Server,
    #[serde(default)]
    store: Store,
    #[serde(default)]
    debug: Debug,
}

impl SilodConfig {
    pub fn load(file: &str) -> Result<Self, std::io::Error> {
        let mut file = std::fs::File::open(file)?;
        let mut content = String::new();
        file.read_to_string(&mut content)?;
        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                error!("{}", e);
                Err(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "error parsing config",
                ))
            }
        }
    }
}

impl ServerConfig for SilodConfig {
    fn server(&self) -> &Server {
        &self.server
    }
}

impl StoreConfig for SilodConfig {
    fn store(&self) -> &Store {
        &self.store
    }
}

impl DebugConfig for SilodConfig {
    fn debug(&self) -> &Debug {
        &self.debug
    }
}
