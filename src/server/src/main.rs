// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use clap::Parser;
use config::{DebugConfig, SilodConfig};
use logger::LogBuilder;
use silo_server::Silod;

#[derive(Parser, Debug)]
#[command(name = "silod", about = "capped collection backing store server")]
struct Args {
    /// Path to a TOML configuration file. Defaults apply without one.
    #[arg(short, long)]
    config: Option<String>,
}

fn main() {
    let args = Args::parse();

    let config = match args.config {
        Some(path) => match SilodConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error loading config: {}", e);
                std::process::exit(1);
            }
        },
        None => SilodConfig::default(),
    };

    let mut log = LogBuilder::new().level(config.debug().log_level());
    if let Some(file) = config.debug().log_file() {
        log = log.output_file(file.into());
    }
    if let Err(e) = log.init() {
        eprintln!("error initializing logging: {}", e);
        std::process::exit(1);
    }

    match Silod::spawn(&config) {
        Ok(server) => server.wait(),
        Err(e) => {
            eprintln!("error launching server: {}", e);
            std::process::exit(1);
        }
    }
}
