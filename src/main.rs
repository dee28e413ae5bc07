/*
 * Copyright © 2023 Archer <archer@nefarious.dev>
 * Licensed under the Apache License, Version 2.0 (the "Licence");
 * you may not use this file except in compliance with the Licence.
 * You may obtain a copy of the Licence at
 *     https://www.apache.org/licenses/LICENSE-2.0
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the Licence is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the Licence for the specific language governing permissions and
 * limitations under the Licence.
 */

//! Mints and decodes identifiers from the command line.
//!
//! The worker and datacenter IDs are read from `--worker-id` / `--datacenter-id` or the `SNOWKEY_WORKER_ID` /
//! `SNOWKEY_DATACENTER_ID` environment variables.

use clap::{Parser, Subcommand};
use snowkey::{GeneratorConfig, Identifier};
use std::error::Error;
use std::io::{self, Write};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "snowkey", version, about = "Mint and decode snowflake primary keys")]
struct Cli {
    /// Worker ID of this process (0-31)
    #[arg(long, env = "SNOWKEY_WORKER_ID", default_value_t = 1, global = true)]
    worker_id: u64,
    /// Datacenter ID of this process (0-31)
    #[arg(long, env = "SNOWKEY_DATACENTER_ID", default_value_t = 1, global = true)]
    datacenter_id: u64,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print new identifiers, one per line
    Mint {
        /// Number of identifiers to mint
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u64,
    },
    /// Print the fields of existing identifiers
    Decode {
        /// Identifiers in their decimal form
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    match run(cli, &mut io::stdout().lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("snowkey: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    // Logs go to stderr so that stdout only carries identifiers
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli, out: &mut impl Write) -> Result<(), Box<dyn Error>> {
    match cli.command {
        Command::Mint { count } => {
            let config = GeneratorConfig {
                worker_id: cli.worker_id,
                datacenter_id: cli.datacenter_id,
            };
            let generator = config.build()?;
            info!(count, worker_id = config.worker_id, datacenter_id = config.datacenter_id, "minting identifiers");
            for _ in 0..count {
                writeln!(out, "{}", generator.next_id()?)?;
            }
        }
        Command::Decode { ids } => {
            for raw in ids {
                let id: Identifier = raw.parse()?;
                writeln!(
                    out,
                    "{id} unix_millis={} elapsed={} datacenter={} worker={} sequence={}",
                    id.get_unix_millis(),
                    id.get_timestamp_raw(),
                    id.get_datacenter_id(),
                    id.get_worker_id(),
                    id.get_sequence_number(),
                )?;
            }
        }
    }
    out.flush()?;
    Ok(())
}
