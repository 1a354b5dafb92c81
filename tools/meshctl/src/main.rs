//! meshctl - control tool for mesh coordinators
//!
//! Runs one device operation per invocation and prints the result as JSON.
//! Without an external serial master the tool talks to the built-in
//! simulated coordinator.

mod demo;
mod ops;

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use tracing::debug;

use mesh_comlink::sim::SimulatedCoordinator;
use mesh_comlink::{Coordinator, LinkConfig, ScanType};

#[derive(Parser)]
#[command(name = "meshctl")]
#[command(about = "Mesh coordinator control tool")]
#[command(long_about = "Mesh coordinator control tool

Device Operations:
  slave-id        Report coordinator identity
  factory         Read or program the factory record
  connections     List valid connection-table entries
  command         Run a named command with a hex payload
  scan            Channel scan
  reset/clear/pair
  ping            Ping a node by short address
  read-register   Read holding registers
  write-register  Write holding registers
  monitor         Print link events until Ctrl+C

Examples:
  meshctl slave-id
  meshctl factory set --mac 00:11:22:33:44:55:66:77 --serial 123456789 --product-type 2
  meshctl scan energy 3
  meshctl ping 0x0001")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (yaml, toml or json)
    #[arg(short, long, global = true, env = "MESHLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Log level or filter, overrides the configuration
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Report coordinator identity
    SlaveId,

    /// Factory record
    Factory {
        #[command(subcommand)]
        command: FactoryCommands,
    },

    /// List valid connection-table entries
    Connections,

    /// Run a named command
    Command {
        /// Command name (reset, clear, pair, ping, scan)
        name: String,
        /// Payload as hex, e.g. 0102
        payload: Option<String>,
    },

    /// Channel scan
    Scan {
        /// energy, active or both
        scan_type: ScanType,
        /// Duration exponent, 0..=14
        duration: u8,
    },

    /// Reset the coordinator
    Reset,

    /// Clear the connection table
    Clear,

    /// Open the network for pairing
    Pair,

    /// Ping a node
    Ping {
        /// 16-bit short address, decimal or 0x-prefixed hex
        address: String,
    },

    /// Read holding registers
    ReadRegister {
        /// Register address, decimal or 0x-prefixed hex
        address: String,
        #[arg(long, value_enum, default_value = "word")]
        width: Width,
        /// Word order for dword values (ABCD, DCBA, CDAB, BADC)
        #[arg(long, default_value = "ABCD")]
        byte_order: String,
    },

    /// Write holding registers
    WriteRegister {
        address: String,
        value: String,
        #[arg(long, value_enum, default_value = "word")]
        width: Width,
        #[arg(long, default_value = "ABCD")]
        byte_order: String,
    },

    /// Keep the link open and print lifecycle events until Ctrl+C
    Monitor {
        /// Simulate a link drop after this many seconds
        #[arg(long)]
        drop_after: Option<u64>,
    },
}

#[derive(Subcommand)]
pub enum FactoryCommands {
    /// Read the factory record
    Get,

    /// Program the factory record
    Set {
        /// Device address, colon separated hex octets
        #[arg(long)]
        mac: String,
        #[arg(long)]
        serial: u64,
        #[arg(long)]
        product_type: Option<u8>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Width {
    Word,
    Dword,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let mut config = LinkConfig::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if cli.json {
        config.log_json = true;
    }
    common::logging::init_logging(&config.log_level, config.log_json)
        .map_err(|e| anyhow!("failed to initialize logging: {e}"))?;
    debug!("Configuration: {:?}", config);

    let sim = SimulatedCoordinator::new(config.port.clone());
    demo::seed(&sim);
    let coordinator = Coordinator::new(sim.clone(), sim.clone(), &config);
    coordinator.open().await?;

    let result = ops::handle_command(cli.command, &coordinator, &sim).await;
    coordinator.destroy().await?;
    result
}
