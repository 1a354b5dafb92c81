//! Command handlers

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use colored::*;
use serde_json::{json, Value};
use tracing::info;

use mesh_comlink::sim::SimulatedCoordinator;
use mesh_comlink::{
    ByteOrder, Coordinator, DWordItem, FactoryConfigInput, LinkState, RegisterItem, ScanDuration,
    WordItem,
};

use crate::{Commands, FactoryCommands, Width};

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse decimal or 0x-prefixed hex
fn parse_u16(text: &str) -> Result<u16> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => text.parse::<u16>(),
    };
    parsed.with_context(|| format!("invalid 16-bit value '{text}'"))
}

fn parse_byte_order(text: &str) -> Result<ByteOrder> {
    ByteOrder::from_str(text).ok_or_else(|| anyhow!("unknown byte order '{text}'"))
}

pub async fn handle_command(
    cmd: Commands,
    coordinator: &Coordinator,
    sim: &SimulatedCoordinator,
) -> Result<()> {
    match cmd {
        Commands::SlaveId => {
            let id = coordinator.get_slave_id().await?;
            print_json(&serde_json::to_value(id)?)
        },
        Commands::Factory { command } => match command {
            FactoryCommands::Get => {
                let config = coordinator.get_factory_config().await?;
                print_json(&serde_json::to_value(config)?)
            },
            FactoryCommands::Set {
                mac,
                serial,
                product_type,
            } => {
                let mac_address = common::hex::decode_sep(mac.trim(), ':')
                    .with_context(|| format!("invalid device address '{mac}'"))?;
                let input = FactoryConfigInput {
                    mac_address,
                    serial_number: serial,
                    product_type,
                };
                let written = coordinator.set_factory_config(&input).await?;
                print_json(&serde_json::to_value(written)?)
            },
        },
        Commands::Connections => {
            let entries = coordinator.get_connections().await?;
            print_json(&serde_json::to_value(entries)?)
        },
        Commands::Command { name, payload } => {
            let payload = match payload {
                Some(hex) => common::hex::decode(hex.trim())
                    .with_context(|| format!("invalid hex payload '{hex}'"))?,
                None => Vec::new(),
            };
            let response = coordinator.command(&name, payload).await?;
            print_json(&json!({
                "status": response.status,
                "values": common::hex::encode_upper(&response.values),
            }))
        },
        Commands::Scan {
            scan_type,
            duration,
        } => {
            let result = coordinator
                .scan(scan_type, ScanDuration::new(duration)?)
                .await?;
            print_json(&serde_json::to_value(result)?)
        },
        Commands::Reset => {
            let status = coordinator.reset().await?;
            print_json(&json!({ "status": status }))
        },
        Commands::Clear => {
            let status = coordinator.clear().await?;
            print_json(&json!({ "status": status }))
        },
        Commands::Pair => {
            let status = coordinator.pair().await?;
            print_json(&json!({ "status": status }))
        },
        Commands::Ping { address } => {
            let result = coordinator.ping(parse_u16(&address)?).await?;
            print_json(&serde_json::to_value(result)?)
        },
        Commands::ReadRegister {
            address,
            width,
            byte_order,
        } => {
            let address = parse_u16(&address)?;
            let value = match width {
                Width::Word => {
                    let item = WordItem::new(address);
                    item.format(&coordinator.read(&item).await?)
                },
                Width::Dword => {
                    let item = DWordItem::new(address, parse_byte_order(&byte_order)?);
                    item.format(&coordinator.read(&item).await?)
                },
            };
            print_json(&json!({ "address": address, "value": value }))
        },
        Commands::WriteRegister {
            address,
            value,
            width,
            byte_order,
        } => {
            let address = parse_u16(&address)?;
            match width {
                Width::Word => {
                    let item = WordItem::new(address);
                    coordinator.write(&item, &item.unformat(&value)?).await?;
                },
                Width::Dword => {
                    let item = DWordItem::new(address, parse_byte_order(&byte_order)?);
                    coordinator.write(&item, &item.unformat(&value)?).await?;
                },
            }
            print_json(&json!({ "address": address, "written": value }))
        },
        Commands::Monitor { drop_after } => monitor(coordinator, sim, drop_after).await,
    }
}

async fn monitor(
    coordinator: &Coordinator,
    sim: &SimulatedCoordinator,
    drop_after: Option<u64>,
) -> Result<()> {
    let mut events = coordinator.connection().subscribe();
    let drop_timer = async {
        match drop_after {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(drop_timer);
    let mut dropped = false;

    println!(
        "{} {} ({})",
        "Monitoring".green().bold(),
        coordinator.connection().name(),
        coordinator.state()
    );

    loop {
        tokio::select! {
            _ = common::shutdown::wait_for_shutdown() => {
                info!("Shutdown signal received");
                break;
            },
            _ = &mut drop_timer, if !dropped => {
                dropped = true;
                sim.disconnect("simulated link drop");
            },
            event = events.recv() => match event {
                Ok(event) => println!("{}", serde_json::to_string(&event)?),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    eprintln!("{} {} events skipped", "warning:".yellow(), n);
                },
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    let stats = coordinator.connection().stats();
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "state": coordinator.state(),
            "reconnectAttempts": stats.total_attempts,
            "reconnects": stats.successful_reconnects,
            "failedReconnects": stats.failed_reconnects,
            "open": coordinator.state() == LinkState::Open,
        }))?
    );
    Ok(())
}
