use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use time::OffsetDateTime;

use patcom_api::{ConfigPatch, ConfigSnapshot};
use patcom_app::error::{Error, Result};
use patcom_app::serial::SerialClient;
use patcom_app::settings::{Serial, Settings};
use patcom_app::{bind_discovery, build_coordinator, build_registry};

/// Discover, inspect and configure PATCOM button panels.
#[derive(Parser, Debug)]
#[command(name = "patcom-app", about = "PATCOM device coordinator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Broadcast a discovery request and list the devices that answer.
    Discover {
        /// Response window in milliseconds.
        #[arg(long)]
        window_ms: Option<u64>,
    },
    /// Keep the device list current from announcements until interrupted.
    Watch,
    /// Read the redacted configuration of one device.
    Fetch { device_id: String },
    /// Make every discovered device match a configuration file.
    Sync {
        /// JSON configuration snapshot.
        snapshot: PathBuf,
        /// Only this device.
        #[arg(long)]
        device: Option<String>,
        /// Send even when the hashes already match, e.g. after changing a secret.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Talk to a device over its USB serial link.
    Serial {
        /// Port path, first available port when omitted.
        #[arg(long)]
        port: Option<String>,
        #[command(subcommand)]
        command: SerialCommand,
    },
}

#[derive(Subcommand, Debug)]
enum SerialCommand {
    Identify,
    Status,
    Config,
    /// Upload a JSON configuration patch.
    SetConfig { patch: PathBuf },
    /// Fire a button as if it was pressed.
    Test { button: u8 },
    /// Forget the WiFi network; the device restarts.
    ResetWifi,
    Wifi,
    Battery,
}

#[tokio::main]
async fn main() {
    let settings = Settings::new().expect("Failed to load settings.");

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let app_name = env!("CARGO_PKG_NAME").replace('-', "_");
            let level = settings.logger.level.as_str();

            format!("{app_name}={level}").into()
        }))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command, &settings).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(command: Command, settings: &Settings) -> Result<()> {
    match command {
        Command::Discover { window_ms } => {
            let window = window_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| settings.discovery.response_window());
            let client = bind_discovery(settings, build_registry(settings)).await?;
            print_json(&client.discover(window).await?)
        }
        Command::Watch => watch(settings).await,
        Command::Fetch { device_id } => {
            let registry = build_registry(settings);
            let client = bind_discovery(settings, registry.clone()).await?;
            client.discover(settings.discovery.response_window()).await?;
            let report = build_coordinator(settings, registry).fetch_config(&device_id).await?;
            print_json(&report)
        }
        Command::Sync {
            snapshot,
            device,
            force,
        } => {
            let snapshot: ConfigSnapshot = read_json(&snapshot)?;
            let registry = build_registry(settings);
            let client = bind_discovery(settings, registry.clone()).await?;
            client.discover(settings.discovery.response_window()).await?;

            let coordinator = build_coordinator(settings, registry.clone());
            let ids: Vec<String> = match device {
                Some(id) => vec![id],
                None => registry
                    .get_discovered_devices()
                    .await
                    .into_iter()
                    .map(|d| d.identity.device_id)
                    .collect(),
            };

            let outcomes = if force || ids.len() == 1 {
                let mut outcomes = Vec::new();
                for id in ids {
                    let outcome = if force {
                        coordinator.push_to_device(&id, &snapshot).await
                    } else {
                        coordinator.sync_to_device(&id, &snapshot).await
                    };
                    outcomes.push((id, outcome));
                }
                outcomes
            } else {
                coordinator.sync_all_devices(&snapshot).await
            };

            for (id, outcome) in &outcomes {
                println!("{}: {:?}", id, outcome);
            }
            Ok(())
        }
        Command::Serial { port, command } => {
            let mut serial = settings.serial.clone().unwrap_or(Serial {
                port_path: None,
                baud_rate: 115_200,
                timeout_ms: 2000,
            });
            if port.is_some() {
                serial.port_path = port;
            }
            tokio::task::spawn_blocking(move || serial_command(&serial, command))
                .await
                .map_err(|e| Error::serial(e.to_string()))?
        }
    }
}

async fn watch(settings: &Settings) -> Result<()> {
    let registry = build_registry(settings);
    let coordinator = build_coordinator(settings, registry.clone());
    let client = bind_discovery(settings, registry.clone()).await?;
    client.discover(settings.discovery.response_window()).await?;

    let mut sweep = tokio::time::interval(settings.discovery.sweep_interval());
    loop {
        tokio::select! {
            result = client.listen_announcements() => return result,
            _ = sweep.tick() => {
                coordinator.sweep_expired(OffsetDateTime::now_utc()).await;
                let devices = registry.get_discovered_devices().await;
                tracing::info!("{} device(s) live", devices.len());
                for device in devices {
                    tracing::debug!(
                        "{} {} hash {} reachable {}",
                        device.identity.device_id,
                        device.ip,
                        device.last_config_hash,
                        device.reachable
                    );
                }
            }
        }
    }
}

fn serial_command(serial: &Serial, command: SerialCommand) -> Result<()> {
    let mut client = SerialClient::open(serial)?;
    match command {
        SerialCommand::Identify => print_json(&client.identify()?),
        SerialCommand::Status => print_json(&client.status()?),
        SerialCommand::Config => print_json(&client.config()?),
        SerialCommand::SetConfig { patch } => {
            let patch: ConfigPatch = read_json(&patch)?;
            print_json(&client.set_config(&patch)?)
        }
        SerialCommand::Test { button } => print_json(&client.test_button(button)?),
        SerialCommand::ResetWifi => client.reset_wifi(),
        SerialCommand::Wifi => print_json(&client.wifi()?),
        SerialCommand::Battery => print_json(&client.battery()?),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .map_err(|e| Error::config(format!("Failed to read {}: {}", path.display(), e)))?;
    Ok(serde_json::from_str(&text)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
