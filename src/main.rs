use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use velbus_rs::util::hex::{decode_hex, encode_hex_upper};
use velbus_rs::velbus::message::{interpret, BusMessage};
use velbus_rs::{
    decode_frame, init_logger, log_info, BusConfig, BusEvent, BusManager, ShutterDirection,
};

#[derive(Parser)]
#[command(name = "velbus-cli")]
#[command(about = "CLI tool for the Velbus home-automation bus")]
struct Cli {
    /// JSON file with the connection, devices and options
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print sensor events until interrupted or for a number of seconds
    Listen {
        #[arg(short, long)]
        seconds: Option<u64>,
    },
    /// Ask modules to announce their type
    Scan {
        /// How long to wait for announcements
        #[arg(short, long, default_value = "3")]
        wait: u64,
    },
    SetLevel {
        device: u32,
        command: u32,
        #[arg(allow_negative_numbers = true)]
        level: i32,
    },
    Shutter {
        device: u32,
        command: u32,
        direction: ShutterDirection,
    },
    /// Decode a hex-encoded frame without touching the bus
    Decode { hex: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let cli = Cli::parse();
    if let Commands::Decode { hex } = &cli.command {
        return decode(hex);
    }

    let Some(path) = cli.config else {
        bail!("--config is required for this command");
    };
    let config = BusConfig::from_json_file(&path)
        .with_context(|| format!("loading {}", path.display()))?;

    let (tx, mut events) = mpsc::unbounded_channel();
    let manager = BusManager::with_options(
        &config.devices,
        config.options.clone(),
        Arc::new(move |event: BusEvent| {
            let _ = tx.send(event);
        }),
    );
    manager
        .open(&config.connection)
        .await
        .with_context(|| format!("opening {}", config.connection.address))?;

    let result = match cli.command {
        Commands::Listen { seconds } => {
            let deadline = seconds.map(Duration::from_secs);
            listen(&mut events, deadline).await;
            Ok(())
        }
        Commands::Scan { wait } => match manager.scan().await {
            Ok(sent) => {
                log_info(&format!("Sent {sent} module type requests"));
                listen(&mut events, Some(Duration::from_secs(wait))).await;
                Ok(())
            }
            Err(e) => Err(e),
        },
        Commands::SetLevel {
            device,
            command,
            level,
        } => manager.set_level(device, command, level).await,
        Commands::Shutter {
            device,
            command,
            direction,
        } => manager.shutter(device, command, direction).await,
        Commands::Decode { .. } => Ok(()),
    };

    manager.close().await?;
    result?;
    Ok(())
}

async fn listen(events: &mut mpsc::UnboundedReceiver<BusEvent>, deadline: Option<Duration>) {
    let forever = async {
        while let Some(event) = events.recv().await {
            match event {
                BusEvent::Sensor { sensor_id, value } => {
                    println!("sensor {sensor_id} = {value}");
                }
                BusEvent::ConnectionLost { reason } => {
                    println!("connection lost: {reason}");
                    return;
                }
            }
        }
    };

    match deadline {
        Some(duration) => {
            let _ = tokio::time::timeout(duration, forever).await;
        }
        None => {
            tokio::select! {
                _ = forever => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
    }
}

fn decode(hex: &str) -> anyhow::Result<()> {
    let bytes = decode_hex(hex)?;
    let frame = decode_frame(&bytes)?;
    println!("{frame:?}");
    match interpret(&frame) {
        BusMessage::Readings(readings) => {
            for reading in readings {
                println!(
                    "address 0x{:02X} channel {} value {} ({:?})",
                    reading.address, reading.channel, reading.value, reading.data_types
                );
            }
        }
        BusMessage::ModuleType {
            address,
            module_type,
        } => println!("address 0x{address:02X} module type 0x{module_type:02X}"),
        BusMessage::Unhandled { address, command } => {
            println!("address 0x{address:02X} command {command:02X?} (not interpreted)");
        }
    }
    log_info(&format!("Decoded {}", encode_hex_upper(&bytes)));
    Ok(())
}
