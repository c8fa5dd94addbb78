//! hulk-button
//!
//! Watches a Dream Cheeky style USB button and runs a command whenever it is
//! pressed. `PRESSED` and `RELEASED` are printed to stdout on every transition.

mod action;
mod config;
mod usb;

use action::{ActionDispatcher, CommandAction, NoAction};
use anyhow::{Context, Result, anyhow};
use clap::{ArgAction, Parser};
use common::{create_poll_bridge, setup_logging};
use config::ButtonConfig;
use protocol::error::EXIT_CODE_FAILURE;
use protocol::{DeviceIdentity, SessionError, parse_hex_id};
use std::process::ExitCode;
use std::time::Duration;
use tokio::signal;
use tracing::{debug, error, info, warn};
use usb::backend::UsbBackend;
use usb::{
    ClaimOptions, ClaimedInterface, PollWorker, claim_device, list_devices, locate,
    spawn_poll_worker,
};

/// Exit code for a forced stop (128 + SIGINT)
const EXIT_CODE_INTERRUPTED: i32 = 130;

#[derive(Parser, Debug)]
#[command(name = "hulk-button")]
#[command(author, version, about = "Run a command when a USB button is pressed")]
#[command(long_about = "
Interfaces with 'Dream Cheeky' style USB buttons.

When the button is pressed, PRESSED is printed to stdout and COMMAND is invoked
with the given arguments, if present. When the button is released, RELEASED is
printed to stdout.

EXAMPLES:
    # Print press/release events only
    hulk-button

    # Run a script on every press
    hulk-button ~/bin/smash.sh --loud

    # Use a different button and a slower poll
    hulk-button --vid 0x1d34 --pid 0x000d --poll-interval 50

    # List USB devices to find the VID/PID
    hulk-button --list-devices

EXIT CODES:
    30  button not found
    31  kernel driver active and --detach-kernel-driver false
    32  access denied (add a udev rule for the device)
    33  unexpected interface/endpoint layout
    130 second Ctrl+C while a transfer was still in flight
")]
struct Args {
    /// Device VID, hex (e.g., 0x1d34)
    #[arg(short = 'v', long = "vid", value_name = "HEX", value_parser = parse_hex_arg)]
    vid: Option<u16>,

    /// Device PID, hex (e.g., 0x0008)
    #[arg(short = 'p', long = "pid", value_name = "HEX", value_parser = parse_hex_arg)]
    pid: Option<u16>,

    /// Polling interval in milliseconds
    #[arg(short = 'i', long = "poll-interval", value_name = "MS")]
    poll_interval: Option<u64>,

    /// Protocol timeout for flaky devices in milliseconds (0 to disable)
    #[arg(short = 't', long = "timeout", value_name = "MS")]
    timeout: Option<u64>,

    /// Detach kernel driver first
    #[arg(short = 'd', long = "detach-kernel-driver", value_name = "BOOL", action = ArgAction::Set)]
    detach_kernel_driver: Option<bool>,

    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// List USB devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Command to run when the button is pressed, followed by its arguments
    #[arg(value_name = "COMMAND", trailing_var_arg = true)]
    command: Vec<String>,
}

impl Args {
    /// Command line values win over the configuration file
    fn apply(&self, config: &mut ButtonConfig) {
        if let Some(vid) = self.vid {
            config.device.vendor_id = vid;
        }
        if let Some(pid) = self.pid {
            config.device.product_id = pid;
        }
        if let Some(interval) = self.poll_interval {
            config.polling.interval_ms = interval;
        }
        if let Some(timeout) = self.timeout {
            config.polling.timeout_ms = timeout;
        }
        if let Some(detach) = self.detach_kernel_driver {
            config.polling.detach_kernel_driver = detach;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if !self.command.is_empty() {
            config.action.command = self.command.clone();
        }
    }
}

fn parse_hex_arg(s: &str) -> std::result::Result<u16, String> {
    parse_hex_id(s).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            let code = e
                .downcast_ref::<SessionError>()
                .map(SessionError::exit_code)
                .unwrap_or(EXIT_CODE_FAILURE);
            ExitCode::from(code)
        }
    }
}

async fn run(args: Args) -> Result<()> {
    // Handle --save-config flag early (before loading config)
    if args.save_config {
        let config = ButtonConfig::default();
        let path = ButtonConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let mut config = if let Some(ref path) = args.config {
        ButtonConfig::load_from(path).context("Failed to load configuration")?
    } else {
        ButtonConfig::load_or_default().context("Failed to load configuration")?
    };
    args.apply(&mut config);
    config.validate()?;

    setup_logging(&config.logging.level).context("Failed to setup logging")?;

    info!("hulk-button v{}", env!("CARGO_PKG_VERSION"));
    debug!("Configuration: {:?}", config);

    let context = rusb::Context::new().context("Failed to initialize libusb")?;

    if args.list_devices {
        return list_devices_mode(&context);
    }

    let identity = config.identity();
    let device = locate(&context, identity).context("Failed to enumerate USB devices")?;
    println!("{}", locate_message(identity, device.is_some()));
    let device = device.ok_or(SessionError::NotFound { identity })?;

    let options = ClaimOptions::new(
        config.polling.detach_kernel_driver,
        config.polling.timeout_ms,
    );
    let claimed = claim_device(&device, &options)?;

    let dispatcher: Box<dyn ActionDispatcher + Send> =
        match CommandAction::from_argv(&config.action.command) {
            Some(action) => {
                info!(
                    "Will run `{}` with {} argument(s) on press",
                    action.program(),
                    action.args().len()
                );
                Box::new(action)
            }
            None => Box::new(NoAction),
        };

    run_poll_loop(claimed, dispatcher, config.polling.interval()).await
}

/// Line printed to stdout once the device lookup is done
fn locate_message(identity: DeviceIdentity, found: bool) -> String {
    if found {
        format!(
            "Found button at vid, pid: {:#x}, {:#x}",
            identity.vendor_id, identity.product_id
        )
    } else {
        "Could not find button.".to_string()
    }
}

/// List USB devices and exit
fn list_devices_mode(context: &rusb::Context) -> Result<()> {
    let devices = list_devices(context).context("Failed to enumerate USB devices")?;

    if devices.is_empty() {
        println!("No USB devices found.");
        return Ok(());
    }

    println!("Found {} USB device(s):\n", devices.len());
    for device in devices {
        println!(
            "  {:04x}:{:04x} - {} {}",
            device.vendor_id,
            device.product_id,
            device
                .manufacturer
                .as_deref()
                .unwrap_or("Unknown Manufacturer"),
            device.product.as_deref().unwrap_or("Unknown Product")
        );
        println!(
            "      Bus {:03} Device {:03}",
            device.bus_number, device.device_address
        );
    }

    Ok(())
}

/// Run the poll thread and relay its events until it stops
async fn run_poll_loop<B>(
    claimed: ClaimedInterface<B>,
    dispatcher: Box<dyn ActionDispatcher + Send>,
    interval: Duration,
) -> Result<()>
where
    B: UsbBackend + Send + 'static,
{
    let interface = claimed.interface_number();
    let (bridge, channels) = create_poll_bridge();
    let worker = PollWorker::new(claimed, dispatcher, channels, interval);
    let handle = spawn_poll_worker(worker).context("Failed to spawn poll thread")?;

    info!("Watching interface {}, press Ctrl+C to stop", interface);

    let mut shutting_down = false;
    let mut signals_available = true;
    loop {
        tokio::select! {
            event = bridge.recv_event() => match event {
                Ok(transition) => println!("{}", transition),
                // Poll thread exited and dropped its end
                Err(_) => break,
            },
            result = signal::ctrl_c(), if signals_available => {
                if let Err(e) = result {
                    error!("Error waiting for Ctrl+C: {}", e);
                    signals_available = false;
                    continue;
                }
                if shutting_down {
                    // Poll thread is stuck in a transfer; the OS releases the claim on exit
                    warn!("Received second Ctrl+C, exiting without waiting for the poll thread");
                    std::process::exit(EXIT_CODE_INTERRUPTED);
                }

                shutting_down = true;
                info!("Received Ctrl+C, shutting down (press again to force)...");
                if let Err(e) = bridge.shutdown().await {
                    debug!("Poll thread already gone: {}", e);
                }
            }
        }
    }

    let joined = tokio::task::spawn_blocking(move || handle.join())
        .await
        .context("Failed to join poll thread")?;
    let stats = joined.map_err(|_| anyhow!("Poll thread panicked"))??;

    info!(
        "Stopped after {} polls ({} samples, {} timeouts, {} presses, {} releases)",
        stats.attempts, stats.samples, stats.timeouts, stats.presses, stats.releases
    );
    Ok(())
}
