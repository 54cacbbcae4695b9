//! Command line front end: dump calibration constants or reboot a NetDAQ unit.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use netdaq_cal::{CalSession, DEFAULT_BAUD_RATE, PromptPolicy, SerialTransport, SessionConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Fluke NetDAQ 2640A/2645A serial calibration tool", long_about = None)]
struct Cli {
    /// Serial port name, e.g. /dev/ttyUSB0
    #[arg(short, long)]
    port: String,

    /// Write the dump report to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Baud rate of the admin port
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Line read timeout in seconds
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Keep readings that are not followed by the `=>` prompt
    #[arg(long)]
    tolerate_missing_prompt: bool,

    /// Abort a dump after this many unanswered queries in a row (0 never gives up)
    #[arg(long, default_value_t = 3)]
    give_up_after: u32,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Read every calibration constant
    Dump,
    /// Read a single calibration constant
    Get {
        /// Even constant id, 0 to 60
        id: u32,
    },
    /// Restart the instrument (privileged, no reply)
    Reboot,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let config = SessionConfig {
        read_timeout: Duration::from_secs(cli.timeout),
        prompt_policy: if cli.tolerate_missing_prompt {
            PromptPolicy::Tolerate
        } else {
            PromptPolicy::Require
        },
        give_up_after: cli.give_up_after,
    };

    let transport = SerialTransport::open(&cli.port, cli.baud)
        .with_context(|| format!("Failed to open serial port {}", cli.port))?;
    info!("Opened {} at {} baud", cli.port, cli.baud);

    let mut session = CalSession::new(transport, config);
    let identity = session.identify().context("Identification failed")?;
    eprintln!("connected to: {}", identity);

    match cli.action {
        Action::Dump => {
            let mut out: Box<dyn Write> = match &cli.output {
                Some(path) => Box::new(
                    File::create(path)
                        .with_context(|| format!("Failed to create {}", path.display()))?,
                ),
                None => Box::new(io::stdout().lock()),
            };
            let summary = session.dump_cal(&mut out).context("Dump aborted")?;
            out.flush()?;
            if summary.failed() > 0 {
                eprintln!("{} constants could not be recovered", summary.failed());
            }
        }
        Action::Get { id } => {
            let outcome = session.get_cal_const(id)?;
            println!("{}", outcome);
            if outcome.reading().is_none() {
                eprintln!("const {} could not be recovered", id);
            }
        }
        Action::Reboot => session.reboot().context("Failed to send reboot")?,
    }

    Ok(())
}
