// relay-connect: dial a listening relay and chat with it from the console
use anyhow::{Context, Result};
use clap::Parser;
use duplex_relay::{stdin, ConsoleSink, RelayConfig, SessionReport};
use relay_client::RelayClient;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "relay-connect")]
#[command(about = "Connect to a relay daemon and relay console text both ways", long_about = None)]
#[command(version = "0.1.0")]
struct Cli {
    /// Relay host (overrides RELAY_HOST, default 127.0.0.1)
    #[arg(short = 'a', long)]
    host: Option<String>,

    /// Relay port (overrides RELAY_PORT, default 25565)
    #[arg(short, long)]
    port: Option<u16>,

    /// Connect to a Unix domain socket instead of TCP
    #[arg(long, value_name = "PATH")]
    unix: Option<String>,

    /// Input line that ends the session (overrides RELAY_SENTINEL)
    #[arg(long)]
    sentinel: Option<String>,

    /// Prefix shown before received text
    #[arg(long, default_value = "server")]
    label: String,

    /// Prefix received text with the local time
    #[arg(short, long)]
    timestamps: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn apply(&self, mut config: RelayConfig) -> RelayConfig {
        if let Some(ref host) = self.host {
            config.endpoint.host = host.clone();
        }
        if let Some(port) = self.port {
            config.endpoint.port = port;
        }
        if let Some(ref sentinel) = self.sentinel {
            config.sentinel = sentinel.clone();
        }
        config.peer_label = self.label.clone();
        config.timestamps |= self.timestamps;
        config
    }
}

fn connect(cli: &Cli, config: &RelayConfig) -> Result<RelayClient> {
    #[cfg(unix)]
    {
        if let Some(ref path) = cli.unix {
            return RelayClient::connect_unix(path).context("could not reach relay");
        }
    }
    #[cfg(not(unix))]
    {
        if cli.unix.is_some() {
            anyhow::bail!("unix sockets are not supported on this platform");
        }
    }
    RelayClient::connect(&config.endpoint).context("could not reach relay")
}

fn run(cli: Cli) -> Result<SessionReport> {
    let config = cli.apply(RelayConfig::from_env());
    config.validate()?;

    let client = connect(&cli, &config)?;
    let sink = ConsoleSink::new(&config.peer_label).with_timestamps(config.timestamps);
    let report = client
        .run(Box::new(stdin()), sink, &config)
        .context("relay session failed")?;
    Ok(report)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(report) => {
            report.log_outcome();
            ExitCode::from(report.exit_code())
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
