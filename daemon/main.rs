// relay-daemon: listen for exactly one peer and relay text both ways
use anyhow::{Context, Result};
use clap::Parser;
#[cfg(unix)]
use duplex_relay::UnixSocketListener;
use duplex_relay::{
    stdin, ConsoleSink, InputSource, RelayConfig, RelayServer, SessionReport, TcpRelayListener,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "relay-daemon")]
#[command(about = "Accept one peer and relay console text in both directions", long_about = None)]
#[command(version = "0.1.0")]
struct Cli {
    /// Interface to bind (overrides RELAY_HOST, default 127.0.0.1)
    #[arg(long)]
    host: Option<String>,

    /// TCP port (overrides RELAY_PORT, default 25565)
    #[arg(short, long)]
    port: Option<u16>,

    /// Listen on a Unix domain socket instead of TCP
    #[arg(long, value_name = "PATH")]
    unix: Option<PathBuf>,

    /// Bytes per receive call (overrides RELAY_CHUNK_SIZE)
    #[arg(long, value_name = "BYTES")]
    chunk_size: Option<usize>,

    /// Input line that ends the session (overrides RELAY_SENTINEL)
    #[arg(long)]
    sentinel: Option<String>,

    /// Prefix shown before received text (overrides RELAY_PEER_LABEL)
    #[arg(long)]
    label: Option<String>,

    /// Prefix received text with the local time
    #[arg(short, long)]
    timestamps: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    // Command-line flags win over environment, environment over defaults
    fn into_config(self, mut config: RelayConfig) -> (RelayConfig, Option<PathBuf>) {
        if let Some(host) = self.host {
            config.endpoint.host = host;
        }
        if let Some(port) = self.port {
            config.endpoint.port = port;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        if let Some(sentinel) = self.sentinel {
            config.sentinel = sentinel;
        }
        if let Some(label) = self.label {
            config.peer_label = label;
        }
        config.timestamps |= self.timestamps;
        (config, self.unix)
    }
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // Relayed text owns stdout
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn serve(config: RelayConfig, unix: Option<PathBuf>) -> Result<SessionReport> {
    let sink = ConsoleSink::new(&config.peer_label).with_timestamps(config.timestamps);
    let input: Box<dyn InputSource> = Box::new(stdin());

    if let Some(path) = unix {
        return serve_unix(&path, config, input, sink);
    }

    let address = config.endpoint.address();
    RelayServer::new(TcpRelayListener::new(&address), config)
        .serve_once(input, sink)
        .with_context(|| format!("relay on {} failed", address))
}

#[cfg(unix)]
fn serve_unix(
    path: &Path,
    config: RelayConfig,
    input: Box<dyn InputSource>,
    sink: ConsoleSink,
) -> Result<SessionReport> {
    RelayServer::new(UnixSocketListener::new(path), config)
        .serve_once(input, sink)
        .with_context(|| format!("relay on {} failed", path.display()))
}

#[cfg(not(unix))]
fn serve_unix(
    _path: &Path,
    _config: RelayConfig,
    _input: Box<dyn InputSource>,
    _sink: ConsoleSink,
) -> Result<SessionReport> {
    anyhow::bail!("unix sockets are not supported on this platform")
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let (config, unix) = cli.into_config(RelayConfig::from_env());
    if let Err(e) = config.validate() {
        error!("{}", e);
        return ExitCode::FAILURE;
    }

    match serve(config, unix) {
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
