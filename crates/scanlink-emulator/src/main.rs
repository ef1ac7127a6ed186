use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use scanlink_core::ScannerIdentity;
use scanlink_emulator::VirtualScanner;
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Virtual scanner accessory for scanlink hosts", long_about = None)]
struct Args {
    /// Address to accept host connections on
    #[arg(long, default_value = "127.0.0.1:7400")]
    listen: SocketAddr,

    /// JSON file with the identity to report (serial, model, ...)
    #[arg(long)]
    identity: Option<PathBuf>,

    /// Delay before every reply, in milliseconds
    #[arg(long, default_value_t = 0)]
    reply_delay_ms: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn load_identity(path: Option<&PathBuf>) -> anyhow::Result<ScannerIdentity> {
    let Some(path) = path else {
        return Ok(VirtualScanner::default_identity());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let identity = load_identity(args.identity.as_ref())?;
    let (mut scanner, handle) = VirtualScanner::new(identity.clone());
    handle.set_reply_delay(Duration::from_millis(args.reply_delay_ms));

    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("binding {}", args.listen))?;
    info!(addr = %args.listen, serial = %identity.serial_number, "virtual scanner listening");

    // One host at a time, like the physical accessory.
    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                return Ok(());
            }
        };
        info!(%peer, "host connected");
        if let Err(e) = stream.set_nodelay(true) {
            error!(%peer, error = %e, "failed to set TCP_NODELAY");
        }
        match scanner.serve(stream).await {
            Ok(outcome) => info!(%peer, ?outcome, "host link ended"),
            Err(e) => error!(%peer, error = %e, "host link failed"),
        }
    }
}
