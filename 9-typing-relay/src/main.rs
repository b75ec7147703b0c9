use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use typing_relay::{
    cli::{Cli, Command},
    client, hub, pipe,
};

/// Logs go to stderr so stdout stays free for the screen or piped payloads.
fn init_tracing(default_filter: &str) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Hub(args) => {
            init_tracing("info");
            let listener = TcpListener::bind(args.listen).await?;
            let hub = hub::Hub::with_send_timeout(
                listener,
                Duration::from_millis(args.send_timeout_ms),
            );
            let addr = hub.local_addr()?;
            println!("hub listening on {addr}");
            info!(%addr, "hub started");
            if let Err(err) = hub.run_until_ctrl_c().await {
                warn!("hub exited with error: {err:?}");
                return Err(err);
            }
        }
        Command::Client(args) => {
            init_tracing("warn");
            let outcome = client::run(args).await;
            if let Err(err) = &outcome {
                error!("client exited with error: {err:?}");
            }
            // The blocking stdin reader would otherwise keep the runtime alive.
            std::process::exit(i32::from(outcome.is_err()));
        }
        Command::Pipe(args) => {
            init_tracing("info");
            pipe::run(args).await?;
        }
    }

    Ok(())
}
