use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the hub that relays frames between every connected client.
    Hub(HubArgs),
    /// Join the chat with a live-typing terminal interface.
    Client(ClientArgs),
    /// Relay stdin to the hub and print whatever peers send, without a UI.
    Pipe(PipeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct HubArgs {
    /// Socket address the hub should bind to. Use port 0 for an ephemeral port.
    #[arg(long, default_value = "127.0.0.1:50051")]
    pub listen: SocketAddr,

    /// Give up on a single recipient's send after this many milliseconds.
    #[arg(long, default_value_t = 2000)]
    pub send_timeout_ms: u64,
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Label attached to every frame this client sends.
    pub username: String,

    /// Address of the hub to connect to.
    #[arg(long, default_value = "127.0.0.1:50051")]
    pub server: SocketAddr,
}

#[derive(Args, Debug, Clone)]
pub struct PipeArgs {
    /// Label attached to every frame this client sends.
    #[arg(long)]
    pub username: String,

    /// Address of the hub to connect to.
    #[arg(long, default_value = "127.0.0.1:50051")]
    pub server: SocketAddr,
}
