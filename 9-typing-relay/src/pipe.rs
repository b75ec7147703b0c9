//! Client without a terminal UI: stdin goes to the hub, peers' payloads go
//! to stdout byte for byte.

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use crate::{
    cli::PipeArgs,
    frame::Frame,
    transport::{self, FrameSink, FrameSource, FrameWriter},
};

/// Largest payload taken from stdin per frame.
pub const CHUNK_SIZE: usize = 1024;

pub async fn run(args: PipeArgs) -> Result<()> {
    let (mut source, sink) = transport::connect(args.server)
        .await
        .with_context(|| format!("failed to connect to {}", args.server))?;
    info!("connected to {}", args.server);

    let receive = async {
        let mut stdout = tokio::io::stdout();
        relay_inbound(&mut source, &mut stdout).await
    };
    let send = async {
        let mut stdin = tokio::io::stdin();
        relay_outbound(&mut stdin, &sink, &args.username).await
    };

    let (received, sent) = tokio::join!(receive, send);
    let sent = sent.context("relaying stdin to the hub failed")?;
    let received = received.context("relaying hub frames to stdout failed")?;
    info!(sent, received, "pipe finished");
    Ok(())
}

/// Sends `input` in chunks as final messages, then closes the write side so
/// the hub sees end-of-stream. Returns the number of bytes sent.
pub async fn relay_outbound<R, W>(
    input: &mut R,
    sink: &FrameWriter<W>,
    username: &str,
) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let read = input.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        sink.send_frame(&Frame::message(username, &buffer[..read])).await?;
        total += read as u64;
    }

    if let Err(error) = sink.shutdown().await {
        warn!(?error, "failed to shut down the write side cleanly");
    }
    Ok(total)
}

/// Writes every received payload to `output` until the hub closes the
/// stream. Returns the number of bytes written.
pub async fn relay_inbound<S, W>(source: &mut S, output: &mut W) -> std::io::Result<u64>
where
    S: FrameSource,
    W: AsyncWrite + Unpin,
{
    let mut total = 0u64;
    while let Some(frame) = source.recv_frame().await? {
        output.write_all(&frame.payload).await?;
        output.flush().await?;
        total += frame.payload.len() as u64;
    }
    info!("hub closed the connection");
    Ok(total)
}
