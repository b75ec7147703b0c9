//! Terminal chat client.
//!
//! Two duties share one [`Session`]: the inbound duty applies frames from the
//! hub, the outbound duty applies raw keystrokes and sends frames. State
//! changes happen under the state lock; paints happen under the screen lock,
//! which a redraw takes first so paints land in the order they were computed.

pub mod input;
pub mod render;
pub mod screen;
pub mod state;

use std::{io::Write, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    select,
    sync::{Mutex, MutexGuard},
    time::timeout,
};
use tracing::{info, warn};

use crate::{
    cli::ClientArgs,
    transport::{self, FrameSink, FrameSource},
};

use self::{
    input::decode_key,
    render::{full_redraw, incremental_redraw},
    screen::{RawModeGuard, Screen, apply_ops},
    state::{KeyOutcome, Redraw, TerminalState},
};

/// Why the outbound duty stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundExit {
    Interrupted,
    InputClosed,
}

/// How long a keystroke's frame may wait on the hub before it counts as lost.
pub const SEND_TIMEOUT: Duration = Duration::from_millis(2000);

pub struct Session<W> {
    state: Mutex<TerminalState>,
    screen: Screen<W>,
    send_timeout: Duration,
}

impl<W: Write + Send> Session<W> {
    pub fn new(username: impl Into<String>, screen: Screen<W>) -> Self {
        Self {
            state: Mutex::new(TerminalState::new(username)),
            screen,
            send_timeout: SEND_TIMEOUT,
        }
    }

    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    pub async fn state(&self) -> MutexGuard<'_, TerminalState> {
        self.state.lock().await
    }

    pub fn screen(&self) -> &Screen<W> {
        &self.screen
    }

    pub async fn redraw(&self, kind: Redraw) -> std::io::Result<()> {
        let mut out = self.screen.lock().await;
        let width = self.screen.width();
        let paint = {
            let mut state = self.state.lock().await;
            let paint = match kind {
                Redraw::Full => full_redraw(&state, width),
                Redraw::Incremental => incremental_redraw(&state, width),
            };
            state.record_paint(paint.layout);
            paint
        };
        apply_ops(&mut *out, &paint.ops)
    }

    /// Applies frames until the hub stream ends or fails, then leaves a
    /// notice in history. Only terminal write errors come back as `Err`.
    pub async fn run_inbound<R: FrameSource>(&self, source: &mut R) -> std::io::Result<()> {
        loop {
            match source.recv_frame().await {
                Ok(Some(frame)) => {
                    let redraw = self.state.lock().await.apply_frame(&frame);
                    self.redraw(redraw).await?;
                }
                Ok(None) => {
                    info!("hub closed the connection");
                    let redraw = self.state.lock().await.connection_lost(None);
                    return self.redraw(redraw).await;
                }
                Err(error) => {
                    warn!(?error, "failed to receive from hub");
                    let redraw = self.state.lock().await.connection_lost(Some(&error));
                    return self.redraw(redraw).await;
                }
            }
        }
    }

    /// A failed send is logged and typing carries on.
    pub async fn run_outbound<K, S>(&self, keys: &mut K, sink: &S) -> std::io::Result<OutboundExit>
    where
        K: AsyncRead + Unpin,
        S: FrameSink,
    {
        loop {
            let byte = match keys.read_u8().await {
                Ok(byte) => byte,
                Err(error) if error.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(OutboundExit::InputClosed);
                }
                Err(error) => return Err(error),
            };

            let outcome = self.state.lock().await.apply_key(decode_key(byte));
            match outcome {
                KeyOutcome::Ignored => {}
                KeyOutcome::Interrupt => return Ok(OutboundExit::Interrupted),
                KeyOutcome::Send { frame, redraw } => {
                    // Bounded so a hub that stops reading cannot swallow Ctrl+C.
                    match timeout(self.send_timeout, sink.send_frame(&frame)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(error)) => warn!(?error, kind = ?frame.kind, "failed to send frame"),
                        Err(_) => warn!(kind = ?frame.kind, "timed out sending frame"),
                    }
                    self.redraw(redraw).await?;
                }
            }
        }
    }
}

pub async fn run(args: ClientArgs) -> Result<()> {
    let (mut source, sink) = transport::connect(args.server)
        .await
        .with_context(|| format!("failed to connect to {}", args.server))?;
    info!(server = %args.server, username = %args.username, "connected");

    let guard = RawModeGuard::acquire().context("failed to enter raw terminal mode")?;
    let session = Arc::new(Session::new(args.username, Screen::stdout()));
    let outcome = drive(&session, &mut source, &sink).await;
    drop(guard);
    outcome
}

async fn drive<W, R, S>(session: &Arc<Session<W>>, source: &mut R, sink: &S) -> Result<()>
where
    W: Write + Send,
    R: FrameSource,
    S: FrameSink,
{
    session.redraw(Redraw::Full).await?;

    let mut keys = tokio::io::stdin();
    select! {
        inbound = session.run_inbound(source) => {
            inbound.context("terminal write failed")?;
        }
        outbound = session.run_outbound(&mut keys, sink) => {
            let exit = outbound.context("terminal i/o failed")?;
            info!(?exit, "input loop finished");
        }
        signal = termination_signal() => {
            signal.context("failed to listen for termination signals")?;
            info!("termination signal received");
        }
    }
    Ok(())
}

#[cfg(unix)]
async fn termination_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    select! {
        interrupted = tokio::signal::ctrl_c() => interrupted,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn termination_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
