use std::{future::Future, io, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use tokio::{
    net::{TcpListener, TcpStream},
    select,
    time::timeout,
};
use tracing::{debug, info, warn};

use crate::{
    frame::Frame,
    registry::{ConnectionId, FailureSlot, Registry},
    transport::{FrameSink, FrameSource, TcpFrameWriter, split_stream},
};

/// Upper bound on a single recipient's send during fan-out.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(2000);

pub struct Hub {
    listener: TcpListener,
    state: Arc<HubState<TcpFrameWriter>>,
}

impl Hub {
    pub fn new(listener: TcpListener) -> Self {
        Self::with_send_timeout(listener, DEFAULT_SEND_TIMEOUT)
    }

    pub fn with_send_timeout(listener: TcpListener, send_timeout: Duration) -> Self {
        Self {
            listener,
            state: Arc::new(HubState::new(send_timeout)),
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let Hub { listener, state } = self;
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => {
                    let clients = state.registry().len().await;
                    info!(clients, "hub shutting down");
                    break;
                }
                accept_result = listener.accept() => {
                    handle_accept_result(accept_result, &state);
                }
            }
        }

        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

fn handle_accept_result(
    result: io::Result<(TcpStream, SocketAddr)>,
    state: &Arc<HubState<TcpFrameWriter>>,
) {
    match result {
        Ok((stream, peer)) => spawn_connection_handler(stream, peer, state),
        Err(err) => warn!(error = ?err, "failed to accept connection"),
    }
}

fn spawn_connection_handler(
    stream: TcpStream,
    peer: SocketAddr,
    state: &Arc<HubState<TcpFrameWriter>>,
) {
    let state = Arc::clone(state);
    tokio::spawn(async move {
        if let Err(err) = stream.set_nodelay(true) {
            debug!(%peer, error = ?err, "could not disable nagle");
        }
        let (source, sink) = split_stream(stream);
        match state.serve_connection(source, sink).await {
            Ok(()) => debug!(%peer, "client handler finished"),
            Err(err) => warn!(%peer, error = ?err, "client connection closed with error"),
        }
    });
}

/// Everything the per-connection handlers share.
pub struct HubState<S> {
    registry: Registry<S>,
    send_timeout: Duration,
}

impl<S: FrameSink> HubState<S> {
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            registry: Registry::new(),
            send_timeout,
        }
    }

    pub fn registry(&self) -> &Registry<S> {
        &self.registry
    }

    /// Drives one client from registration to termination.
    ///
    /// Returns `Err` when a broadcaster reported that sending to this client
    /// failed; a plain disconnect or receive error ends with `Ok`.
    pub async fn serve_connection<R>(&self, mut source: R, sink: S) -> Result<()>
    where
        R: FrameSource,
    {
        let (connection, mut failures) = self.registry.register(sink).await;
        let id = connection.id();
        drop(connection);
        info!(conn = %id, "client connected");

        let delivered = self.receive_loop(id, &mut source, &mut failures).await;

        self.registry.unregister(id).await;
        info!(conn = %id, "client connection cleaned up");

        match delivered.or_else(|| failures.try_take()) {
            Some(error) => {
                Err(anyhow::Error::new(error).context(format!("relaying to {id} failed")))
            }
            None => Ok(()),
        }
    }

    async fn receive_loop<R>(
        &self,
        id: ConnectionId,
        source: &mut R,
        failures: &mut FailureSlot,
    ) -> Option<io::Error>
    where
        R: FrameSource,
    {
        loop {
            select! {
                received = source.recv_frame() => match received {
                    Ok(Some(frame)) => {
                        self.broadcast(&frame, id).await;
                    }
                    Ok(None) => {
                        info!(conn = %id, "client disconnected");
                        return None;
                    }
                    Err(error) => {
                        warn!(conn = %id, ?error, "failed to receive from client");
                        return None;
                    }
                },
                Some(error) = failures.recv() => {
                    warn!(conn = %id, ?error, "client can no longer receive; closing");
                    return Some(error);
                }
            }
        }
    }

    /// Failed or timed-out sends go to the target's failure slot.
    pub async fn broadcast(&self, frame: &Frame, excluding: ConnectionId) -> usize {
        debug!(sender = %frame.sender, kind = ?frame.kind, from = %excluding, "relaying frame");
        let send_timeout = self.send_timeout;

        self.registry
            .for_each_except(excluding, |target| async move {
                // A timed-out write may stop mid-line; the sink refuses further
                // frames from then on, so peers never read a spliced line.
                let outcome = match timeout(send_timeout, target.sink().send_frame(frame)).await {
                    Ok(result) => result,
                    Err(_) => Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("send did not finish within {send_timeout:?}"),
                    )),
                };
                if let Err(error) = outcome {
                    warn!(conn = %target.id(), ?error, "failed to relay frame");
                    target.report_failure(error);
                }
            })
            .await
    }
}
