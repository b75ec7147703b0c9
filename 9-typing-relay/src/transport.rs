//! Stream plumbing between clients and the hub.
//!
//! Frames travel as one JSON object per line. The hub and the clients only
//! talk to the [`FrameSource`] and [`FrameSink`] seams, so the same loops run
//! over TCP in production and over in-memory pipes in tests.

use std::{
    future::Future,
    io,
    net::SocketAddr,
    sync::atomic::{AtomicBool, Ordering},
};

use serde::{Serialize, de::DeserializeOwned};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::Mutex,
};

use crate::frame::Frame;

const LINE_ENDINGS: &[char] = &['\n', '\r'];

pub type TcpFrameReader = FrameReader<BufReader<OwnedReadHalf>>;
pub type TcpFrameWriter = FrameWriter<OwnedWriteHalf>;

/// Receiving half of a stream.
pub trait FrameSource: Send {
    /// Next frame, or `None` once the peer closed the stream cleanly.
    fn recv_frame(&mut self) -> impl Future<Output = io::Result<Option<Frame>>> + Send;
}

/// Sending half of a stream. Shared by reference so several tasks can send.
pub trait FrameSink: Send + Sync + 'static {
    fn send_frame(&self, frame: &Frame) -> impl Future<Output = io::Result<()>> + Send;
}

pub struct FrameReader<R> {
    reader: R,
}

impl<R> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R> FrameSource for FrameReader<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn recv_frame(&mut self) -> io::Result<Option<Frame>> {
        read_message(&mut self.reader).await
    }
}

/// Serializes writers so concurrent senders never interleave partial lines.
///
/// A send that is dropped or fails halfway leaves a torn line on the stream;
/// every later send then fails instead of writing after it.
pub struct FrameWriter<W> {
    writer: Mutex<W>,
    torn: AtomicBool,
}

impl<W> FrameWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            torn: AtomicBool::new(false),
        }
    }

    pub async fn shutdown(&self) -> io::Result<()> {
        self.writer.lock().await.shutdown().await
    }
}

impl<W> FrameSink for FrameWriter<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn send_frame(&self, frame: &Frame) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        if self.torn.load(Ordering::Relaxed) {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "stream holds a partially written frame",
            ));
        }
        self.torn.store(true, Ordering::Relaxed);
        write_message(&mut *writer, frame).await?;
        self.torn.store(false, Ordering::Relaxed);
        Ok(())
    }
}

pub fn split_stream(stream: TcpStream) -> (TcpFrameReader, TcpFrameWriter) {
    let (reader, writer) = stream.into_split();
    (
        FrameReader::new(BufReader::new(reader)),
        FrameWriter::new(writer),
    )
}

/// Opens the single long-lived stream a client keeps with the hub.
pub async fn connect(addr: SocketAddr) -> io::Result<(TcpFrameReader, TcpFrameWriter)> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(split_stream(stream))
}

pub async fn read_message<R, T>(reader: &mut R) -> io::Result<Option<T>>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    loop {
        line.clear();
        let bytes = reader.read_line(&mut line).await?;
        if bytes == 0 {
            return Ok(None);
        }

        let trimmed = line.trim_end_matches(LINE_ENDINGS);
        if trimmed.is_empty() {
            continue;
        }

        let parsed = serde_json::from_str(trimmed).map_err(to_io_error)?;
        return Ok(Some(parsed));
    }
}

pub async fn write_message<W, T>(writer: &mut W, message: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    // One write per frame, flushed, so typing updates reach peers immediately.
    let mut encoded = serde_json::to_vec(message).map_err(to_io_error)?;
    encoded.push(b'\n');
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}

fn to_io_error(err: serde_json::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}
