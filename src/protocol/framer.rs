/// Stream framing over the shared TCP socket.
///
/// Reads never return a partial frame and never consume bytes that belong to
/// the next one. Writes go through a single lock so frames from the heartbeat
/// task and from command senders are never interleaved mid-frame.
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, watch};
use tracing::{debug, trace};

use crate::error::{Error, ProtocolError, Result};
use crate::protocol::command::CmdType;
use crate::protocol::packet::{HEADER_LEN, Packet};

pub type BoxedRead = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWrite = Box<dyn AsyncWrite + Send + Unpin>;

pub struct FrameReader<R> {
    inner: R,
    timeout: Duration,
    stop: Option<watch::Receiver<bool>>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            stop: None,
        }
    }

    /// Abort pending reads with `Error::Closed` once `stop` flips to true.
    pub fn with_stop(mut self, stop: watch::Receiver<bool>) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Read exactly one frame, waiting at most the configured deadline.
    pub async fn read_frame(&mut self) -> Result<Packet> {
        let Self {
            inner,
            timeout,
            stop,
        } = self;

        let read = tokio::time::timeout(*timeout, read_packet(inner));
        let packet = match stop {
            Some(stop) => {
                if *stop.borrow() {
                    return Err(Error::Closed);
                }
                tokio::select! {
                    res = read => res.map_err(|_| Error::Timeout)??,
                    _ = stop.wait_for(|stopped| *stopped) => return Err(Error::Closed),
                }
            }
            None => read.await.map_err(|_| Error::Timeout)??,
        };

        trace!("read {} frame ({} bytes)", packet.cmd, packet.len());
        Ok(packet)
    }
}

async fn read_packet<R: AsyncRead + Unpin>(inner: &mut R) -> Result<Packet> {
    let length = inner.read_u16_le().await.map_err(eof_to_closed)?;
    if (length as usize) < HEADER_LEN {
        return Err(ProtocolError::InvalidLength(length).into());
    }

    let cmd = CmdType(inner.read_u16_le().await.map_err(eof_to_closed)?);
    let mut body = vec![0u8; length as usize - HEADER_LEN];
    inner.read_exact(&mut body).await.map_err(eof_to_closed)?;
    Ok(Packet { cmd, body })
}

fn eof_to_closed(err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        debug!("peer closed the connection");
        Error::Closed
    } else {
        Error::Io(err)
    }
}

/// Cloneable handle to the write half; every clone shares one lock.
#[derive(Clone)]
pub struct FrameWriter {
    inner: Arc<Mutex<BoxedWrite>>,
    timeout: Duration,
}

impl FrameWriter {
    pub fn new<W>(inner: W, timeout: Duration) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            inner: Arc::new(Mutex::new(Box::new(inner))),
            timeout,
        }
    }

    /// Write one complete frame while holding the write lock.
    pub async fn write_frame(&self, frame: &[u8]) -> Result<()> {
        let mut w = self.inner.lock().await;
        let write = async {
            w.write_all(frame).await?;
            w.flush().await
        };
        tokio::time::timeout(self.timeout, write)
            .await
            .map_err(|_| Error::Timeout)??;
        Ok(())
    }

    /// Shut down the write direction. Failures are logged and returned; the
    /// stream is being dropped either way.
    pub async fn shutdown(&self) -> Result<()> {
        let mut w = self.inner.lock().await;
        match tokio::time::timeout(self.timeout, w.shutdown()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                debug!("write shutdown failed: {}", e);
                Err(e.into())
            }
            Err(_) => {
                debug!("write shutdown timed out after {:?}", self.timeout);
                Err(Error::Timeout)
            }
        }
    }
}
