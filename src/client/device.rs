/// Connection to one LED controller.
///
/// One `Device` owns one TCP session: the handshake, the heartbeat task, and
/// the command/response cycle. Operations on the same device are serialized;
/// a second command waits until the first one has read its reply.
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{self, watch};
use tokio::time;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{Error, HandshakeFailure, HandshakePhase, ProtocolError, Result};
use crate::protocol::command::{CmdType, method};
use crate::protocol::fragment;
use crate::protocol::framer::{BoxedRead, FrameReader, FrameWriter};
use crate::protocol::packet;
use crate::protocol::session::{Session, Teardown};
use crate::protocol::xml::{self, DeviceInfo, SdkResponse};
use crate::services::heartbeat::Heartbeat;

pub(crate) type Link = FrameReader<BoxedRead>;

pub struct Device {
    config: ClientConfig,
    state: Arc<Mutex<Session>>,
    /// Read half of the socket. Holding this lock is what makes an operation
    /// exclusive: it is taken for a whole request/reply cycle or upload.
    link: sync::Mutex<Option<Link>>,
}

impl Device {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(Session::new())),
            link: sync::Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_connected(&self) -> bool {
        self.session().live
    }

    /// Session GUID; empty while disconnected.
    pub fn guid(&self) -> String {
        self.session().guid.clone()
    }

    /// Descriptor fetched during the handshake (or by `device_info`).
    pub fn cached_device_info(&self) -> Option<DeviceInfo> {
        self.session().device_info.clone()
    }

    pub(crate) fn cache_device_info(&self, info: DeviceInfo) {
        self.session().device_info = Some(info);
    }

    pub fn transport_version(&self) -> u32 {
        self.session().transport_version
    }

    /// Dial the configured address and run the handshake. An existing
    /// connection is closed first.
    pub async fn connect(&self) -> Result<()> {
        self.close().await;

        let addr = self.config.addr();
        info!("Connecting to {}", addr);
        let stream = match time::timeout(self.config.timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(Error::Connect { addr, source }),
            Err(_) => {
                return Err(Error::Connect {
                    addr,
                    source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
                });
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!("set_nodelay failed: {}", e);
        }

        self.connect_stream(stream).await
    }

    /// Run the handshake over an already established transport.
    pub async fn connect_stream<S>(&self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        self.close().await;

        let timeout = self.config.timeout;
        let (rd, wr) = tokio::io::split(stream);
        let (stop_tx, stop_rx) = watch::channel(false);
        let writer = FrameWriter::new(wr, timeout);
        let reader: BoxedRead = Box::new(rd);
        let reader = FrameReader::new(reader, timeout).with_stop(stop_rx.clone());

        let mut link = self.link.lock().await;
        self.session().attach(writer.clone(), stop_tx);
        let reader = link.insert(reader);

        if let Err(e) = self.handshake(reader, &writer).await {
            warn!("Handshake failed: {}", e);
            let teardown = self.session().detach();
            *link = None;
            drop(link);
            finish_teardown(teardown).await;
            return Err(e);
        }
        drop(link);

        let state = Arc::clone(&self.state);
        let dead = Arc::clone(&self.state);
        let heartbeat = Heartbeat::spawn(
            writer,
            self.config.heartbeat_interval,
            stop_rx,
            move || state.lock().unwrap_or_else(PoisonError::into_inner).live,
            move || dead.lock().unwrap_or_else(PoisonError::into_inner).mark_dead(),
        );
        self.session().set_heartbeat(heartbeat);

        info!("Connected (GUID: {})", self.guid());
        Ok(())
    }

    async fn handshake(&self, reader: &mut Link, writer: &FrameWriter) -> Result<()> {
        debug!("Handshake phase 1: transport version");
        let version = negotiate_version(reader, writer)
            .await
            .map_err(|e| handshake_error(HandshakePhase::Version, e))?;
        self.session().transport_version = version;
        debug!("Transport version 0x{:08X}", version);

        debug!("Handshake phase 2: SDK version");
        let reply = exchange(reader, writer, &xml::build_version_xml())
            .await
            .map_err(|e| handshake_error(HandshakePhase::SdkVersion, e))?;
        let guid = self.session().assign_guid(&reply.guid).to_string();
        info!("SDK session GUID: {}", guid);

        debug!("Handshake phase 3: device info");
        let request = xml::build_sdk_xml(&guid, method::GET_DEVICE_INFO, "");
        let info = exchange(reader, writer, &request)
            .await
            .and_then(SdkResponse::into_success)
            .and_then(|resp| xml::parse_device_info(&resp.inner_xml));
        match info {
            Ok(info) => {
                info!(
                    "Device {} (ID: {}, screen {}x{})",
                    info.model, info.device_id, info.screen_width, info.screen_height
                );
                self.cache_device_info(info);
            }
            Err(e) => warn!("Device info unavailable, continuing: {}", e),
        }
        Ok(())
    }

    /// Stop the heartbeat and drop the socket. Safe to call at any time and
    /// more than once; an operation in flight fails with `Error::Closed`.
    pub async fn close(&self) {
        let teardown = self.session().detach();
        let was_open = teardown.writer.is_some();
        finish_teardown(teardown).await;
        self.link.lock().await.take();
        if was_open {
            info!("Disconnected from {}", self.config.addr());
        }
    }

    /// Send `inner` under `method` and return the parsed reply. A non-success
    /// `result` is returned as data, not as an error.
    pub async fn send_command(&self, method: &str, inner: &str) -> Result<SdkResponse> {
        let (mut link, writer) = self.acquire().await?;
        let Some(reader) = link.as_mut() else {
            return Err(Error::NotConnected);
        };
        let request = xml::build_sdk_xml(&self.guid(), method, inner);
        debug!("-> {}", method);
        let result = exchange(reader, &writer, &request).await;
        self.check(result)
    }

    /// Send a complete SDK document, with its `guid` attribute replaced by the
    /// session GUID.
    pub async fn send_raw_xml(&self, raw: &str) -> Result<SdkResponse> {
        let (mut link, writer) = self.acquire().await?;
        let Some(reader) = link.as_mut() else {
            return Err(Error::NotConnected);
        };
        let request = xml::replace_guid(raw, &self.guid());
        let result = exchange(reader, &writer, &request).await;
        self.check(result)
    }

    /// Lock the read path for one operation and hand out the shared writer.
    pub(super) async fn acquire(&self) -> Result<(sync::MutexGuard<'_, Option<Link>>, FrameWriter)> {
        let link = self.link.lock().await;
        let writer = {
            let session = self.session();
            if !session.live {
                return Err(Error::NotConnected);
            }
            session.writer.clone().ok_or(Error::NotConnected)?
        };
        Ok((link, writer))
    }

    /// Transport failures leave the stream in an unknown position, so the
    /// session is marked dead and the caller has to reconnect.
    pub(super) fn check<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_fatal() {
                warn!("Connection lost: {}", e);
                self.session().mark_dead();
            }
        }
        result
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        // Stop signal ends the heartbeat task; the socket closes with the halves.
        let _ = self.session().detach();
    }
}

async fn finish_teardown(teardown: Teardown) {
    if let Some(heartbeat) = teardown.heartbeat {
        heartbeat.stop().await;
    }
    if let Some(writer) = teardown.writer {
        // Already logged; the halves are dropped regardless.
        let _ = writer.shutdown().await;
    }
}

async fn negotiate_version(reader: &mut Link, writer: &FrameWriter) -> Result<u32> {
    writer.write_frame(&packet::version_ask()).await?;
    let pkt = reader.read_frame().await?;
    match pkt.cmd {
        CmdType::VERSION_ANSWER => Ok(pkt.version()?),
        CmdType::ERROR_ANSWER => Err(Error::Device(pkt.error_code()?)),
        other => Err(ProtocolError::UnexpectedCommand(other).into()),
    }
}

fn handshake_error(phase: HandshakePhase, err: Error) -> Error {
    let reason = match err {
        Error::Device(code) => HandshakeFailure::Device(code),
        Error::Protocol(ProtocolError::UnexpectedCommand(cmd)) => HandshakeFailure::Unexpected(cmd),
        // A version answer too short to carry a version is not a version answer.
        Error::Protocol(ProtocolError::ShortFrame { cmd, .. }) if phase == HandshakePhase::Version => {
            HandshakeFailure::Unexpected(cmd)
        }
        other => HandshakeFailure::Cause(Box::new(other)),
    };
    Error::Handshake { phase, reason }
}

/// One command/response cycle: write every fragment in order, then read
/// until the reply is complete.
async fn exchange(reader: &mut Link, writer: &FrameWriter, request: &str) -> Result<SdkResponse> {
    for frame in fragment::build_request(request.as_bytes())? {
        writer.write_frame(&frame).await?;
    }
    let reply = fragment::assemble_response(reader).await?;
    SdkResponse::parse(&reply)
}
