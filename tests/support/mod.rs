#![allow(dead_code)]

//! Simulated controller for integration tests.
//!
//! Speaks the device side of the protocol on 127.0.0.1 and records what the
//! client sent.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use huidu_sdk::protocol::command::CmdType;
use huidu_sdk::protocol::fragment::{self, Reassembly};
use huidu_sdk::protocol::framer::FrameReader;
use huidu_sdk::protocol::packet::{self, Packet, make_packet};
use huidu_sdk::protocol::xml;
use huidu_sdk::{ClientConfig, Device};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct Behavior {
    /// Answer the version ask with this error code instead of a version.
    pub version_error: Option<u16>,
    /// Answer the version ask with a bodyless frame of this command.
    pub version_reply: Option<CmdType>,
    /// Answer GetIFVersion with an error frame carrying this code.
    pub sdk_version_error: Option<u16>,
    /// GUID returned in the GetIFVersion reply.
    pub guid: String,
    /// Answer GetDeviceInfo with an error frame carrying this code.
    pub device_info_error: Option<u16>,
    pub device_info_xml: String,
    /// Per-method `(result, inner xml)` replies; unknown methods succeed empty.
    pub replies: HashMap<String, (String, String)>,
    /// Send a heartbeat answer ahead of every SDK reply and file answer.
    pub heartbeat_noise: bool,
    pub start_code: u16,
    pub resume_offset: u32,
    pub end_code: u16,
    /// Close the socket right after answering GetDeviceInfo.
    pub hang_up_after_handshake: bool,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            version_error: None,
            version_reply: None,
            sdk_version_error: None,
            guid: "abc-123".to_string(),
            device_info_error: None,
            device_info_xml: r#"<device cpu="TI.335x" model="C16" id="C16-19-A0001" name="sim"/><version fpga="5.2" app="7.10.78.9" kernel="3.0.35"/><screen width="128" height="64" rotation="0"/>"#.to_string(),
            replies: HashMap::new(),
            heartbeat_noise: false,
            start_code: 0,
            resume_offset: 0,
            end_code: 0,
            hang_up_after_handshake: false,
        }
    }
}

impl Behavior {
    pub fn reply(mut self, method: &str, result: &str, inner: &str) -> Self {
        self.replies
            .insert(method.to_string(), (result.to_string(), inner.to_string()));
        self
    }
}

#[derive(Debug, Default)]
pub struct Recorded {
    pub connections: usize,
    pub heartbeats: usize,
    /// Reassembled SDK request documents, in arrival order.
    pub requests: Vec<String>,
    /// Raw file-start frames.
    pub file_starts: Vec<Vec<u8>>,
    /// Bodies of file-content frames.
    pub content_chunks: Vec<Vec<u8>>,
    pub file_ends: usize,
    /// Set when the client side of the latest connection went away.
    pub closed: bool,
}

pub struct SimDevice {
    pub addr: SocketAddr,
    pub log: Arc<Mutex<Recorded>>,
    handle: JoinHandle<()>,
}

impl SimDevice {
    pub async fn start(behavior: Behavior) -> SimDevice {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let log = Arc::new(Mutex::new(Recorded::default()));

        let shared = log.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                {
                    let mut log = shared.lock().unwrap();
                    log.connections += 1;
                    log.closed = false;
                }
                let (rd, wr) = tokio::io::split(stream);
                let reader = FrameReader::new(rd, Duration::from_secs(30));
                tokio::spawn(serve(reader, wr, behavior.clone(), shared.clone()));
            }
        });

        SimDevice { addr, log, handle }
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(self.addr.ip().to_string())
            .with_port(self.addr.port())
            .with_timeout(Duration::from_secs(2))
    }

    pub async fn connect(&self) -> Device {
        let device = Device::new(self.config());
        device.connect().await.unwrap();
        device
    }

    pub fn snapshot<T>(&self, f: impl FnOnce(&Recorded) -> T) -> T {
        f(&self.log.lock().unwrap())
    }

    /// Wait until the client side of the current connection has gone away.
    pub async fn wait_closed(&self) -> bool {
        for _ in 0..200 {
            if self.snapshot(|r| r.closed) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

impl Drop for SimDevice {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve<R, W>(
    mut reader: FrameReader<R>,
    mut wr: W,
    behavior: Behavior,
    log: Arc<Mutex<Recorded>>,
) where
    R: tokio::io::AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut request = Reassembly::new();
    loop {
        let pkt = match reader.read_frame().await {
            Ok(pkt) => pkt,
            Err(_) => {
                log.lock().unwrap().closed = true;
                return;
            }
        };

        let mut out: Vec<Vec<u8>> = Vec::new();
        let mut hang_up = false;
        match pkt.cmd {
            CmdType::VERSION_ASK => match (behavior.version_error, behavior.version_reply) {
                (Some(code), _) => out.push(error_answer(code)),
                (None, Some(cmd)) => out.push(make_packet(cmd, &[]).unwrap()),
                (None, None) => out.push(
                    make_packet(
                        CmdType::VERSION_ANSWER,
                        &packet::TRANSPORT_VERSION.to_le_bytes(),
                    )
                    .unwrap(),
                ),
            },
            CmdType::HEARTBEAT_ASK => {
                log.lock().unwrap().heartbeats += 1;
                out.push(make_packet(CmdType::HEARTBEAT_ANSWER, &[]).unwrap());
            }
            CmdType::SDK_CMD_ASK => {
                let frag = pkt.fragment().unwrap();
                if request.push(frag.total, frag.offset, frag.chunk).unwrap() {
                    let doc = std::mem::take(&mut request).into_text();
                    noise(&behavior, &mut out);
                    out.extend(answer_sdk(&behavior, &doc));
                    hang_up = behavior.hang_up_after_handshake
                        && doc.contains(r#"method="GetDeviceInfo""#);
                    log.lock().unwrap().requests.push(doc);
                }
            }
            CmdType::FILE_START_ASK => {
                log.lock().unwrap().file_starts.push(raw_frame(&pkt));
                noise(&behavior, &mut out);
                let mut body = behavior.start_code.to_le_bytes().to_vec();
                body.extend_from_slice(&behavior.resume_offset.to_le_bytes());
                out.push(make_packet(CmdType::FILE_START_ANSWER, &body).unwrap());
            }
            CmdType::FILE_CONTENT_ASK => {
                log.lock().unwrap().content_chunks.push(pkt.body.clone());
            }
            CmdType::FILE_END_ASK => {
                log.lock().unwrap().file_ends += 1;
                noise(&behavior, &mut out);
                out.push(make_packet(CmdType::FILE_END_ANSWER, &behavior.end_code.to_le_bytes()).unwrap());
            }
            _ => {}
        }

        for frame in out {
            if wr.write_all(&frame).await.is_err() {
                log.lock().unwrap().closed = true;
                return;
            }
        }
        if hang_up {
            log.lock().unwrap().closed = true;
            return;
        }
    }
}

fn noise(behavior: &Behavior, out: &mut Vec<Vec<u8>>) {
    if behavior.heartbeat_noise {
        out.push(make_packet(CmdType::HEARTBEAT_ANSWER, &[]).unwrap());
    }
}

fn error_answer(code: u16) -> Vec<u8> {
    make_packet(CmdType::ERROR_ANSWER, &code.to_le_bytes()).unwrap()
}

fn raw_frame(pkt: &Packet) -> Vec<u8> {
    make_packet(pkt.cmd, &pkt.body).unwrap()
}

fn answer_sdk(behavior: &Behavior, doc: &str) -> Vec<Vec<u8>> {
    let method = xml::elements(doc, "in")
        .unwrap()
        .first()
        .and_then(|attrs| attrs.get("method").cloned())
        .unwrap_or_default();

    if let (Some(code), "GetIFVersion") = (behavior.sdk_version_error, method.as_str()) {
        return vec![error_answer(code)];
    }

    let (guid, result, inner) = match method.as_str() {
        "GetIFVersion" => (
            behavior.guid.clone(),
            "kSuccess".to_string(),
            r#"<version value="1000000"/>"#.to_string(),
        ),
        "GetDeviceInfo" => {
            if let Some(code) = behavior.device_info_error {
                return vec![error_answer(code)];
            }
            let (result, inner) = behavior
                .replies
                .get(&method)
                .cloned()
                .unwrap_or(("kSuccess".to_string(), behavior.device_info_xml.clone()));
            (behavior.guid.clone(), result, inner)
        }
        _ => {
            let (result, inner) = behavior
                .replies
                .get(&method)
                .cloned()
                .unwrap_or(("kSuccess".to_string(), String::new()));
            (behavior.guid.clone(), result, inner)
        }
    };

    let reply = format!(
        r#"<?xml version="1.0" encoding="utf-8"?><sdk guid="{guid}"><out method="{method}" result="{result}">{inner}</out></sdk>"#
    );
    fragment::build_fragments(CmdType::SDK_CMD_ANSWER, reply.as_bytes()).unwrap()
}
