/// UDP device discovery.
/// Broadcasts a search-ask on port 10001 and collects search answers.
use std::net::{Ipv4Addr, SocketAddr};

use byteorder::{ByteOrder, LittleEndian};
use tokio::net::UdpSocket;
use tokio::time::{self, Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::protocol::command::CmdType;
use crate::protocol::packet::{self, HEADER_LEN};

pub const DISCOVERY_PORT: u16 = 10001;

const DEVICE_ID_LEN: usize = 15;

/// A controller that answered the search broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub addr: SocketAddr,
    pub device_id: String,
}

/// Broadcast one search request and gather answers until `timeout` elapses.
pub async fn scan(timeout: Duration) -> Result<Vec<DiscoveredDevice>> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.set_broadcast(true)?;
    socket
        .send_to(&packet::search_ask(), (Ipv4Addr::BROADCAST, DISCOVERY_PORT))
        .await?;
    debug!("Search broadcast sent on port {}", DISCOVERY_PORT);

    let deadline = Instant::now() + timeout;
    let mut found: Vec<DiscoveredDevice> = Vec::new();
    let mut buf = [0u8; 1024];

    loop {
        let (len, peer) = match time::timeout_at(deadline, socket.recv_from(&mut buf)).await {
            Err(_) => break,
            Ok(Ok(received)) => received,
            Ok(Err(e)) => {
                warn!("UDP receive error: {}", e);
                continue;
            }
        };

        let Some(device_id) = parse_search_answer(&buf[..len]) else {
            debug!("Ignoring {} byte datagram from {}", len, peer);
            continue;
        };
        if found.iter().any(|d| d.addr == peer) {
            continue;
        }
        info!("Found device {} at {}", device_id, peer);
        found.push(DiscoveredDevice {
            addr: peer,
            device_id,
        });
    }

    Ok(found)
}

/// Device id from a search answer, or `None` if the datagram is not one.
///
/// Answers normally start with the frame header
/// (`[len][0x1002][version u32][id 15B]...`); some firmwares put the version
/// first (`[version u32][0x1002][id 15B]...`). Both are accepted.
pub fn parse_search_answer(data: &[u8]) -> Option<String> {
    let answer = CmdType::SEARCH_DEVICE_ANSWER.0;
    let id_at = if data.len() >= HEADER_LEN && LittleEndian::read_u16(&data[2..4]) == answer {
        8
    } else if data.len() >= 6 && LittleEndian::read_u16(&data[4..6]) == answer {
        6
    } else {
        return None;
    };

    let raw = data.get(id_at..)?;
    let raw = &raw[..raw.len().min(DEVICE_ID_LEN)];
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let id = String::from_utf8_lossy(&raw[..end]).trim().to_string();
    Some(id)
}
