/// Frame layouts for the binary TCP protocol.
///
/// Every frame is `[length u16][command u16][body]`, little-endian, where
/// `length` counts the whole frame including the 4-byte header.
use byteorder::{ByteOrder, LittleEndian};

use crate::error::ProtocolError;
use crate::protocol::command::{CmdType, ErrorCode, FileType};

pub const HEADER_LEN: usize = 4;
pub const VERSION_FRAME_LEN: usize = 8;
pub const SDK_HEADER_LEN: usize = 12;
pub const ERROR_FRAME_LEN: usize = 6;
pub const FILE_START_HEADER_LEN: usize = 47;
pub const FILE_START_ANSWER_LEN: usize = 10;
pub const FILE_END_ANSWER_LEN: usize = 6;

pub const TRANSPORT_VERSION: u32 = 0x0100_0005;

const MD5_HEX_LEN: usize = 32;

/// One decoded frame. `body` is everything after the 4-byte header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub cmd: CmdType,
    pub body: Vec<u8>,
}

/// Sub-header of a fragmented SDK command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment<'a> {
    pub total: u32,
    pub offset: u32,
    pub chunk: &'a [u8],
}

impl Packet {
    /// Total frame length on the wire.
    pub fn len(&self) -> usize {
        HEADER_LEN + self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Ensure the frame is at least `min` bytes long (header included).
    fn require(&self, min: usize) -> Result<&[u8], ProtocolError> {
        if self.len() < min {
            return Err(ProtocolError::ShortFrame {
                cmd: self.cmd,
                len: self.len(),
                min,
            });
        }
        Ok(&self.body)
    }

    pub fn version(&self) -> Result<u32, ProtocolError> {
        let body = self.require(VERSION_FRAME_LEN)?;
        Ok(LittleEndian::read_u32(&body[0..4]))
    }

    pub fn error_code(&self) -> Result<ErrorCode, ProtocolError> {
        let body = self.require(ERROR_FRAME_LEN)?;
        Ok(ErrorCode(LittleEndian::read_u16(&body[0..2])))
    }

    pub fn fragment(&self) -> Result<Fragment<'_>, ProtocolError> {
        let body = self.require(SDK_HEADER_LEN)?;
        Ok(Fragment {
            total: LittleEndian::read_u32(&body[0..4]),
            offset: LittleEndian::read_u32(&body[4..8]),
            chunk: &body[8..],
        })
    }

    /// Result code and the number of bytes the device already holds.
    pub fn file_start_answer(&self) -> Result<(ErrorCode, u32), ProtocolError> {
        let body = self.require(FILE_START_ANSWER_LEN)?;
        Ok((
            ErrorCode(LittleEndian::read_u16(&body[0..2])),
            LittleEndian::read_u32(&body[2..6]),
        ))
    }

    pub fn file_end_answer(&self) -> Result<ErrorCode, ProtocolError> {
        let body = self.require(FILE_END_ANSWER_LEN)?;
        Ok(ErrorCode(LittleEndian::read_u16(&body[0..2])))
    }
}

/// Allocate a zeroed frame of `len` bytes with its header filled in.
fn frame(cmd: CmdType, len: usize) -> Result<Vec<u8>, ProtocolError> {
    let wire_len = u16::try_from(len).map_err(|_| ProtocolError::FrameTooLarge(len))?;
    let mut pkt = vec![0u8; len];
    LittleEndian::write_u16(&mut pkt[0..2], wire_len);
    LittleEndian::write_u16(&mut pkt[2..4], cmd.0);
    Ok(pkt)
}

/// Header plus an opaque body.
pub fn make_packet(cmd: CmdType, body: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let mut pkt = frame(cmd, HEADER_LEN + body.len())?;
    pkt[HEADER_LEN..].copy_from_slice(body);
    Ok(pkt)
}

pub fn version_ask() -> Vec<u8> {
    let mut pkt = [0u8; VERSION_FRAME_LEN];
    LittleEndian::write_u16(&mut pkt[0..2], VERSION_FRAME_LEN as u16);
    LittleEndian::write_u16(&mut pkt[2..4], CmdType::VERSION_ASK.0);
    LittleEndian::write_u32(&mut pkt[4..8], TRANSPORT_VERSION);
    pkt.to_vec()
}

pub fn heartbeat_ask() -> Vec<u8> {
    header_only(CmdType::HEARTBEAT_ASK)
}

pub fn file_end_ask() -> Vec<u8> {
    header_only(CmdType::FILE_END_ASK)
}

fn header_only(cmd: CmdType) -> Vec<u8> {
    let mut pkt = vec![0u8; HEADER_LEN];
    LittleEndian::write_u16(&mut pkt[0..2], HEADER_LEN as u16);
    LittleEndian::write_u16(&mut pkt[2..4], cmd.0);
    pkt
}

/// `[len][cmd][total u32][offset u32][chunk]`
pub fn sdk_fragment(
    cmd: CmdType,
    total: u32,
    offset: u32,
    chunk: &[u8],
) -> Result<Vec<u8>, ProtocolError> {
    let mut pkt = frame(cmd, SDK_HEADER_LEN + chunk.len())?;
    LittleEndian::write_u32(&mut pkt[4..8], total);
    LittleEndian::write_u32(&mut pkt[8..12], offset);
    pkt[SDK_HEADER_LEN..].copy_from_slice(chunk);
    Ok(pkt)
}

/// File-start ask:
/// `[len][cmd][md5 hex 32B][pad][size u32][pad 4B][type u16][name][NUL]`
pub fn file_start_ask(
    name: &str,
    size: u32,
    md5_hex: &str,
    file_type: FileType,
) -> Result<Vec<u8>, ProtocolError> {
    let name = name.as_bytes();
    let len = FILE_START_HEADER_LEN + name.len() + 1;
    let mut pkt = frame(CmdType::FILE_START_ASK, len)?;

    let md5 = md5_hex.as_bytes();
    let md5_len = md5.len().min(MD5_HEX_LEN);
    pkt[4..4 + md5_len].copy_from_slice(&md5[..md5_len]);
    LittleEndian::write_u32(&mut pkt[37..41], size);
    LittleEndian::write_u16(&mut pkt[45..47], file_type.code());
    pkt[FILE_START_HEADER_LEN..len - 1].copy_from_slice(name);
    Ok(pkt)
}

pub fn file_content_ask(chunk: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    make_packet(CmdType::FILE_CONTENT_ASK, chunk)
}

/// UDP search broadcast: `[len=8][0x1001][transport version]`.
pub fn search_ask() -> Vec<u8> {
    let mut pkt = version_ask();
    LittleEndian::write_u16(&mut pkt[2..4], CmdType::SEARCH_DEVICE_ASK.0);
    pkt
}
