/// Splitting SDK XML bodies into fragment frames and reassembling replies.
use tokio::io::AsyncRead;
use tracing::trace;

use crate::error::{Error, ProtocolError, Result};
use crate::protocol::command::CmdType;
use crate::protocol::framer::FrameReader;
use crate::protocol::packet;

/// Largest XML chunk carried by one frame (also the upload chunk size).
pub const MAX_CONTENT_LEN: usize = 8000;

/// Upper bound on a declared reply size before any buffer is allocated.
pub const MAX_XML_LEN: usize = 64 * 1024 * 1024;

/// Fragment frames for an outbound SDK command.
pub fn build_request(xml: &[u8]) -> Result<Vec<Vec<u8>>> {
    build_fragments(CmdType::SDK_CMD_ASK, xml)
}

/// Split `xml` into contiguous chunks of at most `MAX_CONTENT_LEN` bytes, each
/// framed with the total length and its own starting offset.
pub fn build_fragments(cmd: CmdType, xml: &[u8]) -> Result<Vec<Vec<u8>>> {
    if xml.is_empty() {
        return Ok(Vec::new());
    }
    let total = u32::try_from(xml.len())
        .map_err(|_| ProtocolError::PayloadTooLarge(xml.len() as u64))?;

    let frames = xml
        .chunks(MAX_CONTENT_LEN)
        .enumerate()
        .map(|(i, chunk)| {
            let offset = (i * MAX_CONTENT_LEN) as u32;
            packet::sdk_fragment(cmd, total, offset, chunk)
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(frames)
}

/// Reply buffer sized by the first fragment's declared total.
#[derive(Debug, Default)]
pub struct Reassembly {
    buf: Option<Vec<u8>>,
    received: usize,
}

impl Reassembly {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy one chunk into place. Returns true once every declared byte arrived.
    pub fn push(&mut self, total: u32, offset: u32, chunk: &[u8]) -> Result<bool> {
        if self.buf.is_none() {
            let total = total as usize;
            if total > MAX_XML_LEN {
                return Err(ProtocolError::PayloadTooLarge(total as u64).into());
            }
            self.buf = Some(vec![0u8; total]);
        }
        let Some(buf) = self.buf.as_mut() else {
            return Ok(false);
        };

        let total = buf.len();
        let offset = offset as usize;
        let end = offset
            .checked_add(chunk.len())
            .filter(|&end| end <= total)
            .ok_or(ProtocolError::OffsetOutOfRange {
                offset,
                len: chunk.len(),
                total,
            })?;

        buf[offset..end].copy_from_slice(chunk);
        self.received += chunk.len();
        Ok(self.received >= total)
    }

    pub fn into_text(self) -> String {
        clean_xml(&self.buf.unwrap_or_default())
    }
}

/// Strip a UTF-8 byte-order mark and surrounding whitespace.
pub fn clean_xml(data: &[u8]) -> String {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);
    String::from_utf8_lossy(data).trim().to_string()
}

/// Read frames until one complete SDK reply has been reassembled.
///
/// Heartbeat answers that arrive in between are skipped. An error answer ends
/// the read with `Error::Device`; anything else is a protocol violation.
pub async fn assemble_response<R: AsyncRead + Unpin>(
    reader: &mut FrameReader<R>,
) -> Result<String> {
    let mut reply = Reassembly::new();
    loop {
        let pkt = reader.read_frame().await?;
        match pkt.cmd {
            CmdType::SDK_CMD_ANSWER => {
                let frag = pkt.fragment()?;
                if reply.push(frag.total, frag.offset, frag.chunk)? {
                    return Ok(reply.into_text());
                }
            }
            CmdType::ERROR_ANSWER => return Err(Error::Device(pkt.error_code()?)),
            CmdType::HEARTBEAT_ANSWER => {
                trace!("heartbeat answer while waiting for SDK reply");
            }
            other => return Err(ProtocolError::UnexpectedCommand(other).into()),
        }
    }
}
