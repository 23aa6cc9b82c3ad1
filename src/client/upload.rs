/// Resumable file upload: start, content, end.
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, SeekFrom};
use tracing::{debug, info, trace};

use super::device::{Device, Link};
use crate::error::{Error, ProtocolError, Result, TransferPhase};
use crate::protocol::command::{CmdType, ErrorCode, FileType};
use crate::protocol::fragment::MAX_CONTENT_LEN;
use crate::protocol::framer::FrameWriter;
use crate::protocol::packet::{self, Packet};

const HASH_BUF_LEN: usize = 64 * 1024;

/// Reported after every content chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadProgress {
    pub file_name: String,
    pub total_bytes: u64,
    /// Bytes the device holds so far, including any resumed prefix.
    pub sent_bytes: u64,
    pub percent: f64,
}

/// Outcome of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub file_name: String,
    pub size: u64,
    pub md5: String,
    /// Bytes the device already had before this upload.
    pub resumed_from: u64,
    /// Bytes sent as content frames during this upload.
    pub sent_bytes: u64,
    /// `SUCCESS` or `WRITE_FINISH`.
    pub end_code: ErrorCode,
}

struct FileMeta<'a> {
    name: &'a str,
    size: u32,
    md5: &'a str,
    file_type: FileType,
}

impl Device {
    /// Upload an in-memory buffer as `name`. The type defaults to detection
    /// by extension.
    pub async fn upload_bytes(
        &self,
        name: &str,
        data: &[u8],
        file_type: Option<FileType>,
        progress: Option<&mut (dyn FnMut(UploadProgress) + Send + '_)>,
    ) -> Result<UploadReport> {
        if name.is_empty() {
            return Err(Error::InvalidArgument("file name must not be empty"));
        }
        let size = declared_size(data.len() as u64)?;
        let md5 = format!("{:x}", md5::compute(data));
        let meta = FileMeta {
            name,
            size,
            md5: &md5,
            file_type: file_type.unwrap_or_else(|| FileType::detect(Path::new(name))),
        };

        let (mut link, writer) = self.acquire().await?;
        let Some(reader) = link.as_mut() else {
            return Err(Error::NotConnected);
        };

        let result = async {
            let offset = start(reader, &writer, &meta).await?;
            let rest = &data[offset as usize..];
            let sent = send_content(&writer, rest, &meta, offset, progress).await?;
            let end_code = finish(reader, &writer).await?;
            Ok::<_, Error>(report(&meta, offset, sent, end_code))
        }
        .await;
        self.check(result)
    }

    /// Upload a file from disk under its base name. The digest is computed in
    /// a first streaming pass and the content is read again chunk by chunk.
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        file_type: Option<FileType>,
        progress: Option<&mut (dyn FnMut(UploadProgress) + Send + '_)>,
    ) -> Result<UploadReport> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or(Error::InvalidArgument("path has no usable file name"))?;

        let md5 = file_md5(path).await?;
        let mut file = File::open(path).await.map_err(|e| file_error(path, e))?;
        let len = file.metadata().await.map_err(|e| file_error(path, e))?.len();
        let meta = FileMeta {
            name,
            size: declared_size(len)?,
            md5: &md5,
            file_type: file_type.unwrap_or_else(|| FileType::detect(path)),
        };

        let (mut link, writer) = self.acquire().await?;
        let Some(reader) = link.as_mut() else {
            return Err(Error::NotConnected);
        };

        let result = async {
            let offset = start(reader, &writer, &meta).await?;
            file.seek(SeekFrom::Start(u64::from(offset)))
                .await
                .map_err(|e| file_error(path, e))?;
            let rest = (&mut file).take(u64::from(meta.size - offset));
            let sent = send_content(&writer, rest, &meta, offset, progress).await?;
            let end_code = finish(reader, &writer).await?;
            Ok::<_, Error>(report(&meta, offset, sent, end_code))
        }
        .await;
        self.check(result)
    }

    /// Upload several files in order, stopping at the first failure.
    pub async fn upload_files<P: AsRef<Path>>(
        &self,
        paths: &[P],
        mut progress: Option<&mut (dyn FnMut(UploadProgress) + Send + '_)>,
    ) -> Result<Vec<UploadReport>> {
        let mut reports = Vec::with_capacity(paths.len());
        for path in paths {
            reports.push(self.upload_file(path, None, progress.as_deref_mut()).await?);
        }
        Ok(reports)
    }
}

/// Hex MD5 of a file, read in bounded chunks.
pub async fn file_md5(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let mut file = File::open(path).await.map_err(|e| file_error(path, e))?;
    let mut ctx = md5::Context::new();
    let mut buf = vec![0u8; HASH_BUF_LEN];
    loop {
        let n = file.read(&mut buf).await.map_err(|e| file_error(path, e))?;
        if n == 0 {
            break;
        }
        ctx.consume(&buf[..n]);
    }
    Ok(format!("{:x}", ctx.compute()))
}

fn file_error(path: &Path, source: std::io::Error) -> Error {
    Error::File {
        path: PathBuf::from(path),
        source,
    }
}

fn declared_size(len: u64) -> Result<u32> {
    u32::try_from(len).map_err(|_| ProtocolError::PayloadTooLarge(len).into())
}

fn report(meta: &FileMeta<'_>, offset: u32, sent: u64, end_code: ErrorCode) -> UploadReport {
    UploadReport {
        file_name: meta.name.to_string(),
        size: u64::from(meta.size),
        md5: meta.md5.to_string(),
        resumed_from: u64::from(offset),
        sent_bytes: sent,
        end_code,
    }
}

/// Announce the file and return the device's resume offset.
async fn start(reader: &mut Link, writer: &FrameWriter, meta: &FileMeta<'_>) -> Result<u32> {
    info!(
        "Uploading {} ({} bytes, {:?}, MD5 {})",
        meta.name, meta.size, meta.file_type, meta.md5
    );
    let frame = packet::file_start_ask(meta.name, meta.size, meta.md5, meta.file_type)?;
    writer.write_frame(&frame).await?;

    let answer = read_answer(reader, CmdType::FILE_START_ANSWER).await?;
    let (code, existing) = answer.file_start_answer()?;
    if !code.is_success() {
        return Err(Error::FileTransfer {
            phase: TransferPhase::Start,
            code,
        });
    }
    if existing > meta.size {
        return Err(ProtocolError::ResumeOutOfRange {
            offset: existing,
            size: meta.size,
        }
        .into());
    }
    if existing > 0 {
        info!("Resuming {} at byte {}", meta.name, existing);
    }
    Ok(existing)
}

/// Stream `content` as file-content frames without waiting for acks.
async fn send_content<R: AsyncRead + Unpin>(
    writer: &FrameWriter,
    mut content: R,
    meta: &FileMeta<'_>,
    offset: u32,
    mut progress: Option<&mut (dyn FnMut(UploadProgress) + Send + '_)>,
) -> Result<u64> {
    let total = u64::from(meta.size);
    let mut position = u64::from(offset);
    let mut sent = 0u64;
    let mut buf = vec![0u8; MAX_CONTENT_LEN];

    loop {
        let n = fill(&mut content, &mut buf).await?;
        if n == 0 {
            break;
        }
        writer.write_frame(&packet::file_content_ask(&buf[..n])?).await?;
        sent += n as u64;
        position += n as u64;
        trace!("{}: {}/{} bytes", meta.name, position, total);

        if let Some(sink) = progress.as_deref_mut() {
            sink(UploadProgress {
                file_name: meta.name.to_string(),
                total_bytes: total,
                sent_bytes: position,
                percent: position as f64 / total as f64 * 100.0,
            });
        }
        if n < buf.len() {
            break;
        }
    }
    debug!("{}: sent {} content bytes", meta.name, sent);
    Ok(sent)
}

/// Read until `buf` is full or the source is exhausted.
async fn fill<R: AsyncRead + Unpin>(content: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = content.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

async fn finish(reader: &mut Link, writer: &FrameWriter) -> Result<ErrorCode> {
    writer.write_frame(&packet::file_end_ask()).await?;
    let answer = read_answer(reader, CmdType::FILE_END_ANSWER).await?;
    let code = answer.file_end_answer()?;
    if code != ErrorCode::SUCCESS && code != ErrorCode::WRITE_FINISH {
        return Err(Error::FileTransfer {
            phase: TransferPhase::End,
            code,
        });
    }
    info!("Upload finished ({})", code);
    Ok(code)
}

/// Next frame of type `expected`, skipping heartbeat answers.
async fn read_answer(reader: &mut Link, expected: CmdType) -> Result<Packet> {
    loop {
        let pkt = reader.read_frame().await?;
        match pkt.cmd {
            cmd if cmd == expected => return Ok(pkt),
            CmdType::HEARTBEAT_ANSWER => trace!("heartbeat answer during upload"),
            CmdType::ERROR_ANSWER => return Err(Error::Device(pkt.error_code()?)),
            other => return Err(ProtocolError::UnexpectedCommand(other).into()),
        }
    }
}
