use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{DispatchError, Result};

/// Connect deadline for every probe and work connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(2_000);

/// Upper bound on a single string payload.
pub const MAX_STRING_BYTES: usize = 16 * 1024 * 1024;

/// Fixed header markers exchanged with the conversion hosts. Each one is
/// exactly [`Header::LEN`] bytes on the wire; anything else is an unknown
/// response and aborts the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Header {
    /// Liveness probe request.
    Alive,
    /// Positive acknowledgement.
    Ack,
    /// Host is alive but waiting for its activation config.
    ToConfig,
    /// Marker sent after the activation config payload.
    ConfigApplied,
    /// Opens a work dialogue.
    Init,
    /// Work-start command: document indexing/conversion.
    Convert,
    /// Terminal success response of a work dialogue.
    Done,
}

impl Header {
    pub const LEN: usize = 4;

    pub const fn bytes(self) -> [u8; Self::LEN] {
        match self {
            Header::Alive => *b"ALIV",
            Header::Ack => *b"ACK.",
            Header::ToConfig => *b"TCFG",
            Header::ConfigApplied => *b"CFGA",
            Header::Init => *b"INIT",
            Header::Convert => *b"CONV",
            Header::Done => *b"DONE",
        }
    }

    pub fn parse(raw: [u8; Self::LEN]) -> Option<Header> {
        match &raw {
            b"ALIV" => Some(Header::Alive),
            b"ACK." => Some(Header::Ack),
            b"TCFG" => Some(Header::ToConfig),
            b"CFGA" => Some(Header::ConfigApplied),
            b"INIT" => Some(Header::Init),
            b"CONV" => Some(Header::Convert),
            b"DONE" => Some(Header::Done),
            _ => None,
        }
    }
}

impl std::fmt::Display for Header {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Header::Alive => "ALIVE",
            Header::Ack => "ACK",
            Header::ToConfig => "TO_CONFIG",
            Header::ConfigApplied => "CONFIG_APPLIED",
            Header::Init => "INIT",
            Header::Convert => "CONVERT",
            Header::Done => "DONE",
        })
    }
}

/// Write one header marker.
pub async fn send_header<W>(stream: &mut W, header: Header) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    stream.write_all(&header.bytes()).await?;
    stream.flush().await?;
    Ok(())
}

/// Read one header marker. Unknown byte sequences fail with
/// `UnexpectedHeader`.
pub async fn recv_header<R>(stream: &mut R) -> Result<Header>
where
    R: AsyncRead + Unpin,
{
    let mut raw = [0u8; Header::LEN];
    stream.read_exact(&mut raw).await?;
    Header::parse(raw).ok_or_else(|| {
        DispatchError::UnexpectedHeader(String::from_utf8_lossy(&raw).into_owned())
    })
}

/// Write one length-prefixed UTF-8 string: big-endian u32 byte length
/// followed by the bytes.
pub async fn send_string<W>(stream: &mut W, value: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let len: u32 = value
        .len()
        .try_into()
        .map_err(|_| DispatchError::UnexpectedHeader("string payload too large".to_string()))?;
    stream.write_u32(len).await?;
    stream.write_all(value.as_bytes()).await?;
    stream.flush().await?;
    Ok(())
}

/// Read one length-prefixed UTF-8 string.
pub async fn recv_string<R>(stream: &mut R) -> Result<String>
where
    R: AsyncRead + Unpin,
{
    let len = stream.read_u32().await? as usize;
    if len > MAX_STRING_BYTES {
        return Err(DispatchError::UnexpectedHeader(format!(
            "string payload of {len} bytes exceeds cap"
        )));
    }
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;
    String::from_utf8(buf)
        .map_err(|_| DispatchError::UnexpectedHeader("string payload is not UTF-8".to_string()))
}

/// Client side of one protocol connection. Writes go out immediately;
/// reads are bounded by the per-exchange deadline when one is set.
#[derive(Debug)]
pub struct Connection {
    stream: BufStream<TcpStream>,
    read_timeout: Option<Duration>,
}

impl Connection {
    /// Open a connection to `address:port` within [`CONNECT_TIMEOUT`].
    pub async fn open(address: &str, port: u16, read_timeout: Option<Duration>) -> Result<Self> {
        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect((address, port)))
            .await
            .map_err(|_| DispatchError::timed_out("connect"))??;
        Ok(Self {
            stream: BufStream::new(stream),
            read_timeout,
        })
    }

    pub async fn send_header(&mut self, header: Header) -> Result<()> {
        send_header(&mut self.stream, header).await
    }

    pub async fn recv_header(&mut self) -> Result<Header> {
        let deadline = self.read_timeout;
        let fut = recv_header(&mut self.stream);
        match deadline {
            Some(d) => timeout(d, fut)
                .await
                .map_err(|_| DispatchError::timed_out("read header"))?,
            None => fut.await,
        }
    }

    pub async fn send_string(&mut self, value: &str) -> Result<()> {
        send_string(&mut self.stream, value).await
    }
}
