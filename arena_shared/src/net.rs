//! Framed transport.
//!
//! TCP carrying `[u32 len][len bytes]` frames (little-endian length). The
//! read and write halves are split so a session can run its reader and
//! writer as independent tasks.

use std::{fmt, net::SocketAddr};

use anyhow::Context;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener, TcpStream,
    },
};

use crate::error::{NetError, NetResult};

/// Default upper bound for a single frame.
pub const DEFAULT_MAX_FRAME_LEN: usize = 4096;

/// Identifies a connected session. Assigned by the tick loop, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An accepted connection that has not been registered yet.
#[derive(Debug)]
pub struct RawConnection {
    pub stream: TcpStream,
    pub peer: SocketAddr,
}

impl RawConnection {
    /// Splits into framed halves.
    pub fn into_split(self, max_frame_len: usize) -> (FrameReader, FrameWriter) {
        let (read, write) = self.stream.into_split();
        (
            FrameReader {
                inner: read,
                buf: BytesMut::with_capacity(1024),
                max_frame_len,
            },
            FrameWriter { inner: write },
        )
    }
}

/// Reading half of a framed connection.
#[derive(Debug)]
pub struct FrameReader {
    inner: OwnedReadHalf,
    buf: BytesMut,
    max_frame_len: usize,
}

impl FrameReader {
    /// Reads the next frame. `Ok(None)` means the peer closed cleanly.
    ///
    /// Cancel safe: partial frames stay buffered for the next call.
    pub async fn recv(&mut self) -> NetResult<Option<Bytes>> {
        loop {
            if let Some(frame) = self.parse_frame()? {
                return Ok(Some(frame));
            }
            if self.inner.read_buf(&mut self.buf).await? == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed mid-frame",
                )
                .into());
            }
        }
    }

    fn parse_frame(&mut self) -> NetResult<Option<Bytes>> {
        if self.buf.len() < 4 {
            return Ok(None);
        }
        let len = u32::from_le_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]) as usize;
        if len > self.max_frame_len {
            return Err(NetError::malformed(format!(
                "frame of {len} bytes exceeds limit {}",
                self.max_frame_len
            )));
        }
        if self.buf.len() < 4 + len {
            self.buf.reserve(4 + len - self.buf.len());
            return Ok(None);
        }
        self.buf.advance(4);
        Ok(Some(self.buf.split_to(len).freeze()))
    }
}

/// Writing half of a framed connection.
#[derive(Debug)]
pub struct FrameWriter {
    inner: OwnedWriteHalf,
}

impl FrameWriter {
    pub async fn send(&mut self, frame: &[u8]) -> NetResult<()> {
        let mut buf = BytesMut::with_capacity(4 + frame.len());
        buf.put_u32_le(frame.len() as u32);
        buf.extend_from_slice(frame);
        self.inner.write_all(&buf).await?;
        Ok(())
    }

    /// Flushes and half-closes the stream.
    pub async fn shutdown(&mut self) -> NetResult<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

/// Connects to a server and returns framed halves.
pub async fn connect(addr: SocketAddr, max_frame_len: usize) -> anyhow::Result<(FrameReader, FrameWriter)> {
    let stream = TcpStream::connect(addr).await.context("tcp connect")?;
    stream.set_nodelay(true).context("set nodelay")?;
    Ok(RawConnection { stream, peer: addr }.into_split(max_frame_len))
}

/// TCP server listener.
pub struct FrameListener {
    listener: TcpListener,
}

impl FrameListener {
    pub async fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await.context("tcp bind")?;
        Ok(Self { listener })
    }

    pub async fn accept(&self) -> anyhow::Result<RawConnection> {
        let (stream, peer) = self.listener.accept().await.context("tcp accept")?;
        stream.set_nodelay(true).context("set nodelay")?;
        Ok(RawConnection { stream, peer })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}
