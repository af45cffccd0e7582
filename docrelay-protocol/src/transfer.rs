//! Chunked bulk transfer with byte accounting.
//!
//! Both directions move exactly the declared number of bytes. The receiving
//! side never asks the socket for more than `min(chunk_size, remaining)`, so
//! whatever follows the payload on the wire is left untouched for the next
//! step.

use crate::error::ProtocolError;
use crate::step::Step;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::trace;

/// Copies exactly `size` bytes from a local `source` onto the wire.
///
/// Each write is bounded by `chunk_timeout`. A source that runs dry before
/// `size` bytes is a local error; nothing more is written.
pub async fn send_exact<R, W>(
    source: &mut R,
    wire: &mut W,
    size: u64,
    chunk_size: usize,
    chunk_timeout: Duration,
    step: Step,
) -> Result<u64, ProtocolError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut sent = 0u64;

    while sent < size {
        let want = remaining_chunk(size - sent, buf.len());
        let n = source.read(&mut buf[..want]).await.map_err(ProtocolError::Local)?;
        if n == 0 {
            return Err(ProtocolError::Local(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("source ended after {} of {} bytes", sent, size),
            )));
        }

        timeout(chunk_timeout, wire.write_all(&buf[..n]))
            .await
            .map_err(|_| ProtocolError::Timeout { step })??;
        sent += n as u64;
        trace!(step = %step, sent, size, "chunk sent");
    }

    timeout(chunk_timeout, wire.flush())
        .await
        .map_err(|_| ProtocolError::Timeout { step })??;
    Ok(sent)
}

/// Reads exactly `size` bytes from the wire into a local `sink`.
///
/// Each read is bounded by `chunk_timeout`. A zero-byte read before `size`
/// is reached means the peer went away.
pub async fn receive_exact<R, W>(
    wire: &mut R,
    sink: &mut W,
    size: u64,
    chunk_size: usize,
    chunk_timeout: Duration,
    step: Step,
) -> Result<u64, ProtocolError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut received = 0u64;

    while received < size {
        let want = remaining_chunk(size - received, buf.len());
        let n = timeout(chunk_timeout, wire.read(&mut buf[..want]))
            .await
            .map_err(|_| ProtocolError::Timeout { step })??;
        if n == 0 {
            return Err(ProtocolError::ConnectionAborted {
                step,
                detail: format!("received {} of {} bytes", received, size),
            });
        }

        sink.write_all(&buf[..n]).await.map_err(ProtocolError::Local)?;
        received += n as u64;
        trace!(step = %step, received, size, "chunk received");
    }

    sink.flush().await.map_err(ProtocolError::Local)?;
    Ok(received)
}

fn remaining_chunk(remaining: u64, chunk_size: usize) -> usize {
    usize::try_from(remaining).map_or(chunk_size, |r| r.min(chunk_size))
}
