//! Timeout-bounded channel over one connection.
//!
//! `Wire` knows how to move each kind of field and which deadline applies;
//! the session drivers on either end decide the order.

use crate::ack::AckToken;
use crate::error::ProtocolError;
use crate::frame::{decode_size, decode_token, encode_size};
use crate::step::Step;
use crate::transfer::{receive_exact, send_exact};
use crate::{DEFAULT_CHUNK_SIZE, MAX_ERROR_MESSAGE_LEN, MAX_TOKEN_LEN, SIZE_FIELD_LEN};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::debug;

/// Deadlines applied by a [`Wire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Every token, ACK and size field.
    pub handshake: Duration,
    /// Each individual read or write during a bulk transfer.
    pub chunk: Duration,
    /// A whole bulk transfer, and the wait while the peer is processing.
    pub operation: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            handshake: Duration::from_secs(60),
            chunk: Duration::from_secs(120),
            operation: Duration::from_secs(600),
        }
    }
}

impl Timeouts {
    /// Overall deadline for `step`.
    pub fn for_step(&self, step: Step) -> Duration {
        if step.is_bulk() || step == Step::Process {
            self.operation
        } else {
            self.handshake
        }
    }
}

/// A connection with protocol-aware reads and writes.
#[derive(Debug)]
pub struct Wire<S> {
    stream: S,
    timeouts: Timeouts,
    chunk_size: usize,
}

impl<S> Wire<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, timeouts: Timeouts) -> Self {
        Self {
            stream,
            timeouts,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Writes a raw token.
    pub async fn send_token(&mut self, step: Step, token: &str) -> Result<(), ProtocolError> {
        debug!(step = %step, len = token.len(), "send token");
        self.write_all(step, token.as_bytes()).await
    }

    /// Reads one token with a single bounded read.
    pub async fn recv_token(&mut self, step: Step) -> Result<String, ProtocolError> {
        self.recv_token_within(step, self.timeouts.handshake).await
    }

    /// Like [`Wire::recv_token`] with an explicit deadline, for tokens that
    /// arrive only after the peer has finished a long operation.
    pub async fn recv_token_within(
        &mut self,
        step: Step,
        limit: Duration,
    ) -> Result<String, ProtocolError> {
        let bytes = self.read_token_bytes(step, limit).await?;
        let token = decode_token(&bytes)?;
        debug!(step = %step, len = token.len(), "recv token");
        Ok(token)
    }

    pub async fn send_ack(&mut self, ack: AckToken, step: Step) -> Result<(), ProtocolError> {
        debug!(step = %step, ack = %ack, "send ack");
        self.write_all(step, ack.as_bytes()).await
    }

    /// Reads the ACK that must close `step`. Anything else aborts.
    pub async fn expect_ack(&mut self, step: Step) -> Result<(), ProtocolError> {
        let Some(expected) = step.ack() else {
            return Ok(());
        };

        let bytes = self.read_token_bytes(step, self.timeouts.handshake).await?;
        match AckToken::parse(&bytes) {
            Some(ack) if ack == expected => {
                debug!(step = %step, ack = %ack, "recv ack");
                Ok(())
            }
            _ => Err(ProtocolError::UnexpectedAck {
                step,
                expected: expected.as_str(),
                got: String::from_utf8_lossy(&bytes).into_owned(),
            }),
        }
    }

    pub async fn send_size(&mut self, step: Step, size: u64) -> Result<(), ProtocolError> {
        let field = encode_size(size)?;
        debug!(step = %step, size, "send size");
        self.write_all(step, &field).await
    }

    /// Reads exactly one 16-byte size field.
    pub async fn recv_size(&mut self, step: Step) -> Result<u64, ProtocolError> {
        let mut field = [0u8; SIZE_FIELD_LEN];
        match timeout(self.timeouts.handshake, self.stream.read_exact(&mut field)).await {
            Err(_) => return Err(ProtocolError::Timeout { step }),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(ProtocolError::closed(step))
            }
            Ok(Err(e)) => return Err(e.into()),
            Ok(Ok(_)) => {}
        }
        let size = decode_size(&field)?;
        debug!(step = %step, size, "recv size");
        Ok(size)
    }

    /// Streams `size` bytes from `source`, bounded by the operation timeout.
    pub async fn send_payload<R>(
        &mut self,
        step: Step,
        source: &mut R,
        size: u64,
    ) -> Result<u64, ProtocolError>
    where
        R: AsyncRead + Unpin,
    {
        let chunk = self.timeouts.chunk;
        let fut = send_exact(source, &mut self.stream, size, self.chunk_size, chunk, step);
        let sent = timeout(self.timeouts.operation, fut)
            .await
            .map_err(|_| ProtocolError::Timeout { step })??;
        debug!(step = %step, sent, "payload sent");
        Ok(sent)
    }

    /// Receives exactly `size` bytes into `sink`, bounded by the operation
    /// timeout.
    pub async fn recv_payload<W>(
        &mut self,
        step: Step,
        sink: &mut W,
        size: u64,
    ) -> Result<u64, ProtocolError>
    where
        W: AsyncWrite + Unpin,
    {
        let chunk = self.timeouts.chunk;
        let fut = receive_exact(&mut self.stream, sink, size, self.chunk_size, chunk, step);
        let received = timeout(self.timeouts.operation, fut)
            .await
            .map_err(|_| ProtocolError::Timeout { step })??;
        debug!(step = %step, received, "payload received");
        Ok(received)
    }

    /// Writes the unframed error block that follows a failure envelope.
    pub async fn send_error_block(&mut self, message: &str) -> Result<(), ProtocolError> {
        let block = crate::envelope::truncate_error_block(message);
        debug!(len = block.len(), "send error block");
        self.write_all(Step::ResultPayload, block.as_bytes()).await
    }

    /// Reads the error block, up to the block limit or until the peer
    /// closes. An empty block is returned as such.
    pub async fn recv_error_block(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let step = Step::ResultPayload;
        let mut block = vec![0u8; MAX_ERROR_MESSAGE_LEN];
        let mut filled = 0;

        while filled < block.len() {
            match timeout(self.timeouts.handshake, self.stream.read(&mut block[filled..])).await {
                Err(_) if filled > 0 => break,
                Err(_) => return Err(ProtocolError::Timeout { step }),
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => filled += n,
                Ok(Err(e)) if filled > 0 => {
                    debug!(error = %e, "error block cut short");
                    break;
                }
                Ok(Err(e)) => return Err(e.into()),
            }
        }

        block.truncate(filled);
        debug!(len = filled, "recv error block");
        Ok(block)
    }

    /// Flushes and closes the write half.
    pub async fn shutdown(&mut self) -> Result<(), ProtocolError> {
        timeout(self.timeouts.handshake, self.stream.shutdown())
            .await
            .map_err(|_| ProtocolError::Timeout {
                step: Step::ResultPayload,
            })??;
        Ok(())
    }

    async fn write_all(&mut self, step: Step, bytes: &[u8]) -> Result<(), ProtocolError> {
        let stream = &mut self.stream;
        let write = async {
            stream.write_all(bytes).await?;
            stream.flush().await
        };
        timeout(self.timeouts.handshake, write)
            .await
            .map_err(|_| ProtocolError::Timeout { step })??;
        Ok(())
    }

    async fn read_token_bytes(
        &mut self,
        step: Step,
        limit: Duration,
    ) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = vec![0u8; MAX_TOKEN_LEN];
        let n = timeout(limit, self.stream.read(&mut buf))
            .await
            .map_err(|_| ProtocolError::Timeout { step })??;
        if n == 0 {
            return Err(ProtocolError::closed(step));
        }
        buf.truncate(n);
        Ok(buf)
    }
}
