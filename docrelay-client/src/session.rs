//! Initiator side of one session.

use crate::error::ClientError;
use crate::sink::{partial_path, ResultSink};
use docrelay_protocol::envelope::describe_failure;
use docrelay_protocol::{
    AckToken, Action, EnvelopeHeader, EnvelopeKind, OptionField, Step, Wire,
};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

/// Everything the initiator puts on the wire, already validated.
#[derive(Debug, Clone)]
pub struct Upload {
    pub action: Action,
    /// Name announced to the server.
    pub filename: String,
    /// Local file streamed as the payload.
    pub path: PathBuf,
    pub size: u64,
    pub fields: Vec<(OptionField, String)>,
}

/// How a successful request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The result was written to `path`.
    Saved {
        name: String,
        path: PathBuf,
        size: u64,
    },
    /// The server succeeded with an empty result; nothing was written.
    Empty { name: String },
}

/// Drives one request over an open connection.
pub struct Initiator<S> {
    wire: Wire<S>,
}

impl<S> Initiator<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(wire: Wire<S>) -> Self {
        Self { wire }
    }

    /// Sends `upload` and receives the result into `sink`.
    ///
    /// A result is only ever left on disk once it is complete.
    pub async fn run<K>(mut self, upload: &Upload, sink: &mut K) -> Result<Delivery, ClientError>
    where
        K: ResultSink + ?Sized,
    {
        self.send_request(upload).await?;
        let header = self.recv_header().await?;

        match header.kind() {
            EnvelopeKind::Failure => {
                let block = self.wire.recv_error_block().await?;
                let message = describe_failure(&header.name, &block);
                debug!(name = %header.name, "server reported failure");
                Err(ClientError::ServerReported {
                    name: header.name,
                    message,
                })
            }
            EnvelopeKind::Empty => {
                info!(name = %header.name, "empty result");
                self.close().await;
                Ok(Delivery::Empty { name: header.name })
            }
            EnvelopeKind::Payload => match sink.destination(&header.name, header.size) {
                Some(dest) => {
                    self.receive_into(&dest, header.size).await?;
                    self.close().await;
                    info!(name = %header.name, dest = %dest.display(), size = header.size, "result saved");
                    Ok(Delivery::Saved {
                        name: header.name,
                        path: dest,
                        size: header.size,
                    })
                }
                None => {
                    // Drain so the server finishes cleanly.
                    self.wire
                        .recv_payload(Step::ResultPayload, &mut tokio::io::sink(), header.size)
                        .await?;
                    self.close().await;
                    Err(ClientError::Cancelled)
                }
            },
        }
    }

    async fn send_request(&mut self, upload: &Upload) -> Result<(), ClientError> {
        self.wire.send_token(Step::Action, upload.action.as_str()).await?;
        self.wire.expect_ack(Step::Action).await?;

        self.wire.send_token(Step::Filename, &upload.filename).await?;
        self.wire.expect_ack(Step::Filename).await?;

        self.wire.send_size(Step::Size, upload.size).await?;
        self.wire.expect_ack(Step::Size).await?;

        let mut file = tokio::fs::File::open(&upload.path).await?;
        self.wire
            .send_payload(Step::Payload, &mut file, upload.size)
            .await?;
        debug!(size = upload.size, "payload sent");

        for (field, value) in &upload.fields {
            let step = Step::Option(*field);
            self.wire.send_token(step, value).await?;
            self.wire.expect_ack(step).await?;
        }
        Ok(())
    }

    async fn recv_header(&mut self) -> Result<EnvelopeHeader, ClientError> {
        // The name only arrives once the server has finished processing.
        let operation = self.wire.timeouts().operation;
        let name = self
            .wire
            .recv_token_within(Step::ResultName, operation)
            .await?;
        self.wire.send_ack(AckToken::OutFilename, Step::ResultName).await?;

        let size = self.wire.recv_size(Step::ResultSize).await?;
        self.wire.send_ack(AckToken::OutSize, Step::ResultSize).await?;
        Ok(EnvelopeHeader::new(name, size))
    }

    /// Receives into `<dest>.part`, then renames. The partial file is
    /// removed on any failure.
    async fn receive_into(&mut self, dest: &Path, size: u64) -> Result<(), ClientError> {
        let part = partial_path(dest);
        let result = async {
            let mut file = tokio::fs::File::create(&part).await?;
            self.wire
                .recv_payload(Step::ResultPayload, &mut file, size)
                .await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&part, dest).await?;
            Ok::<(), ClientError>(())
        }
        .await;

        if result.is_err() {
            if let Err(e) = tokio::fs::remove_file(&part).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %part.display(), error = %e, "failed to remove partial result");
                }
            }
        }
        result
    }

    async fn close(&mut self) {
        if let Err(e) = self.wire.shutdown().await {
            debug!("shutdown: {}", e);
        }
    }
}
