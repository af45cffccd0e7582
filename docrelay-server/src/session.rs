//! Responder side of one session.
//!
//! A session owns one connection and, once the filename is known, one
//! [`SessionWorkspace`]. It walks the step plan for the requested action,
//! runs the engine, and answers with a result envelope. Anything that goes
//! wrong after the options are in is reported through the envelope; a
//! broken exchange before that just ends the session.

use crate::error::ServerError;
use crate::server::ServerConfig;
use crate::workspace::SessionWorkspace;
use docrelay_engine::{ProcessOutput, ProcessRequest, ProcessingEngine, ProcessingError};
use docrelay_protocol::archive::{extract_pdfs_sorted, pack};
use docrelay_protocol::envelope::{missing_output_message, processing_failure_message};
use docrelay_protocol::{
    AckToken, Action, EnvelopeHeader, ErrorSentinel, OptionField, OptionSet, ProtocolError,
    SessionPlan, Step, ValidationError, Wire,
};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How a session that reached the result envelope ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// A result was sent.
    Delivered { name: String, size: u64 },
    /// An error sentinel and message were sent.
    Reported {
        sentinel: ErrorSentinel,
        message: String,
    },
}

impl SessionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SessionOutcome::Delivered { .. })
    }
}

/// What the request carried, once everything up to processing is in.
struct Received {
    action: Action,
    fields: Vec<(OptionField, String)>,
}

/// A result ready to be announced.
struct Produced {
    name: String,
    path: PathBuf,
    size: u64,
}

/// One request on one connection.
pub struct Session<S> {
    id: Uuid,
    peer: SocketAddr,
    wire: Wire<S>,
    config: Arc<ServerConfig>,
    engine: Arc<dyn ProcessingEngine>,
    /// Engine task still running after the operation timeout fired.
    overrun: Option<JoinHandle<Result<PathBuf, ServerError>>>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        peer: SocketAddr,
        config: Arc<ServerConfig>,
        engine: Arc<dyn ProcessingEngine>,
    ) -> Self {
        let wire = Wire::new(stream, config.timeouts).with_chunk_size(config.chunk_size);
        Self {
            id: Uuid::new_v4(),
            peer,
            wire,
            config,
            engine,
            overrun: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Runs the session to completion. The workspace, if one was created,
    /// is gone by the time this returns, unless the engine overran its
    /// timeout; then it is removed as soon as the engine call returns.
    pub async fn run(mut self) -> Result<SessionOutcome, ServerError> {
        let raw_action = self.wire.recv_token(Step::Action).await?;
        self.wire.send_ack(AckToken::Action, Step::Action).await?;
        let action = raw_action.parse::<Action>().ok();
        let tag = raw_action.trim().to_string();

        let filename = self.wire.recv_token(Step::Filename).await?;
        self.wire.send_ack(AckToken::Filename, Step::Filename).await?;

        let size = self.wire.recv_size(Step::Size).await?;
        let max = self.config.max_payload_bytes;
        if size > max {
            warn!(session = %self.id, "[{}] declared payload of {} bytes exceeds {}", self.peer, size, max);
            return Err(ProtocolError::PayloadTooLarge { size, max }.into());
        }
        self.wire.send_ack(AckToken::Size, Step::Size).await?;

        let Some(action) = action else {
            warn!(session = %self.id, "[{}] unknown action {:?}", self.peer, tag);
            self.drain_payload(size).await?;
            let err = ServerError::from(ValidationError::UnsupportedAction(tag.clone()));
            return self.report(&tag, ErrorSentinel::Processing, &err).await;
        };
        info!(
            session = %self.id,
            "[{}] {} request for {:?} ({} bytes)",
            self.peer, action, filename, size
        );

        let workspace = match SessionWorkspace::create(
            &self.config.temp_root,
            &filename,
            action,
            self.config.max_base_name_len,
        ) {
            Ok(workspace) => Some(workspace),
            Err(e) => {
                warn!(session = %self.id, "[{}] failed to create workspace: {}", self.peer, e);
                None
            }
        };

        match &workspace {
            Some(ws) => self.receive_payload(ws.input_path(), size).await?,
            None => self.drain_payload(size).await?,
        }
        let received = Received {
            action,
            fields: self.receive_options(action).await?,
        };

        let result = match workspace.as_ref() {
            Some(ws) => self.process(ws, received).await,
            None => Err(ServerError::Io(std::io::Error::other(
                "server could not create a workspace",
            ))),
        };

        let outcome = match result {
            Ok(produced) => self.deliver(produced).await,
            Err(err) => match err.sentinel() {
                Some(sentinel) => {
                    warn!(session = %self.id, "[{}] {} failed: {}", self.peer, action, err);
                    self.report(action.as_str(), sentinel, &err).await
                }
                None => Err(err),
            },
        };
        self.release(workspace);
        outcome
    }

    /// Drops the workspace, after the engine is done with it.
    fn release(&mut self, workspace: Option<SessionWorkspace>) {
        match self.overrun.take() {
            Some(task) => {
                let id = self.id;
                tokio::spawn(async move {
                    let _ = task.await;
                    drop(workspace);
                    debug!(session = %id, "overrun engine call returned, workspace released");
                });
            }
            None => drop(workspace),
        }
    }

    async fn receive_payload(&mut self, path: &Path, size: u64) -> Result<(), ServerError> {
        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(ProtocolError::Local)?;
        self.wire.recv_payload(Step::Payload, &mut file, size).await?;
        file.flush().await.map_err(ProtocolError::Local)?;
        Ok(())
    }

    async fn drain_payload(&mut self, size: u64) -> Result<(), ServerError> {
        self.wire
            .recv_payload(Step::Payload, &mut tokio::io::sink(), size)
            .await?;
        Ok(())
    }

    /// Reads and acknowledges each option field in plan order.
    async fn receive_options(
        &mut self,
        action: Action,
    ) -> Result<Vec<(OptionField, String)>, ServerError> {
        let plan = SessionPlan::for_action(action);
        let mut fields = Vec::new();
        for field in plan.option_fields() {
            let step = Step::Option(field);
            let value = self.wire.recv_token(step).await?;
            self.wire.send_ack(field.ack(), step).await?;
            fields.push((field, value));
        }
        Ok(fields)
    }

    /// Validates what arrived, runs the engine off the runtime and returns
    /// the file to send back.
    async fn process(
        &mut self,
        ws: &SessionWorkspace,
        received: Received,
    ) -> Result<Produced, ServerError> {
        let Received { action, fields } = received;
        let options = OptionSet::from_fields(action, &fields)?;

        let request = ProcessRequest {
            action,
            inputs: vec![ws.input_path().to_path_buf()],
            options,
            output: ws.output_path(),
            work_dir: ws.scratch_dir(),
            base_name: ws.base_name().to_string(),
        };
        let archive = ws.archive_path();
        let engine = Arc::clone(&self.engine);
        let mut task =
            tokio::task::spawn_blocking(move || run_engine(engine.as_ref(), request, &archive));

        let limit = self.config.timeouts.operation;
        let path = match tokio::time::timeout(limit, &mut task).await {
            Err(_) => {
                // A blocking call cannot be cancelled; keep the handle so
                // the workspace outlives it.
                self.overrun = Some(task);
                return Err(ServerError::ProcessingTimeout(limit.as_secs()));
            }
            Ok(Err(join)) => {
                return Err(ProcessingError::Failed(format!("engine task failed: {}", join)).into())
            }
            Ok(Ok(result)) => result?,
        };

        let size = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProcessingError::MissingOutput(path).into())
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Produced {
            name: ws.suggested_name(action),
            path,
            size,
        })
    }

    async fn deliver(&mut self, produced: Produced) -> Result<SessionOutcome, ServerError> {
        let Produced { name, path, size } = produced;
        let header = EnvelopeHeader::new(name, size);
        self.send_header(&header).await?;

        if size > 0 {
            let mut file = tokio::fs::File::open(&path)
                .await
                .map_err(ProtocolError::Local)?;
            self.wire
                .send_payload(Step::ResultPayload, &mut file, size)
                .await?;
        }
        self.close().await;

        info!(
            session = %self.id,
            "[{}] sent {:?} ({} bytes)",
            self.peer, header.name, size
        );
        Ok(SessionOutcome::Delivered {
            name: header.name,
            size,
        })
    }

    /// Sends a failure envelope for `err`.
    async fn report(
        &mut self,
        action: &str,
        sentinel: ErrorSentinel,
        err: &ServerError,
    ) -> Result<SessionOutcome, ServerError> {
        let detail = err.to_string();
        let message = match sentinel {
            ErrorSentinel::Processing => processing_failure_message(action, &detail),
            ErrorSentinel::FileNotFound => missing_output_message(&detail),
        };

        self.send_header(&EnvelopeHeader::failure(sentinel)).await?;
        self.wire.send_error_block(&message).await?;
        self.close().await;

        debug!(session = %self.id, "[{}] reported {}", self.peer, sentinel.file_name());
        Ok(SessionOutcome::Reported { sentinel, message })
    }

    async fn send_header(&mut self, header: &EnvelopeHeader) -> Result<(), ServerError> {
        self.wire.send_token(Step::ResultName, &header.name).await?;
        self.wire.expect_ack(Step::ResultName).await?;
        self.wire.send_size(Step::ResultSize, header.size).await?;
        self.wire.expect_ack(Step::ResultSize).await?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Err(e) = self.wire.shutdown().await {
            debug!(session = %self.id, "[{}] shutdown: {}", self.peer, e);
        }
    }
}

/// Blocking half of processing: merge extraction, the engine call and
/// archive packing.
fn run_engine(
    engine: &dyn ProcessingEngine,
    mut request: ProcessRequest,
    archive: &Path,
) -> Result<PathBuf, ServerError> {
    if request.action.takes_archive_input() {
        let dest = request.work_dir.join("inputs");
        std::fs::create_dir_all(&dest)?;
        let inputs = extract_pdfs_sorted(&request.inputs[0], &dest)?;
        if inputs.len() < 2 {
            return Err(ValidationError::TooFewMergeInputs(inputs.len()).into());
        }
        request.inputs = inputs;
    }

    let output = engine.process(&request)?;
    output.verify()?;
    match output {
        ProcessOutput::File(path) => Ok(path),
        ProcessOutput::Files(files) => {
            let names = pack(&files, archive)?;
            debug!(entries = names.len(), "packed result archive");
            Ok(archive.to_path_buf())
        }
    }
}
