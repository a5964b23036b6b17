//! Per-session async worker
//!
//! Each session runs on its own task with a single-consumer channel, so its
//! events are handled strictly in arrival order and never share state with
//! another session.

use crate::error::PipelineError;
use crate::event::HostEvent;
use crate::session::{Session, SessionReport};
use attest_domain::SessionId;
use attest_gatekeeper::GateOutput;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// A sanitized final message, ready for the host
#[derive(Debug, Clone)]
pub struct RenderedMessage {
    /// Session that produced the message
    pub session_id: SessionId,
    /// Gate output; only `sanitized_text` may reach the user
    pub output: GateOutput,
}

enum Exit {
    Closed,
    Aborted(usize),
}

/// Drives one [`Session`] from its event channel
///
/// Closing the channel finishes the session gracefully. An abort signal
/// drops whatever is still queued and ends the session as aborted.
///
/// # Examples
///
/// ```no_run
/// use attest_domain::{SessionContext, SessionId};
/// use attest_journal::MemorySink;
/// use attest_pipeline::{spawn_session, HostEvent, PipelineConfig, Session};
/// use tokio::sync::mpsc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = PipelineConfig::default();
///     let session = Session::new(
///         SessionContext::new(SessionId::new("s-1")),
///         &config,
///         Box::new(MemorySink::new()),
///     )?;
///     let (outputs, mut rendered) = mpsc::unbounded_channel();
///     let handle = spawn_session(session, config.channel_capacity, outputs);
///
///     handle.send(HostEvent::final_message("s-1", Some("Generated 5 candidate structures"))).await?;
///     let report = handle.close().await?;
///
///     let message = rendered.recv().await.ok_or("no output")?;
///     println!("{} ({})", message.output.sanitized_text, report.status);
///     Ok(())
/// }
/// ```
pub struct SessionWorker {
    session: Session,
    events: mpsc::Receiver<HostEvent>,
    abort: oneshot::Receiver<()>,
    outputs: mpsc::UnboundedSender<RenderedMessage>,
}

impl SessionWorker {
    /// Create a worker
    pub fn new(
        session: Session,
        events: mpsc::Receiver<HostEvent>,
        abort: oneshot::Receiver<()>,
        outputs: mpsc::UnboundedSender<RenderedMessage>,
    ) -> Self {
        Self {
            session,
            events,
            abort,
            outputs,
        }
    }

    /// Run until the channel closes or an abort arrives
    pub async fn run(mut self) -> SessionReport {
        tracing::info!("Session worker started for {}", self.session.session_id());

        // A dropped abort sender only means nobody can abort any more
        let mut abort_armed = true;
        let exit = loop {
            tokio::select! {
                biased;
                signal = &mut self.abort, if abort_armed => {
                    match signal {
                        Ok(()) => {
                            self.events.close();
                            let mut discarded = 0;
                            while self.events.try_recv().is_ok() {
                                discarded += 1;
                            }
                            break Exit::Aborted(discarded);
                        }
                        Err(_) => abort_armed = false,
                    }
                }
                event = self.events.recv() => {
                    match event {
                        Some(event) => self.handle(event),
                        None => break Exit::Closed,
                    }
                }
            }
        };

        let report = match exit {
            Exit::Closed => self.session.finish(),
            Exit::Aborted(discarded) => self.session.abort(discarded),
        };
        tracing::info!("Session worker for {} stopped ({})", report.session_id, report.status);
        report
    }

    fn handle(&mut self, event: HostEvent) {
        match self.session.handle(event) {
            Ok(Some(output)) => {
                let message = RenderedMessage {
                    session_id: self.session.session_id().clone(),
                    output,
                };
                if self.outputs.send(message).is_err() {
                    tracing::warn!(
                        "Output receiver dropped; message of session {} lost",
                        self.session.session_id()
                    );
                }
            }
            Ok(None) => {}
            Err(e) if e.is_fatal() => {
                tracing::error!("Session {} halted: {}", self.session.session_id(), e);
            }
            Err(e) => {
                tracing::warn!("Session {} rejected event: {}", self.session.session_id(), e);
            }
        }
    }
}

/// Host-side handle of a running session worker
pub struct SessionHandle {
    session_id: SessionId,
    events: mpsc::Sender<HostEvent>,
    abort: oneshot::Sender<()>,
    task: JoinHandle<SessionReport>,
}

impl SessionHandle {
    /// Session this handle feeds
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Queue an event, waiting while the channel is full
    pub async fn send(&self, event: HostEvent) -> Result<(), PipelineError> {
        self.events
            .send(event)
            .await
            .map_err(|_| PipelineError::Worker(format!("session {} is no longer running", self.session_id)))
    }

    /// Close the channel and wait for the session to finish
    pub async fn close(self) -> Result<SessionReport, PipelineError> {
        let SessionHandle { events, task, .. } = self;
        drop(events);
        task.await.map_err(|e| PipelineError::Worker(e.to_string()))
    }

    /// Cancel the session, discarding queued events
    pub async fn abort(self) -> Result<SessionReport, PipelineError> {
        let SessionHandle {
            session_id,
            events,
            abort,
            task,
        } = self;
        if abort.send(()).is_err() {
            tracing::debug!("Session {} already stopped before abort", session_id);
        }
        drop(events);
        task.await.map_err(|e| PipelineError::Worker(e.to_string()))
    }
}

/// Start a worker task for `session`
///
/// Must be called from within a tokio runtime.
pub fn spawn_session(
    session: Session,
    capacity: usize,
    outputs: mpsc::UnboundedSender<RenderedMessage>,
) -> SessionHandle {
    let session_id = session.session_id().clone();
    let (events_tx, events_rx) = mpsc::channel(capacity.max(1));
    let (abort_tx, abort_rx) = oneshot::channel();
    let worker = SessionWorker::new(session, events_rx, abort_rx, outputs);
    SessionHandle {
        session_id,
        events: events_tx,
        abort: abort_tx,
        task: tokio::spawn(worker.run()),
    }
}
