//! Demultiplexes a mixed host stream into per-session workers

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::event::HostEvent;
use crate::session::{Session, SessionReport};
use crate::worker::{spawn_session, RenderedMessage, SessionHandle};
use attest_domain::{SessionContext, SessionId};
use attest_journal::AuditSink;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Builds the audit sink for a newly seen session
pub type SinkFactory =
    Box<dyn Fn(&SessionId) -> Result<Box<dyn AuditSink>, PipelineError> + Send + Sync>;

/// Routes host events to one worker per session
///
/// A worker is spawned the first time a session id is seen. Sessions share
/// no mutable state; only the rendered-output channel is common.
///
/// # Examples
///
/// ```no_run
/// use attest_journal::{AuditSink, MemorySink};
/// use attest_pipeline::{Dispatcher, HostEvent, PipelineConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let (mut dispatcher, mut rendered) = Dispatcher::new(PipelineConfig::default(), |_| {
///         Ok(Box::new(MemorySink::new()) as Box<dyn AuditSink>)
///     })?;
///
///     dispatcher.dispatch(HostEvent::final_message("a", Some("No numbers here"))).await?;
///     dispatcher.dispatch(HostEvent::final_message("b", Some("Generated 5 structures"))).await?;
///     let reports = dispatcher.shutdown().await?;
///     assert_eq!(reports.len(), 2);
///
///     while let Some(message) = rendered.recv().await {
///         println!("{}: {}", message.session_id, message.output.sanitized_text);
///     }
///     Ok(())
/// }
/// ```
pub struct Dispatcher {
    config: PipelineConfig,
    sink_factory: SinkFactory,
    sessions: HashMap<SessionId, SessionHandle>,
    outputs: mpsc::UnboundedSender<RenderedMessage>,
}

impl Dispatcher {
    /// Create a dispatcher and the receiver for rendered messages
    ///
    /// The receiver yields `None` once the dispatcher has shut down and every
    /// worker has stopped.
    pub fn new<F>(
        config: PipelineConfig,
        sink_factory: F,
    ) -> Result<(Self, mpsc::UnboundedReceiver<RenderedMessage>), PipelineError>
    where
        F: Fn(&SessionId) -> Result<Box<dyn AuditSink>, PipelineError> + Send + Sync + 'static,
    {
        config.validate().map_err(PipelineError::Config)?;
        let (outputs, rendered) = mpsc::unbounded_channel();
        let dispatcher = Self {
            config,
            sink_factory: Box::new(sink_factory),
            sessions: HashMap::new(),
            outputs,
        };
        Ok((dispatcher, rendered))
    }

    /// Configuration every session is opened with
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Route an event to its session, opening the session on first sight
    pub async fn dispatch(&mut self, event: HostEvent) -> Result<(), PipelineError> {
        let handle = match self.sessions.entry(event.session_id.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let handle = open_session(entry.key(), &self.config, &self.sink_factory, &self.outputs)?;
                entry.insert(handle)
            }
        };
        handle.send(event).await
    }

    /// Close one session gracefully
    pub async fn close(&mut self, session_id: &SessionId) -> Result<SessionReport, PipelineError> {
        let handle = self.take(session_id)?;
        handle.close().await
    }

    /// Abort one session, discarding its queued events
    pub async fn abort(&mut self, session_id: &SessionId) -> Result<SessionReport, PipelineError> {
        let handle = self.take(session_id)?;
        handle.abort().await
    }

    /// Ids of running sessions, sorted
    pub fn active_sessions(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Close every session and wait for all of them
    ///
    /// Reports come back sorted by session id.
    pub async fn shutdown(self) -> Result<Vec<SessionReport>, PipelineError> {
        let Dispatcher { sessions, .. } = self;
        info!("Shutting down {} sessions", sessions.len());

        let mut handles: Vec<(SessionId, SessionHandle)> = sessions.into_iter().collect();
        handles.sort_by(|a, b| a.0.cmp(&b.0));

        let mut reports = Vec::with_capacity(handles.len());
        for (_, handle) in handles {
            reports.push(handle.close().await?);
        }
        Ok(reports)
    }

    fn take(&mut self, session_id: &SessionId) -> Result<SessionHandle, PipelineError> {
        self.sessions
            .remove(session_id)
            .ok_or_else(|| PipelineError::Worker(format!("no running session {}", session_id)))
    }
}

fn open_session(
    session_id: &SessionId,
    config: &PipelineConfig,
    sink_factory: &SinkFactory,
    outputs: &mpsc::UnboundedSender<RenderedMessage>,
) -> Result<SessionHandle, PipelineError> {
    debug!("Opening session {}", session_id);
    let sink = sink_factory(session_id)?;
    let session = Session::new(SessionContext::new(session_id.clone()), config, sink)?;
    Ok(spawn_session(session, config.channel_capacity, outputs.clone()))
}
