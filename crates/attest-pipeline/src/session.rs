//! The synchronous core of a provenance-enforcing session
//!
//! A [`Session`] owns everything one conversation needs: the extractor, the
//! registry, the render gate, the audit logger and the artifact tracker.
//! Events are handled one at a time; a tool output's values are committed
//! before `handle` returns, so a later event always sees them.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::event::{EventBody, FinalMessage, HostEvent, ToolCallOutput, ToolCallStart};
use crate::metrics::SessionMetrics;
use attest_domain::traits::{ProvenanceStore, PutOutcome};
use attest_domain::{
    Artifact, AuditEvent, AuditEventType, CallId, EntryRef, ProvenanceEntry, RenderDecision,
    RenderOutcome, SessionContext, SessionId, ToolInvocationRecord,
};
use attest_extractor::{ArtifactDescriptor, ExtractionResult, Extractor, Unwrapped};
use attest_gatekeeper::{GateOutput, RenderGate};
use attest_journal::{ArtifactTracker, AuditSink, EventLogger, JournalError};
use attest_registry::ValueRegistry;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, error, info, warn};

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Event stream closed normally
    Completed,
    /// A registry or audit write failed; numeric rendering failed closed
    Halted,
    /// The host cancelled the session
    Aborted,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionStatus::Completed => "completed",
            SessionStatus::Halted => "halted",
            SessionStatus::Aborted => "aborted",
        };
        f.write_str(label)
    }
}

/// Everything a finished session hands back
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// Session the report belongs to
    pub session_id: SessionId,
    /// How the session ended
    pub status: SessionStatus,
    /// Why the session halted, if it did
    pub halt_reason: Option<String>,
    /// Counters
    pub metrics: SessionMetrics,
    /// Current registry entries, in commit order
    pub entries: Vec<ProvenanceEntry>,
    /// Entries replaced by recomputations
    pub superseded: Vec<ProvenanceEntry>,
    /// Every tool output that reached detection
    pub invocations: Vec<ToolInvocationRecord>,
    /// Hashed artifacts
    pub artifacts: Vec<Artifact>,
    /// In-memory copy of the audit trail
    pub audit_events: Vec<AuditEvent>,
}

/// One conversation's pipeline state
pub struct Session {
    ctx: SessionContext,
    extractor: Extractor,
    gate: RenderGate,
    registry: ValueRegistry,
    logger: EventLogger,
    artifacts: ArtifactTracker,
    started: HashMap<CallId, Option<String>>,
    invocations: Vec<ToolInvocationRecord>,
    pending_text: String,
    metrics: SessionMetrics,
    halt_reason: Option<String>,
}

impl Session {
    /// Open a session and write its `session_start` record
    ///
    /// Fails when the configuration is invalid or the first audit write
    /// fails: a session that cannot be audited is never started.
    pub fn new(
        ctx: SessionContext,
        config: &PipelineConfig,
        sink: Box<dyn AuditSink>,
    ) -> Result<Self, PipelineError> {
        config.validate().map_err(PipelineError::Config)?;

        let mut session = Self {
            extractor: Extractor::try_new(config.extractor_config())
                .map_err(|e| PipelineError::Config(e.to_string()))?,
            gate: RenderGate::try_new(config.gate_config())
                .map_err(|e| PipelineError::Config(e.to_string()))?,
            registry: ValueRegistry::new(ctx.session_id().clone()),
            logger: EventLogger::new(&ctx, sink),
            artifacts: ArtifactTracker::new(),
            started: HashMap::new(),
            invocations: Vec::new(),
            pending_text: String::new(),
            metrics: SessionMetrics::new(),
            halt_reason: None,
            ctx,
        };

        session.log(
            AuditEventType::SessionStart,
            json!({
                "started_at": session.ctx.start_time().to_rfc3339(),
                "strictness": config.strictness.to_string(),
                "relative_tolerance": config.relative_tolerance,
                "absolute_tolerance": config.absolute_tolerance,
            }),
        )?;
        info!("Session {} started", session.ctx.session_id());
        Ok(session)
    }

    /// Process one host event
    ///
    /// Returns the gate output when the event was a final message. Fatal
    /// errors halt the session before they are returned; the session stays
    /// usable and fails closed from then on.
    pub fn handle(&mut self, event: HostEvent) -> Result<Option<GateOutput>, PipelineError> {
        if &event.session_id != self.ctx.session_id() {
            return Err(PipelineError::SessionMismatch {
                expected: self.ctx.session_id().to_string(),
                found: event.session_id.to_string(),
            });
        }

        debug!("Session {} handling {}", self.ctx.session_id(), event.body.type_name());
        match event.body {
            EventBody::ToolCallStart(start) => {
                self.on_tool_start(start)?;
                Ok(None)
            }
            EventBody::ToolCallOutput(output) => {
                self.on_tool_output(output, event.timestamp)?;
                Ok(None)
            }
            EventBody::AssistantTextChunk(chunk) => {
                self.pending_text.push_str(&chunk.text);
                Ok(None)
            }
            EventBody::FinalMessage(message) => Ok(Some(self.on_final_message(message))),
        }
    }

    /// Stop trusting the registry; later renders fail closed
    pub fn halt(&mut self, reason: impl Into<String>) {
        if self.halt_reason.is_some() {
            return;
        }
        let reason = reason.into();
        error!("Session {} halted: {}", self.ctx.session_id(), reason);
        self.halt_reason = Some(reason.clone());

        if !self.logger.is_halted() {
            if let Err(e) = self.logger.record(AuditEventType::SessionHalted, json!({ "reason": reason })) {
                error!("Could not record halt of session {}: {}", self.ctx.session_id(), e);
            }
        }
    }

    /// Close the session normally: log `session_end` and flush
    pub fn finish(self) -> SessionReport {
        let status = if self.is_halted() {
            SessionStatus::Halted
        } else {
            SessionStatus::Completed
        };
        self.close(status)
    }

    /// Cancel the session
    ///
    /// `discarded_events` host events were still queued and are dropped
    /// unprocessed. Their tool outputs never reach the registry.
    pub fn abort(mut self, discarded_events: usize) -> SessionReport {
        warn!(
            "Session {} aborted with {} queued events",
            self.ctx.session_id(),
            discarded_events
        );
        let pending = json!({
            "queued_events": discarded_events,
            "pending_text_chars": self.pending_text.chars().count(),
        });
        if let Err(e) = self.logger.record(AuditEventType::DraftsDiscarded, pending).map(|_| ()) {
            self.on_log_failure(&e);
        }
        self.close(SessionStatus::Aborted)
    }

    /// Session identifier
    pub fn session_id(&self) -> &SessionId {
        self.ctx.session_id()
    }

    /// Session context
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// The session's registry
    pub fn registry(&self) -> &ValueRegistry {
        &self.registry
    }

    /// Audit records written so far
    pub fn audit_events(&self) -> &[AuditEvent] {
        self.logger.events()
    }

    /// Tool outputs that reached detection, in arrival order
    pub fn invocations(&self) -> &[ToolInvocationRecord] {
        &self.invocations
    }

    /// Record for one call
    pub fn invocation(&self, call_id: &CallId) -> Option<&ToolInvocationRecord> {
        self.invocations.iter().find(|record| record.call_id() == call_id)
    }

    /// Hashed artifacts
    pub fn artifacts(&self) -> &[Artifact] {
        self.artifacts.artifacts()
    }

    /// Counters
    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    /// Assistant text accumulated since the last final message
    pub fn pending_text(&self) -> &str {
        &self.pending_text
    }

    /// Whether a fatal error stopped the session from trusting its registry
    pub fn is_halted(&self) -> bool {
        self.halt_reason.is_some()
    }

    /// Why the session halted
    pub fn halt_reason(&self) -> Option<&str> {
        self.halt_reason.as_deref()
    }

    fn on_tool_start(&mut self, start: ToolCallStart) -> Result<(), PipelineError> {
        self.log(
            AuditEventType::ToolCallStart,
            json!({
                "call_id": start.call_id,
                "tool_name": start.tool_name,
                "arguments": start.arguments,
            }),
        )?;
        self.started.insert(start.call_id, start.tool_name);
        Ok(())
    }

    fn on_tool_output(
        &mut self,
        output: ToolCallOutput,
        received_at: DateTime<Utc>,
    ) -> Result<(), PipelineError> {
        self.metrics.record_tool_call();
        let call_id = output.call_id.clone();
        let reported = output
            .tool_name
            .clone()
            .or_else(|| self.started.get(&call_id).cloned().flatten());

        if self.is_halted() {
            debug!("Session {} is halted; ignoring output of {}", self.ctx.session_id(), call_id);
            self.metrics.record_excluded();
            return Ok(());
        }

        if output.is_no_output() {
            self.metrics.record_excluded();
            return self.log(
                AuditEventType::ToolCallNoOutput,
                json!({
                    "call_id": call_id,
                    "tool_name": reported,
                    "status": output.status,
                }),
            );
        }

        let Unwrapped { payload, layers } = match self.extractor.unwrap_envelopes(&output.output) {
            Ok(unwrapped) => unwrapped,
            Err(e) => {
                self.metrics.record_excluded();
                return self.log(
                    AuditEventType::UnwrapError,
                    json!({
                        "call_id": call_id,
                        "tool_name": reported,
                        "error": e.to_string(),
                    }),
                );
            }
        };

        let detection = self.extractor.detect(reported.as_deref(), &payload);
        if let Some(ambiguity) = &detection.ambiguity {
            self.log(
                AuditEventType::DetectionAmbiguity,
                json!({
                    "call_id": call_id,
                    "chosen": ambiguity.chosen,
                    "candidates": ambiguity.candidates,
                }),
            )?;
        }

        self.log(
            AuditEventType::ToolCallEnd,
            json!({
                "call_id": call_id,
                "reported_tool_name": reported,
                "detected_tool": detection.tool,
                "unwrap_layers": layers,
            }),
        )?;
        self.invocations.push(ToolInvocationRecord::new(
            call_id.clone(),
            reported,
            detection.tool.clone(),
            output.output,
            received_at,
        ));

        if !detection.tool.is_attributed() {
            warn!("Output of call {} is unattributed; no values extracted", call_id);
            self.metrics.record_excluded();
            return Ok(());
        }

        let extraction = match self.extractor.extract(&detection.tool, &call_id, &payload) {
            Ok(extraction) => extraction,
            Err(e) => {
                self.metrics.record_excluded();
                return self.log(
                    AuditEventType::ExtractionError,
                    json!({
                        "call_id": call_id,
                        "tool": detection.tool.label(),
                        "error": e.to_string(),
                    }),
                );
            }
        };

        self.commit_extraction(&call_id, detection.tool.label(), extraction)
    }

    fn commit_extraction(
        &mut self,
        call_id: &CallId,
        tool: &str,
        extraction: ExtractionResult,
    ) -> Result<(), PipelineError> {
        let ExtractionResult {
            mut drafts,
            unpaired,
            unknown_units,
            artifacts,
        } = extraction;

        for unknown in unknown_units {
            self.log(
                AuditEventType::UnitUnknown,
                json!({
                    "call_id": call_id,
                    "property_name": unknown.property_name,
                    "structure_id": unknown.structure_id,
                }),
            )?;
        }

        for value in unpaired {
            self.metrics.unpaired += 1;
            self.log(
                AuditEventType::UnpairedValue,
                json!({
                    "call_id": call_id,
                    "structure_id": value.structure_id,
                    "side": value.side,
                    "reason": value.reason,
                }),
            )?;
        }

        for descriptor in artifacts {
            self.record_artifact(call_id, tool, descriptor)?;
        }

        for draft in &mut drafts {
            if draft.artifact_hash.is_none() {
                draft.artifact_hash = self.artifacts.hash_for(call_id, draft.structure_id.as_deref());
            }
        }

        let outcomes = match self.registry.commit_batch(drafts) {
            Ok(outcomes) => outcomes,
            Err(e) => {
                self.halt(format!("registry write failed for call {}: {}", call_id, e));
                return Err(e.into());
            }
        };

        for outcome in outcomes {
            match outcome {
                PutOutcome::Inserted(entry_ref) => {
                    self.metrics.values_committed += 1;
                    self.log_committed(entry_ref, false)?;
                }
                PutOutcome::Unchanged(entry_ref) => self.log_committed(entry_ref, true)?,
                PutOutcome::Conflict(conflict) => {
                    self.metrics.values_committed += 1;
                    self.metrics.conflicts += 1;
                    self.log_warning(
                        AuditEventType::DuplicateKeyConflict,
                        json!({
                            "key": conflict.key.to_string(),
                            "previous": entry_payload(&conflict.previous),
                            "current": entry_payload(&conflict.current),
                        }),
                    )?;
                    self.log_committed(conflict.current.entry_ref(), false)?;
                }
            }
        }
        Ok(())
    }

    fn log_committed(&mut self, entry_ref: EntryRef, unchanged: bool) -> Result<(), PipelineError> {
        let Some(entry) = self.registry.get(entry_ref) else {
            return Ok(());
        };
        let mut payload = entry_payload(entry);
        payload["unchanged"] = Value::Bool(unchanged);
        self.log(AuditEventType::ValueExtracted, payload)
    }

    fn record_artifact(
        &mut self,
        call_id: &CallId,
        tool: &str,
        descriptor: ArtifactDescriptor,
    ) -> Result<(), PipelineError> {
        let ArtifactDescriptor {
            reference,
            content,
            structure_id,
        } = descriptor;

        let recorded = match content {
            Some(content) => Ok(self.artifacts.record(
                reference.clone(),
                content.as_bytes(),
                call_id.clone(),
                tool,
                structure_id,
            )),
            None => self
                .artifacts
                .record_file(&reference, call_id.clone(), tool, structure_id),
        };

        let payload = match recorded {
            Ok(artifact) => json!({
                "call_id": call_id,
                "artifact_id": artifact.artifact_id.to_string(),
                "content_reference": artifact.content_reference,
                "content_hash": artifact.content_hash.as_str(),
                "tool": artifact.tool,
                "structure_id": artifact.structure_id,
            }),
            Err(e) => {
                warn!("Artifact {} of call {} not hashed: {}", reference, call_id, e);
                return self.log_warning(
                    AuditEventType::ArtifactRecorded,
                    json!({
                        "call_id": call_id,
                        "content_reference": reference,
                        "content_hash": Value::Null,
                        "error": e.to_string(),
                    }),
                );
            }
        };
        self.metrics.artifacts += 1;
        self.log(AuditEventType::ArtifactRecorded, payload)
    }

    fn on_final_message(&mut self, message: FinalMessage) -> GateOutput {
        let accumulated = std::mem::take(&mut self.pending_text);
        let text = message.text.unwrap_or(accumulated);

        let output = if self.is_halted() {
            self.gate.render_halted(&text)
        } else {
            self.gate.render(&text, &self.registry)
        };
        self.metrics
            .record_render(output.decisions.iter().map(|decision| decision.outcome));

        match self.log_render(&output) {
            Ok(()) => output,
            Err(e) => {
                // Decisions that were not audited cannot be shown
                warn!("Render of session {} not audited: {}", self.ctx.session_id(), e);
                self.gate.render_halted(&text)
            }
        }
    }

    fn log_render(&mut self, output: &GateOutput) -> Result<(), PipelineError> {
        for decision in &output.decisions {
            let payload = decision_payload(decision);
            if decision.outcome == RenderOutcome::Allow {
                self.log(AuditEventType::RenderDecision, payload)?;
            } else {
                self.log_warning(AuditEventType::RenderDecision, payload)?;
            }
        }

        self.log(
            AuditEventType::RenderComplete,
            json!({
                "blocked": output.blocked,
                "halted": self.is_halted(),
                "decisions": output.decisions.len(),
                "allowed": output.count(RenderOutcome::Allow),
                "redacted": output.count(RenderOutcome::Redact),
                "blocked_claims": output.count(RenderOutcome::Block),
            }),
        )
    }

    fn close(mut self, status: SessionStatus) -> SessionReport {
        let end = json!({
            "status": status.to_string(),
            "entries": self.registry.len(),
            "tool_calls": self.metrics.tool_calls,
        });
        let written = match self.logger.record(AuditEventType::SessionEnd, end).map(|_| ()) {
            Ok(()) => self.logger.flush(),
            Err(e) => Err(e),
        };
        let status = match written {
            Ok(()) => status,
            Err(e) => {
                self.on_log_failure(&e);
                if status == SessionStatus::Aborted {
                    status
                } else {
                    SessionStatus::Halted
                }
            }
        };

        info!(
            "Session {} ended ({}):\n{}",
            self.ctx.session_id(),
            status,
            self.metrics.summary()
        );

        let artifacts = self.artifacts.artifacts().to_vec();
        let (entries, superseded) = self.registry.into_entries();
        SessionReport {
            session_id: self.ctx.session_id().clone(),
            status,
            halt_reason: self.halt_reason,
            metrics: self.metrics,
            entries,
            superseded,
            invocations: self.invocations,
            artifacts,
            audit_events: self.logger.into_events(),
        }
    }

    fn log(&mut self, event_type: AuditEventType, payload: Value) -> Result<(), PipelineError> {
        match self.logger.record(event_type, payload).map(|_| ()) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.on_log_failure(&e);
                Err(e.into())
            }
        }
    }

    fn log_warning(&mut self, event_type: AuditEventType, payload: Value) -> Result<(), PipelineError> {
        match self.logger.warn(event_type, payload).map(|_| ()) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.on_log_failure(&e);
                Err(e.into())
            }
        }
    }

    fn on_log_failure(&mut self, e: &JournalError) {
        if e.is_fatal() && self.halt_reason.is_none() {
            error!("Session {} halted: audit log failure: {}", self.ctx.session_id(), e);
            self.halt_reason = Some(format!("audit log failure: {}", e));
        }
    }
}

fn entry_payload(entry: &ProvenanceEntry) -> Value {
    json!({
        "entry_ref": entry.entry_ref().to_string(),
        "property_name": entry.property_name(),
        "value": entry.value(),
        "unit": entry.unit().as_str(),
        "source_tool": entry.source_tool(),
        "call_id": entry.call_id(),
        "structure_id": entry.structure_id(),
        "artifact_hash": entry.artifact_hash().map(|hash| hash.as_str()),
    })
}

fn decision_payload(decision: &RenderDecision) -> Value {
    json!({
        "text_span": decision.text_span,
        "span_text": decision.span_text,
        "candidate_value": decision.candidate_value,
        "candidate_unit_or_keyword": decision.candidate_unit_or_keyword,
        "claim_kind": decision.claim_kind,
        "outcome": decision.outcome,
        "matched_entry_ref": decision.matched_ref_label(),
        "citation": decision.citation.as_ref().map(|citation| citation.to_string()),
    })
}
