//! Integration tests for attest-pipeline
//!
//! These drive whole sessions: tool outputs in, sanitized text and audit
//! trail out.

use attest_domain::{AuditEvent, AuditEventType, RenderOutcome, SessionContext, SessionId};
use attest_journal::{AuditSink, FileSink, MemorySink};
use attest_pipeline::{
    Dispatcher, EventBody, HostEvent, PipelineConfig, PipelineError, Session, SessionStatus,
};
use serde_json::{json, Value};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Accepts a fixed number of lines, then fails every write
struct FlakySink {
    remaining: Arc<AtomicUsize>,
}

impl AuditSink for FlakySink {
    fn append_line(&mut self, _line: &str) -> io::Result<()> {
        let left = self.remaining.load(Ordering::SeqCst);
        if left == 0 {
            return Err(io::Error::other("disk full"));
        }
        self.remaining.store(left - 1, Ordering::SeqCst);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn structure_analysis_output() -> Value {
    json!({
        "generated_structures": [
            {"composition": "TiO2", "structures": [{}, {}]},
            {"composition": "SrTiO3", "structures": [{}]}
        ],
        "energy_calculations": [
            {"structure_id": "TiO2_struct_1", "formation_energy": -6.823},
            {"structure_id": "SrTiO3_struct_1", "formation_energy": -3.412}
        ]
    })
}

fn new_session(id: &str, config: &PipelineConfig) -> (Session, MemorySink) {
    let sink = MemorySink::new();
    let session = Session::new(
        SessionContext::new(SessionId::new(id)),
        config,
        Box::new(sink.clone()),
    )
    .unwrap();
    (session, sink)
}

fn count(events: &[AuditEvent], event_type: AuditEventType) -> usize {
    events.iter().filter(|event| event.event_type == event_type).count()
}

#[test]
fn test_join_commits_intersection_and_logs_the_rest() {
    let (mut session, _) = new_session("s-1", &PipelineConfig::default());
    session
        .handle(HostEvent::tool_call_output("s-1", "c1", structure_analysis_output()))
        .unwrap();

    let report = session.finish();
    assert_eq!(report.entries.len(), 2);
    assert_eq!(count(&report.audit_events, AuditEventType::ValueExtracted), 2);
    // TiO2_struct_2 has no energy
    assert_eq!(count(&report.audit_events, AuditEventType::UnpairedValue), 1);
    assert_eq!(report.metrics.unpaired, 1);
}

#[test]
fn test_allowed_spans_trace_back_to_tool_calls() {
    let (mut session, _) = new_session("s-1", &PipelineConfig::default());
    session
        .handle(HostEvent::tool_call_start("s-1", "c1", "structure_analysis"))
        .unwrap();
    session
        .handle(HostEvent::tool_call_output("s-1", "c1", structure_analysis_output()))
        .unwrap();

    let output = session
        .handle(HostEvent::final_message(
            "s-1",
            Some("TiO2 has a formation energy of -6.82 eV/atom, SrTiO3 about -3.41 eV/atom."),
        ))
        .unwrap()
        .unwrap();
    assert!(!output.blocked);
    assert_eq!(output.count(RenderOutcome::Allow), 2);

    for decision in output.decisions.iter().filter(|d| d.outcome == RenderOutcome::Allow) {
        let entry_ref = decision.matched_entry_ref.unwrap();
        let entry = session
            .registry()
            .entries()
            .find(|entry| entry.entry_ref() == entry_ref)
            .unwrap();
        assert!(session.invocation(entry.call_id()).is_some());
        assert!((entry.value() - decision.candidate_value).abs() < 0.01);
    }
}

#[test]
fn test_later_turn_cites_value_from_earlier_turn() {
    let (mut session, _) = new_session("s-1", &PipelineConfig::default());
    session
        .handle(HostEvent::tool_call_start("s-1", "c1", "structure_analysis"))
        .unwrap();
    session
        .handle(HostEvent::tool_call_output("s-1", "c1", structure_analysis_output()))
        .unwrap();

    let first = session
        .handle(HostEvent::final_message("s-1", Some("Both structures are done.")))
        .unwrap()
        .unwrap();
    assert!(!first.blocked);
    assert!(first.decisions.is_empty());

    // Next turn, no new tool calls: the registry still backs the claim
    session
        .handle(HostEvent::text_chunk("s-1", "As computed earlier, TiO2 has a "))
        .unwrap();
    session
        .handle(HostEvent::text_chunk("s-1", "formation energy of -6.82 eV/atom."))
        .unwrap();
    let second = session
        .handle(HostEvent::final_message("s-1", None))
        .unwrap()
        .unwrap();

    assert!(!second.blocked);
    assert_eq!(
        second.sanitized_text,
        "As computed earlier, TiO2 has a formation energy of -6.82 eV/atom."
    );
    assert_eq!(second.decisions.len(), 1);
    let decision = &second.decisions[0];
    assert_eq!(decision.outcome, RenderOutcome::Allow);
    let citation = decision.citation.as_ref().unwrap();
    assert_eq!(citation.call_id.as_str(), "c1");

    let report = session.finish();
    assert_eq!(count(&report.audit_events, AuditEventType::RenderComplete), 2);
    assert_eq!(report.metrics.renders, 2);
}

#[test]
fn test_unverified_value_never_reaches_user() {
    let (mut session, _) = new_session("s-1", &PipelineConfig::default());
    session
        .handle(HostEvent::tool_call_output("s-1", "c1", structure_analysis_output()))
        .unwrap();

    let output = session
        .handle(HostEvent::final_message("s-1", Some("TiO2 has a formation energy of -7.50 eV/atom")))
        .unwrap()
        .unwrap();
    assert!(output.blocked);
    assert!(!output.sanitized_text.contains("-7.50"));

    let (mut lenient, _) = new_session("s-2", &PipelineConfig::lenient());
    lenient
        .handle(HostEvent::tool_call_output("s-2", "c1", structure_analysis_output()))
        .unwrap();
    let output = lenient
        .handle(HostEvent::final_message(
            "s-2",
            Some("TiO2 is at -6.82 eV/atom, not -7.50 eV/atom."),
        ))
        .unwrap()
        .unwrap();
    assert!(!output.blocked);
    assert!(output.sanitized_text.contains("-6.82"));
    assert!(!output.sanitized_text.contains("-7.50"));
    assert_eq!(output.count(RenderOutcome::Redact), 1);
}

#[test]
fn test_recomputation_supersedes_and_is_audited() {
    let (mut session, _) = new_session("s-1", &PipelineConfig::default());
    let energy = |value: f64| json!({"energies": [{"structure_id": "TiO2_struct_1", "formation_energy": value}]});
    session.handle(HostEvent::tool_call_start("s-1", "c1", "energy_calculator")).unwrap();
    session.handle(HostEvent::tool_call_output("s-1", "c1", energy(-6.823))).unwrap();
    session.handle(HostEvent::tool_call_start("s-1", "c2", "energy_calculator")).unwrap();
    session.handle(HostEvent::tool_call_output("s-1", "c2", energy(-6.500))).unwrap();

    let output = session
        .handle(HostEvent::final_message("s-1", Some("The formation energy is -6.823 eV/atom")))
        .unwrap()
        .unwrap();
    // Only the latest value backs claims
    assert!(output.blocked);

    let report = session.finish();
    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.superseded.len(), 1);
    let conflict = report
        .audit_events
        .iter()
        .find(|event| event.event_type == AuditEventType::DuplicateKeyConflict)
        .unwrap();
    assert_eq!(conflict.payload["previous"]["value"], -6.823);
    assert_eq!(conflict.payload["level"], "warning");
}

#[test]
fn test_registry_failure_halts_session() {
    let (mut session, _) = new_session("s-1", &PipelineConfig::default());
    session.handle(HostEvent::tool_call_start("s-1", "c1", "energy_calculator")).unwrap();
    let result = session.handle(HostEvent::tool_call_output(
        "s-1",
        "c1",
        json!({"energies": [{"structure_id": "TiO2_struct_1", "formation_energy": -6.823, " ": 1.0}]}),
    ));

    assert!(matches!(result, Err(PipelineError::Registry(_))));
    assert!(session.is_halted());
    // The batch is all-or-nothing
    assert!(session.registry().entries().next().is_none());

    let output = session
        .handle(HostEvent::final_message("s-1", Some("Generated 5 candidate structures")))
        .unwrap()
        .unwrap();
    assert!(output.blocked);

    let report = session.finish();
    assert_eq!(report.status, SessionStatus::Halted);
    assert_eq!(count(&report.audit_events, AuditEventType::SessionHalted), 1);
}

#[test]
fn test_log_failure_fails_closed() {
    let remaining = Arc::new(AtomicUsize::new(1));
    let mut session = Session::new(
        SessionContext::new(SessionId::new("s-1")),
        &PipelineConfig::default(),
        Box::new(FlakySink {
            remaining: remaining.clone(),
        }),
    )
    .unwrap();

    let result = session.handle(HostEvent::tool_call_output("s-1", "c1", structure_analysis_output()));
    assert!(matches!(&result, Err(e) if e.is_fatal()));
    assert!(session.is_halted());

    let output = session
        .handle(HostEvent::final_message("s-1", Some("TiO2 has a formation energy of -6.82 eV/atom")))
        .unwrap()
        .unwrap();
    assert!(output.blocked);
    assert!(!output.sanitized_text.contains("-6.82"));
    assert_eq!(session.finish().status, SessionStatus::Halted);
}

#[test]
fn test_unattributed_output_backs_nothing() {
    let (mut session, _) = new_session("s-1", &PipelineConfig::default());
    session
        .handle(HostEvent::tool_call_output("s-1", "c1", json!({"mystery": 1.5})))
        .unwrap();

    assert_eq!(session.invocations().len(), 1);
    assert!(!session.invocations()[0].detected_tool().is_attributed());
    assert!(session.registry().entries().next().is_none());
}

#[test]
fn test_artifacts_are_hashed_and_attached() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("TiO2_struct_1.cif");
    std::fs::write(&path, "data_TiO2").unwrap();

    let (mut session, _) = new_session("s-1", &PipelineConfig::default());
    session.handle(HostEvent::tool_call_start("s-1", "c1", "energy_calculator")).unwrap();
    session
        .handle(HostEvent::tool_call_output(
            "s-1",
            "c1",
            json!({
                "energies": [{"structure_id": "TiO2_struct_1", "formation_energy": -6.823}],
                "artifacts": [path.display().to_string()]
            }),
        ))
        .unwrap();

    let report = session.finish();
    assert_eq!(report.artifacts.len(), 1);
    assert_eq!(
        report.entries[0].artifact_hash(),
        Some(&attest_journal::content_hash(b"data_TiO2"))
    );
    assert_eq!(count(&report.audit_events, AuditEventType::ArtifactRecorded), 1);
}

#[test]
fn test_audit_file_is_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");

    let mut session = Session::new(
        SessionContext::new(SessionId::new("s-1")),
        &PipelineConfig::default(),
        Box::new(FileSink::open(&path).unwrap()),
    )
    .unwrap();
    session
        .handle(HostEvent::tool_call_output("s-1", "c1", structure_analysis_output()))
        .unwrap();
    session
        .handle(HostEvent::final_message("s-1", Some("The bandgap is approximately 1.5 eV")))
        .unwrap();
    session.finish();

    let contents = std::fs::read_to_string(&path).unwrap();
    let events: Vec<AuditEvent> = contents
        .lines()
        .map(|line| AuditEvent::from_json_line(line).unwrap())
        .collect();
    assert_eq!(events.first().unwrap().event_type, AuditEventType::SessionStart);
    assert_eq!(events.last().unwrap().event_type, AuditEventType::SessionEnd);
    for (index, event) in events.iter().enumerate() {
        assert_eq!(event.payload["seq"], (index + 1) as u64);
        assert_eq!(event.payload["session_id"], "s-1");
    }

    let decision = events
        .iter()
        .find(|event| event.event_type == AuditEventType::RenderDecision)
        .unwrap();
    assert_eq!(decision.payload["outcome"], "BLOCK");
    assert_eq!(decision.payload["matched_entry_ref"], "NONE");
}

#[tokio::test]
async fn test_dispatcher_keeps_sessions_apart() {
    let sinks: Arc<std::sync::Mutex<Vec<(SessionId, MemorySink)>>> = Arc::default();
    let factory_sinks = sinks.clone();
    let (mut dispatcher, mut rendered) = Dispatcher::new(PipelineConfig::default(), move |id| {
        let sink = MemorySink::new();
        factory_sinks
            .lock()
            .map_err(|e| PipelineError::Worker(e.to_string()))?
            .push((id.clone(), sink.clone()));
        Ok(Box::new(sink) as Box<dyn AuditSink>)
    })
    .unwrap();

    // Session A computes the value; session B only claims it
    dispatcher
        .dispatch(HostEvent::tool_call_output("a", "c1", structure_analysis_output()))
        .await
        .unwrap();
    dispatcher
        .dispatch(HostEvent::final_message("b", Some("TiO2 has a formation energy of -6.82 eV/atom")))
        .await
        .unwrap();
    dispatcher
        .dispatch(HostEvent::final_message("a", Some("TiO2 has a formation energy of -6.82 eV/atom")))
        .await
        .unwrap();
    assert_eq!(
        dispatcher.active_sessions(),
        vec![SessionId::new("a"), SessionId::new("b")]
    );

    let reports = dispatcher.shutdown().await.unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].entries.len(), 2);
    assert!(reports[1].entries.is_empty());

    let mut messages = Vec::new();
    while let Some(message) = rendered.recv().await {
        messages.push(message);
    }
    assert_eq!(messages.len(), 2);
    for message in messages {
        match message.session_id.as_str() {
            "a" => assert!(!message.output.blocked),
            "b" => assert!(message.output.blocked),
            other => panic!("unexpected session {}", other),
        }
    }
    assert_eq!(sinks.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_dispatcher_abort_discards_session() {
    let (mut dispatcher, _rendered) = Dispatcher::new(PipelineConfig::default(), |_| {
        Ok(Box::new(MemorySink::new()) as Box<dyn AuditSink>)
    })
    .unwrap();

    dispatcher
        .dispatch(HostEvent::text_chunk("a", "half a thought"))
        .await
        .unwrap();
    let report = dispatcher.abort(&SessionId::new("a")).await.unwrap();
    assert_eq!(report.status, SessionStatus::Aborted);
    assert!(dispatcher.active_sessions().is_empty());
    assert!(matches!(
        dispatcher.abort(&SessionId::new("a")).await,
        Err(PipelineError::Worker(_))
    ));
}

#[test]
fn test_no_output_statuses_are_excluded() {
    let (mut session, _) = new_session("s-1", &PipelineConfig::default());
    for (call, status) in [("c1", "timeout"), ("c2", "error"), ("c3", "cancelled")] {
        let mut event = HostEvent::tool_call_output("s-1", call, structure_analysis_output());
        if let EventBody::ToolCallOutput(output) = &mut event.body {
            output.status = Some(status.to_string());
        }
        session.handle(event).unwrap();
    }

    assert!(session.registry().entries().next().is_none());
    assert_eq!(count(session.audit_events(), AuditEventType::ToolCallNoOutput), 3);
}
