//! Common fixtures for hemisphere integration tests
//!
//! Builders for workshop records in the shape upstream writers store them,
//! plus small helpers for assembling APIs over in-memory or SQLite sources.

#![allow(dead_code)]

use hemisphere::storage::{
    AnswerRecord, KeyInsightRecord, PhaseNotesRecord, SessionRecords, StructuredInsightRecord,
};
use hemisphere::{GraphAssembler, HemisphereApi, InsightSource, MemorySource, WorkshopRecords};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const WORKSHOP_ID: &str = "w-retail";
pub const RUN_TYPE: &str = "live";

pub fn insight(node_type: &str, text: &str, severity: Option<f64>) -> StructuredInsightRecord {
    StructuredInsightRecord {
        insight_type: Some(json!(node_type)),
        text: Some(json!(text)),
        severity: severity.map(|s| json!(s)),
        ..Default::default()
    }
}

pub fn key_insight(title: &str, insight: &str, confidence: &str) -> KeyInsightRecord {
    KeyInsightRecord {
        title: Some(json!(title)),
        insight: Some(json!(insight)),
        confidence: Some(json!(confidence)),
        evidence: Vec::new(),
    }
}

pub fn phase_notes(phase: &str, buckets: &[(&str, Value)]) -> PhaseNotesRecord {
    PhaseNotesRecord {
        phase: phase.to_string(),
        buckets: buckets
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect::<BTreeMap<_, _>>(),
    }
}

pub fn answer(key: &str, text: &str) -> AnswerRecord {
    AnswerRecord {
        key: key.to_string(),
        text: Some(json!(text)),
    }
}

pub fn session(id: &str, participant: &str, insights: Vec<StructuredInsightRecord>) -> SessionRecords {
    SessionRecords {
        session_id: id.to_string(),
        participant_name: Some(json!(participant)),
        structured_insights: insights,
        ..Default::default()
    }
}

pub fn workshop(sessions: Vec<SessionRecords>) -> WorkshopRecords {
    WorkshopRecords {
        workshop_id: WORKSHOP_ID.to_string(),
        run_type: RUN_TYPE.to_string(),
        sessions,
    }
}

/// Two sessions: a shared constraint (severities 5 and 3) and an enabler
/// seen only in S1.
pub fn approval_workshop() -> WorkshopRecords {
    workshop(vec![
        session(
            "S1",
            "Ana",
            vec![
                insight("CONSTRAINT", "approval process blocks releases", Some(5.0)),
                insight("ENABLER", "automated testing works well", None),
            ],
        ),
        session(
            "S2",
            "Ben",
            vec![insight("CONSTRAINT", "approval process blocks releases", Some(3.0))],
        ),
    ])
}

/// A richer run touching every record kind.
pub fn mixed_workshop() -> WorkshopRecords {
    let mut s1 = session(
        "S1",
        "Ana",
        vec![
            insight("FRICTION", "manual handoffs between store and warehouse teams", Some(4.0)),
            insight("VISION", "customers see live stock in every channel", None),
        ],
    );
    s1.key_insights = vec![key_insight(
        "Handoffs",
        "manual handoffs between store and warehouse teams",
        "high",
    )];
    s1.phase_notes = vec![phase_notes(
        "reality",
        &[
            ("frictions", json!(["stock counts are reconciled by hand every night"])),
            ("strengths", json!("store managers know their regulars")),
        ],
    )];
    s1.answers = vec![answer(
        "reality:friction:0",
        "Every night we reconcile stock counts by hand because the warehouse system and the tills never agree on what is actually on the shelf.",
    )];

    let mut s2 = session(
        "S2",
        "Ben",
        vec![
            insight("FRICTION", "manual handoffs between store and warehouse teams", Some(2.0)),
            insight("CONSTRAINT", "legacy till system cannot share stock data", Some(5.0)),
        ],
    );
    s2.phase_notes = vec![phase_notes(
        "future",
        &[("future", json!(["customers see live stock in every channel"]))],
    )];

    workshop(vec![s1, s2, session("S3", "Cy", Vec::new())])
}

pub fn memory_api(workshop: WorkshopRecords) -> HemisphereApi {
    api_over(Arc::new(MemorySource::new().with_workshop(workshop)))
}

pub fn api_over(source: Arc<dyn InsightSource>) -> HemisphereApi {
    HemisphereApi::new(source, Arc::new(GraphAssembler::offline()))
}
