//! End-to-end hemisphere builds
//!
//! Drives full builds through `HemisphereApi` over in-memory and SQLite
//! sources, and checks the graph-level properties that must hold for any
//! input: merge order independence, idempotent re-ingestion, edge
//! uniqueness and layer gating.

mod common;

use common::*;
use hemisphere::adapter::similarity::layers_compatible;
use hemisphere::graph::{sort_by_weight_desc, Layer};
use hemisphere::{
    CancellationToken, Edge, EdgeKind, EdgeSet, GraphAssembler, HemisphereApi, Node, NodeId,
    NodeRegistry, NodeType, OpenSource, SourceRef, SqliteSource, CORE_TRUTH_NODE_ID,
    GENERIC_ERROR,
};
use proptest::prelude::*;
use regex_lite::Regex;
use std::sync::Arc;

const EPS: f64 = 1e-9;

fn fallback_pattern() -> Regex {
    Regex::new(r"^[A-Z][^,]* is driving [^,]+, amplifying [^,]+\.$").unwrap()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shared_constraint_merges_across_sessions() {
    let response = memory_api(approval_workshop())
        .hemisphere_graph(WORKSHOP_ID, RUN_TYPE)
        .await;
    let graph = response.graph().expect("build should succeed");

    let thematic: Vec<&Node> = graph
        .nodes
        .iter()
        .filter(|n| n.node_type != NodeType::CoreTruth)
        .collect();
    assert_eq!(thematic.len(), 2, "exactly two merged nodes");

    let constraint = graph
        .node(&NodeId::from("constraint:approval-process-blocks-releases"))
        .unwrap();
    assert!((constraint.weight - 2.0).abs() < EPS);
    assert!((constraint.severity.unwrap() - 4.0).abs() < EPS);
    assert_eq!(constraint.sources.len(), 2);

    let enabler = NodeId::from("enabler:automated-testing-works-well");
    let cooccur = graph
        .edge_between(&constraint.id, &enabler, EdgeKind::Cooccur)
        .expect("S1 nodes co-occur");
    assert!(cooccur.strength > 0.0);
}

#[tokio::test]
async fn zero_drivers_without_narrative_still_roots_graph() {
    let api = memory_api(workshop(vec![session("S1", "Ana", Vec::new())]));
    let response = api.hemisphere_graph(WORKSHOP_ID, RUN_TYPE).await;
    assert!(response.is_ok());

    let graph = response.graph().unwrap();
    assert_eq!(graph.node_count(), 1);
    let root = graph.core_truth().unwrap();
    assert_eq!(root.id.as_str(), CORE_TRUTH_NODE_ID);
    assert!(fallback_pattern().is_match(&root.summary), "got {:?}", root.summary);
    assert_eq!(graph.edges_of_kind(EdgeKind::CauseHint).count(), 0);
}

#[tokio::test]
async fn fallback_sentence_names_top_drivers() {
    let response = memory_api(mixed_workshop())
        .hemisphere_graph(WORKSHOP_ID, RUN_TYPE)
        .await;
    let graph = response.graph().unwrap();
    let root = graph.core_truth().unwrap();
    assert!(fallback_pattern().is_match(&root.summary), "got {:?}", root.summary);

    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["diagnostics"]["coreTruth"]["origin"], "fallback");
    assert_eq!(value["diagnostics"]["coreTruth"]["reason"], "disabled");
}

#[tokio::test]
async fn mixed_records_fill_every_thematic_layer() {
    let response = memory_api(mixed_workshop())
        .hemisphere_graph(WORKSHOP_ID, RUN_TYPE)
        .await;
    let graph = response.graph().unwrap();
    let layers = graph.node_count_by_layer();

    assert_eq!(layers[&Layer::H0], 1);
    assert!(layers.get(&Layer::H1).copied().unwrap_or(0) >= 1);
    assert!(layers.get(&Layer::H2).copied().unwrap_or(0) >= 1);
    assert!(layers.get(&Layer::H3).copied().unwrap_or(0) >= 1);
    assert_eq!(layers.get(&Layer::H4).copied().unwrap_or(0), 1, "one long answer");

    // The vision appears as a structured insight in S1 and a phase note in S2.
    let vision = graph
        .nodes
        .iter()
        .find(|n| n.node_type == NodeType::Vision)
        .unwrap();
    assert_eq!(vision.sources.len(), 2);

    for edge in graph.edges_of_kind(EdgeKind::CauseHint) {
        assert_eq!(edge.source.as_str(), CORE_TRUTH_NODE_ID);
        let target = graph.node(&edge.target).unwrap();
        assert!(!target.is_evidence(), "evidence is never ranked");
    }
}

#[tokio::test]
async fn response_envelope_counts_participants() {
    let response = memory_api(mixed_workshop())
        .hemisphere_graph(WORKSHOP_ID, RUN_TYPE)
        .await;
    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["ok"], true);
    assert_eq!(value["sessionCount"], 3);
    assert_eq!(value["participantCount"], 3);
    assert_eq!(value["hemisphereGraph"]["nodes"][0]["id"], CORE_TRUTH_NODE_ID);
    assert_eq!(value["hemisphereGraph"]["nodes"][0]["layer"], "H0");
}

#[tokio::test]
async fn unknown_run_type_is_generic_failure() {
    let response = memory_api(approval_workshop())
        .hemisphere_graph(WORKSHOP_ID, "rehearsal")
        .await;
    assert_eq!(response.status_code(), 500);
    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["ok"], false);
    assert_eq!(value["error"], GENERIC_ERROR);
}

#[tokio::test]
async fn cancelled_build_returns_no_graph() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let response = memory_api(approval_workshop())
        .hemisphere_graph_cancellable(WORKSHOP_ID, RUN_TYPE, &cancel)
        .await;
    assert!(response.graph().is_none());
}

// ---------------------------------------------------------------------------
// SQLite round trip
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sqlite_import_then_build() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hemisphere.db");

    {
        let source = SqliteSource::open(&path).unwrap();
        let bundle = serde_json::to_string(&mixed_workshop()).unwrap();
        assert_eq!(source.import_json(&bundle).unwrap(), 3);
    }

    let source = SqliteSource::open(&path).unwrap();
    source.set_session_status("S3", "in_progress").unwrap();
    let api: HemisphereApi = api_over(Arc::new(source));

    let listed = api.list_workshops().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].session_count, 2);

    let response = api.hemisphere_graph(WORKSHOP_ID, RUN_TYPE).await;
    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["sessionCount"], 2);

    // Same graph as the in-memory build without the incomplete session.
    let mut expected = mixed_workshop();
    expected.sessions.retain(|s| s.session_id != "S3");
    let expected = memory_api(expected).hemisphere_graph(WORKSHOP_ID, RUN_TYPE).await;

    let ids = |r: &hemisphere::HemisphereResponse| {
        let mut ids: Vec<String> = r
            .graph()
            .unwrap()
            .nodes
            .iter()
            .map(|n| n.id.to_string())
            .collect();
        ids.sort();
        ids
    };
    assert_eq!(ids(&response), ids(&expected));
}

#[tokio::test]
async fn wrong_typed_records_are_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let source = SqliteSource::open(&dir.path().join("hemisphere.db")).unwrap();
    let bundle = serde_json::json!({
        "workshopId": WORKSHOP_ID,
        "runType": RUN_TYPE,
        "sessions": [{
            "sessionId": "S1",
            "participantName": {"first": "Ana"},
            "structuredInsights": [
                {"type": "CHALLENGE", "text": "Budget pressure delays hiring", "severity": 3},
                {"type": 7, "text": "Regulators slow every launch"}
            ],
            "keyInsights": [
                {"title": ["Peer support"], "insight": 5}
            ],
            "answers": [
                {"key": "reality:friction:0", "text": 42}
            ]
        }]
    });
    assert_eq!(source.import_json(&bundle.to_string()).unwrap(), 1);

    let response = api_over(Arc::new(source))
        .hemisphere_graph(WORKSHOP_ID, RUN_TYPE)
        .await;
    let graph = response.graph().expect("bad records must not fail the build");
    assert!(graph
        .node(&NodeId::from("challenge:budget-pressure-delays-hiring"))
        .is_some());
    assert!(graph
        .nodes
        .iter()
        .all(|n| !n.label.to_lowercase().contains("regulators")));

    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["diagnostics"]["fragmentsSkipped"], 2);
}

// ---------------------------------------------------------------------------
// Assembler with a narrative service
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failing_narrative_service_falls_back() {
    use hemisphere::narrative::MockClient;
    use hemisphere::CoreTruthSynthesizer;

    let synthesizer =
        CoreTruthSynthesizer::new(Arc::new(MockClient::available().with_failure("HTTP 503")));
    let assembler = GraphAssembler::offline().with_synthesizer(synthesizer);
    let output = assembler
        .build(&approval_workshop(), &CancellationToken::new())
        .await
        .unwrap();

    let root = output.graph.core_truth().unwrap();
    assert!(fallback_pattern().is_match(&root.summary));
    assert!(root.summary.starts_with("Approval process blocks releases"));
    let origin = serde_json::to_value(output.stats.core_truth.unwrap()).unwrap();
    assert_eq!(origin["reason"], "service_error");
}

#[cfg(feature = "live_narrative")]
#[tokio::test]
async fn live_narrative_endpoint_phrases_core_truth() {
    use hemisphere::{HemisphereConfig, HttpNarrativeClient, NarrativeClient};

    let Ok(endpoint) = std::env::var("HEMISPHERE_NARRATIVE_URL") else {
        eprintln!("HEMISPHERE_NARRATIVE_URL not set, skipping");
        return;
    };
    let mut config = HemisphereConfig::default();
    config.narrative.enabled = true;
    config.narrative.endpoint = endpoint;

    let client: Arc<dyn NarrativeClient> = Arc::new(HttpNarrativeClient::from_config(&config.narrative).unwrap());
    let assembler = GraphAssembler::new(&config, Some(client));
    let output = assembler
        .build(&mixed_workshop(), &CancellationToken::new())
        .await
        .unwrap();

    let root = output.graph.core_truth().unwrap();
    assert!(!root.summary.trim().is_empty());
    eprintln!("core truth: {} ({:?})", root.summary, output.stats.core_truth);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

fn arb_node_type() -> impl Strategy<Value = NodeType> {
    prop_oneof![
        Just(NodeType::Vision),
        Just(NodeType::Belief),
        Just(NodeType::Challenge),
        Just(NodeType::Friction),
        Just(NodeType::Constraint),
        Just(NodeType::Enabler),
    ]
}

/// One observation of the same logical node from some session.
fn arb_observation() -> impl Strategy<Value = Node> {
    (
        1u8..4,
        prop::option::of(1.0f64..5.0),
        prop::option::of(0.0f64..1.0),
        prop::sample::select(vec!["vision", "reality", "future", "key-insight"]),
    )
        .prop_map(|(session, severity, confidence, phase)| {
            let mut node = Node::new(
                NodeId::from("friction:manual-handoffs"),
                NodeType::Friction,
                "manual handoffs",
                "manual handoffs",
            )
            .with_phase_tag(phase)
            .with_source(SourceRef::new(format!("S{}", session), format!("P{}", session)));
            if let Some(s) = severity {
                node = node.with_severity(s);
            }
            if let Some(c) = confidence {
                node = node.with_confidence(c);
            }
            node
        })
}

fn merged(observations: &[Node]) -> Node {
    let mut registry = NodeRegistry::new();
    for node in observations {
        registry.upsert(node.clone());
    }
    registry.into_nodes().remove(0)
}

fn close(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => (x - y).abs() < 1e-6,
        (None, None) => true,
        _ => false,
    }
}

proptest! {
    #[test]
    fn merge_is_order_independent(
        observations in prop::collection::vec(arb_observation(), 1..8),
        seed in any::<u64>(),
    ) {
        let mut shuffled = observations.clone();
        // Deterministic permutation from the seed.
        let n = shuffled.len();
        for i in (1..n).rev() {
            let j = (seed.wrapping_mul(i as u64 + 7) % (i as u64 + 1)) as usize;
            shuffled.swap(i, j);
        }

        let a = merged(&observations);
        let b = merged(&shuffled);
        prop_assert!((a.weight - b.weight).abs() < EPS);
        prop_assert!(close(a.severity, b.severity));
        prop_assert!(close(a.confidence, b.confidence));
        prop_assert_eq!(a.phase_tags, b.phase_tags);
        prop_assert_eq!(a.sources, b.sources);
    }

    #[test]
    fn reingesting_same_fragment_doubles_weight_only(
        node in arb_observation(),
        quote in "[a-z ]{1,40}",
    ) {
        let node = node.with_evidence(quote.trim().to_string() + ".");
        let merged = merged(&[node.clone(), node.clone()]);
        prop_assert!((merged.weight - 2.0 * node.weight).abs() < EPS);
        prop_assert_eq!(merged.sources.len(), node.sources.len());
        prop_assert_eq!(merged.evidence.len(), node.evidence.len());
        prop_assert!(close(merged.severity, node.severity));
    }

    #[test]
    fn edges_are_unique_and_keep_max(
        strengths in prop::collection::vec(0.0f64..1.0, 1..10),
        flip in prop::collection::vec(any::<bool>(), 10),
    ) {
        let a = NodeId::from("friction:a");
        let b = NodeId::from("constraint:b");
        let edges = EdgeSet::new();
        for (i, s) in strengths.iter().enumerate() {
            let edge = if flip[i] {
                Edge::undirected(a.clone(), b.clone(), EdgeKind::Similar, *s)
            } else {
                Edge::undirected(b.clone(), a.clone(), EdgeKind::Similar, *s)
            };
            edges.upsert_max(edge);
        }
        let max = strengths.iter().cloned().fold(f64::MIN, f64::max);
        let snapshot = edges.to_sorted_vec();
        prop_assert_eq!(snapshot.len(), 1);
        prop_assert!((snapshot[0].strength - max).abs() < EPS);
    }

    #[test]
    fn similar_edges_respect_layer_gating(
        types in prop::collection::vec(arb_node_type(), 2..8),
    ) {
        // Identical text on every node so only the layer gate can block a link.
        let workshop = workshop(vec![session(
            "S1",
            "Ana",
            types
                .iter()
                .map(|t| insight(&t.to_string(), "release approvals wait on one manager", Some(3.0)))
                .collect(),
        )]);
        let output = tokio_test::block_on(
            GraphAssembler::offline().build(&workshop, &CancellationToken::new()),
        )
        .unwrap();
        let graph = &output.graph;

        for edge in graph.edges_of_kind(EdgeKind::Similar) {
            let source = graph.node(&edge.source).unwrap();
            let target = graph.node(&edge.target).unwrap();
            prop_assert!(layers_compatible(source.layer, target.layer));
        }

        let mut thematic: Vec<&Node> = graph
            .nodes
            .iter()
            .filter(|n| !n.is_evidence() && n.node_type != NodeType::CoreTruth)
            .collect();
        sort_by_weight_desc(&mut thematic);
        for (i, a) in thematic.iter().enumerate() {
            for b in &thematic[i + 1..] {
                let linked = graph.edge_between(&a.id, &b.id, EdgeKind::Similar).is_some();
                prop_assert_eq!(linked, layers_compatible(a.layer, b.layer));
            }
        }
    }
}
