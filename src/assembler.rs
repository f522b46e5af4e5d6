//! GraphAssembler: one hemisphere build, start to finish
//!
//! A build walks a fixed sequence of stages:
//!
//! INGEST → MERGE → LINK → SCORE → SYNTHESIZE → FINALIZE
//!
//! Every build owns its registry and edge set; nothing is shared between
//! builds. Only data-source failures and cancellation end a build early.
//! Bad records are skipped at INGEST and narrative failures fall back at
//! SYNTHESIZE, so both still produce a graph.

use crate::adapter::cancel::CancellationToken;
use crate::adapter::cooccurrence::CoOccurrenceEnrichment;
use crate::adapter::enrichment::{Enrichment, EnrichmentReport, EnrichmentRegistry};
use crate::adapter::evidence::{collect_quotes, select_evidence};
use crate::adapter::fragment::{session_fragments, InsightFragment};
use crate::adapter::similarity::SimilarityEnrichment;
use crate::adapter::text_analysis::summarize_label;
use crate::analysis::{Ranking, ScoredNode};
use crate::config::{HemisphereConfig, Limits};
use crate::graph::{
    Edge, EdgeKind, EdgeSet, HemisphereGraph, Layer, Node, NodeId, NodeRegistry, NodeType,
};
use crate::narrative::{DriverDescriptor, NarrativeClient};
use crate::storage::{InsightSource, StorageError, WorkshopRecords};
use crate::synthesis::{CoreTruth, CoreTruthOrigin, CoreTruthSynthesizer, SynthesisInput};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::Instrument;

/// Id of the synthetic root node.
pub const CORE_TRUTH_NODE_ID: &str = "core-truth";

/// Build stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Ingest,
    Merge,
    Link,
    Score,
    Synthesize,
    Finalize,
}

impl Stage {
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Ingest => Some(Stage::Merge),
            Stage::Merge => Some(Stage::Link),
            Stage::Link => Some(Stage::Score),
            Stage::Score => Some(Stage::Synthesize),
            Stage::Synthesize => Some(Stage::Finalize),
            Stage::Finalize => None,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::Ingest => "INGEST",
            Stage::Merge => "MERGE",
            Stage::Link => "LINK",
            Stage::Score => "SCORE",
            Stage::Synthesize => "SYNTHESIZE",
            Stage::Finalize => "FINALIZE",
        })
    }
}

/// Errors that end a build without a graph.
#[derive(Debug, thiserror::Error)]
pub enum HemisphereError {
    #[error("data source error: {0}")]
    Source(#[from] StorageError),

    #[error("build cancelled before {0}")]
    Cancelled(Stage),
}

/// What happened during one build.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStats {
    pub request_id: String,
    pub fragments_seen: usize,
    pub fragments_skipped: usize,
    /// Skipped fragments per source kind
    pub skipped_by_source: BTreeMap<String, usize>,
    pub evidence_selected: usize,
    pub nodes_by_layer: BTreeMap<Layer, usize>,
    pub edges_by_kind: BTreeMap<EdgeKind, usize>,
    /// Edge writes per enrichment id
    pub enrichment_writes: BTreeMap<String, usize>,
    pub drivers: Vec<ScoredNode>,
    pub core_truth: Option<CoreTruthOrigin>,
}

/// A finished build.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub graph: HemisphereGraph,
    pub stats: BuildStats,
}

/// Runs hemisphere builds. Holds configuration only; each `build` call
/// creates its own working state.
pub struct GraphAssembler {
    limits: Limits,
    enrichments: EnrichmentRegistry,
    synthesizer: CoreTruthSynthesizer,
}

impl GraphAssembler {
    /// Assembler from config; `client` is used only if narrative is enabled.
    pub fn new(config: &HemisphereConfig, client: Option<Arc<dyn NarrativeClient>>) -> Self {
        let limits = config.limits.clone();
        let enrichments = default_enrichments(&limits);
        Self {
            limits,
            enrichments,
            synthesizer: CoreTruthSynthesizer::from_config(&config.narrative, client),
        }
    }

    /// Assembler with default limits that never calls out for the sentence.
    pub fn offline() -> Self {
        Self::new(&HemisphereConfig::default(), None)
    }

    pub fn with_synthesizer(mut self, synthesizer: CoreTruthSynthesizer) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Fetch a workshop from `source` and build its graph.
    pub async fn build_from_source(
        &self,
        source: &dyn InsightSource,
        workshop_id: &str,
        run_type: &str,
        cancel: &CancellationToken,
    ) -> Result<(WorkshopRecords, BuildOutput), HemisphereError> {
        let workshop = source.load_workshop(workshop_id, run_type).map_err(|e| {
            tracing::warn!(workshop = workshop_id, run_type, error = %e, "data source failed");
            HemisphereError::from(e)
        })?;
        let output = self.build(&workshop, cancel).await?;
        Ok((workshop, output))
    }

    /// Build the graph for already-loaded workshop records.
    pub async fn build(
        &self,
        workshop: &WorkshopRecords,
        cancel: &CancellationToken,
    ) -> Result<BuildOutput, HemisphereError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!(
            "hemisphere_build",
            request_id = %request_id,
            workshop = %workshop.workshop_id,
            run_type = %workshop.run_type,
        );
        self.run(workshop, cancel, request_id).instrument(span).await
    }

    async fn run(
        &self,
        workshop: &WorkshopRecords,
        cancel: &CancellationToken,
        request_id: String,
    ) -> Result<BuildOutput, HemisphereError> {
        let mut stats = BuildStats {
            request_id,
            ..Default::default()
        };
        tracing::info!(sessions = workshop.session_count(), "build started");

        enter(Stage::Ingest, cancel)?;
        let (fragments, evidence_ids) = self.ingest(workshop, &mut stats);

        enter(Stage::Merge, cancel)?;
        let mut registry = NodeRegistry::new();
        for fragment in fragments {
            registry.upsert(fragment.into_node());
        }
        tracing::debug!(nodes = registry.len(), "merged");

        enter(Stage::Link, cancel)?;
        let edges = EdgeSet::new();
        for report in self.link(&registry, &edges) {
            tracing::debug!(enrichment = %report.enrichment_id, edges = report.edges_written, "enrichment finished");
            stats.enrichment_writes.insert(report.enrichment_id, report.edges_written);
        }

        enter(Stage::Score, cancel)?;
        let ranking = Ranking::compute(&registry, &edges);
        for scored in ranking.ranked() {
            if let Some(node) = registry.get_mut(&scored.node_id) {
                node.centrality = Some(scored.score);
            }
        }
        let drivers = ranking.drivers(self.limits.driver_count).to_vec();
        let central = ranking.central(self.limits.central_count).to_vec();
        stats.drivers = drivers.clone();

        enter(Stage::Synthesize, cancel)?;
        let input = self.synthesis_input(&registry, &drivers, &central, &evidence_ids);
        let core_truth = self.synthesizer.synthesize(&input).await;
        stats.core_truth = Some(core_truth.origin.clone());

        enter(Stage::Finalize, cancel)?;
        let graph = self.finalize(registry, edges, &central, core_truth);
        stats.nodes_by_layer = graph.node_count_by_layer();
        for edge in &graph.edges {
            *stats.edges_by_kind.entry(edge.kind).or_insert(0) += 1;
        }

        tracing::info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            skipped = stats.fragments_skipped,
            fallback = stats.core_truth.as_ref().is_some_and(CoreTruthOrigin::is_fallback),
            "build finished"
        );
        Ok(BuildOutput { graph, stats })
    }

    /// Enrichments join their worker threads before returning. On a
    /// multi-threaded runtime the worker is handed over to the blocking pool
    /// first so other tasks keep running.
    fn link(&self, registry: &NodeRegistry, edges: &EdgeSet) -> Vec<EnrichmentReport> {
        let multi_thread = tokio::runtime::Handle::try_current()
            .is_ok_and(|h| h.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread);
        if multi_thread {
            tokio::task::block_in_place(|| self.enrichments.run_all(registry, edges))
        } else {
            self.enrichments.run_all(registry, edges)
        }
    }

    /// Validated fragments for every session plus the selected evidence.
    /// Returns the evidence node ids in selection order.
    fn ingest(
        &self,
        workshop: &WorkshopRecords,
        stats: &mut BuildStats,
    ) -> (Vec<InsightFragment>, Vec<NodeId>) {
        let mut fragments = Vec::new();
        for session in &workshop.sessions {
            let (accepted, rejected) = session_fragments(session);
            stats.fragments_seen += accepted.len() + rejected.len();
            stats.fragments_skipped += rejected.len();
            for (kind, err) in rejected {
                tracing::debug!(session = %session.session_id, source = %kind, error = %err, "skipped fragment");
                *stats.skipped_by_source.entry(kind.to_string()).or_insert(0) += 1;
            }
            fragments.extend(accepted);
        }

        let evidence = select_evidence(
            &workshop.sessions,
            self.limits.evidence_candidates,
            self.limits.evidence_min_words,
        );
        stats.fragments_seen += evidence.len();
        stats.evidence_selected = evidence.len();
        let evidence_ids = evidence.iter().map(InsightFragment::node_id).collect();
        fragments.extend(evidence);

        (fragments, evidence_ids)
    }

    fn synthesis_input(
        &self,
        registry: &NodeRegistry,
        drivers: &[ScoredNode],
        central: &[ScoredNode],
        evidence_ids: &[NodeId],
    ) -> SynthesisInput {
        let driver_nodes: Vec<&Node> = drivers.iter().filter_map(|s| registry.get(&s.node_id)).collect();
        let evidence_nodes = evidence_ids.iter().filter_map(|id| registry.get(id));

        SynthesisInput {
            drivers: drivers
                .iter()
                .zip(&driver_nodes)
                .map(|(scored, node)| DriverDescriptor {
                    node_type: node.node_type.to_string(),
                    label: node.label.clone(),
                    summary: node.summary.clone(),
                    weight: node.weight,
                    severity: node.severity,
                    cross_domain_count: scored.cross_domain,
                    centrality: scored.score,
                })
                .collect(),
            central_labels: central
                .iter()
                .filter_map(|s| registry.get(&s.node_id))
                .map(|n| n.label.clone())
                .collect(),
            quotes: collect_quotes(driver_nodes.iter().copied(), evidence_nodes, self.limits.quote_limit),
        }
    }

    /// Add the root and its CAUSE_HINT edges, then freeze the graph.
    fn finalize(
        &self,
        registry: NodeRegistry,
        edges: EdgeSet,
        central: &[ScoredNode],
        core_truth: CoreTruth,
    ) -> HemisphereGraph {
        let root_id = NodeId::from_string(CORE_TRUTH_NODE_ID);
        let root = Node::new(
            root_id.clone(),
            NodeType::CoreTruth,
            summarize_label(&core_truth.sentence),
            core_truth.sentence,
        )
        .with_weight(self.limits.root_weight);

        for (rank, scored) in central.iter().enumerate() {
            edges.upsert_max(Edge::directed(
                root_id.clone(),
                scored.node_id.clone(),
                EdgeKind::CauseHint,
                self.limits.cause_hint_strength(rank),
            ));
        }

        let mut nodes = Vec::with_capacity(registry.len() + 1);
        nodes.push(root);
        nodes.extend(registry.into_nodes());

        HemisphereGraph {
            nodes,
            edges: edges.to_sorted_vec(),
            core_truth_node_id: root_id,
        }
    }
}

/// The LINK stage enrichments, configured from `limits`.
pub fn default_enrichments(limits: &Limits) -> EnrichmentRegistry {
    let enrichments: Vec<Arc<dyn Enrichment>> = vec![
        Arc::new(SimilarityEnrichment::with_limits(
            limits.similarity_node_cap,
            limits.similarity_threshold,
        )),
        Arc::new(CoOccurrenceEnrichment::with_limits(
            limits.cooccur_per_session,
            limits.cooccur_strength,
        )),
    ];
    EnrichmentRegistry::new(enrichments)
}

fn enter(stage: Stage, cancel: &CancellationToken) -> Result<(), HemisphereError> {
    if cancel.is_cancelled() {
        tracing::info!(%stage, "build cancelled");
        return Err(HemisphereError::Cancelled(stage));
    }
    tracing::debug!(%stage, "entering stage");
    Ok(())
}
