//! Transport-independent API layer.
//!
//! `HemisphereApi` is the single entry point for consumer-facing
//! operations. Transports (CLI, MCP, direct embedding) call its methods and
//! never reach into the assembler or the data source directly.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::adapter::CancellationToken;
use crate::assembler::{BuildStats, GraphAssembler, HemisphereError};
use crate::graph::HemisphereGraph;
use crate::storage::{InsightSource, StorageResult, WorkshopSummary};

/// Message returned to callers for every failed build. Details are logged,
/// never surfaced.
pub const GENERIC_ERROR: &str = "Failed to build hemisphere graph";

/// Run type assumed when a caller does not name one.
pub const DEFAULT_RUN_TYPE: &str = "live";

/// A successful build as returned to callers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEnvelope {
    pub ok: bool,
    pub workshop_id: String,
    pub run_type: String,
    pub generated_at: DateTime<Utc>,
    pub session_count: usize,
    pub participant_count: usize,
    pub hemisphere_graph: HemisphereGraph,
    pub diagnostics: BuildStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub ok: bool,
    pub error: String,
}

/// `{ ok: true, ... }` or `{ ok: false, error }`. No partial graphs.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum HemisphereResponse {
    Ok(Box<GraphEnvelope>),
    Err(ErrorEnvelope),
}

impl HemisphereResponse {
    fn failed() -> Self {
        HemisphereResponse::Err(ErrorEnvelope {
            ok: false,
            error: GENERIC_ERROR.to_string(),
        })
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, HemisphereResponse::Ok(_))
    }

    /// HTTP-style status for transports.
    pub fn status_code(&self) -> u16 {
        match self {
            HemisphereResponse::Ok(_) => 200,
            HemisphereResponse::Err(_) => 500,
        }
    }

    pub fn graph(&self) -> Option<&HemisphereGraph> {
        match self {
            HemisphereResponse::Ok(envelope) => Some(&envelope.hemisphere_graph),
            HemisphereResponse::Err(_) => None,
        }
    }
}

/// Single entry point for all consumer-facing operations.
#[derive(Clone)]
pub struct HemisphereApi {
    source: Arc<dyn InsightSource>,
    assembler: Arc<GraphAssembler>,
}

impl HemisphereApi {
    pub fn new(source: Arc<dyn InsightSource>, assembler: Arc<GraphAssembler>) -> Self {
        Self { source, assembler }
    }

    /// Build the hemisphere graph for a workshop run.
    pub async fn hemisphere_graph(&self, workshop_id: &str, run_type: &str) -> HemisphereResponse {
        self.hemisphere_graph_cancellable(workshop_id, run_type, &CancellationToken::new())
            .await
    }

    /// As `hemisphere_graph`, abandoning the build once `cancel` fires.
    pub async fn hemisphere_graph_cancellable(
        &self,
        workshop_id: &str,
        run_type: &str,
        cancel: &CancellationToken,
    ) -> HemisphereResponse {
        match self.build(workshop_id, run_type, cancel).await {
            Ok(envelope) => HemisphereResponse::Ok(Box::new(envelope)),
            Err(err) => {
                tracing::error!(workshop = workshop_id, run_type, error = %err, "hemisphere build failed");
                HemisphereResponse::failed()
            }
        }
    }

    /// Build and keep the error, for callers that need to tell failures apart.
    pub async fn build(
        &self,
        workshop_id: &str,
        run_type: &str,
        cancel: &CancellationToken,
    ) -> Result<GraphEnvelope, HemisphereError> {
        let (workshop, output) = self
            .assembler
            .build_from_source(self.source.as_ref(), workshop_id, run_type, cancel)
            .await?;

        Ok(GraphEnvelope {
            ok: true,
            workshop_id: workshop.workshop_id.clone(),
            run_type: workshop.run_type.clone(),
            generated_at: Utc::now(),
            session_count: workshop.session_count(),
            participant_count: workshop.participant_count(),
            hemisphere_graph: output.graph,
            diagnostics: output.stats,
        })
    }

    pub fn list_workshops(&self) -> StorageResult<Vec<WorkshopSummary>> {
        self.source.list_workshops()
    }
}
