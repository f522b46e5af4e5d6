//! Graph analysis over the merged hemisphere
//!
//! Runs after the LINK stage, once every SIMILAR and COOCCUR edge is in
//! place. Currently a single analysis: composite centrality.

mod centrality;

pub use centrality::{composite_score, severity_norm, Ranking, ScoredNode};
