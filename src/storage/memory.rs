//! In-memory insight source

use super::records::WorkshopRecords;
use super::traits::{InsightSource, StorageError, StorageResult, WorkshopSummary};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Workshops held in memory, keyed by (workshop id, run type).
#[derive(Debug, Default)]
pub struct MemorySource {
    workshops: RwLock<BTreeMap<(String, String), WorkshopRecords>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a workshop run.
    pub fn insert(&self, workshop: WorkshopRecords) -> StorageResult<()> {
        let key = (workshop.workshop_id.clone(), workshop.run_type.clone());
        self.workshops
            .write()
            .map_err(|_| StorageError::LockPoisoned)?
            .insert(key, workshop);
        Ok(())
    }

    pub fn with_workshop(self, workshop: WorkshopRecords) -> Self {
        let key = (workshop.workshop_id.clone(), workshop.run_type.clone());
        if let Ok(mut workshops) = self.workshops.write() {
            workshops.insert(key, workshop);
        }
        self
    }
}

impl InsightSource for MemorySource {
    fn load_workshop(&self, workshop_id: &str, run_type: &str) -> StorageResult<WorkshopRecords> {
        let workshops = self.workshops.read().map_err(|_| StorageError::LockPoisoned)?;
        workshops
            .get(&(workshop_id.to_string(), run_type.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::WorkshopNotFound {
                workshop_id: workshop_id.to_string(),
                run_type: run_type.to_string(),
            })
    }

    fn list_workshops(&self) -> StorageResult<Vec<WorkshopSummary>> {
        let workshops = self.workshops.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(workshops
            .values()
            .filter(|w| !w.sessions.is_empty())
            .map(|w| WorkshopSummary {
                workshop_id: w.workshop_id.clone(),
                run_type: w.run_type.clone(),
                session_count: w.session_count(),
            })
            .collect())
    }
}
