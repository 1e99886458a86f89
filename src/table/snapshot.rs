use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, info};

use super::model::{FileId, Table};
use super::normalizer::Normalizer;
use super::parser::parse_tables;
use super::render::render_tables;
use crate::error::{BoqError, BoqResult};

/// Inert copy of freshly normalized markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub markup: String,
    pub captured_at: DateTime<Utc>,
}

/// Pristine copies keyed by file identifier.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    snapshots: HashMap<FileId, Snapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture right after normalization. A later normalization of the same
    /// file replaces the previous copy.
    pub fn capture(&mut self, file_id: &FileId, tables: &[Table]) {
        let markup = render_tables(tables);
        debug!(%file_id, bytes = markup.len(), "Captured pristine snapshot");
        if self
            .snapshots
            .insert(
                file_id.clone(),
                Snapshot {
                    markup,
                    captured_at: Utc::now(),
                },
            )
            .is_some()
        {
            info!(%file_id, "Replaced pristine snapshot after re-normalization");
        }
    }

    pub fn get(&self, file_id: &FileId) -> Option<&Snapshot> {
        self.snapshots.get(file_id)
    }

    pub fn contains(&self, file_id: &FileId) -> bool {
        self.snapshots.contains_key(file_id)
    }

    /// Rebuild live tables from the snapshot, with editing wired again.
    pub fn restore(&self, file_id: &FileId, normalizer: &Normalizer) -> BoqResult<Vec<Table>> {
        let snapshot = self.get(file_id).ok_or_else(|| BoqError::NoSnapshot {
            file_id: file_id.to_string(),
        })?;
        let raw_tables = parse_tables(&snapshot.markup)?;
        if raw_tables.is_empty() {
            return Err(BoqError::NoTable);
        }
        raw_tables
            .into_iter()
            .enumerate()
            .map(|(index, raw)| normalizer.rewire(raw, index, file_id))
            .collect()
    }
}
