// src/records.rs
// =============================================================================
// The in-memory record list and the status of every record's image.
//
// A load always does two things: fetch every row from the table, then probe
// every image URL with the parallel scanner. Statuses are never stored
// anywhere; they are recomputed on each load and after each upload.
//
// Filtering and sorting happen on the in-memory copy, no reload needed.
// =============================================================================

use std::str::FromStr;

use serde::Serialize;

use crate::backend::{Record, RecordId, RecordStore};
use crate::checker::StatusChecker;
use crate::error::{LinkerError, Result};

/// Which records to show, by image status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Ok,
    Error,
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "ok" => Ok(StatusFilter::Ok),
            "error" => Ok(StatusFilter::Error),
            other => Err(format!("unknown status filter '{}' (expected all, ok or error)", other)),
        }
    }
}

/// A record plus whether its image URL answered 200.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordStatus {
    #[serde(flatten)]
    pub record: Record,
    pub ok: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    entries: Vec<RecordStatus>,
}

impl RecordSet {
    /// Fetches every record and probes every image URL.
    pub async fn load(store: &dyn RecordStore, checker: &StatusChecker) -> Result<RecordSet> {
        let records = store.fetch_all().await?;
        tracing::info!(count = records.len(), "records fetched, checking image statuses");

        let urls: Vec<Option<String>> = records.iter().map(|r| r.image_url.clone()).collect();
        let statuses = checker.scan(&urls).await;

        Ok(RecordSet::from_parts(records, statuses))
    }

    /// Pairs records with statuses computed elsewhere.
    ///
    /// Missing statuses count as broken.
    pub fn from_parts(records: Vec<Record>, statuses: Vec<bool>) -> RecordSet {
        let mut statuses = statuses.into_iter();
        let entries = records
            .into_iter()
            .map(|record| RecordStatus {
                record,
                ok: statuses.next().unwrap_or(false),
            })
            .collect();
        RecordSet { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (working, broken) image counts.
    pub fn counts(&self) -> (usize, usize) {
        let ok = self.entries.iter().filter(|e| e.ok).count();
        (ok, self.entries.len() - ok)
    }

    /// Records matching `filter`, in load order.
    pub fn filtered(&self, filter: StatusFilter) -> Vec<&RecordStatus> {
        self.entries
            .iter()
            .filter(|entry| match filter {
                StatusFilter::All => true,
                StatusFilter::Ok => entry.ok,
                StatusFilter::Error => !entry.ok,
            })
            .collect()
    }

    /// Records matching `filter`, sorted by id ascending.
    pub fn display_rows(&self, filter: StatusFilter) -> Vec<&RecordStatus> {
        let mut rows = self.filtered(filter);
        rows.sort_by(|a, b| a.record.id.cmp(&b.record.id));
        rows
    }

    pub fn get(&self, id: &RecordId) -> Option<&RecordStatus> {
        self.entries.iter().find(|entry| entry.record.id.same_as(id))
    }

    fn get_mut(&mut self, id: &RecordId) -> Result<&mut RecordStatus> {
        self.entries
            .iter_mut()
            .find(|entry| entry.record.id.same_as(id))
            .ok_or_else(|| LinkerError::NotFound(id.to_string()))
    }

    /// Mirrors a persisted image URL change locally.
    pub fn set_image_url(&mut self, id: &RecordId, url: &str) -> Result<()> {
        self.get_mut(id)?.record.image_url = Some(url.to_string());
        Ok(())
    }

    /// Re-probes one record's image and returns the new status.
    pub async fn refresh_status(&mut self, id: &RecordId, checker: &StatusChecker) -> Result<bool> {
        let entry = self.get_mut(id)?;
        entry.ok = checker.check(entry.record.image_url.as_deref()).await;
        Ok(entry.ok)
    }
}
