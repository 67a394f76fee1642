//! Local JSON history file used by the downloader.

use crate::error::Result;
use crate::model::ScaleRecord;
use log::info;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// A JSON array of records on disk, kept sorted by `create_time`.
#[derive(Debug)]
pub struct HistoryFile {
    path: PathBuf,
    records: Vec<ScaleRecord>,
}

impl HistoryFile {
    /// Load `path`; a missing file starts an empty history.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records = match fs::read(&path) {
            Ok(bytes) => {
                let records: Vec<ScaleRecord> = serde_json::from_slice(&bytes)?;
                info!("Loaded {} existing records from {}", records.len(), path.display());
                records
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No existing data found at {}", path.display());
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[ScaleRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [ScaleRecord] {
        &mut self.records
    }

    /// Start time for the next download: one millisecond past the newest record.
    pub fn resume_from(&self) -> Option<i64> {
        self.records.iter().map(|r| r.create_time).max().map(|t| t + 1)
    }

    /// Add records and re-sort; returns how many were added.
    pub fn append(&mut self, new: Vec<ScaleRecord>) -> usize {
        let added = new.len();
        self.records.extend(new);
        self.records.sort_by_key(|r| r.create_time);
        added
    }

    /// Write the history back as pretty-printed JSON.
    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.records)?;
        fs::write(&self.path, json)?;
        info!("Saved {} records to {}", self.records.len(), self.path.display());
        Ok(())
    }
}
