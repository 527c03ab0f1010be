//! The stored table: CSV on disk, and the process-wide copy read from it.

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::Result;
use crate::types::{cell_text, parse_priority, parse_timestamp, IncidentRecord, RawTable};

/// Row shape of the stored table. Columns the table lacks stay `None`,
/// columns this does not name are ignored.
#[derive(Debug, Deserialize)]
struct StoredRow {
    create_time_incident: Option<String>,
    incident_type_id: Option<String>,
    incident_type_desc: Option<String>,
    disposition_text: Option<String>,
    cpd_neighborhood: Option<String>,
    sna_neighborhood: Option<String>,
    priority: Option<String>,
    event_number: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl StoredRow {
    /// `None` when the row has no primary neighborhood
    fn into_record(self) -> Option<IncidentRecord> {
        let cpd_neighborhood = non_empty(self.cpd_neighborhood)?;
        let created_raw = non_empty(self.create_time_incident);

        Some(IncidentRecord {
            created_at: created_raw.as_deref().and_then(parse_timestamp),
            created_raw,
            incident_type_id: non_empty(self.incident_type_id),
            incident_type_desc: non_empty(self.incident_type_desc),
            disposition_text: non_empty(self.disposition_text),
            cpd_neighborhood,
            sna_neighborhood: non_empty(self.sna_neighborhood),
            priority: self.priority.as_deref().and_then(parse_priority),
            event_number: non_empty(self.event_number),
        })
    }
}

/// Read the stored table. Header names are lower-cased first; rows without
/// a primary neighborhood are dropped.
pub fn read_table(path: &Path) -> Result<Vec<IncidentRecord>> {
    let mut reader = ReaderBuilder::new().flexible(true).from_path(path)?;

    let headers: StringRecord = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    reader.set_headers(headers.clone());

    let mut records = Vec::new();
    let mut dropped = 0usize;
    for row in reader.records() {
        let row = row?;
        let stored: StoredRow = row.deserialize(Some(&headers))?;
        match stored.into_record() {
            Some(record) => records.push(record),
            None => dropped += 1,
        }
    }

    info!(
        path = %path.display(),
        rows = records.len(),
        dropped,
        "Loaded incident table"
    );
    Ok(records)
}

/// Write `table` to `path`, creating the parent directory and replacing any
/// existing file
pub fn write_table(path: &Path, table: &RawTable) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = WriterBuilder::new().from_path(path)?;
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(
            table
                .headers
                .iter()
                .map(|h| row.get(h).map(cell_text).unwrap_or_default()),
        )?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = table.len(), "Saved table");
    Ok(())
}

/// Hex SHA-256 of a file's contents, streamed
pub fn file_digest(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Something that can produce the full incident table
pub trait TableLoader {
    fn load(&self) -> Result<Vec<IncidentRecord>>;
}

impl<L: TableLoader + ?Sized> TableLoader for Box<L> {
    fn load(&self) -> Result<Vec<IncidentRecord>> {
        (**self).load()
    }
}

/// Loads the table from a local CSV file
#[derive(Debug, Clone)]
pub struct CsvTableLoader {
    path: PathBuf,
}

impl CsvTableLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TableLoader for CsvTableLoader {
    fn load(&self) -> Result<Vec<IncidentRecord>> {
        read_table(&self.path)
    }
}

/// The table as seen by a running process. Loaded on first use and kept
/// until [`TableCache::reload`] is called; a refresh that finishes while the
/// process runs is not picked up on its own.
pub struct TableCache<L> {
    loader: L,
    table: Option<Arc<Vec<IncidentRecord>>>,
}

impl<L: TableLoader> TableCache<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            table: None,
        }
    }

    /// The cached table, loading it if this is the first call
    pub fn get(&mut self) -> Result<Arc<Vec<IncidentRecord>>> {
        if let Some(table) = &self.table {
            return Ok(Arc::clone(table));
        }
        self.reload()
    }

    /// Drop the cached copy and load the table again
    pub fn reload(&mut self) -> Result<Arc<Vec<IncidentRecord>>> {
        debug!("Loading incident table");
        let table = Arc::new(self.loader.load()?);
        self.table = Some(Arc::clone(&table));
        Ok(table)
    }

    pub fn is_loaded(&self) -> bool {
        self.table.is_some()
    }
}
