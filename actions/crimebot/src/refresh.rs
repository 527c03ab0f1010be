//! Fetch the full dataset, save it, and republish it.
//!
//! Steps run strictly in order with no rollback: if the upload fails the
//! local file has already been replaced.

use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::hub::{BlobUploader, HubClient};
use crate::source::{fetch_all, SocrataClient, TabularSource};
use crate::store::{file_digest, write_table};
use crate::transform;
use crate::types::RawTable;

/// What a completed refresh produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub records: usize,
    pub pages: usize,
    pub path: PathBuf,
    /// SHA-256 of the written file
    pub digest: String,
    pub uploaded: bool,
}

/// Run the refresh job against the given source and uploader
pub fn refresh<S, U>(config: &Config, source: &S, uploader: &U) -> Result<RefreshReport>
where
    S: TabularSource + ?Sized,
    U: BlobUploader + ?Sized,
{
    info!(
        domain = %config.socrata_domain,
        dataset = %config.socrata_dataset,
        "Pulling data from Socrata"
    );
    let fetched = fetch_all(source, config.page_size, config.page_delay)?;

    let table = if config.normalize {
        transform::normalize(fetched.records)
    } else {
        RawTable::from_records(fetched.records)
    };

    let path = config.table_path();
    write_table(&path, &table)?;
    let digest = file_digest(&path)?;
    info!(path = %path.display(), %digest, "Saved latest dataset");

    let uploaded = if config.upload {
        if let Err(e) = uploader.upload_file(&path, &config.table_file) {
            error!(error = %e, "Upload to Hugging Face failed");
            return Err(e);
        }
        true
    } else {
        warn!("Upload skipped; the published dataset was not updated");
        false
    };

    Ok(RefreshReport {
        records: table.len(),
        pages: fetched.pages,
        path,
        digest,
        uploaded,
    })
}

/// Refresh with the Socrata source and Hub uploader named in `config`
pub fn run(config: &Config) -> Result<RefreshReport> {
    let source = SocrataClient::from_config(config);
    let hub = HubClient::from_config(config);
    refresh(config, &source, &hub)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use crate::error::Error;
    use crate::types::RawRecord;
    use serde_json::json;
    use std::cell::RefCell;
    use std::path::Path;
    use std::time::Duration;

    struct FixedSource(Vec<RawRecord>);

    impl TabularSource for FixedSource {
        fn fetch_page(&self, limit: usize, offset: usize) -> Result<Vec<RawRecord>> {
            Ok(self.0.iter().skip(offset).take(limit).cloned().collect())
        }
    }

    #[derive(Default)]
    struct RecordingUploader {
        uploads: RefCell<Vec<(PathBuf, String)>>,
        fail: bool,
    }

    impl BlobUploader for RecordingUploader {
        fn upload_file(&self, local: &Path, path_in_repo: &str) -> Result<()> {
            if self.fail {
                return Err(Error::Upload("403 Forbidden".to_string()));
            }
            self.uploads
                .borrow_mut()
                .push((local.to_path_buf(), path_in_repo.to_string()));
            Ok(())
        }
    }

    fn source() -> FixedSource {
        FixedSource(
            vec![
                json!({"create_time_incident": "2024-03-15T08:12:00.000", "cpd_neighborhood": "CUF", "priority": "2", "beat": "P1"}),
                json!({"create_time_incident": "2024-03-16T09:00:00.000", "disposition_text": "ARREST", "cpd_neighborhood": "WESTWOOD"}),
                json!({"event_number": "E3"}),
            ]
            .into_iter()
            .filter_map(|v| v.as_object().cloned())
            .collect(),
        )
    }

    fn config(dir: &Path) -> ConfigBuilder {
        ConfigBuilder::new()
            .data_dir(dir.join("data"))
            .page_size(2)
            .page_delay(Duration::ZERO)
    }

    #[test]
    fn test_refresh_writes_and_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path()).build().unwrap();
        let uploader = RecordingUploader::default();

        let report = refresh(&config, &source(), &uploader).unwrap();
        assert_eq!(report.records, 3);
        assert_eq!(report.pages, 2);
        assert!(report.uploaded);
        assert_eq!(
            *uploader.uploads.borrow(),
            vec![(config.table_path(), "calls_for_service_latest.csv".to_string())]
        );

        let written = std::fs::read_to_string(&report.path).unwrap();
        let mut lines = written.lines();
        assert_eq!(
            lines.next(),
            Some("create_time_incident,incident_type_desc,incident_type_id,disposition_text,event_number,sna_neighborhood,cpd_neighborhood,priority")
        );
        assert_eq!(lines.next(), Some("2024-03-15 08:12:00,,,,,CUF,CUF,2"));
        assert_eq!(
            lines.next(),
            Some("2024-03-16 09:00:00,ARREST,,ARREST,,WESTWOOD,WESTWOOD,")
        );
    }

    #[test]
    fn test_raw_refresh_keeps_all_columns() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path()).raw().skip_upload().build().unwrap();
        let uploader = RecordingUploader::default();

        let report = refresh(&config, &source(), &uploader).unwrap();
        assert!(!report.uploaded);
        assert!(uploader.uploads.borrow().is_empty());

        let written = std::fs::read_to_string(&report.path).unwrap();
        let header = written.lines().next().unwrap();
        assert!(header.contains("beat"));
        assert!(header.contains("disposition_text"));
    }

    #[test]
    fn test_upload_failure_is_returned_after_write() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path()).build().unwrap();
        let uploader = RecordingUploader {
            fail: true,
            ..Default::default()
        };

        let err = refresh(&config, &source(), &uploader).unwrap_err();
        assert!(matches!(err, Error::Upload(_)));
        assert!(config.table_path().exists());
    }

    #[test]
    fn test_refresh_twice_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path()).skip_upload().build().unwrap();
        let uploader = RecordingUploader::default();

        let first = refresh(&config, &source(), &uploader).unwrap();
        let first_bytes = std::fs::read(&first.path).unwrap();
        let second = refresh(&config, &source(), &uploader).unwrap();

        assert_eq!(first.digest, second.digest);
        assert_eq!(first_bytes, std::fs::read(&second.path).unwrap());
    }
}
