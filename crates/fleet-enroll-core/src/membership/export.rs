use crate::error::Error;
use crate::model::{CollectionId, DuplicateRecord, MembershipSnapshot};
use chrono::{DateTime, Local};
use csv::Writer;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

/// Per-run suffix for export file names.
pub fn run_stamp(now: DateTime<Local>) -> String {
    now.format("%Y%m%d_%H%M%S_%3f").to_string()
}

/// Writes membership snapshots and duplicate reports as CSV, one file per
/// collection per run. Files are created exclusively and never overwritten.
pub struct SnapshotExporter {
    dir: PathBuf,
    run_stamp: String,
}

impl SnapshotExporter {
    pub fn new<P: AsRef<Path>>(dir: P, run_stamp: &str) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            run_stamp: run_stamp.to_string(),
        }
    }

    /// Exporter stamped with the current local time.
    pub fn for_current_run<P: AsRef<Path>>(dir: P) -> Self {
        Self::new(dir, &run_stamp(Local::now()))
    }

    pub fn snapshot_path(&self, collection_id: &CollectionId) -> PathBuf {
        self.dir
            .join(format!("{}_{}.csv", collection_id, self.run_stamp))
    }

    pub fn duplicates_path(&self) -> PathBuf {
        self.dir.join(format!("duplicates_{}.csv", self.run_stamp))
    }

    pub fn export_snapshot(&self, snapshot: &MembershipSnapshot) -> Result<PathBuf, Error> {
        let path = self.snapshot_path(&snapshot.collection_id);
        let mut writer = Writer::from_writer(self.create_exclusive(&path)?);

        writer.write_record(["collection_id", "collection_name", "device_name"])?;
        for device in &snapshot.device_names {
            writer.write_record([
                snapshot.collection_id.as_str(),
                snapshot.collection_name.as_str(),
                device.as_str(),
            ])?;
        }
        writer.flush()?;

        info!(
            "Exported {} devices of {} to {}",
            snapshot.device_names.len(),
            snapshot.collection_id,
            path.display()
        );
        Ok(path)
    }

    pub fn export_snapshots(&self, snapshots: &[MembershipSnapshot]) -> Result<Vec<PathBuf>, Error> {
        snapshots.iter().map(|s| self.export_snapshot(s)).collect()
    }

    pub fn export_duplicates(&self, duplicates: &[DuplicateRecord]) -> Result<PathBuf, Error> {
        let path = self.duplicates_path();
        let mut writer = Writer::from_writer(self.create_exclusive(&path)?);

        writer.write_record(["device_name", "collection_count", "collection_ids"])?;
        for duplicate in duplicates {
            let ids: Vec<&str> = duplicate.collection_ids.iter().map(|id| id.as_str()).collect();
            writer.write_record(&[
                duplicate.device_name.clone(),
                duplicate.collection_ids.len().to_string(),
                ids.join(";"),
            ])?;
        }
        writer.flush()?;

        info!("Exported {} duplicates to {}", duplicates.len(), path.display());
        Ok(path)
    }

    fn create_exclusive(&self, path: &Path) -> Result<File, Error> {
        fs::create_dir_all(&self.dir).map_err(|e| self.classify(e))?;
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| self.classify(e))
    }

    fn classify(&self, err: io::Error) -> Error {
        match err.kind() {
            io::ErrorKind::PermissionDenied => Error::Environment(format!(
                "cannot write exports under {}: {}",
                self.dir.display(),
                err
            )),
            _ => Error::Io(err),
        }
    }
}
