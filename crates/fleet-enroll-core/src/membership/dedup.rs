use crate::directory::DirectoryService;
use crate::error::Error;
use crate::model::{CollectionId, DuplicateRecord, MembershipSnapshot};
use crate::progress::ProgressReporter;
use ahash::AHashSet;
use chrono::Utc;
use dashmap::DashMap;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFailure {
    pub collection_id: CollectionId,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct DedupReport {
    pub snapshots: Vec<MembershipSnapshot>,
    pub duplicates: Vec<DuplicateRecord>,
    pub failures: Vec<SnapshotFailure>,
}

pub struct MembershipDedupEngine {
    directory: Arc<dyn DirectoryService>,
}

impl MembershipDedupEngine {
    pub fn new(directory: Arc<dyn DirectoryService>) -> Self {
        Self { directory }
    }

    pub fn capture_snapshot(&self, id: &CollectionId) -> Result<MembershipSnapshot, Error> {
        let collection = self
            .directory
            .get_collection(id)?
            .ok_or_else(|| Error::NotFound(format!("collection {}", id)))?;
        let device_names = self.directory.get_membership(id)?;
        Ok(MembershipSnapshot {
            collection_id: collection.id,
            collection_name: collection.name,
            device_names,
            taken_at: Utc::now(),
        })
    }

    /// Snapshot every distinct collection (in caller order) and report the
    /// devices found in more than one of them.
    ///
    /// Callers must only pass collections that already exist; snapshots are
    /// point-in-time and never retried.
    pub fn snapshot_and_dedup(
        &self,
        collection_ids: &[CollectionId],
        reporter: &dyn ProgressReporter,
    ) -> Result<DedupReport, Error> {
        let mut seen = AHashSet::new();
        let distinct: Vec<&CollectionId> = collection_ids
            .iter()
            .filter(|id| seen.insert((*id).clone()))
            .collect();

        let captured: Vec<(&CollectionId, Result<MembershipSnapshot, Error>)> = distinct
            .par_iter()
            .map(|id| (*id, self.capture_snapshot(id)))
            .collect();

        let mut report = DedupReport::default();
        for (id, outcome) in captured {
            match outcome {
                Ok(snapshot) => {
                    debug!(
                        "Snapshot of {} taken: {} devices",
                        snapshot.collection_id,
                        snapshot.device_names.len()
                    );
                    reporter.on_snapshot_taken(&snapshot);
                    report.snapshots.push(snapshot);
                }
                Err(err) if err.is_fatal() => {
                    let summary = format!(
                        "{} of {} snapshots taken",
                        report.snapshots.len(),
                        distinct.len()
                    );
                    return Err(Error::interrupted(summary, err));
                }
                Err(err) => {
                    warn!("Snapshot of {} failed: {}", id, err);
                    reporter.on_snapshot_failed(id, &err.to_string());
                    report.failures.push(SnapshotFailure {
                        collection_id: id.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        report.duplicates = find_duplicates(&report.snapshots);
        for duplicate in &report.duplicates {
            info!(
                "Device {} is a member of {} collections",
                duplicate.device_name,
                duplicate.collection_ids.len()
            );
            reporter.on_duplicate_found(duplicate);
        }
        Ok(report)
    }
}

/// Devices present in two or more snapshots, ordered by where each device
/// first appears when walking the snapshots in order.
pub fn find_duplicates(snapshots: &[MembershipSnapshot]) -> Vec<DuplicateRecord> {
    // device name -> (snapshot position, position within snapshot)
    let index: DashMap<String, Vec<(usize, usize)>> = DashMap::new();

    snapshots
        .par_iter()
        .enumerate()
        .for_each(|(snapshot_pos, snapshot)| {
            for (device_pos, name) in snapshot.device_names.iter().enumerate() {
                index
                    .entry(name.clone())
                    .or_default()
                    .push((snapshot_pos, device_pos));
            }
        });

    let mut records: Vec<((usize, usize), DuplicateRecord)> = index
        .into_iter()
        .filter(|(_, hits)| hits.len() > 1)
        .map(|(device_name, mut hits)| {
            hits.sort_unstable();
            let first_seen = hits[0];
            let collection_ids = hits
                .iter()
                .map(|(snapshot_pos, _)| snapshots[*snapshot_pos].collection_id.clone())
                .collect();
            (
                first_seen,
                DuplicateRecord {
                    device_name,
                    collection_ids,
                },
            )
        })
        .collect();

    records.sort_by_key(|(first_seen, _)| *first_seen);
    records.into_iter().map(|(_, record)| record).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn snapshot(id: &str, devices: &[&str]) -> MembershipSnapshot {
        MembershipSnapshot {
            collection_id: CollectionId::parse(id).unwrap(),
            collection_name: format!("{} name", id),
            device_names: devices.iter().map(|d| d.to_string()).collect::<BTreeSet<_>>(),
            taken_at: Utc::now(),
        }
    }

    fn ids(record: &DuplicateRecord) -> Vec<&str> {
        record.collection_ids.iter().map(|id| id.as_str()).collect()
    }

    #[test]
    fn test_pairwise_overlap() {
        let snapshots = vec![
            snapshot("COLL0A", &["x", "y"]),
            snapshot("COLL0B", &["y", "z"]),
            snapshot("COLL0C", &["z", "x"]),
        ];
        let dupes = find_duplicates(&snapshots);
        assert_eq!(dupes.len(), 3);
        assert_eq!(dupes[0].device_name, "x");
        assert_eq!(ids(&dupes[0]), vec!["COLL0A", "COLL0C"]);
        assert_eq!(dupes[1].device_name, "y");
        assert_eq!(ids(&dupes[1]), vec!["COLL0A", "COLL0B"]);
        assert_eq!(dupes[2].device_name, "z");
        assert_eq!(ids(&dupes[2]), vec!["COLL0B", "COLL0C"]);
    }

    #[test]
    fn test_single_membership_is_not_a_duplicate() {
        let snapshots = vec![
            snapshot("COLL0A", &["only-a", "shared"]),
            snapshot("COLL0B", &["shared", "only-b"]),
        ];
        let dupes = find_duplicates(&snapshots);
        assert_eq!(dupes.len(), 1);
        assert_eq!(dupes[0].device_name, "shared");
    }

    #[test]
    fn test_device_in_three_collections() {
        let snapshots = vec![
            snapshot("COLL0A", &["d"]),
            snapshot("COLL0B", &["d"]),
            snapshot("COLL0C", &["d"]),
        ];
        let dupes = find_duplicates(&snapshots);
        assert_eq!(ids(&dupes[0]), vec!["COLL0A", "COLL0B", "COLL0C"]);
    }

    #[test]
    fn test_no_snapshots() {
        assert!(find_duplicates(&[]).is_empty());
    }
}
