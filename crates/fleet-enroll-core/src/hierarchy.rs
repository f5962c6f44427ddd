use crate::directory::DirectoryService;
use crate::error::Error;
use crate::model::{Collection, CollectionId, CreationFailure, HierarchyResult};
use crate::progress::ProgressReporter;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const PILOT_COMMENT: &str = "Pilot Collection";

pub fn pilot_name(parent_name: &str) -> String {
    format!("{}_PILOT", parent_name)
}

pub fn child_name(parent_name: &str, index: usize) -> String {
    format!("{}_CHILD_{}", parent_name, index)
}

fn child_comment(parent_name: &str, index: usize) -> String {
    format!("Child Collection {} of {}", index, parent_name)
}

/// Builds a pilot and N children under an existing parent collection.
///
/// Not transactional: every slot is attempted, failures are recorded and
/// earlier creations stand. Only a fatal directory error stops the run.
pub struct CollectionHierarchyEngine {
    directory: Arc<dyn DirectoryService>,
}

struct Slot {
    index: usize,
    name: String,
    comment: String,
}

enum Ensured {
    Created(CollectionId),
    Reused(Collection),
}

impl CollectionHierarchyEngine {
    pub fn new(directory: Arc<dyn DirectoryService>) -> Self {
        Self { directory }
    }

    pub fn resolve_parent(&self, parent_id: &CollectionId) -> Result<Collection, Error> {
        self.directory
            .get_collection(parent_id)?
            .ok_or_else(|| Error::NotFound(format!("collection {}", parent_id)))
    }

    pub fn create_hierarchy(
        &self,
        parent_id: &CollectionId,
        want_pilot: bool,
        child_count: usize,
        reporter: &dyn ProgressReporter,
    ) -> Result<HierarchyResult, Error> {
        if child_count == 0 {
            return Err(Error::InvalidInput(
                "child count must be a positive integer".to_string(),
            ));
        }
        let parent = self.resolve_parent(parent_id)?;
        info!(
            "Building hierarchy under {} ({}): pilot={}, children={}",
            parent.name, parent.id, want_pilot, child_count
        );

        let mut slots = Vec::with_capacity(child_count + 1);
        if want_pilot {
            slots.push(Slot {
                index: 0,
                name: pilot_name(&parent.name),
                comment: PILOT_COMMENT.to_string(),
            });
        }
        slots.extend((1..=child_count).map(|index| Slot {
            index,
            name: child_name(&parent.name, index),
            comment: child_comment(&parent.name, index),
        }));

        let mut result = HierarchyResult::default();
        for slot in slots {
            let id = match self.ensure_collection(&parent, &slot) {
                Ok(Ensured::Created(id)) => {
                    info!("Created collection {} ({})", slot.name, id);
                    reporter.on_collection_created(&Collection {
                        id: id.clone(),
                        name: slot.name.clone(),
                        limiting_collection_id: Some(parent.id.clone()),
                        comment: slot.comment.clone(),
                    });
                    id
                }
                Ok(Ensured::Reused(existing)) => {
                    info!("Collection {} already exists as {}", existing.name, existing.id);
                    reporter.on_collection_reused(&existing);
                    result.reused.push(existing.id.clone());
                    existing.id
                }
                Err(err) if err.is_fatal() => {
                    return Err(Error::interrupted(progress_summary(&result), err));
                }
                Err(err) => {
                    let reason = err.to_string();
                    warn!("Failed to create collection {}: {}", slot.name, reason);
                    reporter.on_collection_failed(slot.index, &slot.name, &reason);
                    result.failures.push(CreationFailure {
                        index: slot.index,
                        name: slot.name,
                        reason,
                    });
                    continue;
                }
            };

            if slot.index == 0 {
                result.pilot_id = Some(id);
            } else {
                result.child_ids.push(id);
            }
        }

        debug!(
            "Hierarchy complete: pilot={:?}, {} children, {} failures",
            result.pilot_id,
            result.child_ids.len(),
            result.failures.len()
        );
        Ok(result)
    }

    fn ensure_collection(&self, parent: &Collection, slot: &Slot) -> Result<Ensured, Error> {
        if let Some(existing) = self.directory.find_collection_by_name(&slot.name)? {
            if existing.limiting_collection_id.as_ref() == Some(&parent.id) {
                return Ok(Ensured::Reused(existing));
            }
            return Err(Error::Directory(format!(
                "name '{}' already used by {} outside {}",
                slot.name, existing.id, parent.id
            )));
        }
        self.directory
            .create_collection(&slot.name, &parent.id, &slot.comment)
            .map(Ensured::Created)
    }
}

fn progress_summary(result: &HierarchyResult) -> String {
    let created: Vec<String> = result.all_ids().iter().map(|id| id.to_string()).collect();
    if created.is_empty() {
        "no collections created".to_string()
    } else {
        format!("created before failure: {}", created.join(", "))
    }
}
