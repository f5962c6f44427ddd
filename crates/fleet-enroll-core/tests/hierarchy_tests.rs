use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use fleet_enroll_core::model::{Collection, CollectionId, DeviceRecord};
use fleet_enroll_core::{
    CollectionHierarchyEngine, DirectoryService, Error, Inventory, InventoryDirectory,
    ProgressReporter, SilentReporter,
};

/// Wraps an in-memory directory, counts creation calls and injects failures.
struct ScriptedDirectory {
    inner: InventoryDirectory,
    creates: AtomicUsize,
    reject_names: Vec<String>,
    unavailable_after: Option<usize>,
}

impl ScriptedDirectory {
    fn new(inventory: Inventory) -> Self {
        Self {
            inner: InventoryDirectory::in_memory(inventory).unwrap(),
            creates: AtomicUsize::new(0),
            reject_names: Vec::new(),
            unavailable_after: None,
        }
    }

    fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

impl DirectoryService for ScriptedDirectory {
    fn get_collection(&self, id: &CollectionId) -> Result<Option<Collection>, Error> {
        self.inner.get_collection(id)
    }

    fn find_collection_by_name(&self, name: &str) -> Result<Option<Collection>, Error> {
        self.inner.find_collection_by_name(name)
    }

    fn get_device_count(&self, id: &CollectionId) -> Result<usize, Error> {
        self.inner.get_device_count(id)
    }

    fn create_collection(
        &self,
        name: &str,
        limiting_id: &CollectionId,
        comment: &str,
    ) -> Result<CollectionId, Error> {
        let call = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        if self.unavailable_after.map_or(false, |limit| call > limit) {
            return Err(Error::Environment("site server unreachable".to_string()));
        }
        if self.reject_names.iter().any(|n| n == name) {
            return Err(Error::Directory(format!("{} rejected", name)));
        }
        self.inner.create_collection(name, limiting_id, comment)
    }

    fn get_membership(&self, id: &CollectionId) -> Result<BTreeSet<String>, Error> {
        self.inner.get_membership(id)
    }

    fn get_device_record(&self, name: &str) -> Result<Option<DeviceRecord>, Error> {
        self.inner.get_device_record(name)
    }
}

#[derive(Default)]
struct RecordingReporter {
    events: Mutex<Vec<String>>,
}

impl RecordingReporter {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressReporter for RecordingReporter {
    fn on_collection_created(&self, collection: &Collection) {
        self.events
            .lock()
            .unwrap()
            .push(format!("created {}", collection.name));
    }

    fn on_collection_reused(&self, collection: &Collection) {
        self.events
            .lock()
            .unwrap()
            .push(format!("reused {}", collection.name));
    }

    fn on_collection_failed(&self, index: usize, name: &str, _reason: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("failed {} {}", index, name));
    }
}

fn parent_inventory() -> Inventory {
    Inventory::new("LAB")
        .with_collection("SMS00001", "All Systems", None)
        .with_collection("LAB00100", "Servers", Some("SMS00001"))
}

fn parent() -> CollectionId {
    CollectionId::parse("LAB00100").unwrap()
}

#[test]
fn test_pilot_and_two_children() {
    let dir = Arc::new(ScriptedDirectory::new(parent_inventory()));
    let engine = CollectionHierarchyEngine::new(dir.clone());
    let reporter = RecordingReporter::default();

    let result = engine.create_hierarchy(&parent(), true, 2, &reporter).unwrap();

    assert!(result.pilot_id.is_some());
    assert_eq!(result.child_ids.len(), 2);
    assert!(result.failures.is_empty());
    assert!(result.reused.is_empty());
    assert_eq!(dir.create_calls(), 3);

    let pilot = dir
        .get_collection(result.pilot_id.as_ref().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(pilot.name, "Servers_PILOT");
    assert_eq!(pilot.comment, "Pilot Collection");
    assert_eq!(pilot.limiting_collection_id, Some(parent()));

    for (i, id) in result.child_ids.iter().enumerate() {
        let child = dir.get_collection(id).unwrap().unwrap();
        assert_eq!(child.name, format!("Servers_CHILD_{}", i + 1));
        assert_eq!(child.limiting_collection_id, Some(parent()));
    }

    assert_eq!(
        reporter.events(),
        vec![
            "created Servers_PILOT",
            "created Servers_CHILD_1",
            "created Servers_CHILD_2",
        ]
    );
}

#[test]
fn test_failed_child_does_not_stop_the_rest() {
    let mut scripted = ScriptedDirectory::new(parent_inventory());
    scripted.reject_names = vec!["Servers_CHILD_3".to_string()];
    let dir = Arc::new(scripted);
    let engine = CollectionHierarchyEngine::new(dir.clone());

    let result = engine
        .create_hierarchy(&parent(), false, 5, &SilentReporter)
        .unwrap();

    assert_eq!(result.child_ids.len(), 4);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].index, 3);
    assert_eq!(result.failures[0].name, "Servers_CHILD_3");
    assert_eq!(dir.create_calls(), 5);
    for name in ["Servers_CHILD_1", "Servers_CHILD_2", "Servers_CHILD_4", "Servers_CHILD_5"] {
        assert!(dir.find_collection_by_name(name).unwrap().is_some(), "{}", name);
    }
    assert!(dir.find_collection_by_name("Servers_CHILD_3").unwrap().is_none());
}

#[test]
fn test_zero_children_rejected_before_any_write() {
    let dir = Arc::new(ScriptedDirectory::new(parent_inventory()));
    let engine = CollectionHierarchyEngine::new(dir.clone());

    let err = engine
        .create_hierarchy(&parent(), true, 0, &SilentReporter)
        .unwrap_err();

    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(err.is_recoverable());
    assert_eq!(dir.create_calls(), 0);
}

#[test]
fn test_unknown_parent_is_not_found() {
    let dir = Arc::new(ScriptedDirectory::new(parent_inventory()));
    let engine = CollectionHierarchyEngine::new(dir.clone());
    let missing = CollectionId::parse("LAB09999").unwrap();

    let err = engine
        .create_hierarchy(&missing, true, 2, &SilentReporter)
        .unwrap_err();

    assert!(matches!(err, Error::NotFound(_)));
    assert!(err.is_recoverable());
    assert_eq!(dir.create_calls(), 0);
}

#[test]
fn test_rerun_reuses_existing_collections() {
    let dir = Arc::new(ScriptedDirectory::new(parent_inventory()));
    let engine = CollectionHierarchyEngine::new(dir.clone());
    let first = engine
        .create_hierarchy(&parent(), true, 2, &SilentReporter)
        .unwrap();

    let reporter = RecordingReporter::default();
    let second = engine.create_hierarchy(&parent(), true, 2, &reporter).unwrap();

    assert_eq!(dir.create_calls(), 3);
    assert_eq!(second.all_ids(), first.all_ids());
    assert_eq!(second.reused.len(), 3);
    assert!(reporter.events().iter().all(|e| e.starts_with("reused")));
}

#[test]
fn test_name_taken_under_other_parent_is_a_failure() {
    let inventory = parent_inventory().with_collection(
        "LAB00200",
        "Servers_CHILD_1",
        Some("SMS00001"),
    );
    let dir = Arc::new(ScriptedDirectory::new(inventory));
    let engine = CollectionHierarchyEngine::new(dir.clone());

    let result = engine
        .create_hierarchy(&parent(), false, 2, &SilentReporter)
        .unwrap();

    assert_eq!(result.child_ids.len(), 1);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].index, 1);
    assert_eq!(dir.create_calls(), 1);
}

#[test]
fn test_directory_outage_interrupts_the_run() {
    let mut scripted = ScriptedDirectory::new(parent_inventory());
    scripted.unavailable_after = Some(1);
    let dir = Arc::new(scripted);
    let engine = CollectionHierarchyEngine::new(dir.clone());

    let err = engine
        .create_hierarchy(&parent(), true, 3, &SilentReporter)
        .unwrap_err();

    assert!(err.is_fatal());
    match &err {
        Error::Interrupted { summary, source } => {
            assert!(summary.contains("LAB00001"), "{}", summary);
            assert!(matches!(**source, Error::Environment(_)));
        }
        other => panic!("expected Interrupted, got {:?}", other),
    }
    assert_eq!(dir.create_calls(), 2);
}
