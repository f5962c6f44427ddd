use crate::model::{
    Collection, CollectionId, DuplicateRecord, MembershipSnapshot, RegistryOutcome,
    ResolvedDevice,
};

/// Trait for reporting run events, one hook per meaningful state transition.
///
/// CLI implements with tracing/indicatif; tests record the calls.
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_collection_created(&self, _collection: &Collection) {}
    fn on_collection_reused(&self, _collection: &Collection) {}
    fn on_collection_failed(&self, _index: usize, _name: &str, _reason: &str) {}

    fn on_snapshot_taken(&self, _snapshot: &MembershipSnapshot) {}
    fn on_snapshot_failed(&self, _collection_id: &CollectionId, _reason: &str) {}
    fn on_duplicate_found(&self, _duplicate: &DuplicateRecord) {}

    fn on_batch_start(&self, _total_devices: usize) {}
    fn on_device_resolved(&self, _device: &ResolvedDevice) {}
    fn on_device_unresolved(&self, _short_name: &str, _reason: &str) {}
    fn on_device_reachable(&self, _short_name: &str, _ip_address: &str) {}
    fn on_device_unreachable(&self, _short_name: &str, _fqdn: &str) {}
    /// Answered the probe, but no address came back to register.
    fn on_device_unaddressed(&self, _short_name: &str, _fqdn: &str) {}
    fn on_registry_write(&self, _short_name: &str, _ip_address: &str, _outcome: RegistryOutcome) {}
    fn on_registry_write_failed(&self, _short_name: &str, _reason: &str) {}
    fn on_channel_checked(&self, _short_name: &str, _healthy: bool) {}
    fn on_session_finished(&self, _short_name: &str, _ok: bool) {}
    fn on_device_complete(&self, _short_name: &str) {}
    fn on_batch_complete(&self, _completed: usize) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
