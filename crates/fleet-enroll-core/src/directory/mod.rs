pub mod inventory;

use crate::error::Error;
use crate::model::{Collection, CollectionId, DeviceRecord};
use std::collections::BTreeSet;

pub use inventory::{Inventory, InventoryDirectory};

/// The management console's collection and device directory.
///
/// Engines receive it explicitly as `Arc<dyn DirectoryService>`; there is
/// no ambient connection. `Environment` errors mean the service itself is
/// unavailable and end the run.
pub trait DirectoryService: Send + Sync {
    fn get_collection(&self, id: &CollectionId) -> Result<Option<Collection>, Error>;

    fn find_collection_by_name(&self, name: &str) -> Result<Option<Collection>, Error>;

    fn get_device_count(&self, id: &CollectionId) -> Result<usize, Error>;

    fn create_collection(
        &self,
        name: &str,
        limiting_id: &CollectionId,
        comment: &str,
    ) -> Result<CollectionId, Error>;

    fn get_membership(&self, id: &CollectionId) -> Result<BTreeSet<String>, Error>;

    fn get_device_record(&self, name: &str) -> Result<Option<DeviceRecord>, Error>;
}
