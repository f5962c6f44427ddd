use super::DirectoryService;
use crate::error::Error;
use crate::model::{Collection, CollectionId, DeviceRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Serialized form of the directory: collections, their members and the
/// device records the console knows about.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    pub site_code: String,
    #[serde(default)]
    pub next_id: u32,
    #[serde(default)]
    pub collections: Vec<Collection>,
    #[serde(default)]
    pub memberships: BTreeMap<CollectionId, BTreeSet<String>>,
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
}

impl Inventory {
    pub fn new(site_code: &str) -> Self {
        Self {
            site_code: site_code.to_string(),
            ..Default::default()
        }
    }

    pub fn with_collection(mut self, id: &str, name: &str, limiting_id: Option<&str>) -> Self {
        if let Ok(id) = CollectionId::parse(id) {
            self.collections.push(Collection {
                id,
                name: name.to_string(),
                limiting_collection_id: limiting_id.and_then(|l| CollectionId::parse(l).ok()),
                comment: String::new(),
            });
        }
        self
    }

    pub fn with_members(mut self, id: &str, devices: &[&str]) -> Self {
        if let Ok(id) = CollectionId::parse(id) {
            self.memberships
                .entry(id)
                .or_default()
                .extend(devices.iter().map(|d| d.to_string()));
        }
        self
    }

    pub fn with_device(mut self, name: &str, resource_id: &str, suffix: Option<&str>) -> Self {
        self.devices.push(DeviceRecord {
            name: name.to_string(),
            resource_id: resource_id.to_string(),
            domain_suffix: suffix.map(str::to_string),
        });
        self
    }

    fn validate(&self) -> Result<(), Error> {
        let code = &self.site_code;
        if code.is_empty() || code.len() > 3 || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidInput(format!(
                "site code '{}' must be 1-3 alphanumeric characters",
                code
            )));
        }
        Ok(())
    }

    fn find(&self, id: &CollectionId) -> Option<&Collection> {
        self.collections.iter().find(|c| &c.id == id)
    }

    fn allocate_id(&mut self) -> Result<CollectionId, Error> {
        loop {
            self.next_id += 1;
            let candidate = CollectionId::parse(&format!("{}{:05}", self.site_code, self.next_id))?;
            if self.find(&candidate).is_none() {
                return Ok(candidate);
            }
        }
    }
}

/// `DirectoryService` over an [`Inventory`], optionally persisted as JSON.
pub struct InventoryDirectory {
    state: Mutex<Inventory>,
    path: Option<PathBuf>,
}

impl InventoryDirectory {
    pub fn in_memory(inventory: Inventory) -> Result<Self, Error> {
        inventory.validate()?;
        Ok(Self {
            state: Mutex::new(inventory),
            path: None,
        })
    }

    /// Open a JSON inventory file. An unreadable file means the directory is unavailable.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            Error::Environment(format!("inventory {} unavailable: {}", path.display(), e))
        })?;
        let inventory: Inventory = serde_json::from_str(&raw)?;
        inventory.validate()?;
        info!(
            "Loaded inventory {} ({} collections, {} devices)",
            path.display(),
            inventory.collections.len(),
            inventory.devices.len()
        );
        Ok(Self {
            state: Mutex::new(inventory),
            path: Some(path.to_path_buf()),
        })
    }

    fn state(&self) -> Result<MutexGuard<'_, Inventory>, Error> {
        self.state
            .lock()
            .map_err(|e| Error::Environment(format!("inventory lock poisoned: {}", e)))
    }

    fn persist(&self, inventory: &Inventory) -> Result<(), Error> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(inventory)?;
        // a directory we cannot write to is an unavailable directory
        fs::write(&tmp, body)
            .and_then(|_| fs::rename(&tmp, path))
            .map_err(|e| {
                Error::Environment(format!("cannot write inventory {}: {}", path.display(), e))
            })?;
        debug!("Inventory written to {}", path.display());
        Ok(())
    }
}

impl DirectoryService for InventoryDirectory {
    fn get_collection(&self, id: &CollectionId) -> Result<Option<Collection>, Error> {
        Ok(self.state()?.find(id).cloned())
    }

    fn find_collection_by_name(&self, name: &str) -> Result<Option<Collection>, Error> {
        Ok(self
            .state()?
            .collections
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    fn get_device_count(&self, id: &CollectionId) -> Result<usize, Error> {
        self.get_membership(id).map(|members| members.len())
    }

    fn create_collection(
        &self,
        name: &str,
        limiting_id: &CollectionId,
        comment: &str,
    ) -> Result<CollectionId, Error> {
        let mut state = self.state()?;
        if state.find(limiting_id).is_none() {
            return Err(Error::NotFound(format!("limiting collection {}", limiting_id)));
        }
        if state
            .collections
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(name))
        {
            return Err(Error::Directory(format!("collection name '{}' is taken", name)));
        }

        // state changes only once the file holds the new collection
        let mut next = state.clone();
        let id = next.allocate_id()?;
        next.collections.push(Collection {
            id: id.clone(),
            name: name.to_string(),
            limiting_collection_id: Some(limiting_id.clone()),
            comment: comment.to_string(),
        });
        next.memberships.entry(id.clone()).or_default();
        self.persist(&next)?;
        *state = next;
        Ok(id)
    }

    fn get_membership(&self, id: &CollectionId) -> Result<BTreeSet<String>, Error> {
        let state = self.state()?;
        if state.find(id).is_none() {
            return Err(Error::NotFound(format!("collection {}", id)));
        }
        Ok(state.memberships.get(id).cloned().unwrap_or_default())
    }

    fn get_device_record(&self, name: &str) -> Result<Option<DeviceRecord>, Error> {
        Ok(self
            .state()?
            .devices
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
            .cloned())
    }
}
