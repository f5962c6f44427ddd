use crate::directory::DirectoryService;
use crate::error::Error;
use crate::model::ResolvedDevice;
use std::sync::Arc;
use tracing::trace;

/// Short name + adapter DNS suffix from the directory -> FQDN.
/// No DNS lookup happens here; the probe does that.
pub struct NetworkResolver {
    directory: Arc<dyn DirectoryService>,
}

impl NetworkResolver {
    pub fn new(directory: Arc<dyn DirectoryService>) -> Self {
        Self { directory }
    }

    pub fn resolve(&self, short_name: &str) -> Result<ResolvedDevice, Error> {
        let record = self
            .directory
            .get_device_record(short_name)?
            .ok_or_else(|| Error::Unresolved(format!("{}: no device record", short_name)))?;

        let suffix = record
            .domain_suffix
            .as_deref()
            .map(|s| s.trim().trim_start_matches('.'))
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Unresolved(format!("{}: no DNS suffix", short_name)))?;

        let fqdn = format!("{}.{}", short_name, suffix);
        trace!("{} resolved to {} ({})", short_name, fqdn, record.resource_id);
        Ok(ResolvedDevice {
            short_name: short_name.to_string(),
            fqdn,
            ip_address: None,
            resource_id: Some(record.resource_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{Inventory, InventoryDirectory};

    fn resolver() -> NetworkResolver {
        let inventory = Inventory::new("LAB")
            .with_device("web01", "16777301", Some("corp.example.com"))
            .with_device("web02", "16777302", Some(".corp.example.com"))
            .with_device("kiosk", "16777303", None)
            .with_device("blank", "16777304", Some("  "));
        NetworkResolver::new(Arc::new(InventoryDirectory::in_memory(inventory).unwrap()))
    }

    #[test]
    fn test_fqdn_from_suffix() {
        let device = resolver().resolve("web01").unwrap();
        assert_eq!(device.fqdn, "web01.corp.example.com");
        assert_eq!(device.resource_id.as_deref(), Some("16777301"));
        assert!(device.ip_address.is_none());
    }

    #[test]
    fn test_leading_dot_in_suffix_is_ignored() {
        assert_eq!(resolver().resolve("web02").unwrap().fqdn, "web02.corp.example.com");
    }

    #[test]
    fn test_missing_record_or_suffix_is_unresolved() {
        let r = resolver();
        for name in ["ghost", "kiosk", "blank"] {
            let err = r.resolve(name).unwrap_err();
            assert!(matches!(err, Error::Unresolved(_)), "{}: {:?}", name, err);
        }
    }
}
