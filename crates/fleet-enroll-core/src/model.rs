use crate::error::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Directory-assigned collection identifier: 6 to 8 ASCII alphanumerics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionId(String);

impl CollectionId {
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let trimmed = raw.trim();
        let valid_len = (6..=8).contains(&trimmed.len());
        if !valid_len || !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidInput(format!(
                "'{}' is not a collection id (6-8 alphanumeric characters)",
                raw
            )));
        }
        Ok(CollectionId(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CollectionId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CollectionId::parse(&value)
    }
}

impl From<CollectionId> for String {
    fn from(id: CollectionId) -> Self {
        id.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    pub name: String,
    #[serde(default)]
    pub limiting_collection_id: Option<CollectionId>,
    #[serde(default)]
    pub comment: String,
}

/// What the directory knows about a device: its resource id and the DNS
/// suffix reported by its network adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub name: String,
    pub resource_id: String,
    #[serde(default)]
    pub domain_suffix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipSnapshot {
    pub collection_id: CollectionId,
    pub collection_name: String,
    pub device_names: BTreeSet<String>,
    pub taken_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateRecord {
    pub device_name: String,
    pub collection_ids: Vec<CollectionId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationFailure {
    /// 0 for the pilot, 1..=n for children.
    pub index: usize,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HierarchyResult {
    pub pilot_id: Option<CollectionId>,
    pub child_ids: Vec<CollectionId>,
    pub failures: Vec<CreationFailure>,
    /// Ids that already existed under the parent and were not recreated.
    pub reused: Vec<CollectionId>,
}

impl HierarchyResult {
    /// Pilot first, then children in creation order.
    pub fn all_ids(&self) -> Vec<CollectionId> {
        self.pilot_id
            .iter()
            .chain(self.child_ids.iter())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDevice {
    pub short_name: String,
    pub fqdn: String,
    pub ip_address: Option<String>,
    pub resource_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRegistryEntry {
    pub ip: String,
    pub short_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryOutcome {
    Added,
    AlreadyPresent,
}

/// Per-device pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStage {
    Resolving,
    Probing,
    Registering,
    VerifyingChannel,
    Sessioning,
    Done,
}

impl fmt::Display for DeviceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceStage::Resolving => "resolving",
            DeviceStage::Probing => "probing",
            DeviceStage::Registering => "registering",
            DeviceStage::VerifyingChannel => "verifying channel",
            DeviceStage::Sessioning => "sessioning",
            DeviceStage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFailure {
    pub stage: DeviceStage,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEnrollmentResult {
    pub short_name: String,
    pub fqdn: Option<String>,
    pub ip_address: Option<String>,
    pub reachable: bool,
    /// `None` when the pipeline stopped before the channel check.
    pub management_channel_healthy: Option<bool>,
    pub registered: bool,
    pub failure: Option<DeviceFailure>,
}

impl DeviceEnrollmentResult {
    pub(crate) fn new(short_name: &str) -> Self {
        Self {
            short_name: short_name.to_string(),
            fqdn: None,
            ip_address: None,
            reachable: false,
            management_channel_healthy: None,
            registered: false,
            failure: None,
        }
    }

    pub(crate) fn fail(mut self, stage: DeviceStage, reason: impl Into<String>) -> Self {
        self.failure = Some(DeviceFailure {
            stage,
            reason: reason.into(),
        });
        self
    }
}
