pub mod config;
pub mod directory;
pub mod enrollment;
pub mod error;
pub mod hierarchy;
pub mod input;
pub mod membership;
pub mod model;
pub mod network;
pub mod platform;
pub mod progress;
pub mod registry;

pub use config::AppConfig;
pub use directory::{DirectoryService, Inventory, InventoryDirectory};
pub use enrollment::DeviceEnrollmentOrchestrator;
pub use error::Error;
pub use hierarchy::CollectionHierarchyEngine;
pub use membership::{DedupReport, MembershipDedupEngine, SnapshotExporter};
pub use progress::{ProgressReporter, SilentReporter};
pub use registry::HostRegistry;
