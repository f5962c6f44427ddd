pub mod dedup;
pub mod export;

pub use dedup::{find_duplicates, DedupReport, MembershipDedupEngine, SnapshotFailure};
pub use export::{run_stamp, SnapshotExporter};
