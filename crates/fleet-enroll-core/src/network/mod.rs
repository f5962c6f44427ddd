pub mod probe;
pub mod resolver;
pub mod session;

pub use probe::{ProbeResult, ReachabilityProbe, TcpProbe};
pub use resolver::NetworkResolver;
pub use session::{CommandSession, SessionLauncher};
