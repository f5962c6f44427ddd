use crate::directory::DirectoryService;
use crate::error::Error;
use crate::model::{DeviceEnrollmentResult, DeviceStage, RegistryOutcome, ResolvedDevice};
use crate::network::{NetworkResolver, ReachabilityProbe, SessionLauncher};
use crate::progress::ProgressReporter;
use crate::registry::HostRegistry;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Drives resolve -> probe -> register -> verify channel -> (session) for a
/// batch of short names.
///
/// Device pipelines run on a bounded rayon pool; results come back in input
/// order. A fatal error stops new devices from starting and ends the run.
/// Sessions are interactive, so they are opened one at a time after the
/// pool phase.
pub struct DeviceEnrollmentOrchestrator {
    resolver: NetworkResolver,
    probe: Arc<dyn ReachabilityProbe>,
    registry: Arc<HostRegistry>,
    session: Option<Arc<dyn SessionLauncher>>,
    workers: usize,
}

struct DeviceRun {
    result: DeviceEnrollmentResult,
    /// Present when the device got far enough for a session.
    session_target: Option<ResolvedDevice>,
}

impl DeviceEnrollmentOrchestrator {
    pub fn new(
        directory: Arc<dyn DirectoryService>,
        probe: Arc<dyn ReachabilityProbe>,
        registry: Arc<HostRegistry>,
    ) -> Self {
        Self {
            resolver: NetworkResolver::new(directory),
            probe,
            registry,
            session: None,
            workers: 1,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_session_launcher(mut self, launcher: Arc<dyn SessionLauncher>) -> Self {
        self.session = Some(launcher);
        self
    }

    pub fn run(
        &self,
        short_names: &[String],
        open_session: bool,
        reporter: &dyn ProgressReporter,
    ) -> Result<Vec<DeviceEnrollmentResult>, Error> {
        reporter.on_batch_start(short_names.len());

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| Error::Environment(format!("cannot start worker pool: {}", e)))?;

        let stop = AtomicBool::new(false);
        let outcomes: Vec<Option<Result<DeviceRun, Error>>> = pool.install(|| {
            short_names
                .par_iter()
                .map(|name| {
                    if stop.load(Ordering::SeqCst) {
                        return None;
                    }
                    let outcome = self.enroll_device(name, reporter);
                    if outcome.is_err() {
                        stop.store(true, Ordering::SeqCst);
                    }
                    Some(outcome)
                })
                .collect()
        });

        let mut results = Vec::with_capacity(short_names.len());
        let mut session_targets = Vec::new();
        let mut fatal = None;
        for outcome in outcomes.into_iter().flatten() {
            match outcome {
                Ok(run) => {
                    session_targets.extend(run.session_target);
                    results.push(run.result);
                }
                Err(err) => {
                    fatal.get_or_insert(err);
                }
            }
        }

        if let Some(err) = fatal {
            let completed: Vec<&str> = results.iter().map(|r| r.short_name.as_str()).collect();
            let summary = format!(
                "{} of {} devices completed [{}]",
                completed.len(),
                short_names.len(),
                completed.join(", ")
            );
            return Err(Error::interrupted(summary, err));
        }

        reporter.on_batch_complete(results.len());

        if open_session {
            for device in &session_targets {
                self.open_session(device, reporter);
            }
        }

        Ok(results)
    }

    /// Err only for fatal errors; everything else lands in the result.
    fn enroll_device(
        &self,
        short_name: &str,
        reporter: &dyn ProgressReporter,
    ) -> Result<DeviceRun, Error> {
        let run = self.pipeline(short_name, reporter)?;
        trace!("{}: {}", short_name, DeviceStage::Done);
        reporter.on_device_complete(short_name);
        Ok(run)
    }

    fn pipeline(
        &self,
        short_name: &str,
        reporter: &dyn ProgressReporter,
    ) -> Result<DeviceRun, Error> {
        let mut result = DeviceEnrollmentResult::new(short_name);

        trace!("{}: {}", short_name, DeviceStage::Resolving);
        let mut device = match self.resolver.resolve(short_name) {
            Ok(device) => {
                info!("{} resolved to {}", short_name, device.fqdn);
                reporter.on_device_resolved(&device);
                device
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!("{}", err);
                reporter.on_device_unresolved(short_name, &err.to_string());
                return Ok(stopped(result.fail(DeviceStage::Resolving, err.to_string())));
            }
        };
        result.fqdn = Some(device.fqdn.clone());

        trace!("{}: {}", short_name, DeviceStage::Probing);
        let probe = self.probe.probe(&device.fqdn);
        if !probe.reachable {
            let err = Error::Unreachable(device.fqdn.clone());
            warn!("{}", err);
            reporter.on_device_unreachable(short_name, &device.fqdn);
            return Ok(stopped(result.fail(DeviceStage::Probing, err.to_string())));
        }
        result.reachable = true;
        let Some(ip) = probe.ip_address else {
            warn!("{} answered but no address was resolved", device.fqdn);
            reporter.on_device_unaddressed(short_name, &device.fqdn);
            return Ok(stopped(
                result.fail(DeviceStage::Probing, "reachable but no address resolved"),
            ));
        };
        info!("{} is reachable at {}", device.fqdn, ip);
        reporter.on_device_reachable(short_name, &ip);
        result.ip_address = Some(ip.clone());
        device.ip_address = Some(ip.clone());

        trace!("{}: {}", short_name, DeviceStage::Registering);
        match self.registry.append(&ip, short_name) {
            Ok(outcome) => {
                match outcome {
                    RegistryOutcome::Added => info!("Added {} {} to registry", ip, short_name),
                    RegistryOutcome::AlreadyPresent => {
                        info!("{} {} is already in the registry", ip, short_name)
                    }
                }
                reporter.on_registry_write(short_name, &ip, outcome);
                result.registered = true;
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!("Registry write for {} failed: {}", short_name, err);
                reporter.on_registry_write_failed(short_name, &err.to_string());
                return Ok(stopped(result.fail(DeviceStage::Registering, err.to_string())));
            }
        }

        trace!("{}: {}", short_name, DeviceStage::VerifyingChannel);
        let healthy = self.probe.check_management_channel(short_name);
        result.management_channel_healthy = Some(healthy);
        if healthy {
            info!("Management channel on {} is healthy", short_name);
        } else {
            warn!("{}", Error::ChannelUnhealthy(short_name.to_string()));
        }
        reporter.on_channel_checked(short_name, healthy);

        Ok(DeviceRun {
            result,
            session_target: Some(device),
        })
    }

    fn open_session(&self, device: &ResolvedDevice, reporter: &dyn ProgressReporter) {
        trace!("{}: {}", device.short_name, DeviceStage::Sessioning);
        let ok = match &self.session {
            Some(launcher) => match launcher.open(device) {
                Ok(()) => {
                    debug!("Session to {} closed", device.short_name);
                    true
                }
                Err(err) => {
                    warn!("Session to {} failed: {}", device.short_name, err);
                    false
                }
            },
            None => {
                warn!("No session launcher configured; skipping {}", device.short_name);
                false
            }
        };
        reporter.on_session_finished(&device.short_name, ok);
    }
}

fn stopped(result: DeviceEnrollmentResult) -> DeviceRun {
    DeviceRun {
        result,
        session_target: None,
    }
}
