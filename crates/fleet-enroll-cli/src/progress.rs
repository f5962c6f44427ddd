use colored::*;
use fleet_enroll_core::model::{Collection, CollectionId, DuplicateRecord, RegistryOutcome};
use fleet_enroll_core::ProgressReporter;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;

/// CLI progress reporter.
///
/// - Collection and duplicate events: one status line each
/// - Device batch: progress bar over the requested names
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        let mut guard = self.bar.lock().unwrap();
        if let Some(old) = guard.take() {
            old.finish_and_clear();
        }
        *guard = Some(pb);
    }

    fn finish_bar(&self) {
        let mut guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.take() {
            pb.finish_and_clear();
        }
    }

    /// Print above the bar when one is active so it is not torn.
    fn line(&self, msg: String) {
        let guard = self.bar.lock().unwrap();
        match guard.as_ref() {
            Some(pb) => pb.println(msg),
            None => eprintln!("{}", msg),
        }
    }
}

impl Drop for CliReporter {
    fn drop(&mut self) {
        self.finish_bar();
    }
}

impl ProgressReporter for CliReporter {
    fn on_collection_created(&self, collection: &Collection) {
        self.line(format!(
            "  {} Created {} ({})",
            "✓".green(),
            collection.name,
            collection.id
        ));
    }

    fn on_collection_reused(&self, collection: &Collection) {
        self.line(format!(
            "  {} Exists  {} ({})",
            "=".cyan(),
            collection.name,
            collection.id
        ));
    }

    fn on_collection_failed(&self, _index: usize, name: &str, reason: &str) {
        self.line(format!("  {} Failed  {}: {}", "✗".red(), name, reason));
    }

    fn on_snapshot_failed(&self, collection_id: &CollectionId, reason: &str) {
        self.line(format!("  {} Snapshot {}: {}", "✗".red(), collection_id, reason));
    }

    fn on_duplicate_found(&self, duplicate: &DuplicateRecord) {
        let ids: Vec<String> = duplicate.collection_ids.iter().map(|id| id.to_string()).collect();
        self.line(format!(
            "  {} {} is in {}",
            "!".yellow(),
            duplicate.device_name.yellow(),
            ids.join(", ")
        ));
    }

    fn on_batch_start(&self, total_devices: usize) {
        let pb = ProgressBar::new(total_devices as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "  {spinner:.cyan} Enrolling [{bar:30.cyan/dim}] {pos}/{len} devices {msg}",
            )
            .unwrap()
            .progress_chars("━╸─")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.enable_steady_tick(std::time::Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_device_unresolved(&self, short_name: &str, reason: &str) {
        self.line(format!("  {} {}: {}", "✗".red(), short_name, reason));
    }

    fn on_device_unreachable(&self, short_name: &str, fqdn: &str) {
        self.line(format!("  {} {}: {} is unreachable", "✗".red(), short_name, fqdn));
    }

    fn on_device_unaddressed(&self, short_name: &str, fqdn: &str) {
        self.line(format!("  {} {}: {} answered without an address", "✗".red(), short_name, fqdn));
    }

    fn on_registry_write(&self, short_name: &str, ip_address: &str, outcome: RegistryOutcome) {
        let status = match outcome {
            RegistryOutcome::Added => "registered".green(),
            RegistryOutcome::AlreadyPresent => "already registered".cyan(),
        };
        self.line(format!("  {} {} {} {}", "✓".green(), short_name, ip_address, status));
    }

    fn on_registry_write_failed(&self, short_name: &str, reason: &str) {
        self.line(format!("  {} {}: registry write failed: {}", "✗".red(), short_name, reason));
    }

    fn on_channel_checked(&self, short_name: &str, healthy: bool) {
        if !healthy {
            self.line(format!(
                "  {} {}: management channel not answering",
                "!".yellow(),
                short_name
            ));
        }
    }

    fn on_session_finished(&self, short_name: &str, ok: bool) {
        if !ok {
            self.line(format!("  {} session to {} failed", "!".yellow(), short_name));
        }
    }

    fn on_device_complete(&self, short_name: &str) {
        let guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.as_ref() {
            pb.set_message(short_name.to_string());
            pb.inc(1);
        }
    }

    fn on_batch_complete(&self, completed: usize) {
        self.finish_bar();
        eprintln!("  {} Enrollment complete: {} devices", "✓".green(), completed);
    }
}
