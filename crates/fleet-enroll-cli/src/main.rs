mod commands;
mod logging;
mod progress;
mod prompt;

use std::fs;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands, DedupArgs, EnrollArgs, HierarchyArgs, RegistryCommand};
use dotenv::dotenv;
use fleet_enroll_core::input;
use fleet_enroll_core::model::{CollectionId, DeviceEnrollmentResult};
use fleet_enroll_core::network::{CommandSession, TcpProbe};
use fleet_enroll_core::{
    AppConfig, CollectionHierarchyEngine, DedupReport, DeviceEnrollmentOrchestrator,
    DirectoryService, Error, HostRegistry, InventoryDirectory, MembershipDedupEngine,
    SnapshotExporter,
};
use progress::CliReporter;
use tracing::{error, info, warn};

fn main() -> ExitCode {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match fleet_enroll_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let args = Cli::parse();

    let outcome = match args.command {
        Some(Commands::Hierarchy(args)) => run_hierarchy(&config, args),
        Some(Commands::Dedup(args)) => run_dedup(&config, args),
        Some(Commands::Enroll(args)) => run_enroll(&config, args),
        Some(Commands::Registry(RegistryCommand::List)) => run_registry_list(&config),
        Some(Commands::Registry(RegistryCommand::Clear)) => run_registry_clear(&config),
        Some(Commands::ShowCollection { id }) => run_show_collection(&config, &id),
        Some(Commands::PrintConfig) => toml::to_string_pretty(&config)
            .map(|rendered| println!("{}", rendered))
            .map_err(anyhow::Error::from),
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn open_directory(config: &AppConfig) -> anyhow::Result<Arc<dyn DirectoryService>> {
    let directory = InventoryDirectory::open(&config.inventory_path)?;
    Ok(Arc::new(directory))
}

fn run_hierarchy(config: &AppConfig, args: HierarchyArgs) -> anyhow::Result<()> {
    let directory = open_directory(config)?;
    let engine = CollectionHierarchyEngine::new(Arc::clone(&directory));

    let parent = prompt::prompt_until("Parent collection ID", args.parent.as_deref(), |raw| {
        let id = input::parse_collection_id(raw)?;
        let collection = engine.resolve_parent(&id)?;
        let count = directory.get_device_count(&id)?;
        println!(
            "  {} ({}) with {} devices",
            collection.name.cyan(),
            collection.id,
            count
        );
        Ok(id)
    })?;
    let child_count = prompt::prompt_until(
        "Number of child collections",
        args.children.as_deref(),
        input::parse_child_count,
    )?;

    let reporter = CliReporter::new();
    let result = engine.create_hierarchy(&parent, args.pilot, child_count, &reporter)?;

    println!();
    if let Some(pilot) = &result.pilot_id {
        info!("Pilot collection: {}", pilot.to_string().green());
    }
    info!(
        "{} child collections created, {} reused, {} failed",
        format!("{}", result.child_ids.len()).green(),
        format!("{}", result.reused.len()).cyan(),
        format!("{}", result.failures.len()).red(),
    );
    for failure in &result.failures {
        warn!("  #{} {}: {}", failure.index, failure.name, failure.reason);
    }

    if args.dedup {
        let ids = result.all_ids();
        let dedup = MembershipDedupEngine::new(directory);
        let report = dedup.snapshot_and_dedup(&ids, &reporter)?;
        print_dedup_report(&report);
        if args.export {
            export_report(config, &report)?;
        }
    }
    Ok(())
}

fn run_dedup(config: &AppConfig, args: DedupArgs) -> anyhow::Result<()> {
    let ids = args
        .ids
        .iter()
        .map(|raw| input::parse_collection_id(raw))
        .collect::<Result<Vec<CollectionId>, Error>>()?;

    let engine = MembershipDedupEngine::new(open_directory(config)?);
    let reporter = CliReporter::new();
    let report = engine.snapshot_and_dedup(&ids, &reporter)?;

    print_dedup_report(&report);
    if args.export {
        export_report(config, &report)?;
    }
    Ok(())
}

fn print_dedup_report(report: &DedupReport) {
    for snapshot in &report.snapshots {
        info!(
            "{} ({}): {} devices",
            snapshot.collection_name,
            snapshot.collection_id,
            snapshot.device_names.len()
        );
    }
    info!(
        "{} devices in more than one collection, {} collections could not be read",
        format!("{}", report.duplicates.len()).yellow(),
        format!("{}", report.failures.len()).red(),
    );
}

fn export_report(config: &AppConfig, report: &DedupReport) -> anyhow::Result<()> {
    let exporter = SnapshotExporter::for_current_run(&config.export_dir);
    let mut written = exporter.export_snapshots(&report.snapshots)?;
    written.push(exporter.export_duplicates(&report.duplicates)?);
    for path in &written {
        info!("Wrote {}", path.display());
    }
    Ok(())
}

fn collect_device_names(args: &EnrollArgs) -> anyhow::Result<Vec<String>> {
    let mut text = args.names.join("\n");
    if let Some(path) = &args.file {
        let listed = fs::read_to_string(path)
            .with_context(|| format!("reading device list {}", path.display()))?;
        text.push('\n');
        text.push_str(&listed);
    }

    let names = input::parse_device_list(&text)?;
    if !names.is_empty() {
        return Ok(names);
    }
    let names = prompt::prompt_until("Device names (comma separated)", None, |raw| {
        let names = input::parse_device_list(raw)?;
        if names.is_empty() {
            return Err(Error::InvalidInput("at least one device name is required".to_string()));
        }
        Ok(names)
    })?;
    Ok(names)
}

fn run_enroll(config: &AppConfig, args: EnrollArgs) -> anyhow::Result<()> {
    let names = collect_device_names(&args)?;
    let directory = open_directory(config)?;
    let registry = Arc::new(HostRegistry::new(&config.hosts_file));

    if args.clear_registry {
        confirm_and_clear(&registry)?;
    }

    let orchestrator = DeviceEnrollmentOrchestrator::new(
        directory,
        Arc::new(TcpProbe::new(&config.probe)),
        Arc::clone(&registry),
    )
    .with_workers(config.worker_count())
    .with_session_launcher(Arc::new(CommandSession::new(config.session_command.clone())));

    let reporter = CliReporter::new();
    let results = orchestrator.run(&names, args.session, &reporter)?;
    print_enrollment_summary(&results);
    Ok(())
}

fn print_enrollment_summary(results: &[DeviceEnrollmentResult]) {
    println!();
    for result in results {
        let channel = match result.management_channel_healthy {
            Some(true) => "healthy".green(),
            Some(false) => "unhealthy".yellow(),
            None => "-".dimmed(),
        };
        let status = match &result.failure {
            Some(failure) => format!("failed while {}: {}", failure.stage, failure.reason).red(),
            None if result.registered => "registered".green(),
            None => "not registered".yellow(),
        };
        println!(
            "  {:<16} {:<40} {:<16} channel {:<9} {}",
            result.short_name,
            result.fqdn.as_deref().unwrap_or("-"),
            result.ip_address.as_deref().unwrap_or("-"),
            channel,
            status
        );
    }
    let registered = results.iter().filter(|r| r.registered).count();
    info!(
        "{} of {} devices registered",
        format!("{}", registered).green(),
        results.len()
    );
}

fn confirm_and_clear(registry: &HostRegistry) -> anyhow::Result<()> {
    let question = format!(
        "Are you SURE you want to CLEAR every entry in {}?",
        registry.path().display()
    );
    if !prompt::prompt_confirm(&question, Some(false))? {
        bail!("registry clear cancelled");
    }
    registry.clear()?;
    println!("Registry cleared");
    Ok(())
}

fn run_registry_list(config: &AppConfig) -> anyhow::Result<()> {
    let registry = HostRegistry::new(&config.hosts_file);
    let entries = registry.entries()?;
    for entry in &entries {
        println!("  {:<40} {}", entry.ip, entry.short_name);
    }
    info!("{} entries in {}", entries.len(), registry.path().display());
    Ok(())
}

fn run_registry_clear(config: &AppConfig) -> anyhow::Result<()> {
    confirm_and_clear(&HostRegistry::new(&config.hosts_file))
}

fn run_show_collection(config: &AppConfig, raw_id: &str) -> anyhow::Result<()> {
    let id = input::parse_collection_id(raw_id)?;
    let directory = open_directory(config)?;
    let collection = directory
        .get_collection(&id)?
        .ok_or_else(|| Error::NotFound(format!("collection {}", id)))?;
    let count = directory.get_device_count(&id)?;

    println!("Collection: {} ({})", collection.name.cyan(), collection.id);
    if let Some(limiting) = &collection.limiting_collection_id {
        println!("Limited to: {}", limiting);
    }
    if !collection.comment.is_empty() {
        println!("Comment:    {}", collection.comment);
    }
    println!("Devices:    {}", count);
    Ok(())
}
