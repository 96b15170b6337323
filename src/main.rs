use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use log::{info, warn, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use evidence_collector::cli::{Args, CollectOpts, Commands};
use evidence_collector::collectors::ModuleRegistry;
use evidence_collector::config::{load_or_create_config, CollectionConfig};
use evidence_collector::constants::DEFAULT_MODULES;
use evidence_collector::orchestrator::{CollectionRequest, Orchestrator, RunCallbacks};
use evidence_collector::privileges;
use evidence_collector::utils::compress::{format_bytes, format_duration};
use evidence_collector::utils::hash::{hash_file, verify_hash};

fn main() -> Result<()> {
    let args = Args::parse();

    initialize_logging(args.verbose)?;

    match args.command {
        Commands::Collect(opts) => run_collection(opts),
        Commands::ListModules => list_modules(),
        Commands::Hash { file, algorithms } => hash_command(&file, &algorithms),
        Commands::Verify {
            file,
            digest,
            algorithm,
        } => verify_command(&file, &digest, &algorithm),
        Commands::InitConfig { path } => {
            info!("Creating default configuration file at {}", path.display());
            CollectionConfig::default().save_to_yaml_file(&path)?;
            info!("Configuration created successfully");
            Ok(())
        }
    }
}

/// Initialize logging with the specified verbosity level
fn initialize_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    TermLogger::init(log_level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto)
        .context("Failed to initialize logger")?;
    Ok(())
}

fn run_collection(opts: CollectOpts) -> Result<()> {
    let mut config = load_or_create_config(opts.config.as_deref())?;
    if let Some(output) = &opts.output {
        config.output_directory = output.clone();
    }
    if opts.no_compress {
        config.compression.enabled = false;
    }
    if opts.no_report {
        config.report.enabled = false;
    }

    let module_ids: Vec<String> = if opts.modules.is_empty() {
        DEFAULT_MODULES.iter().map(|s| s.to_string()).collect()
    } else {
        opts.modules
    };

    if !privileges::is_elevated() {
        warn!("Running without elevated privileges - some modules may fail");
        warn!("{}", privileges::get_elevation_instructions());
    }

    let output_dir = config.run_directory();
    info!("Collecting {} into {}", module_ids.join(", "), output_dir.display());

    let orchestrator = Arc::new(Orchestrator::new());
    let handler_orchestrator = Arc::clone(&orchestrator);
    ctrlc::set_handler(move || handler_orchestrator.stop())
        .context("Failed to install Ctrl+C handler")?;

    let callbacks = RunCallbacks::new()
        .on_progress(|done, total| info!("Progress: {}/{} modules", done, total))
        .on_module_completed(|id, ok| {
            if !ok {
                warn!("Module {} did not complete", id);
            }
        })
        .on_compression_progress(|p| {
            info!(
                "Compressing: {:.1}% ({}/{} files, {}/s, ETA {})",
                p.percent,
                p.files_done,
                p.total_files,
                format_bytes(p.throughput_bps as u64),
                p.eta.map(format_duration).unwrap_or_else(|| "--:--:--".to_string())
            )
        });

    orchestrator.start(CollectionRequest::new(module_ids, &output_dir, config), callbacks)?;

    let outcome = orchestrator
        .wait()
        .ok_or_else(|| anyhow!("Collection worker terminated unexpectedly"))?;

    for module in &outcome.modules {
        match &module.error {
            Some(reason) => info!("  {:<12} {:<10} {}", module.id, module.state, reason),
            None => info!("  {:<12} {}", module.id, module.state),
        }
    }
    if let Some(archive) = &outcome.archive {
        info!("Archive: {}", archive.archive_path.display());
    }

    if !outcome.success {
        bail!(outcome.message);
    }
    info!("{}", outcome.message);
    Ok(())
}

fn list_modules() -> Result<()> {
    for module in ModuleRegistry::builtin().describe() {
        let elevation = if privileges::requires_elevation(&module.id) {
            " [requires elevation]"
        } else {
            ""
        };
        println!(
            "{:<12} {} v{}{}\n             {}",
            module.id, module.name, module.version, elevation, module.description
        );
    }
    Ok(())
}

fn hash_command(file: &Path, algorithms: &[String]) -> Result<()> {
    let digests = hash_file(file, algorithms);
    if digests.is_empty() {
        bail!("Could not hash {}", file.display());
    }
    for (algorithm, digest) in &digests {
        println!("{}  {}  {}", algorithm, digest, file.display());
    }
    Ok(())
}

fn verify_command(file: &Path, digest: &str, algorithm: &str) -> Result<()> {
    if !verify_hash(file, digest, algorithm) {
        bail!("Verification failed for {}", file.display());
    }
    println!("OK  {}", file.display());
    Ok(())
}
