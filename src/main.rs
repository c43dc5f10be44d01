//! hotkey-registry - inspect global hotkey conflicts from the command line.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;

use hotkey_registry::bindings::{apply_bindings, load_bindings};
use hotkey_registry::config::{self, Config};
use hotkey_registry::error::{HotkeyError, ResultExt};
use hotkey_registry::hotkeys::{
    BackendError, BackendProbe, ConflictDocument, ConflictGroup, DispatchFrontEnd,
    GlobalHotkeyBackend, HotkeyRegistry, HotkeyService, RegistryOptions, ReservedShortcutsProbe,
    Shortcut, SystemConflictProbe, SystemHotkeyBackend,
};
use hotkey_registry::logging;

/// hotkey-registry - global hotkey arbitration tools
#[derive(Parser)]
#[command(name = "hotkey-registry")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (default: <data dir>/hotkey-registry/settings.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report whether a shortcut is already claimed outside this process
    Probe {
        /// Shortcut text, e.g. "win+shift+c"
        shortcut: String,
    },
    /// Load declared module bindings and report their conflicts
    Check {
        /// JSON list of {moduleName, hotkeyName, shortcut, mechanism}
        bindings: PathBuf,

        /// Also register sole owners with the OS (released before exit)
        #[arg(long)]
        register: bool,
    },
    /// Register bindings with the OS and dispatch them until Enter is pressed
    Run {
        /// JSON list of {moduleName, hotkeyName, shortcut, mechanism}
        bindings: PathBuf,
    },
    /// Print the last exported conflict document
    Show,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(config::default_config_path);
    let config = config::load_config(&config_path);
    let _guard = logging::init(&config);

    match cli.command {
        Commands::Probe { shortcut } => probe(&shortcut),
        Commands::Check { bindings, register } => check(&config, &bindings, register),
        Commands::Run { bindings } => run(&config, &bindings),
        Commands::Show => show(&config),
    }
}

/// Start the OS backend, falling back to the static reserved list when no
/// backend is available (headless sessions).
fn system_probe() -> (Arc<dyn SystemConflictProbe>, Option<Arc<GlobalHotkeyBackend>>) {
    match GlobalHotkeyBackend::spawn() {
        Ok(backend) => {
            let backend = Arc::new(backend);
            let probe: Arc<dyn SystemConflictProbe> =
                Arc::new(BackendProbe::new(backend.clone()));
            (probe, Some(backend))
        }
        Err(e) => {
            warn!(error = %e, "OS hotkey backend unavailable, using reserved shortcut list");
            let probe: Arc<dyn SystemConflictProbe> =
                Arc::new(ReservedShortcutsProbe::for_current_platform());
            (probe, None)
        }
    }
}

fn probe(text: &str) -> Result<()> {
    let shortcut = Shortcut::parse(text).map_err(HotkeyError::from)?;
    let hotkey = shortcut.to_hotkey();
    if !hotkey.is_valid() {
        return Err(HotkeyError::InvalidHotkey(text.to_string()).into());
    }

    let (probe, _backend) = system_probe();
    if probe.has_system_conflict(&hotkey) {
        println!("{}: taken", shortcut);
    } else {
        println!("{}: free", shortcut);
    }
    Ok(())
}

fn check(config: &Config, bindings_path: &Path, register: bool) -> Result<()> {
    let bindings = load_bindings(bindings_path)
        .with_context(|| format!("Failed to load {}", bindings_path.display()))?;

    let (probe, backend) = system_probe();
    let registry = Arc::new(HotkeyRegistry::new(probe, RegistryOptions::from_config(config)));
    let report = apply_bindings(&registry, &bindings);

    println!("{} binding(s) added", report.added);
    for (binding, error) in &report.invalid {
        println!(
            "  invalid: {}/{} '{}': {}",
            binding.module_name,
            binding.hotkey_name,
            binding.shortcut,
            error.user_message()
        );
    }
    for binding in &report.rejected {
        println!(
            "  rejected: {}/{} '{}'",
            binding.module_name, binding.hotkey_name, binding.shortcut
        );
    }

    // Registrations stay live until the report below is printed.
    let front_end = if register {
        let front_end = DispatchFrontEnd::new(registry.clone(), require_backend(backend)?);
        let pass = front_end.register_all();
        println!(
            "registration pass: {} registered, {} taken, {} failed",
            pass.registered, pass.taken, pass.failed
        );
        Some(front_end)
    } else {
        None
    };

    for binding in &bindings {
        let Ok(shortcut) = binding.parse_shortcut() else {
            continue;
        };
        let status = match registry.check_conflict(
            shortcut,
            &binding.module_name,
            &binding.hotkey_name,
        ) {
            Ok(()) => "ok".to_string(),
            Err(e) => e.user_message(),
        };
        println!(
            "{:<24} {}/{}: {}",
            shortcut.to_string(),
            binding.module_name,
            binding.hotkey_name,
            status
        );
    }

    if let Some(front_end) = front_end {
        front_end.unregister_all();
    }

    registry.export_conflicts().log_err();
    if let Some(exporter) = registry.exporter() {
        println!("conflicts written to {}", exporter.path().display());
    }

    let document = ConflictDocument::from_sets(&registry.conflict_sets());
    print_groups(&document.groups());
    Ok(())
}

fn run(config: &Config, bindings_path: &Path) -> Result<()> {
    let bindings = load_bindings(bindings_path)
        .with_context(|| format!("Failed to load {}", bindings_path.display()))?;

    let (probe, backend) = system_probe();
    let backend = require_backend(backend)?;
    let registry = Arc::new(HotkeyRegistry::new(probe, RegistryOptions::from_config(config)));
    let front_end = Arc::new(DispatchFrontEnd::new(registry.clone(), backend));
    let _listener = front_end
        .spawn_event_listener()
        .context("Failed to start the hotkey event listener")?;
    let service = HotkeyService::from_front_end(front_end);

    for binding in &bindings {
        let shortcut = match binding.parse_shortcut() {
            Ok(shortcut) => shortcut,
            Err(e) => {
                println!(
                    "  invalid: {}/{}: {}",
                    binding.module_name,
                    binding.hotkey_name,
                    e.user_message()
                );
                continue;
            }
        };
        let added = service.register(
            shortcut,
            &binding.module_name,
            &binding.hotkey_name,
            binding.logging_action(),
        );
        let status = if !added {
            "rejected".to_string()
        } else {
            match registry.check_conflict(shortcut, &binding.module_name, &binding.hotkey_name) {
                Ok(()) => "active".to_string(),
                Err(e) => e.user_message(),
            }
        };
        println!(
            "{:<24} {}/{}: {}",
            shortcut.to_string(),
            binding.module_name,
            binding.hotkey_name,
            status
        );
    }

    if let Some(exporter) = registry.exporter() {
        println!("conflicts written to {}", exporter.path().display());
    }
    println!("listening for hotkeys, press Enter to stop");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read stdin")?;

    drop(service);
    Ok(())
}

fn require_backend(
    backend: Option<Arc<GlobalHotkeyBackend>>,
) -> Result<Arc<dyn SystemHotkeyBackend>> {
    let backend: Arc<dyn SystemHotkeyBackend> = backend.ok_or_else(|| {
        HotkeyError::Backend(BackendError::Unavailable(
            "no OS hotkey backend in this session".to_string(),
        ))
    })?;
    Ok(backend)
}

fn show(config: &Config) -> Result<()> {
    let path = config.conflicts_path();
    let document = ConflictDocument::load(&path)
        .map_err(HotkeyError::from)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    println!("{}", path.display());
    print_groups(&document.groups());
    Ok(())
}

fn print_groups(groups: &[ConflictGroup]) {
    if groups.is_empty() {
        println!("no conflicts");
        return;
    }
    for group in groups {
        let kind = if group.is_system_conflict {
            "system"
        } else {
            "in-app"
        };
        println!("{} ({})", group.hotkey, kind);
        for owner in &group.owners {
            println!("  {} / {}", owner.module_name, owner.hotkey_name);
        }
    }
}
