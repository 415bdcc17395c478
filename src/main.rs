// src/main.rs - Runs one guided MMU operation against the simulated printer and filament manager
use clap::Parser;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError};
use tokio::sync::{broadcast, mpsc};

use mmu_wizard::config::{self, Config};
use mmu_wizard::filament::FilamentPicker;
use mmu_wizard::hardware::{ChannelPrinter, PrinterRequest};
use mmu_wizard::models::{Operation, Spool};
use mmu_wizard::simulator::{HotendModel, SimulatedFilamentManager, SimulatedPrinter};
use mmu_wizard::wizard::{Page, WizardCommand, WizardController, WizardUpdate};

/// MMU filament wizard
#[derive(Parser, Debug)]
#[command(name = "mmu-wizard", about = "Walks through one MMU filament operation on a simulated printer.")]
struct Cli {
    /// Path to a TOML config file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 1-based MMU slot to operate on
    #[arg(short, long, default_value_t = 1)]
    slot: u8,

    /// load, unload, load-nozzle, unload-nozzle, cut or eject
    #[arg(short, long, default_value = "load")]
    operation: Operation,

    /// Spool id from the simulator inventory to load (defaults to the first spool)
    #[arg(long)]
    spool: Option<i64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,

    /// Print every wizard update as a JSON line
    #[arg(long)]
    json: bool,

    /// Afterwards, answer a tool-change prompt by picking this 1-based filament
    #[arg(long)]
    select_filament: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .init();

    let config = match &cli.config {
        Some(path) => {
            let path = path.to_string_lossy();
            tracing::info!("Loading configuration from: {}", path);
            config::load_config(&path).map_err(|e| {
                tracing::error!("Failed to load config from '{}': {}", path, e);
                Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
            })?
        }
        None => Config::default(),
    };

    tracing::info!(
        "MMU wizard: {} on slot {} ({:?} filament source, {} slots)",
        cli.operation,
        cli.slot,
        config.wizard.filament_source,
        config.wizard.slot_count
    );

    let new_spool = pick_spool(&config, cli.spool);
    if cli.operation.picks_spool() && new_spool.is_none() {
        tracing::warn!("No spool in the simulator inventory; the operation will abort at assignment");
    }

    let manager = Arc::new(SimulatedFilamentManager::new(
        config.simulator.spools.clone(),
        config.simulator.loaded.clone(),
    ));
    manager.set_failing(config.simulator.fail_mutations);

    let (printer, printer_rx) = ChannelPrinter::channel();
    let hotend = HotendModel::new(
        config.simulator.ambient_temperature,
        config.simulator.hotend_target,
    );
    let (simulated_printer, temperature_rx) = SimulatedPrinter::new(printer_rx, hotend);
    let history = simulated_printer.history();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let printer_task = tokio::spawn(simulated_printer.run(shutdown_rx));

    let (controller, mut updates) =
        WizardController::new(config.wizard.clone(), manager.clone(), Arc::new(printer), temperature_rx);
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let wizard_task = tokio::spawn(controller.run(commands_rx));

    let interrupt_tx = commands_tx.clone();
    let interrupt_shutdown = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, closing wizard");
            if interrupt_tx.send(WizardCommand::Exit).is_err() {
                let _ = interrupt_shutdown.send(());
            }
        }
    });

    // Scripted operator: answers every page and presses every stage button.
    let mut operation_sent = false;
    while let Some(update) = updates.recv().await {
        if cli.json {
            println!("{}", serde_json::to_string(&update)?);
        }
        let command = match &update {
            WizardUpdate::Slots { slots } => {
                for (index, filament) in slots.iter().enumerate() {
                    tracing::info!(
                        "Slot {}: {} {}",
                        index + 1,
                        filament.name,
                        if filament.enabled { "" } else { "(empty)" }
                    );
                }
                None
            }
            WizardUpdate::Page { page } => match page {
                Page::SlotPick => Some(WizardCommand::SelectSlot(cli.slot)),
                Page::FunctionPick if operation_sent => Some(WizardCommand::Exit),
                Page::FunctionPick => {
                    operation_sent = true;
                    Some(WizardCommand::SelectOperation(cli.operation))
                }
                Page::SpoolPick | Page::NozzleHeat => match (&new_spool, cli.operation) {
                    (Some(spool), Operation::Load) => Some(WizardCommand::SelectSpool {
                        spool: spool.clone(),
                        skip_change: false,
                    }),
                    _ => Some(WizardCommand::HeatNozzle),
                },
                Page::Operation => None,
            },
            WizardUpdate::Stage(view) => {
                tracing::info!("[{} stage {}] {}", view.operation, view.stage, view.message);
                view.button.as_ref().map(|label| {
                    tracing::info!("Pressing '{}'", label);
                    WizardCommand::Confirm
                })
            }
            WizardUpdate::Checkmark { operation, slot } => {
                tracing::info!("✓ {} on slot {} done", operation, slot);
                None
            }
            WizardUpdate::MainScreen => break,
        };
        if let Some(command) = command {
            if commands_tx.send(command).is_err() {
                break;
            }
        }
    }

    match wizard_task.await? {
        Ok(()) => tracing::info!("Wizard finished"),
        Err(e) => tracing::warn!("Wizard stopped: {}", e),
    }
    // The printer stops once the wizard has dropped the last request sender.
    printer_task.await?;
    drop(shutdown_tx);

    let history = history.lock().unwrap_or_else(PoisonError::into_inner);
    for request in history.iter() {
        match request {
            PrinterRequest::ExecuteGcode { command } => tracing::info!("Sent: {}", command),
            PrinterRequest::SetHotendTarget { temperature } => {
                tracing::info!("Hotend target set: {:.1}°C", temperature)
            }
        }
    }
    if let Some(id) = cli.select_filament {
        let mut picker = FilamentPicker::new(
            manager.clone(),
            config.wizard.filament_source,
            config.wizard.slot_count,
        );
        picker.show().await;
        match picker.filaments().iter().find(|filament| filament.id == id).cloned() {
            Some(filament) => match picker.select(&filament).await {
                Ok(request) if cli.json => println!("{}", serde_json::to_string(&request)?),
                Ok(_) => {}
                Err(e) => tracing::warn!("Filament select failed: {}", e),
            },
            None => {
                picker.hide();
                tracing::warn!("No filament {} in the picker", id);
            }
        }
    }

    let channel = usize::from(cli.slot.saturating_sub(1));
    tracing::info!(
        "Slot {} now holds spool {}",
        cli.slot,
        manager
            .loaded_spool(channel)
            .map(|id| id.to_string())
            .unwrap_or_else(|| "none".to_string())
    );
    Ok(())
}

fn pick_spool(config: &Config, id: Option<i64>) -> Option<Spool> {
    let spools = &config.simulator.spools;
    match id {
        Some(id) => spools.iter().find(|spool| spool.id == id).cloned(),
        None => spools.first().cloned(),
    }
}
