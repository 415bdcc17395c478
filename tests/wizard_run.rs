// End-to-end runs of the wizard loop against the simulated printer and filament manager

use mmu_wizard::config::{self, Config};
use mmu_wizard::hardware::{ChannelPrinter, PrinterRequest};
use mmu_wizard::models::{Operation, Spool};
use mmu_wizard::simulator::{HotendModel, SimulatedFilamentManager, SimulatedPrinter};
use mmu_wizard::wizard::{Page, WizardCommand, WizardController, WizardError, WizardUpdate};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_test::assert_ok;

const CONFIG: &str = r##"
[wizard]
default_hotend_temperature = 215.0
stage_delay_ms = 500
checkmark_delay_ms = 300

[simulator]
ambient_temperature = 25.0
loaded = [3, -1]

[[simulator.spools]]
id = 3
name = "Galaxy Black"
material = "PLA"
color = "#111111"

[[simulator.spools]]
id = 8
name = "Mystic Green"
material = "PETG"
temperature_offset = 15.0
"##;

fn load_test_config() -> Config {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(CONFIG.as_bytes()).unwrap();
    config::load_config(file.path().to_str().unwrap()).unwrap()
}

struct Outcome {
    result: Result<(), WizardError>,
    updates: Vec<WizardUpdate>,
    requests: Vec<PrinterRequest>,
    manager: Arc<SimulatedFilamentManager>,
}

/// Runs one operation on `slot`, answering every page and pressing every button.
async fn run_operation(config: Config, slot: u8, operation: Operation, new_spool: Option<Spool>) -> Outcome {
    let manager = Arc::new(SimulatedFilamentManager::new(
        config.simulator.spools.clone(),
        config.simulator.loaded.clone(),
    ));
    manager.set_failing(config.simulator.fail_mutations);
    let (printer, printer_rx) = ChannelPrinter::channel();
    let (simulated, temperature_rx) = SimulatedPrinter::new(
        printer_rx,
        HotendModel::new(config.simulator.ambient_temperature, config.simulator.hotend_target),
    );
    let history = simulated.history();
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let printer_task = tokio::spawn(simulated.run(shutdown_rx));

    let (controller, mut updates_rx) =
        WizardController::new(config.wizard.clone(), manager.clone(), Arc::new(printer), temperature_rx);
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let wizard_task = tokio::spawn(controller.run(commands_rx));

    let mut updates = Vec::new();
    let mut operation_sent = false;
    while let Some(update) = updates_rx.recv().await {
        let command = match &update {
            WizardUpdate::Page { page: Page::SlotPick } => Some(WizardCommand::SelectSlot(slot)),
            WizardUpdate::Page { page: Page::FunctionPick } if operation_sent => Some(WizardCommand::Exit),
            WizardUpdate::Page { page: Page::FunctionPick } => {
                operation_sent = true;
                Some(WizardCommand::SelectOperation(operation))
            }
            WizardUpdate::Page {
                page: Page::SpoolPick | Page::NozzleHeat,
            } => Some(match &new_spool {
                Some(spool) => WizardCommand::SelectSpool {
                    spool: spool.clone(),
                    skip_change: false,
                },
                None => WizardCommand::HeatNozzle,
            }),
            WizardUpdate::Stage(view) => view.button.as_ref().map(|_| WizardCommand::Confirm),
            _ => None,
        };
        let done = update == WizardUpdate::MainScreen;
        updates.push(update);
        if done {
            break;
        }
        if let Some(command) = command {
            commands_tx.send(command).unwrap();
        }
    }

    let result = wizard_task.await.unwrap();
    // The wizard held the only request sender; the printer drains what is left and stops.
    printer_task.await.unwrap();
    let requests = history.lock().unwrap().clone();
    Outcome {
        result,
        updates,
        requests,
        manager,
    }
}

fn gcode(requests: &[PrinterRequest]) -> Vec<&str> {
    requests
        .iter()
        .filter_map(|request| match request {
            PrinterRequest::ExecuteGcode { command } => Some(command.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_config_file_round_trips_inventory() {
    let config = load_test_config();
    assert_eq!(config.wizard.stage_delay_ms, 500);
    assert_eq!(config.wizard.slot_count, 5);
    assert_eq!(config.simulator.spools.len(), 2);
    assert_eq!(config.simulator.spools[1].temperature_offset, Some(15.0));
}

#[tokio::test(start_paused = true)]
async fn test_load_to_nozzle_from_cold_runs_to_completion() {
    let outcome = run_operation(load_test_config(), 1, Operation::LoadToNozzle, None).await;
    assert_ok!(outcome.result);
    assert_eq!(gcode(&outcome.requests), vec!["M701 P0"]);

    // Heat request first, restore of the previous target last.
    assert_eq!(
        outcome.requests.first(),
        Some(&PrinterRequest::SetHotendTarget { temperature: 215.0 })
    );
    assert_eq!(
        outcome.requests.last(),
        Some(&PrinterRequest::SetHotendTarget { temperature: 0.0 })
    );
    let warned = outcome.updates.iter().any(|update| {
        matches!(update, WizardUpdate::Stage(view) if view.message == "hotend may not be hot enough, continue?")
    });
    assert!(warned);
    assert!(outcome
        .updates
        .iter()
        .any(|update| matches!(update, WizardUpdate::Checkmark { operation: Operation::LoadToNozzle, .. })));
}

#[tokio::test(start_paused = true)]
async fn test_unload_releases_spool() {
    let outcome = run_operation(load_test_config(), 1, Operation::Unload, None).await;
    assert_ok!(outcome.result);
    assert_eq!(outcome.manager.loaded_spool(0), None);
    assert!(gcode(&outcome.requests).is_empty());
    let slots = outcome.updates.iter().rev().find_map(|update| match update {
        WizardUpdate::Slots { slots } => Some(slots.clone()),
        _ => None,
    });
    let slots = slots.unwrap();
    assert_eq!(slots.len(), 5);
    assert!(!slots[0].enabled);
    assert_eq!(slots[0].name, "empty");
}

#[tokio::test(start_paused = true)]
async fn test_load_swaps_spools() {
    let config = load_test_config();
    let green = config.simulator.spools[1].clone();
    let outcome = run_operation(config, 1, Operation::Load, Some(green)).await;
    assert_ok!(outcome.result);
    assert_eq!(outcome.manager.loaded_spool(0), Some(8));
    assert_eq!(gcode(&outcome.requests), vec!["M704 P0"]);
    assert_eq!(outcome.manager.mutation_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failing_manager_aborts_to_main_screen() {
    let mut config = load_test_config();
    config.simulator.fail_mutations = true;
    let outcome = run_operation(config, 1, Operation::Unload, None).await;
    assert_ok!(outcome.result);
    assert_eq!(outcome.manager.loaded_spool(0), Some(3));
    assert_eq!(outcome.manager.mutation_count(), 1);
    assert_eq!(outcome.updates.last(), Some(&WizardUpdate::MainScreen));
    assert!(!outcome
        .updates
        .iter()
        .any(|update| matches!(update, WizardUpdate::Checkmark { .. })));
    assert_eq!(
        outcome.requests,
        vec![PrinterRequest::SetHotendTarget { temperature: 0.0 }]
    );
}
