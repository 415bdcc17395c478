//! Wizard control loop
//!
//! `WizardController` owns everything that changes while the wizard is open: the page, the
//! operator's picks, the live session and its generation. It is the only place where side effects
//! reported by the state machine are carried out, and the only reader of the temperature stream.
//!
//! Timer stages are backed by spawned sleeps that post back into the loop tagged with the
//! generation they were scheduled under. Ending a session bumps the generation, so anything still
//! in flight for it is dropped on arrival.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use super::WizardError;
use super::machine::{OperationStateMachine, Transition, Trigger};
use super::pages::{Navigation, Page, PageController};
use super::session::{Selection, SlotPick, StageView, WizardSession};
use super::stage::{Advance, SideEffect};
use crate::config::WizardConfig;
use crate::filament::{FilamentCatalog, SlotEntry, SpoolChange, SpoolMutationCoordinator};
use crate::hardware::{FilamentSource, HardwareCommandDispatcher, PrinterControl, TemperatureGate};
use crate::models::{FilamentState, Operation, Slot, Spool, TemperatureSample};

/// Operator input.
#[derive(Debug, Clone, PartialEq)]
pub enum WizardCommand {
    /// 1-based slot number picked on the slot page.
    SelectSlot(u8),
    SelectOperation(Operation),
    /// `skip_change` assigns the spool straight away instead of moving on.
    SelectSpool { spool: Spool, skip_change: bool },
    HeatNozzle,
    /// Stage button press.
    Confirm,
    Back,
    Exit,
}

/// What the wizard shows, in the order it changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WizardUpdate {
    Slots { slots: Vec<FilamentState> },
    Page { page: Page },
    Stage(StageView),
    Checkmark { operation: Operation, slot: Slot },
    MainScreen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    Stage,
    Checkmark,
}

#[derive(Debug, Clone, Copy)]
struct TimerFired {
    generation: u64,
    kind: TimerKind,
}

pub struct WizardController {
    config: WizardConfig,
    catalog: FilamentCatalog,
    coordinator: SpoolMutationCoordinator,
    dispatcher: HardwareCommandDispatcher,
    printer: Arc<dyn PrinterControl>,
    gate: TemperatureGate,
    machine: OperationStateMachine,
    pages: PageController,
    selection: Selection,
    slots: Vec<SlotEntry>,
    session: Option<WizardSession>,
    generation: u64,
    hotend_current_temp: f64,
    temperature: watch::Receiver<TemperatureSample>,
    updates: mpsc::UnboundedSender<WizardUpdate>,
    timer_tx: mpsc::UnboundedSender<TimerFired>,
    timer_rx: mpsc::UnboundedReceiver<TimerFired>,
    finished: bool,
}

impl WizardController {
    pub fn new(
        config: WizardConfig,
        source: Arc<dyn FilamentSource>,
        printer: Arc<dyn PrinterControl>,
        temperature: watch::Receiver<TemperatureSample>,
    ) -> (Self, mpsc::UnboundedReceiver<WizardUpdate>) {
        let (updates, updates_rx) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let sample = *temperature.borrow();
        let gate = TemperatureGate::from_config(&config);
        let controller = Self {
            catalog: FilamentCatalog::new(source.clone(), config.filament_source, config.slot_count),
            coordinator: SpoolMutationCoordinator::new(source),
            dispatcher: HardwareCommandDispatcher::new(printer.clone()),
            printer,
            gate,
            machine: OperationStateMachine::new(gate),
            pages: PageController::new(sample.target),
            selection: Selection::default(),
            slots: Vec::new(),
            session: None,
            generation: 0,
            hotend_current_temp: sample.current,
            temperature,
            updates,
            timer_tx,
            timer_rx,
            finished: false,
            config,
        };
        (controller, updates_rx)
    }

    pub fn page(&self) -> Page {
        self.pages.page()
    }

    pub fn session(&self) -> Option<&WizardSession> {
        self.session.as_ref()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn slots(&self) -> &[SlotEntry] {
        &self.slots
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Loads the slot list and shows the slot picker.
    pub async fn start(&mut self) {
        tracing::info!(
            "Filament wizard opened (hotend target {:.1}°C will be restored on exit)",
            self.pages.previous_hotend_target()
        );
        self.slots = self.catalog.refresh().await;
        self.publish_slots();
        self.show_page(Page::SlotPick);
    }

    /// Applies one operator command.
    ///
    /// Mutation failures and missing picks abort the wizard before the error is returned; other
    /// errors leave the wizard where it was.
    pub async fn handle(&mut self, command: WizardCommand) -> Result<(), WizardError> {
        if self.finished {
            tracing::debug!("Ignoring {:?}, wizard already closed", command);
            return Ok(());
        }
        let result = self.apply(command).await;
        if let Err(e) = &result {
            self.on_error(e);
        }
        result
    }

    /// Waits for the next scheduled timer and applies it.
    pub async fn next_timer(&mut self) -> Result<(), WizardError> {
        let fired = self.timer_rx.recv().await.ok_or(WizardError::ChannelClosed)?;
        let result = self.handle_timer(fired).await;
        if let Err(e) = &result {
            self.on_error(e);
        }
        result
    }

    /// Records a hotend reading for the temperature gate.
    pub fn sync_temperature(&mut self, sample: TemperatureSample) {
        self.hotend_current_temp = sample.current;
        if let Some(session) = self.session.as_mut() {
            session.hotend_current_temp = sample.current;
        }
    }

    /// Runs the wizard until it is closed or the command channel goes away.
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<WizardCommand>,
    ) -> Result<(), WizardError> {
        self.start().await;
        let mut temperature_open = true;
        while !self.finished {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        // Errors are already acted on inside `handle`.
                        let _ = self.handle(command).await;
                    }
                    None => {
                        tracing::warn!("Command channel closed, closing wizard");
                        self.teardown();
                        return Err(WizardError::ChannelClosed);
                    }
                },
                Some(fired) = self.timer_rx.recv() => {
                    if let Err(e) = self.handle_timer(fired).await {
                        self.on_error(&e);
                    }
                }
                changed = self.temperature.changed(), if temperature_open => match changed {
                    Ok(()) => {
                        let sample = *self.temperature.borrow_and_update();
                        self.sync_temperature(sample);
                    }
                    Err(_) => {
                        tracing::debug!("Temperature stream ended");
                        temperature_open = false;
                    }
                },
            }
        }
        Ok(())
    }

    async fn apply(&mut self, command: WizardCommand) -> Result<(), WizardError> {
        let page = self.pages.page();
        match (page, command) {
            (Page::SlotPick, WizardCommand::SelectSlot(number)) => {
                let slot = Slot::new(number, self.catalog.slot_count())
                    .ok_or(WizardError::InvalidSlot(number))?;
                let entry = self
                    .slots
                    .get(slot.channel())
                    .cloned()
                    .ok_or(WizardError::InvalidSlot(number))?;
                tracing::info!("Slot {} selected ({})", slot, entry.filament.name);
                self.selection.slot = Some(SlotPick {
                    slot,
                    filament: entry.filament,
                    spool: entry.spool,
                });
                self.forward().await
            }
            (Page::FunctionPick, WizardCommand::SelectOperation(operation)) => {
                tracing::info!("Operation {} selected", operation);
                self.selection.operation = Some(operation);
                self.pages.choose_operation(operation);
                self.forward().await
            }
            (Page::SpoolPick | Page::NozzleHeat, WizardCommand::SelectSpool { spool, skip_change }) => {
                if skip_change {
                    let change = self
                        .coordinator
                        .assign(self.selection.slot(), Some(&spool))
                        .await?;
                    tracing::info!(
                        "Spool {} assigned without changing page",
                        spool.display_name()
                    );
                    self.record_change(&change);
                    self.selection.new_spool = Some(spool);
                    Ok(())
                } else {
                    tracing::info!("New spool selected: {}", spool.display_name());
                    self.selection.new_spool = Some(spool);
                    self.forward().await
                }
            }
            (Page::SpoolPick | Page::NozzleHeat, WizardCommand::HeatNozzle) => {
                let spool = self
                    .selection
                    .new_spool
                    .as_ref()
                    .or_else(|| self.selection.slot.as_ref().and_then(|pick| pick.spool.as_ref()));
                let target = self.gate.wanted_temperature(spool);
                tracing::info!("Heating nozzle to {:.1}°C", target);
                if let Err(e) = self.printer.set_hotend_target(target) {
                    tracing::warn!("Failed to set hotend target: {}", e);
                }
                self.forward().await
            }
            (Page::Operation, WizardCommand::Confirm) => self.drive(Trigger::UserConfirm).await,
            (_, WizardCommand::Back) => {
                if page == Page::Operation {
                    self.end_session();
                }
                let target = self.pages.back();
                self.arrive(target).await
            }
            (_, WizardCommand::Exit) => {
                self.teardown();
                Ok(())
            }
            (page, _) => Err(WizardError::UnexpectedCommand(page)),
        }
    }

    async fn forward(&mut self) -> Result<(), WizardError> {
        let target = self.pages.forward(false);
        self.arrive(target).await
    }

    async fn arrive(&mut self, target: Navigation) -> Result<(), WizardError> {
        match target {
            Navigation::MainScreen => {
                self.teardown();
                Ok(())
            }
            Navigation::Page(page) => {
                self.show_page(page);
                if page == Page::Operation {
                    self.start_operation().await?;
                }
                Ok(())
            }
        }
    }

    async fn start_operation(&mut self) -> Result<(), WizardError> {
        self.generation += 1;
        let session =
            WizardSession::from_selection(self.generation, &self.selection, self.hotend_current_temp)?;
        tracing::info!(
            "Starting {} on slot {} (session {}, generation {})",
            session.operation,
            session.slot,
            session.id,
            session.generation
        );
        let transition = self.machine.enter(session.operation, session);
        self.apply_transition(transition).await
    }

    async fn drive(&mut self, trigger: Trigger) -> Result<(), WizardError> {
        let Some(session) = self.session.take() else {
            return Err(WizardError::UnexpectedCommand(self.pages.page()));
        };
        let transition = self.machine.advance(session, trigger);
        if !transition.moved() {
            self.session = Some(transition.session);
            return Ok(());
        }
        self.apply_transition(transition).await
    }

    /// Shows the stage just entered and carries out its side effect.
    async fn apply_transition(&mut self, transition: Transition) -> Result<(), WizardError> {
        let Transition {
            mut session,
            effect,
            ..
        } = transition;
        self.emit(WizardUpdate::Stage(session.view()));
        match effect {
            Some(SideEffect::ReleaseSpool) => {
                let change = self.coordinator.release(Some(session.slot)).await?;
                self.record_change(&change);
                session = session.with_change(change);
            }
            Some(SideEffect::AssignSpool) => {
                let change = self
                    .coordinator
                    .assign(Some(session.slot), session.new_spool.as_ref())
                    .await?;
                self.record_change(&change);
                session = session.with_change(change);
            }
            Some(SideEffect::Dispatch) => {
                self.dispatcher.dispatch(session.operation, session.slot.channel())
            }
            Some(SideEffect::Complete) => {
                tracing::info!("{} on slot {} complete", session.operation, session.slot);
                self.emit(WizardUpdate::Checkmark {
                    operation: session.operation,
                    slot: session.slot,
                });
                self.schedule(TimerKind::Checkmark, session.generation);
            }
            Some(SideEffect::ReturnToPicker) => {
                tracing::info!("Slot {} has nothing to unload", session.slot);
                self.end_session();
                self.show_page(Page::FunctionPick);
                return Ok(());
            }
            None => {}
        }
        if matches!(session.spec().map(|spec| spec.advance), Some(Advance::Timer { .. })) {
            self.schedule(TimerKind::Stage, session.generation);
        }
        self.session = Some(session);
        Ok(())
    }

    async fn handle_timer(&mut self, fired: TimerFired) -> Result<(), WizardError> {
        if self.finished || self.session.is_none() || fired.generation != self.generation {
            tracing::debug!(
                "Discarding {:?} timer from generation {} (live generation {})",
                fired.kind,
                fired.generation,
                self.generation
            );
            return Err(WizardError::StaleCallback(fired.generation));
        }
        match fired.kind {
            TimerKind::Stage => self.drive(Trigger::TimerElapsed).await,
            TimerKind::Checkmark => {
                self.end_session();
                self.show_page(Page::FunctionPick);
                Ok(())
            }
        }
    }

    fn show_page(&mut self, page: Page) {
        self.pages.set_page(page);
        self.emit(WizardUpdate::Page { page });
    }

    fn schedule(&self, kind: TimerKind, generation: u64) {
        let delay = match kind {
            TimerKind::Stage => self.config.stage_delay(),
            TimerKind::Checkmark => self.config.checkmark_delay(),
        };
        let timer_tx = self.timer_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = timer_tx.send(TimerFired { generation, kind });
        });
    }

    fn record_change(&mut self, change: &SpoolChange) {
        self.selection.apply_change(change);
        if let Some(slot) = self.selection.slot() {
            if let Some(entry) = self.slots.get_mut(slot.channel()) {
                entry.filament = change.filament.clone();
                entry.spool = Some(change.spool.clone());
            }
        }
        self.publish_slots();
    }

    fn end_session(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::info!(
                "Ending {} session {} at stage {}",
                session.operation,
                session.id,
                session.current_stage
            );
        }
        self.generation += 1;
    }

    fn on_error(&mut self, error: &WizardError) {
        match error {
            WizardError::FilamentMutation(_) | WizardError::MissingSelection(_) => {
                tracing::warn!("Aborting wizard: {}", error);
                self.teardown();
            }
            WizardError::StaleCallback(_) => {}
            _ => tracing::warn!("{}", error),
        }
    }

    /// Closes the wizard. Restores the hotend target recorded at start, whatever the reason.
    fn teardown(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.end_session();
        let target = self.pages.previous_hotend_target();
        if let Err(e) = self.printer.set_hotend_target(target) {
            tracing::warn!("Failed to restore hotend target {:.1}°C: {}", target, e);
        }
        tracing::info!("Filament wizard closed");
        self.emit(WizardUpdate::MainScreen);
    }

    fn publish_slots(&self) {
        let slots = self.slots.iter().map(|entry| entry.filament.clone()).collect();
        self.emit(WizardUpdate::Slots { slots });
    }

    fn emit(&self, update: WizardUpdate) {
        // Nobody listening is fine; the wizard keeps running headless.
        let _ = self.updates.send(update);
    }
}
