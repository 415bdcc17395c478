//! Simulated printer and filament manager.
//!
//! These stand in for the real collaborators when the wizard runs from the command line and in
//! the test suite. The printer consumes `PrinterRequest`s and models the hotend temperature; the
//! filament manager keeps a spool inventory and per-channel assignment in memory.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};

use crate::hardware::{FilamentError, FilamentSource, PrinterRequest};
use crate::models::{FilamentState, Spool, TemperatureSample};

/// Channels a simulated MMU accepts assignments for.
pub const DEFAULT_CHANNELS: usize = 5;

/// First-order hotend model: approaches the target (or ambient when off) at a fixed rate.
#[derive(Debug, Clone, PartialEq)]
pub struct HotendModel {
    pub current: f64,
    pub target: f64,
    pub ambient: f64,
    /// Fraction of the remaining gap closed per second.
    pub response: f64,
}

impl HotendModel {
    pub fn new(ambient: f64, target: f64) -> Self {
        Self {
            current: ambient,
            target,
            ambient,
            response: 0.35,
        }
    }

    pub fn step(&mut self, dt: f64) {
        let goal = if self.target > 0.0 { self.target } else { self.ambient };
        let factor = (self.response * dt).min(1.0);
        self.current += (goal - self.current) * factor;
    }

    pub fn sample(&self) -> TemperatureSample {
        TemperatureSample {
            current: self.current,
            target: self.target,
        }
    }
}

/// Printer task that executes wizard requests against a simulated hotend.
pub struct SimulatedPrinter {
    requests: mpsc::UnboundedReceiver<PrinterRequest>,
    temperature_tx: watch::Sender<TemperatureSample>,
    hotend: HotendModel,
    history: Arc<Mutex<Vec<PrinterRequest>>>,
}

impl SimulatedPrinter {
    pub fn new(
        requests: mpsc::UnboundedReceiver<PrinterRequest>,
        hotend: HotendModel,
    ) -> (Self, watch::Receiver<TemperatureSample>) {
        let (temperature_tx, temperature_rx) = watch::channel(hotend.sample());
        let printer = Self {
            requests,
            temperature_tx,
            hotend,
            history: Arc::new(Mutex::new(Vec::new())),
        };
        (printer, temperature_rx)
    }

    /// Every request received so far, in arrival order.
    pub fn history(&self) -> Arc<Mutex<Vec<PrinterRequest>>> {
        self.history.clone()
    }

    pub fn hotend(&self) -> &HotendModel {
        &self.hotend
    }

    pub fn handle(&mut self, request: PrinterRequest) {
        match &request {
            PrinterRequest::ExecuteGcode { command } => {
                tracing::info!("Printer <- {}", command);
            }
            PrinterRequest::SetHotendTarget { temperature } => {
                tracing::info!("Setting hotend target: {:.1}°C", temperature);
                self.hotend.target = *temperature;
            }
        }
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        self.publish();
    }

    pub fn tick(&mut self, dt: Duration) {
        self.hotend.step(dt.as_secs_f64());
        self.publish();
    }

    fn publish(&self) {
        // No receivers left just means nobody is watching the temperature any more.
        let _ = self.temperature_tx.send(self.hotend.sample());
    }

    /// Serves requests and advances the hotend model until shutdown or until every sender is gone.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        let period = Duration::from_millis(100);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Simulated printer shutting down");
                    break;
                }
                request = self.requests.recv() => match request {
                    Some(request) => self.handle(request),
                    None => break,
                },
                _ = interval.tick() => self.tick(period),
            }
        }
    }
}

#[derive(Debug, Default)]
struct ManagerState {
    inventory: Vec<Spool>,
    loaded: Vec<i64>,
    selected: Option<usize>,
}

/// In-memory filament manager with failure injection.
#[derive(Debug)]
pub struct SimulatedFilamentManager {
    state: Mutex<ManagerState>,
    channels: usize,
    failing: AtomicBool,
    mutations: AtomicUsize,
}

impl SimulatedFilamentManager {
    /// `loaded[channel]` is the spool id in that channel, `-1` for empty.
    pub fn new(inventory: Vec<Spool>, loaded: Vec<i64>) -> Self {
        Self {
            channels: DEFAULT_CHANNELS.max(loaded.len()),
            state: Mutex::new(ManagerState {
                inventory,
                loaded,
                selected: None,
            }),
            failing: AtomicBool::new(false),
            mutations: AtomicUsize::new(0),
        }
    }

    /// Makes every subsequent request fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Assignment attempts seen so far, failed ones included.
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    /// Spool id loaded in `channel`, if any.
    pub fn loaded_spool(&self, channel: usize) -> Option<i64> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.loaded.get(channel).copied().filter(|id| *id > -1)
    }

    /// Channel of the last filament select request.
    pub fn selected_channel(&self) -> Option<usize> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).selected
    }

    fn check_available(&self) -> Result<(), FilamentError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(FilamentError::Rejected("simulated failure".to_string()));
        }
        Ok(())
    }

    fn spools_by_channel(&self) -> Vec<Spool> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .loaded
            .iter()
            .map(|id| {
                state
                    .inventory
                    .iter()
                    .find(|spool| spool.id == *id && spool.is_loaded())
                    .cloned()
                    .unwrap_or_else(Spool::unloaded)
            })
            .collect()
    }
}

#[async_trait]
impl FilamentSource for SimulatedFilamentManager {
    async fn list_filaments(&self) -> Result<Vec<FilamentState>, FilamentError> {
        self.check_available()?;
        Ok(self
            .spools_by_channel()
            .iter()
            .enumerate()
            .map(|(channel, spool)| FilamentState::from_spool(channel as u32 + 1, spool))
            .collect())
    }

    async fn list_spools(&self) -> Result<Vec<Spool>, FilamentError> {
        self.check_available()?;
        Ok(self.spools_by_channel())
    }

    async fn set_spool_at_channel(&self, spool: &Spool, channel: usize) -> Result<(), FilamentError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        if channel >= self.channels {
            return Err(FilamentError::ChannelOutOfRange(channel));
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if spool.is_loaded() && !state.inventory.iter().any(|s| s.id == spool.id) {
            state.inventory.push(spool.clone());
        }
        if state.loaded.len() <= channel {
            state.loaded.resize(channel + 1, -1);
        }
        state.loaded[channel] = spool.id;
        tracing::debug!("Filament manager: channel {} now holds spool {}", channel, spool.id);
        Ok(())
    }

    async fn select_filament(&self, channel: usize) -> Result<(), FilamentError> {
        self.check_available()?;
        if channel >= self.channels {
            return Err(FilamentError::ChannelOutOfRange(channel));
        }
        self.state.lock().unwrap_or_else(PoisonError::into_inner).selected = Some(channel);
        tracing::debug!("Filament manager: channel {} selected", channel);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hotend_model_heats_toward_target_and_cools_when_off() {
        let mut hotend = HotendModel::new(25.0, 215.0);
        for _ in 0..200 {
            hotend.step(0.1);
        }
        assert!(hotend.current > 200.0 && hotend.current <= 215.0);
        hotend.target = 0.0;
        for _ in 0..200 {
            hotend.step(0.1);
        }
        assert!(hotend.current < 40.0);
    }

    #[test]
    fn test_printer_records_requests_and_publishes_target() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let (mut printer, temperature_rx) = SimulatedPrinter::new(rx, HotendModel::new(25.0, 0.0));
        printer.handle(PrinterRequest::SetHotendTarget { temperature: 230.0 });
        printer.handle(PrinterRequest::ExecuteGcode { command: "M702".to_string() });
        assert_eq!(temperature_rx.borrow().target, 230.0);
        assert_eq!(printer.history().lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (printer, _temperature_rx) = SimulatedPrinter::new(rx, HotendModel::new(25.0, 0.0));
        let history = printer.history();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(printer.run(shutdown_rx));
        tx.send(PrinterRequest::ExecuteGcode { command: "M704 P0".to_string() }).unwrap();
        tokio::task::yield_now().await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
        assert_eq!(
            history.lock().unwrap().as_slice(),
            &[PrinterRequest::ExecuteGcode { command: "M704 P0".to_string() }]
        );
    }

    #[tokio::test]
    async fn test_manager_rejects_unknown_channel() {
        let manager = SimulatedFilamentManager::new(Vec::new(), Vec::new());
        let err = manager
            .set_spool_at_channel(&Spool::unloaded(), DEFAULT_CHANNELS)
            .await
            .unwrap_err();
        assert!(matches!(err, FilamentError::ChannelOutOfRange(5)));
    }
}
