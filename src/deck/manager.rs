//! The deck main loop.
//!
//! A blocking reader thread turns device key states into [`DeckInput::Key`]
//! messages; the async loop multiplexes those with the clock tickers, external
//! commands and ctrl-c, and drives the [`PanelRegistry`] from a single task.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::comm::server::{self, CommandRequest};
use crate::comm::{Event, EventBus, EventType};
use crate::device::{KeyStateTracker, SharedDeck, check_key};
use crate::error::{DpError, Result};
use crate::panel::PanelRegistry;

const SOURCE: &str = "deck_manager";

/// Messages the main loop reacts to.
#[derive(Debug)]
pub enum DeckInput {
    /// A key changed state.
    Key { key: u8, pressed: bool },
    /// A command from the external socket or a [`DeckHandle`].
    Command(CommandRequest),
    /// The reader lost the device.
    Disconnected,
    Shutdown,
}

/// Cloneable way to talk to a running [`DeckManager`].
#[derive(Debug, Clone)]
pub struct DeckHandle {
    tx: mpsc::UnboundedSender<DeckInput>,
}

impl DeckHandle {
    fn send(&self, input: DeckInput) -> bool {
        self.tx.send(input).is_ok()
    }

    pub fn press(&self, key: u8) -> bool {
        self.send(DeckInput::Key { key, pressed: true })
    }

    pub fn release(&self, key: u8) -> bool {
        self.send(DeckInput::Key { key, pressed: false })
    }

    /// Press `key` now and release it after `duration`.
    pub fn push(&self, key: u32, duration: Duration) -> oneshot::Receiver<std::result::Result<(), String>> {
        let (reply, outcome) = oneshot::channel();
        self.send(DeckInput::Command(CommandRequest::Push { key, duration, reply }));
        outcome
    }

    pub fn shutdown(&self) -> bool {
        self.send(DeckInput::Shutdown)
    }
}

/// Where the external command server listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandAddr {
    pub host: String,
    pub port: u16,
}

/// Loop settings.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Visible clock period, `Duration::ZERO` disables it.
    pub clock_tick_interval: Duration,
    /// Hidden clock period, `Duration::ZERO` disables it.
    pub hidden_clock_tick_interval: Duration,
    pub command_server: Option<CommandAddr>,
    /// How long the reader waits for input before checking for shutdown.
    pub poll_timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            clock_tick_interval: Duration::from_secs(2),
            hidden_clock_tick_interval: Duration::from_secs(1),
            command_server: None,
            poll_timeout: Duration::from_millis(50),
        }
    }
}

/// Owns the device session and runs the main loop.
pub struct DeckManager {
    device: SharedDeck,
    bus: EventBus,
    brightness: u8,
    tx: mpsc::UnboundedSender<DeckInput>,
    rx: Option<mpsc::UnboundedReceiver<DeckInput>>,
    started: Instant,
    clock_ticks: u64,
    hidden_ticks: u64,
    pending_releases: Vec<(Instant, u8)>,
}

impl DeckManager {
    pub fn new(device: SharedDeck, bus: EventBus, brightness: u8) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            device,
            bus,
            brightness,
            tx,
            rx: Some(rx),
            started: Instant::now(),
            clock_ticks: 0,
            hidden_ticks: 0,
            pending_releases: Vec::new(),
        }
    }

    pub fn handle(&self) -> DeckHandle {
        DeckHandle { tx: self.tx.clone() }
    }

    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub const fn device(&self) -> &SharedDeck {
        &self.device
    }

    /// Reset the deck, apply brightness, announce readiness and draw the tree.
    #[instrument(skip_all, fields(serial = %self.device.serial()))]
    pub fn initialize(&mut self, registry: &mut PanelRegistry) -> Result<()> {
        registry.renderer().reset_deck()?;
        self.device.set_brightness(self.brightness)?;
        self.started = Instant::now();
        self.bus
            .publish(&Event::signal(EventType::Initialized).from_source(SOURCE));
        registry.render();
        info!(brightness = self.brightness, "Deck initialized");
        Ok(())
    }

    /// Run until ctrl-c, [`DeckHandle::shutdown`] or device loss.
    #[instrument(skip_all, fields(serial = %self.device.serial()))]
    pub async fn run(mut self, mut registry: PanelRegistry, options: RunOptions) -> Result<()> {
        let mut inputs = self
            .rx
            .take()
            .ok_or_else(|| DpError::Other("deck manager already ran".to_string()))?;
        self.initialize(&mut registry)?;

        let stop = Arc::new(AtomicBool::new(false));
        let reader = spawn_reader(
            Arc::clone(&self.device),
            self.tx.clone(),
            Arc::clone(&stop),
            options.poll_timeout,
        )?;

        let (command_tx, mut commands) = mpsc::channel(16);
        let server = match &options.command_server {
            Some(addr) => match server::bind(&addr.host, addr.port).await {
                Ok(listener) => Some(tokio::spawn(server::serve(listener, command_tx))),
                Err(e) => {
                    error!(error = %e, "External commands disabled");
                    None
                }
            },
            None => None,
        };
        let commands_enabled = server.is_some();

        let mut clock = ticker(options.clock_tick_interval);
        let mut hidden = ticker(options.hidden_clock_tick_interval);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        info!("Deck loop running");
        loop {
            let next_release = self.pending_releases.iter().map(|(at, _)| *at).min();
            tokio::select! {
                input = inputs.recv() => {
                    let Some(input) = input else { break };
                    if self.handle_input(&mut registry, input).is_break() {
                        break;
                    }
                }
                Some(request) = commands.recv(), if commands_enabled => {
                    let _ = self.handle_input(&mut registry, DeckInput::Command(request));
                }
                _ = tick(&mut clock) => self.clock_tick(&mut registry),
                _ = tick(&mut hidden) => self.hidden_tick(&mut registry),
                () = sleep_until(next_release) => self.release_due(&mut registry, Instant::now()),
                _ = &mut ctrl_c => {
                    info!("Interrupted");
                    break;
                }
            }
        }

        self.shutdown(&mut registry);
        stop.store(true, Ordering::SeqCst);
        if let Some(server) = server {
            server.abort();
        }
        if tokio::task::spawn_blocking(move || reader.join()).await.is_err() {
            warn!("Reader thread did not stop cleanly");
        }
        Ok(())
    }

    /// React to one input. Breaks when the loop should stop.
    pub fn handle_input(&mut self, registry: &mut PanelRegistry, input: DeckInput) -> ControlFlow<()> {
        match input {
            DeckInput::Key { key, pressed } => self.key_event(registry, key, pressed),
            DeckInput::Command(CommandRequest::Push { key, duration, reply }) => {
                let outcome = self.push(registry, key, duration);
                if let Err(reason) = &outcome {
                    warn!(key, reason = %reason, "Push refused");
                }
                let _ = reply.send(outcome);
            }
            DeckInput::Disconnected => {
                warn!(serial = %self.device.serial(), "Device disconnected");
                return ControlFlow::Break(());
            }
            DeckInput::Shutdown => {
                info!("Shutdown requested");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn key_event(&self, registry: &mut PanelRegistry, key: u8, pressed: bool) {
        debug!(key, pressed, "Key event");
        let changed = Event::key(EventType::KeyChanged, key, pressed).from_source(SOURCE);
        self.bus.publish(&changed);
        let topic = if pressed {
            EventType::KeyPressed
        } else {
            EventType::KeyReleased
        };
        self.bus.publish(&Event::key(topic, key, pressed).from_source(SOURCE));
        registry.handle_key(key, pressed);
    }

    fn push(&mut self, registry: &mut PanelRegistry, key: u32, duration: Duration) -> std::result::Result<(), String> {
        let key = usize::try_from(key).map_err(|e| e.to_string())?;
        let key = check_key(self.device.info(), key).map_err(|e| e.to_string())?;
        let release_at = Instant::now()
            .checked_add(duration)
            .ok_or_else(|| format!("duration of {}s is too long", duration.as_secs()))?;
        info!(key, secs = duration.as_secs_f64(), "Push command");
        self.key_event(registry, key, true);
        self.pending_releases.push((release_at, key));
        Ok(())
    }

    /// Release pushed keys whose deadline passed.
    pub fn release_due(&mut self, registry: &mut PanelRegistry, now: Instant) {
        let (due, later): (Vec<_>, Vec<_>) = self.pending_releases.drain(..).partition(|(at, _)| *at <= now);
        self.pending_releases = later;
        for (_, key) in due {
            self.key_event(registry, key, false);
        }
    }

    pub fn clock_tick(&mut self, registry: &mut PanelRegistry) {
        let (time_i, time_count) = (self.clock_ticks, self.started.elapsed().as_secs());
        self.clock_ticks += 1;
        trace!(time_i, time_count, "Clock tick");
        self.bus
            .publish(&Event::tick(EventType::ClockTick, time_i, time_count).from_source(SOURCE));
        registry.tick(time_i, time_count);
    }

    pub fn hidden_tick(&mut self, registry: &mut PanelRegistry) {
        let (time_i, time_count) = (self.hidden_ticks, self.started.elapsed().as_secs());
        self.hidden_ticks += 1;
        self.bus.publish(
            &Event::tick(EventType::InternalClockTick, time_i, time_count).from_source(SOURCE),
        );
        registry.internal_tick(time_i, time_count);
    }

    /// Announce exit and leave the deck blank.
    pub fn shutdown(&mut self, registry: &mut PanelRegistry) {
        self.bus.publish(&Event::signal(EventType::Exit).from_source(SOURCE));
        self.pending_releases.clear();
        if let Err(e) = registry.renderer().reset_deck() {
            warn!(error = %e, "Failed to reset deck on shutdown");
        }
        info!("Deck loop stopped");
    }
}

fn ticker(period: Duration) -> Option<Interval> {
    if period.is_zero() {
        return None;
    }
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(interval)
}

async fn tick(interval: &mut Option<Interval>) -> Instant {
    match interval {
        Some(interval) => interval.tick().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Poll the device on a dedicated thread and forward key transitions.
fn spawn_reader(
    device: SharedDeck,
    tx: mpsc::UnboundedSender<DeckInput>,
    stop: Arc<AtomicBool>,
    poll_timeout: Duration,
) -> Result<JoinHandle<()>> {
    let name = format!("deck-reader-{}", device.serial());
    std::thread::Builder::new()
        .name(name)
        .spawn(move || {
            let mut tracker = KeyStateTracker::new(device.key_count());
            while !stop.load(Ordering::SeqCst) {
                match device.read_key_states(poll_timeout) {
                    Ok(Some(states)) => {
                        for event in tracker.update(&states) {
                            let input = DeckInput::Key {
                                key: event.key,
                                pressed: event.pressed,
                            };
                            if tx.send(input).is_err() {
                                return;
                            }
                        }
                    }
                    Ok(None) => {}
                    Err(e) if !device.is_connected() || matches!(e, DpError::DeviceClosed { .. }) => {
                        if !stop.load(Ordering::SeqCst) {
                            warn!(error = %e, "Reader lost the device");
                            let _ = tx.send(DeckInput::Disconnected);
                        }
                        return;
                    }
                    Err(e) => {
                        warn!(error = %e, "Read failed");
                        std::thread::sleep(poll_timeout);
                    }
                }
            }
            debug!("Reader stopped");
        })
        .map_err(DpError::from)
}
