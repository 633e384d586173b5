//! Built-in button kinds.

use std::collections::VecDeque;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::Context as _;
use chrono::Local;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::button::{Button, ItemContext};
use super::factory::ButtonSpec;
use crate::comm::{EventData, EventType};
use crate::deck::KeyDisplay;

fn param_str<'a>(spec: &'a ButtonSpec, key: &str) -> Option<&'a str> {
    spec.params.get(key).and_then(Value::as_str)
}

fn param_secs(spec: &ButtonSpec, key: &str) -> Option<u64> {
    spec.params.get(key).and_then(|v| match v {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Shell used to run launch and command-runner commands.
pub fn shell_command(command: &str) -> Command {
    let mut cmd = if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C");
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c");
        cmd
    };
    cmd.arg(command).stdin(Stdio::null());
    cmd
}

/// Spawn `command` without waiting for it. The child is reaped on a helper thread.
pub fn spawn_detached(command: &str) -> anyhow::Result<u32> {
    let mut child = shell_command(command)
        .spawn()
        .with_context(|| format!("failed to spawn `{command}`"))?;
    let pid = child.id();
    std::thread::spawn(move || {
        let _ = child.wait();
    });
    Ok(pid)
}

/// Static caption and icon.
pub struct StaticButton {
    class: String,
    text: Option<String>,
    icon: String,
    icon_pressed: String,
}

impl StaticButton {
    pub fn from_spec(spec: &ButtonSpec) -> Self {
        Self {
            class: spec.class.clone(),
            text: param_str(spec, "text").map(str::to_string),
            icon: spec
                .icon
                .clone()
                .or_else(|| param_str(spec, "icon").map(str::to_string))
                .unwrap_or_else(|| "button_default".to_string()),
            icon_pressed: spec
                .icon_pressed
                .clone()
                .or_else(|| param_str(spec, "icon_pressed").map(str::to_string))
                .unwrap_or_else(|| "default_pressed".to_string()),
        }
    }

    fn caption<'a>(&'a self, ctx: &'a ItemContext<'_>) -> &'a str {
        self.text.as_deref().unwrap_or(ctx.item)
    }
}

impl Button for StaticButton {
    fn class(&self) -> &str {
        &self.class
    }

    fn on_rendered(&mut self, ctx: &mut ItemContext<'_>) -> KeyDisplay {
        KeyDisplay::icon(&self.icon).with_text(self.caption(ctx))
    }

    fn on_pressed(&mut self, ctx: &mut ItemContext<'_>) -> anyhow::Result<Option<KeyDisplay>> {
        Ok(Some(KeyDisplay::icon(&self.icon_pressed).with_text(self.caption(ctx))))
    }
}

/// Sends a message to its siblings when released.
pub struct MessageButton {
    inner: StaticButton,
    message: String,
}

impl MessageButton {
    pub fn from_spec(spec: &ButtonSpec) -> Self {
        Self {
            inner: StaticButton::from_spec(spec),
            message: param_str(spec, "message").unwrap_or("Hello").to_string(),
        }
    }
}

impl Button for MessageButton {
    fn class(&self) -> &str {
        self.inner.class()
    }

    fn on_rendered(&mut self, ctx: &mut ItemContext<'_>) -> KeyDisplay {
        self.inner.on_rendered(ctx)
    }

    fn on_pressed(&mut self, ctx: &mut ItemContext<'_>) -> anyhow::Result<Option<KeyDisplay>> {
        self.inner.on_pressed(ctx)
    }

    fn on_released(&mut self, ctx: &mut ItemContext<'_>) -> anyhow::Result<Option<KeyDisplay>> {
        ctx.dispatch(json!({ "message": self.message }));
        Ok(Some(self.inner.on_rendered(ctx)))
    }

    fn on_dispatch(&mut self, ctx: &mut ItemContext<'_>, source: &str, data: &Value) {
        if let Some(message) = data.get("message").and_then(Value::as_str) {
            info!(item = ctx.item, panel = ctx.panel, source, message, "Message received");
        }
    }
}

/// Runs a shell command on release.
pub struct LaunchButton {
    inner: StaticButton,
    command: String,
}

impl LaunchButton {
    pub fn from_spec(spec: &ButtonSpec) -> anyhow::Result<Self> {
        let command = param_str(spec, "command")
            .filter(|c| !c.trim().is_empty())
            .context("launch button needs a `command` param")?;
        Ok(Self {
            inner: StaticButton::from_spec(spec),
            command: command.to_string(),
        })
    }
}

impl Button for LaunchButton {
    fn class(&self) -> &str {
        self.inner.class()
    }

    fn on_rendered(&mut self, ctx: &mut ItemContext<'_>) -> KeyDisplay {
        self.inner.on_rendered(ctx)
    }

    fn on_pressed(&mut self, ctx: &mut ItemContext<'_>) -> anyhow::Result<Option<KeyDisplay>> {
        self.inner.on_pressed(ctx)
    }

    fn on_released(&mut self, ctx: &mut ItemContext<'_>) -> anyhow::Result<Option<KeyDisplay>> {
        let pid = spawn_detached(&self.command)?;
        info!(item = ctx.item, command = %self.command, pid, "Launched command");
        Ok(Some(self.inner.on_rendered(ctx)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClockMode {
    Hours,
    Minutes,
    Seconds,
}

impl ClockMode {
    const fn pattern(self) -> &'static str {
        match self {
            Self::Hours => "%H:%M",
            Self::Minutes => "%M:%S",
            Self::Seconds => "%S",
        }
    }
}

/// Shows the local time, refreshed on every clock tick.
pub struct ClockButton {
    class: String,
    mode: ClockMode,
}

impl ClockButton {
    pub fn from_spec(spec: &ButtonSpec) -> anyhow::Result<Self> {
        let mode = match param_str(spec, "mode").unwrap_or("hours") {
            "hours" => ClockMode::Hours,
            "minutes" => ClockMode::Minutes,
            "seconds" => ClockMode::Seconds,
            other => anyhow::bail!("unknown clock mode `{other}`"),
        };
        Ok(Self {
            class: spec.class.clone(),
            mode,
        })
    }

    fn now(&self) -> KeyDisplay {
        KeyDisplay::label(Local::now().format(self.mode.pattern()).to_string())
    }
}

impl Button for ClockButton {
    fn class(&self) -> &str {
        &self.class
    }

    fn on_rendered(&mut self, _ctx: &mut ItemContext<'_>) -> KeyDisplay {
        self.now()
    }

    fn on_pressed(&mut self, _ctx: &mut ItemContext<'_>) -> anyhow::Result<Option<KeyDisplay>> {
        Ok(None)
    }

    fn on_tick(&mut self, _ctx: &mut ItemContext<'_>, _time_i: u64, _time_count: u64) -> Option<KeyDisplay> {
        Some(self.now())
    }
}

/// `MM:SS`, with minutes allowed past 59.
fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Counts down once started by a dispatch or a release.
///
/// A `start` that arrives while running is queued and begins when the
/// current run ends or is stopped.
pub struct CountdownButton {
    class: String,
    duration: Duration,
    remaining: Duration,
    deadline: Option<Instant>,
    queue: VecDeque<Duration>,
}

impl CountdownButton {
    pub fn from_spec(spec: &ButtonSpec) -> Self {
        let duration = Duration::from_secs(param_secs(spec, "duration").unwrap_or(60));
        Self {
            class: spec.class.clone(),
            duration,
            remaining: duration,
            deadline: None,
            queue: VecDeque::new(),
        }
    }

    pub const fn is_running(&self) -> bool {
        self.deadline.is_some()
    }

    /// Runs waiting behind the current one.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    fn start(&mut self, duration: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(duration) else {
            return false;
        };
        self.remaining = duration;
        self.deadline = Some(deadline);
        true
    }

    /// Start the next queued run, if any.
    fn advance(&mut self) -> bool {
        match self.queue.pop_front() {
            Some(next) => self.start(next),
            None => false,
        }
    }

    fn stop(&mut self) {
        if let Some(deadline) = self.deadline.take() {
            self.remaining = deadline.saturating_duration_since(Instant::now());
        }
    }

    fn display(&self) -> KeyDisplay {
        let mut display = KeyDisplay::label(format_remaining(self.remaining));
        if self.is_running() {
            display = display.with_background(image::Rgb([0, 60, 140]));
        }
        if let Some(next) = self.queue.front() {
            display = display.with_text(format!("next {}", format_remaining(*next)));
        }
        display
    }
}

impl Button for CountdownButton {
    fn class(&self) -> &str {
        &self.class
    }

    fn on_rendered(&mut self, _ctx: &mut ItemContext<'_>) -> KeyDisplay {
        self.display()
    }

    fn on_pressed(&mut self, _ctx: &mut ItemContext<'_>) -> anyhow::Result<Option<KeyDisplay>> {
        Ok(None)
    }

    fn on_released(&mut self, ctx: &mut ItemContext<'_>) -> anyhow::Result<Option<KeyDisplay>> {
        if self.is_running() {
            self.stop();
        } else if !self.start(self.duration) {
            warn!(item = ctx.item, secs = self.duration.as_secs(), "Countdown duration is out of range");
        }
        info!(item = ctx.item, running = self.is_running(), "Countdown toggled");
        Ok(Some(self.display()))
    }

    fn on_tick(&mut self, ctx: &mut ItemContext<'_>, _time_i: u64, _time_count: u64) -> Option<KeyDisplay> {
        if let Some(deadline) = self.deadline {
            self.remaining = deadline.saturating_duration_since(Instant::now());
            if self.remaining.is_zero() {
                self.deadline = None;
                info!(item = ctx.item, "Countdown finished");
                ctx.publish(
                    EventType::custom("countdown_finished"),
                    EventData::Item {
                        panel: ctx.panel.to_string(),
                        item: ctx.item.to_string(),
                        key: ctx.key.unwrap_or_default(),
                    },
                );
                if self.advance() {
                    info!(item = ctx.item, left = self.queue.len(), "Next queued countdown started");
                }
            }
        }
        Some(self.display())
    }

    fn on_dispatch(&mut self, ctx: &mut ItemContext<'_>, source: &str, data: &Value) {
        let Some(action) = data.get("action").and_then(Value::as_str) else {
            return;
        };
        let duration = data
            .get("duration")
            .and_then(Value::as_u64)
            .map_or(self.duration, Duration::from_secs);
        let accepted = match action {
            "start" if self.is_running() => {
                self.queue.push_back(duration);
                true
            }
            "start" => self.start(duration),
            "stop" => {
                self.stop();
                self.advance();
                true
            }
            "clear" => {
                self.queue.clear();
                self.stop();
                true
            }
            "restart" => {
                self.duration = duration;
                self.start(duration)
            }
            other => {
                warn!(item = ctx.item, source, action = other, "Unknown countdown action");
                return;
            }
        };
        if !accepted {
            warn!(item = ctx.item, source, action, secs = duration.as_secs(), "Countdown duration is out of range");
            return;
        }
        info!(item = ctx.item, source, action, secs = duration.as_secs(), "Countdown updated");
    }
}

/// Caption for a timer preset: `HHhMM` from one hour up, else `MMm`.
fn format_preset(secs: u64) -> String {
    if secs >= 3600 {
        format!("{:02}h{:02}", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{:02}m", secs / 60)
    }
}

/// Starts sibling countdowns with a preset duration.
pub struct TimerStartButton {
    class: String,
    duration: u64,
    icon: String,
}

impl TimerStartButton {
    pub fn from_spec(spec: &ButtonSpec) -> anyhow::Result<Self> {
        let duration = param_secs(spec, "duration").context("timer_start button needs a `duration` param")?;
        Ok(Self {
            class: spec.class.clone(),
            duration,
            icon: spec.icon.clone().unwrap_or_else(|| "button_default".to_string()),
        })
    }
}

impl Button for TimerStartButton {
    fn class(&self) -> &str {
        &self.class
    }

    fn on_rendered(&mut self, _ctx: &mut ItemContext<'_>) -> KeyDisplay {
        KeyDisplay::icon(&self.icon).with_text(format_preset(self.duration))
    }

    fn on_released(&mut self, ctx: &mut ItemContext<'_>) -> anyhow::Result<Option<KeyDisplay>> {
        ctx.dispatch(json!({ "action": "start", "duration": self.duration }));
        Ok(Some(self.on_rendered(ctx)))
    }
}

/// Publishes a custom event on release.
pub struct EventButton {
    inner: StaticButton,
    topic: EventType,
    payload: Value,
}

impl EventButton {
    pub fn from_spec(spec: &ButtonSpec) -> anyhow::Result<Self> {
        let topic = param_str(spec, "topic")
            .or_else(|| param_str(spec, "event"))
            .filter(|t| !t.trim().is_empty())
            .context("event button needs a `topic` param")?;
        Ok(Self {
            inner: StaticButton::from_spec(spec),
            topic: match topic.parse::<EventType>() {
                Ok(topic) => topic,
                Err(never) => match never {},
            },
            payload: spec.params.get("payload").cloned().unwrap_or(Value::Null),
        })
    }
}

impl Button for EventButton {
    fn class(&self) -> &str {
        self.inner.class()
    }

    fn on_rendered(&mut self, ctx: &mut ItemContext<'_>) -> KeyDisplay {
        self.inner.on_rendered(ctx)
    }

    fn on_pressed(&mut self, ctx: &mut ItemContext<'_>) -> anyhow::Result<Option<KeyDisplay>> {
        self.inner.on_pressed(ctx)
    }

    fn on_released(&mut self, ctx: &mut ItemContext<'_>) -> anyhow::Result<Option<KeyDisplay>> {
        let delivered = ctx.publish(self.topic.clone(), EventData::Payload {
            value: self.payload.clone(),
        });
        info!(item = ctx.item, topic = %self.topic, delivered, "Event button fired");
        Ok(Some(self.inner.on_rendered(ctx)))
    }
}
