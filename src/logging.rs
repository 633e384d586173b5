//! Structured logging initialization for DeckPilot.
//!
//! Supports both human-friendly and machine-readable (JSON) output formats,
//! with TTY detection, verbosity control and regex log filter rules.

use std::fmt;
use std::io::{self, IsTerminal};

use regex::{Regex, RegexBuilder};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Metadata, Subscriber};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::format::FmtSpan,
    layer::{Context, Filter, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::error::{DpError, Result};

/// Logging options collected from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct LogSettings {
    /// Emit JSON lines for machine consumption.
    pub robot_mode: bool,
    /// Verbosity level: 0 = info, 1 = debug, 2+ = trace.
    pub verbose: u8,
    /// Only errors.
    pub quiet: bool,
    /// Explicit level name (DEBUG, INFO, WARNING, ERROR), overrides verbosity.
    pub level: Option<String>,
    /// Filter rule specs, ORed together.
    pub filters: Vec<String>,
}

/// Initialize the tracing subscriber.
///
/// # Environment Variables
///
/// * `RUST_LOG` - Override the default filter (e.g., "deckpilot=debug,elgato_streamdeck=warn")
///
/// # Output Behavior
///
/// | Mode | TTY | Output |
/// |------|-----|--------|
/// | Robot | any | JSON lines to stderr |
/// | Human | yes | Pretty colored output to stderr |
/// | Human | no | Compact plain output to stderr |
pub fn init_logging(settings: &LogSettings) -> Result<()> {
    let directive = default_directive(settings)?;
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));
    let rules = LogFilterSet::parse(&settings.filters)?;

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = if settings.robot_mode {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
            .with_thread_ids(false)
            .with_span_events(FmtSpan::NONE)
            .with_writer(io::stderr)
            .boxed()
    } else if io::stderr().is_terminal() {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .with_thread_ids(false)
            .with_span_events(FmtSpan::NONE)
            .with_writer(io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .with_thread_ids(false)
            .with_span_events(FmtSpan::NONE)
            .compact()
            .with_writer(io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(env_filter).with_filter(rules))
        .try_init()
        .map_err(|e| DpError::Other(format!("logging already initialized: {e}")))
}

/// Build the default `EnvFilter` directive from verbosity and level flags.
pub fn default_directive(settings: &LogSettings) -> Result<String> {
    if let Some(level) = &settings.level {
        return Ok(format!("deckpilot={}", parse_level_name(level)?));
    }
    Ok(if settings.quiet {
        "deckpilot=error".to_string()
    } else {
        match settings.verbose {
            0 => "deckpilot=info",
            1 => "deckpilot=debug",
            _ => "deckpilot=trace",
        }
        .to_string()
    })
}

fn parse_level_name(name: &str) -> Result<&'static str> {
    match name.to_ascii_uppercase().as_str() {
        "TRACE" => Ok("trace"),
        "DEBUG" => Ok("debug"),
        "INFO" => Ok("info"),
        "WARN" | "WARNING" => Ok("warn"),
        "ERROR" | "CRITICAL" => Ok("error"),
        _ => Err(DpError::InvalidLogFilter {
            spec: name.to_string(),
            reason: "unknown log level".to_string(),
        }),
    }
}

/// Level names as shown to filter rules.
const fn level_name(level: Level) -> &'static str {
    match level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARNING",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
}

/// Field a filter criterion applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogField {
    Level,
    Source,
    Message,
}

impl LogField {
    fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "type" | "level" | "severity" => Some(Self::Level),
            "source" | "class" | "cls" => Some(Self::Source),
            "message" | "msg" | "text" => Some(Self::Message),
            _ => None,
        }
    }
}

/// A single log record as seen by filter rules.
#[derive(Debug, Clone, Copy)]
pub struct LogRecord<'a> {
    pub level: &'a str,
    pub source: &'a str,
    pub message: &'a str,
}

/// One filter spec such as `type=INFO|WARNING,source=panel.*`.
///
/// All criteria must match.
#[derive(Debug, Clone)]
pub struct LogFilterRule {
    criteria: Vec<(LogField, Regex)>,
}

impl LogFilterRule {
    pub fn parse(spec: &str) -> Result<Self> {
        let invalid = |reason: String| DpError::InvalidLogFilter {
            spec: spec.to_string(),
            reason,
        };

        let mut criteria = Vec::new();
        for part in spec.split([',', ';']) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let Some(split_at) = part.find(['=', ':']) else {
                return Err(invalid(format!("missing value in '{part}'")));
            };
            let (key, value) = (&part[..split_at], part[split_at + 1..].trim());
            let field = LogField::parse(key)
                .ok_or_else(|| invalid(format!("unknown field '{}'", key.trim())))?;
            if value.is_empty() {
                return Err(invalid(format!("missing value for '{}'", key.trim())));
            }
            let regex = RegexBuilder::new(value)
                .case_insensitive(true)
                .build()
                .map_err(|e| invalid(e.to_string()))?;
            criteria.push((field, regex));
        }

        if criteria.is_empty() {
            return Err(invalid("empty filter".to_string()));
        }
        Ok(Self { criteria })
    }

    pub fn matches(&self, record: &LogRecord<'_>) -> bool {
        self.criteria.iter().all(|(field, regex)| {
            let value = match field {
                LogField::Level => record.level,
                LogField::Source => record.source,
                LogField::Message => record.message,
            };
            regex.is_match(value)
        })
    }
}

/// A set of filter rules; a record passes if any rule matches.
///
/// An empty set lets everything through.
#[derive(Debug, Clone, Default)]
pub struct LogFilterSet {
    rules: Vec<LogFilterRule>,
}

impl LogFilterSet {
    pub fn parse<S: AsRef<str>>(specs: &[S]) -> Result<Self> {
        let rules = specs
            .iter()
            .map(|s| LogFilterRule::parse(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn allows(&self, record: &LogRecord<'_>) -> bool {
        self.rules.is_empty() || self.rules.iter().any(|rule| rule.matches(record))
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Filter<S> for LogFilterSet {
    fn enabled(&self, _meta: &Metadata<'_>, _cx: &Context<'_, S>) -> bool {
        true
    }

    fn event_enabled(&self, event: &Event<'_>, _cx: &Context<'_, S>) -> bool {
        if self.rules.is_empty() {
            return true;
        }
        let meta = event.metadata();
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.allows(&LogRecord {
            level: level_name(*meta.level()),
            source: meta.target(),
            message: &visitor.message,
        })
    }
}
