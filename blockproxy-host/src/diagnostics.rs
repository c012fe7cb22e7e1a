//! Diagnostics sink.
//!
//! Every recoverable failure inside the proxy is reported here instead of
//! being returned to the caller. Production code uses [`TracingDiagnostics`];
//! [`RecordingDiagnostics`] keeps events in memory so callers can inspect them.

use std::fmt;
use std::sync::Mutex;

/// Severity of a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// A structured diagnostic: which step failed, for which target, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticEvent {
    pub operation: &'static str,
    pub target_id: Option<String>,
    /// Context slot or source id involved, when there is one.
    pub context: Option<String>,
    pub message: String,
}

impl DiagnosticEvent {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            target_id: None,
            context: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_target(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.operation)?;
        if let Some(target) = &self.target_id {
            write!(f, " target={target}")?;
        }
        if let Some(context) = &self.context {
            write!(f, " context={context}")?;
        }
        write!(f, " {}", self.message)
    }
}

pub trait Diagnostics: Send + Sync {
    fn record(&self, level: Level, event: &DiagnosticEvent);

    fn debug(&self, event: DiagnosticEvent) {
        self.record(Level::Debug, &event);
    }

    fn info(&self, event: DiagnosticEvent) {
        self.record(Level::Info, &event);
    }

    fn warn(&self, event: DiagnosticEvent) {
        self.record(Level::Warn, &event);
    }

    fn error(&self, event: DiagnosticEvent) {
        self.record(Level::Error, &event);
    }
}

/// Emits events through `tracing` with structured fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn record(&self, level: Level, event: &DiagnosticEvent) {
        let target_id = event.target_id.as_deref().unwrap_or("");
        let context = event.context.as_deref().unwrap_or("");
        match level {
            Level::Debug => tracing::debug!(
                operation = event.operation,
                target_id,
                context,
                "{}",
                event.message
            ),
            Level::Info => tracing::info!(
                operation = event.operation,
                target_id,
                context,
                "{}",
                event.message
            ),
            Level::Warn => tracing::warn!(
                operation = event.operation,
                target_id,
                context,
                "{}",
                event.message
            ),
            Level::Error => tracing::error!(
                operation = event.operation,
                target_id,
                context,
                "{}",
                event.message
            ),
        }
    }
}

/// Keeps every event in memory, optionally forwarding to another sink.
#[derive(Default)]
pub struct RecordingDiagnostics {
    events: Mutex<Vec<(Level, DiagnosticEvent)>>,
    forward: Option<Box<dyn Diagnostics>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records and also passes every event on to `sink`.
    pub fn forwarding_to(sink: impl Diagnostics + 'static) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            forward: Some(Box::new(sink)),
        }
    }

    pub fn events(&self) -> Vec<(Level, DiagnosticEvent)> {
        self.lock().clone()
    }

    /// Events recorded at exactly `level`.
    pub fn at(&self, level: Level) -> Vec<DiagnosticEvent> {
        self.lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, e)| e.clone())
            .collect()
    }

    pub fn count(&self, level: Level) -> usize {
        self.lock().iter().filter(|(l, _)| *l == level).count()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(Level, DiagnosticEvent)>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn record(&self, level: Level, event: &DiagnosticEvent) {
        self.lock().push((level, event.clone()));
        if let Some(sink) = &self.forward {
            sink.record(level, event);
        }
    }
}

impl fmt::Debug for RecordingDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingDiagnostics")
            .field("events", &self.lock().len())
            .field("forwarding", &self.forward.is_some())
            .finish()
    }
}
