//! Diagnostics
//!
//! Build stages report through a sink handed to them by the caller instead of
//! a process-wide log category.

/// Severity of a diagnostic message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Informational progress message
    Log,
    /// Recoverable problem, the build continues
    Warning,
    /// The current operation failed
    Error,
}

/// Sink for messages emitted by the build pipeline
pub trait Diagnostics {
    /// Informational message
    fn log(&mut self, message: &str);

    /// Recoverable problem
    fn warn(&mut self, message: &str);

    /// Failure
    fn error(&mut self, message: &str);

    /// Dispatch on severity
    fn emit(&mut self, severity: Severity, message: &str) {
        match severity {
            Severity::Log => self.log(message),
            Severity::Warning => self.warn(message),
            Severity::Error => self.error(message),
        }
    }
}

/// Forwards every message to the `log` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn log(&mut self, message: &str) {
        log::info!(target: "kiln", "{}", message);
    }

    fn warn(&mut self, message: &str) {
        log::warn!(target: "kiln", "{}", message);
    }

    fn error(&mut self, message: &str) {
        log::error!(target: "kiln", "{}", message);
    }
}

/// Keeps every message in memory
#[derive(Debug, Clone, Default)]
pub struct CollectingDiagnostics {
    /// Messages in emission order
    pub messages: Vec<(Severity, String)>,
}

impl CollectingDiagnostics {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages of one severity
    pub fn of(&self, severity: Severity) -> impl Iterator<Item = &str> {
        self.messages
            .iter()
            .filter(move |(s, _)| *s == severity)
            .map(|(_, m)| m.as_str())
    }

    /// Number of warnings recorded
    pub fn warning_count(&self) -> usize {
        self.of(Severity::Warning).count()
    }

    /// Number of errors recorded
    pub fn error_count(&self) -> usize {
        self.of(Severity::Error).count()
    }
}

impl Diagnostics for CollectingDiagnostics {
    fn log(&mut self, message: &str) {
        self.messages.push((Severity::Log, message.to_string()));
    }

    fn warn(&mut self, message: &str) {
        self.messages.push((Severity::Warning, message.to_string()));
    }

    fn error(&mut self, message: &str) {
        self.messages.push((Severity::Error, message.to_string()));
    }
}
