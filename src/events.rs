//! Collaborator interfaces: result notifications and data export
use super::dashboard::DashboardSnapshot;
use super::error::ValidationError;
use parking_lot::Mutex;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Csv,
    Png,
    Pdf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLevel {
    Success,
    Failure,
    Info,
}

/// Discrete outcome of a confirm, discard or export call, for the
/// presentation layer to surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardEvent {
    Confirmed { entries: usize },
    ConfirmRejected { message: String },
    Discarded,
    ExportDispatched { format: ExportFormat },
    ExportFailed { format: ExportFormat, message: String },
}

/// Receives result events. Called synchronously, in operation order.
pub trait Notifier: Send {
    fn notify(&mut self, event: DashboardEvent);
}

/// Encodes and delivers an export. The dashboard only hands over the
/// requested format and a frozen snapshot.
pub trait Exporter: Send {
    fn export(&mut self, format: ExportFormat, snapshot: &DashboardSnapshot) -> anyhow::Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

/// Keeps every event in a shared buffer. Clones observe the same buffer.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<DashboardEvent>>>,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Png => "png",
            ExportFormat::Pdf => "pdf",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "png" => Ok(ExportFormat::Png),
            "pdf" => Ok(ExportFormat::Pdf),
            _ => Err(ValidationError::UnknownFormat(s.to_string())),
        }
    }
}

impl DashboardEvent {
    pub fn level(&self) -> EventLevel {
        match self {
            DashboardEvent::Confirmed { .. } | DashboardEvent::ExportDispatched { .. } => {
                EventLevel::Success
            }
            DashboardEvent::ConfirmRejected { .. } | DashboardEvent::ExportFailed { .. } => {
                EventLevel::Failure
            }
            DashboardEvent::Discarded => EventLevel::Info,
        }
    }
}

impl fmt::Display for DashboardEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DashboardEvent::Confirmed { .. } => f.write_str("Changes saved successfully"),
            DashboardEvent::ConfirmRejected { message } => f.write_str(message),
            DashboardEvent::Discarded => f.write_str("Changes discarded"),
            DashboardEvent::ExportDispatched { format } => {
                write!(f, "Exporting data as {}...", format.as_str().to_uppercase())
            }
            DashboardEvent::ExportFailed { format, message } => {
                write!(f, "Export as {} failed: {message}", format.as_str().to_uppercase())
            }
        }
    }
}

impl Notifier for NoopNotifier {
    fn notify(&mut self, _: DashboardEvent) {}
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn events(&self) -> Vec<DashboardEvent> {
        self.events.lock().clone()
    }
    pub fn last(&self) -> Option<DashboardEvent> {
        self.events.lock().last().cloned()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&mut self, event: DashboardEvent) {
        self.events.lock().push(event);
    }
}

impl<F> Exporter for F
where
    F: FnMut(ExportFormat, &DashboardSnapshot) -> anyhow::Result<()> + Send,
{
    fn export(&mut self, format: ExportFormat, snapshot: &DashboardSnapshot) -> anyhow::Result<()> {
        self(format, snapshot)
    }
}
