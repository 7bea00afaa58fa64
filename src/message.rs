//! In-memory representation of a single Syslog message.

use crate::facility::Facility;
use crate::severity::Severity;

/// A syslog message.
///
/// Immutable once constructed: fields are read through accessors and the
/// `with_*` methods consume the value and return a new one. The priority is
/// always derived from facility and severity and never stored.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SyslogMessage {
    facility: u32,
    severity: Severity,
    timestamp: String,
    hostname: String,
    app_name: String,
    message: String,
}

impl Default for SyslogMessage {
    fn default() -> Self {
        Self {
            facility: Facility::USER.code(),
            severity: Severity::INFO,
            timestamp: String::new(),
            hostname: String::new(),
            app_name: String::new(),
            message: String::new(),
        }
    }
}

impl SyslogMessage {
    pub fn new(facility: impl Into<u32>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            facility: facility.into(),
            severity,
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    /// Raw facility code, possibly outside the named range.
    pub fn facility(&self) -> u32 {
        self.facility
    }

    pub fn facility_name(&self) -> Option<Facility> {
        Facility::from_code(self.facility)
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// `facility * 8 + severity`
    pub fn priority(&self) -> u64 {
        u64::from(self.facility) * 8 + u64::from(self.severity.code())
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
