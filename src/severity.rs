use std::fmt::Display;
use std::str::FromStr;

use crate::Error;

/// Syslog Severities from RFC 5424. Lower is more severe.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[allow(non_camel_case_types)]
pub enum Severity {
    EMERG = 0,
    ALERT = 1,
    CRIT = 2,
    ERR = 3,
    WARNING = 4,
    NOTICE = 5,
    #[default]
    INFO = 6,
    DEBUG = 7,
}

/// Convert a code (as used in the wire serialization) into a `Severity`
impl TryFrom<u8> for Severity {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let severity = match value {
            0 => Severity::EMERG,
            1 => Severity::ALERT,
            2 => Severity::CRIT,
            3 => Severity::ERR,
            4 => Severity::WARNING,
            5 => Severity::NOTICE,
            6 => Severity::INFO,
            7 => Severity::DEBUG,
            _ => return Err(Error::BadSeverity(value.to_string())),
        };

        Ok(severity)
    }
}

impl Severity {
    /// Severity carried in the low three bits of a priority value.
    pub(crate) fn from_priority(pri: u64) -> Self {
        match pri & 0x7 {
            0 => Severity::EMERG,
            1 => Severity::ALERT,
            2 => Severity::CRIT,
            3 => Severity::ERR,
            4 => Severity::WARNING,
            5 => Severity::NOTICE,
            6 => Severity::INFO,
            _ => Severity::DEBUG,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Convert a syslog severity into a unique string representation
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::EMERG => "emerg",
            Severity::ALERT => "alert",
            Severity::CRIT => "crit",
            Severity::ERR => "err",
            Severity::WARNING => "warning",
            Severity::NOTICE => "notice",
            Severity::INFO => "info",
            Severity::DEBUG => "debug",
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts either the name (`warning`) or the numeric code (`4`).
impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(code) = s.parse::<u8>() {
            return Severity::try_from(code);
        }

        let severity = match s.to_ascii_lowercase().as_str() {
            "emerg" | "emergency" => Severity::EMERG,
            "alert" => Severity::ALERT,
            "crit" | "critical" => Severity::CRIT,
            "err" | "error" => Severity::ERR,
            "warning" | "warn" => Severity::WARNING,
            "notice" => Severity::NOTICE,
            "info" => Severity::INFO,
            "debug" => Severity::DEBUG,
            _ => return Err(Error::BadSeverity(s.to_string())),
        };

        Ok(severity)
    }
}
