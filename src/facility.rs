use std::str::FromStr;

use crate::Error;

/// Syslog facilities. Taken From RFC 5424, but some platforms mix these around.
/// Names are from Linux.
///
/// Messages carry their facility as a plain code so values outside this table
/// still round-trip; this enum only names the well-known ones.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Ord, PartialOrd, Hash)]
#[allow(non_camel_case_types)]
pub enum Facility {
    KERN = 0,
    USER = 1,
    MAIL = 2,
    DAEMON = 3,
    AUTH = 4,
    SYSLOG = 5,
    LPR = 6,
    NEWS = 7,
    UUCP = 8,
    CRON = 9,
    AUTHPRIV = 10,
    FTP = 11,
    NTP = 12,
    AUDIT = 13,
    ALERT = 14,
    CLOCKD = 15,
    LOCAL0 = 16,
    LOCAL1 = 17,
    LOCAL2 = 18,
    LOCAL3 = 19,
    LOCAL4 = 20,
    LOCAL5 = 21,
    LOCAL6 = 22,
    LOCAL7 = 23,
}

const ALL: [Facility; 24] = [
    Facility::KERN,
    Facility::USER,
    Facility::MAIL,
    Facility::DAEMON,
    Facility::AUTH,
    Facility::SYSLOG,
    Facility::LPR,
    Facility::NEWS,
    Facility::UUCP,
    Facility::CRON,
    Facility::AUTHPRIV,
    Facility::FTP,
    Facility::NTP,
    Facility::AUDIT,
    Facility::ALERT,
    Facility::CLOCKD,
    Facility::LOCAL0,
    Facility::LOCAL1,
    Facility::LOCAL2,
    Facility::LOCAL3,
    Facility::LOCAL4,
    Facility::LOCAL5,
    Facility::LOCAL6,
    Facility::LOCAL7,
];

impl Facility {
    /// Look up the named facility for a wire code
    pub fn from_code(code: u32) -> Option<Self> {
        ALL.get(code as usize).copied()
    }

    pub fn code(self) -> u32 {
        self as u32
    }

    /// Convert a syslog facility into a unique string representation
    pub fn as_str(self) -> &'static str {
        match self {
            Facility::KERN => "kern",
            Facility::USER => "user",
            Facility::MAIL => "mail",
            Facility::DAEMON => "daemon",
            Facility::AUTH => "auth",
            Facility::SYSLOG => "syslog",
            Facility::LPR => "lpr",
            Facility::NEWS => "news",
            Facility::UUCP => "uucp",
            Facility::CRON => "cron",
            Facility::AUTHPRIV => "authpriv",
            Facility::FTP => "ftp",
            Facility::NTP => "ntp",
            Facility::AUDIT => "audit",
            Facility::ALERT => "alert",
            Facility::CLOCKD => "clockd",
            Facility::LOCAL0 => "local0",
            Facility::LOCAL1 => "local1",
            Facility::LOCAL2 => "local2",
            Facility::LOCAL3 => "local3",
            Facility::LOCAL4 => "local4",
            Facility::LOCAL5 => "local5",
            Facility::LOCAL6 => "local6",
            Facility::LOCAL7 => "local7",
        }
    }
}

impl From<Facility> for u32 {
    fn from(value: Facility) -> Self {
        value.code()
    }
}

impl FromStr for Facility {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL.iter()
            .copied()
            .find(|f| f.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::BadFacility(s.to_string()))
    }
}
