//! Log severity levels and their ordering.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Severity of an ingested log line.
///
/// Ordered `Debug < Info < Warn < Error` (ordinals 0 through 3).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Severity {
    /// Diagnostic chatter.
    Debug,
    /// Normal operation. Also the fallback for unrecognised levels.
    #[default]
    Info,
    /// Something unexpected that did not stop the job.
    Warn,
    /// A failure.
    Error,
}

impl Severity {
    /// Numeric ordinal (0 through 3).
    pub const fn ordinal(self) -> u8 {
        match self {
            Self::Debug => 0,
            Self::Info => 1,
            Self::Warn => 2,
            Self::Error => 3,
        }
    }

    /// Lowercase wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Resolve a producer-declared level, defaulting to [`Severity::Info`]
    /// when it is absent or not recognised.
    pub fn resolve(declared: Option<&str>) -> Self {
        declared.and_then(|s| s.parse().ok()).unwrap_or_default()
    }

    /// Whether a record at this severity passes a gate set to `minimum`.
    pub fn meets(self, minimum: Self) -> bool {
        self >= minimum
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A level string that names no known severity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown severity: {0:?}")]
pub struct UnknownSeverity(pub String);

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(UnknownSeverity(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_follow_ordering() {
        let all = [Severity::Debug, Severity::Info, Severity::Warn, Severity::Error];
        for (expected, level) in (0u8..).zip(all) {
            assert_eq!(level.ordinal(), expected);
        }
        assert!(Severity::Debug < Severity::Error);
    }

    #[test]
    fn unknown_and_missing_levels_resolve_to_info() {
        assert_eq!(Severity::resolve(None), Severity::Info);
        assert_eq!(Severity::resolve(Some("verbose")), Severity::Info);
        assert_eq!(Severity::resolve(Some("WARN")), Severity::Warn);
    }

    #[test]
    fn meets_is_inclusive() {
        assert!(Severity::Info.meets(Severity::Info));
        assert!(Severity::Error.meets(Severity::Warn));
        assert!(!Severity::Debug.meets(Severity::Info));
    }
}
