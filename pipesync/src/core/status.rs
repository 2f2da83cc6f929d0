//! The platform status vocabulary.
//!
//! The string forms are read by existing consumers and must not change.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of an operator or deployment.
///
/// Orchestrator phases that have no mapping pass through as [`Status::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    /// Required parameters are missing.
    #[default]
    Unset,
    /// Every required parameter has a value.
    SettedUp,
    /// Waiting to be scheduled by the orchestrator.
    Pending,
    /// Executing.
    Running,
    /// Finished successfully.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Interrupted by a user.
    Terminated,
    /// A phase outside the vocabulary, kept verbatim.
    Other(String),
}

impl Status {
    /// Returns the wire form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Unset => "Unset",
            Self::SettedUp => "Setted up",
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Terminated => "Terminated",
            Self::Other(raw) => raw,
        }
    }

    /// Parses a wire value. Unknown values become [`Status::Other`].
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "Unset" => Self::Unset,
            "Setted up" => Self::SettedUp,
            "Pending" => Self::Pending,
            "Running" => Self::Running,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            "Terminated" => Self::Terminated,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns true if the status was produced by a pipeline run.
    #[must_use]
    pub const fn is_run_state(&self) -> bool {
        matches!(
            self,
            Self::Pending | Self::Running | Self::Succeeded | Self::Failed | Self::Terminated
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Status {
    fn from(raw: String) -> Self {
        match Self::parse(&raw) {
            Self::Other(_) => Self::Other(raw),
            known => known,
        }
    }
}

impl From<&str> for Status {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<Status> for String {
    fn from(status: Status) -> Self {
        match status {
            Status::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_is_verbatim() {
        let expected = [
            (Status::Unset, "Unset"),
            (Status::SettedUp, "Setted up"),
            (Status::Pending, "Pending"),
            (Status::Running, "Running"),
            (Status::Succeeded, "Succeeded"),
            (Status::Failed, "Failed"),
            (Status::Terminated, "Terminated"),
        ];
        for (status, wire) in expected {
            assert_eq!(status.to_string(), wire);
            assert_eq!(Status::parse(wire), status);
        }
    }

    #[test]
    fn test_unknown_phase_passes_through() {
        let status = Status::parse("Available");
        assert_eq!(status, Status::Other("Available".to_string()));
        assert_eq!(status.as_str(), "Available");
    }

    #[test]
    fn test_status_serialize() {
        let json = serde_json::to_string(&Status::SettedUp).unwrap();
        assert_eq!(json, r#""Setted up""#);

        let back: Status = serde_json::from_str(r#""Omitted""#).unwrap();
        assert_eq!(back, Status::Other("Omitted".to_string()));
    }

    #[test]
    fn test_run_state() {
        assert!(Status::Running.is_run_state());
        assert!(!Status::SettedUp.is_run_state());
        assert!(!Status::Unset.is_run_state());
    }
}
