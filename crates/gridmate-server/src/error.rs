//! Closed error taxonomy at the tool boundary.
//!
//! Every failed tool call reports exactly one [`ToolError`] variant, tagged
//! with a stable `error_kind` string in the payload.

use gridmate_core::GridError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("No network is currently loaded. Create or load a network first.")]
    NoNetworkLoaded,

    #[error("{0}")]
    NetworkNotFound(String),

    #[error("{0}")]
    UnsupportedFormat(String),

    #[error("{0}")]
    SolverFailure(String),

    #[error("{0}")]
    InvalidReference(String),

    #[error("{0}")]
    TransportFailure(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Serialization(String),
}

pub type ToolResult<T> = Result<T, ToolError>;

impl ToolError {
    pub const KINDS: [&'static str; 8] = [
        "no_network_loaded",
        "network_not_found",
        "unsupported_format",
        "solver_failure",
        "invalid_reference",
        "transport_failure",
        "invalid_argument",
        "serialization",
    ];

    /// Tag carried as `error_kind` in error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::NoNetworkLoaded => "no_network_loaded",
            ToolError::NetworkNotFound(_) => "network_not_found",
            ToolError::UnsupportedFormat(_) => "unsupported_format",
            ToolError::SolverFailure(_) => "solver_failure",
            ToolError::InvalidReference(_) => "invalid_reference",
            ToolError::TransportFailure(_) => "transport_failure",
            ToolError::InvalidArgument(_) => "invalid_argument",
            ToolError::Serialization(_) => "serialization",
        }
    }

    /// Rebuilds an error from its payload tag, as received by a client.
    pub fn from_kind(kind: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            "no_network_loaded" => ToolError::NoNetworkLoaded,
            "network_not_found" => ToolError::NetworkNotFound(message),
            "unsupported_format" => ToolError::UnsupportedFormat(message),
            "solver_failure" => ToolError::SolverFailure(message),
            "invalid_reference" => ToolError::InvalidReference(message),
            "invalid_argument" => ToolError::InvalidArgument(message),
            "serialization" => ToolError::Serialization(message),
            "transport_failure" => ToolError::TransportFailure(message),
            _ => ToolError::TransportFailure(format!("unknown error kind '{kind}': {message}")),
        }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        ToolError::InvalidArgument(msg.into())
    }
}

impl From<GridError> for ToolError {
    fn from(err: GridError) -> Self {
        let message = err.to_string();
        match err {
            GridError::NotFound(_) => ToolError::NetworkNotFound(message),
            GridError::UnsupportedFormat { .. } => ToolError::UnsupportedFormat(message),
            GridError::Parse(_) | GridError::Io(_) => ToolError::Serialization(message),
            GridError::InvalidReference { .. } | GridError::StillReferenced { .. } => {
                ToolError::InvalidReference(message)
            }
            GridError::UnknownStdType { .. } | GridError::Validation(_) => {
                ToolError::InvalidArgument(message)
            }
            GridError::Solver(_) => ToolError::SolverFailure(message),
        }
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        ToolError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridmate_core::ElementKind;
    use std::path::PathBuf;

    #[test]
    fn test_grid_errors_map_to_tool_kinds() {
        let cases = [
            (GridError::NotFound(PathBuf::from("x.json")), "network_not_found"),
            (
                GridError::UnsupportedFormat {
                    extension: ".csv".into(),
                    supported: ".json, .p".into(),
                },
                "unsupported_format",
            ),
            (GridError::Parse("bad".into()), "serialization"),
            (
                GridError::InvalidReference {
                    kind: ElementKind::Bus,
                    index: 9,
                },
                "invalid_reference",
            ),
            (
                GridError::StillReferenced {
                    kind: ElementKind::Bus,
                    index: 0,
                    referenced_by: "line 0".into(),
                },
                "invalid_reference",
            ),
            (
                GridError::UnknownStdType {
                    kind: "line",
                    name: "x".into(),
                },
                "invalid_argument",
            ),
            (GridError::solver("singular"), "solver_failure"),
        ];
        for (err, kind) in cases {
            assert_eq!(ToolError::from(err).kind(), kind);
        }
    }

    #[test]
    fn test_kind_roundtrip() {
        for kind in ToolError::KINDS {
            assert_eq!(ToolError::from_kind(kind, "msg").kind(), kind);
        }
        assert_eq!(ToolError::from_kind("bogus", "msg").kind(), "transport_failure");
    }

    #[test]
    fn test_message_keeps_grid_detail() {
        let err = ToolError::from(GridError::InvalidReference {
            kind: ElementKind::Bus,
            index: 9,
        });
        assert_eq!(err.to_string(), "bus 9 does not exist");
    }
}
