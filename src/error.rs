// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for gaffer.
//!
//! This module provides strongly-typed errors for different parts of the
//! application, using `thiserror` for ergonomic error definitions and
//! `anyhow` for error propagation.
//!
//! Most user-facing operations deliberately do *not* surface these errors:
//! missing records come back as `None`, failed VCS removals come back as
//! `false`, and agent selection falls back to no selection. The enums below
//! cover the places where a caller can meaningfully branch on the failure.

use thiserror::Error;

/// Errors that can occur while talking to the host session RPC.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Host not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {message}")]
    ApiError {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Response parsing error: {0}")]
    ParseError(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl HostError {
    /// Create an API error with status code.
    pub fn api(message: impl Into<String>, status_code: u16) -> Self {
        Self::ApiError {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkError(_) | Self::Timeout(_))
    }
}

impl From<reqwest::Error> for HostError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(0)
        } else if err.is_decode() {
            Self::ParseError(err.to_string())
        } else {
            Self::NetworkError(err.to_string())
        }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid config format: {0}")]
    InvalidFormat(String),

    #[error("IO error reading config: {0}")]
    IoError(String),

    #[error("YAML parsing error: {0}")]
    YamlError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err.to_string())
    }
}

/// Errors that can occur during delegation persistence.
///
/// Read paths swallow these into `None`; they surface only from `create`
/// when the initial record cannot be written at all.
#[derive(Error, Debug)]
pub enum DelegationError {
    #[error("Delegation not found: {0}")]
    NotFound(String),

    #[error("Failed to save delegation: {0}")]
    SaveFailed(String),

    #[error("Delegation record corrupted: {0}")]
    Corrupted(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for DelegationError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

/// Result type alias using anyhow for flexible error handling.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_error_retryable() {
        assert!(HostError::NetworkError("timeout".to_string()).is_retryable());
        assert!(HostError::Timeout(30000).is_retryable());
        assert!(!HostError::NotConfigured("no host".to_string()).is_retryable());
        assert!(!HostError::SessionNotFound("ses-1".to_string()).is_retryable());
    }

    #[test]
    fn test_host_error_api() {
        let err = HostError::api("Bad request", 400);
        match err {
            HostError::ApiError {
                message,
                status_code,
            } => {
                assert_eq!(message, "Bad request");
                assert_eq!(status_code, Some(400));
            }
            _ => panic!("Expected ApiError"),
        }
    }

    #[test]
    fn test_config_error_from_json() {
        let result: std::result::Result<serde_json::Value, _> =
            serde_json::from_str("invalid json");
        let json_err = result.unwrap_err();
        let config_err: ConfigError = json_err.into();
        assert!(matches!(config_err, ConfigError::JsonError(_)));
    }

    #[test]
    fn test_delegation_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: DelegationError = io_err.into();
        assert!(matches!(err, DelegationError::NotFound(_)));
    }

    #[test]
    fn test_error_display() {
        let err = HostError::ApiError {
            message: "boom".to_string(),
            status_code: Some(500),
        };
        assert!(format!("{}", err).contains("boom"));
    }
}
