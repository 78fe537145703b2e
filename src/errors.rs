// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the relocalization pipeline
//!
//! Every stage has its own error enum. [`PipelineError`] wraps them without
//! flattening, so callers can tell "not authenticated" apart from
//! "pose not found" apart from "network unreachable".

use crate::frame::TrackingState;
use std::fmt;

/// Result type alias using PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Top-level error for a relocalization attempt
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Missing or invalid configuration (caught before any network call)
    Configuration(ConfigError),
    /// Image resize or compression failed
    Encoding(EncodingError),
    /// Service round trip failed
    Localization(LocalizationError),
    /// Capture pose or returned pose is unusable
    Pose(PoseError),
    /// Token exchange failed
    Auth(AuthError),
    /// The attempt was abandoned before it completed
    Cancelled,
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Map type is selected but its code is empty
    MissingMapCode,
    /// MapSet type is selected but its code is empty
    MissingMapSetCode,
    /// Both a map code and a map set code were given
    AmbiguousMapSelection,
    /// Map code contains a control character or a double quote
    InvalidMapCode(String),
    /// Client id or secret is empty
    MissingCredentials,
    /// Endpoint URL cannot be used
    InvalidEndpoint(String),
    /// Config file could not be read or written
    Io(String),
    /// Config file is not valid JSON
    Parse(String),
}

/// Image preparation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// Pixel buffer does not match the declared dimensions
    InvalidBuffer(String),
    /// Resampling to the target resolution failed
    Resize(String),
    /// JPEG compression failed
    Compress(String),
    /// Background encoding task panicked or was dropped
    TaskFailed(String),
}

/// Service-level errors from a localization request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalizationError {
    /// Bearer credential missing or expired
    Unauthorized,
    /// Network-level failure
    Transport(String),
    /// Non-2xx HTTP status
    BadStatus(u16),
    /// Response body did not match the expected schema
    Decode(String),
}

/// Pose resolution errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoseError {
    /// Capture position is at the tracking origin; tracking had not started
    DegeneratePose,
    /// Returned map pose matrix cannot be inverted
    SingularPose,
    /// Resolution was asked for a result with no pose
    PoseNotFound,
    /// Tracking was not in the normal state at capture time
    NotTracking(TrackingState),
}

/// Credential exchange errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Client id or secret missing
    MissingCredentials,
    /// Network-level failure
    Transport(String),
    /// Non-2xx HTTP status from the token endpoint
    BadStatus(u16),
    /// Token response did not match the expected schema
    Decode(String),
}

impl PipelineError {
    /// Whether the caller may reasonably retry the same attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::Localization(LocalizationError::Transport(_))
                | PipelineError::Localization(LocalizationError::BadStatus(_))
                | PipelineError::Auth(AuthError::Transport(_))
        )
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Configuration(e) => write!(f, "Configuration error: {}", e),
            PipelineError::Encoding(e) => write!(f, "Encoding error: {}", e),
            PipelineError::Localization(e) => write!(f, "Localization error: {}", e),
            PipelineError::Pose(e) => write!(f, "Pose error: {}", e),
            PipelineError::Auth(e) => write!(f, "Authentication error: {}", e),
            PipelineError::Cancelled => write!(f, "Relocalization cancelled"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingMapCode => write!(f, "Please set a map code"),
            ConfigError::MissingMapSetCode => write!(f, "Please set a map set code"),
            ConfigError::AmbiguousMapSelection => {
                write!(f, "Set either a map code or a map set code, not both")
            }
            ConfigError::InvalidMapCode(code) => {
                write!(f, "Map code {:?} contains a control character or quote", code)
            }
            ConfigError::MissingCredentials => write!(f, "Client id and secret are required"),
            ConfigError::InvalidEndpoint(url) => write!(f, "Invalid endpoint: {}", url),
            ConfigError::Io(msg) => write!(f, "Config file error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Config parse error: {}", msg),
        }
    }
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingError::InvalidBuffer(msg) => write!(f, "Invalid frame buffer: {}", msg),
            EncodingError::Resize(msg) => write!(f, "Resize failed: {}", msg),
            EncodingError::Compress(msg) => write!(f, "JPEG encoding failed: {}", msg),
            EncodingError::TaskFailed(msg) => write!(f, "Encoding task error: {}", msg),
        }
    }
}

impl fmt::Display for LocalizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalizationError::Unauthorized => {
                write!(f, "Authentication token is missing or expired")
            }
            LocalizationError::Transport(msg) => write!(f, "Network error: {}", msg),
            LocalizationError::BadStatus(code) => write!(f, "Unexpected status code: {}", code),
            LocalizationError::Decode(msg) => write!(f, "Failed to decode response: {}", msg),
        }
    }
}

impl fmt::Display for PoseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoseError::DegeneratePose => write!(
                f,
                "Camera position is too close to origin, tracking might not be initialized yet"
            ),
            PoseError::SingularPose => write!(f, "Returned pose matrix is not invertible"),
            PoseError::PoseNotFound => write!(f, "No pose was found for the query image"),
            PoseError::NotTracking(state) => write!(f, "Tracking is not normal: {}", state),
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::MissingCredentials => write!(f, "Client id and secret are required"),
            AuthError::Transport(msg) => write!(f, "Network error: {}", msg),
            AuthError::BadStatus(code) => write!(f, "Unexpected status code: {}", code),
            AuthError::Decode(msg) => write!(f, "Unable to parse token response: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for EncodingError {}
impl std::error::Error for LocalizationError {}
impl std::error::Error for PoseError {}
impl std::error::Error for AuthError {}

// Conversions from stage errors to PipelineError
impl From<ConfigError> for PipelineError {
    fn from(err: ConfigError) -> Self {
        PipelineError::Configuration(err)
    }
}

impl From<EncodingError> for PipelineError {
    fn from(err: EncodingError) -> Self {
        PipelineError::Encoding(err)
    }
}

impl From<LocalizationError> for PipelineError {
    fn from(err: LocalizationError) -> Self {
        PipelineError::Localization(err)
    }
}

impl From<PoseError> for PipelineError {
    fn from(err: PoseError) -> Self {
        PipelineError::Pose(err)
    }
}

impl From<AuthError> for PipelineError {
    fn from(err: AuthError) -> Self {
        PipelineError::Auth(err)
    }
}

impl From<image::ImageError> for EncodingError {
    fn from(err: image::ImageError) -> Self {
        EncodingError::Compress(err.to_string())
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_errors_are_preserved() {
        let err: PipelineError = LocalizationError::Unauthorized.into();
        assert_eq!(
            err,
            PipelineError::Localization(LocalizationError::Unauthorized)
        );

        let err: PipelineError = PoseError::DegeneratePose.into();
        assert!(matches!(err, PipelineError::Pose(PoseError::DegeneratePose)));
    }

    #[test]
    fn test_retry_policy() {
        assert!(PipelineError::from(LocalizationError::Transport("reset".into())).is_retryable());
        assert!(PipelineError::from(LocalizationError::BadStatus(503)).is_retryable());
        assert!(!PipelineError::from(LocalizationError::Unauthorized).is_retryable());
        assert!(!PipelineError::from(ConfigError::MissingMapCode).is_retryable());
        assert!(!PipelineError::from(PoseError::SingularPose).is_retryable());
        assert!(!PipelineError::Cancelled.is_retryable());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            LocalizationError::BadStatus(500).to_string(),
            "Unexpected status code: 500"
        );
        assert_eq!(
            PipelineError::from(ConfigError::MissingMapSetCode).to_string(),
            "Configuration error: Please set a map set code"
        );
    }
}
