use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Recognition session error: {0}")]
    Session(#[from] SessionError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Shutdown requested")]
    ShutdownRequested,

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

/// Errors raised while acquiring or running the microphone capture path.
///
/// All of these are fatal to starting a session and are surfaced verbatim
/// to the user; none are retried automatically.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("Input device not found: {name:?}")]
    DeviceNotFound { name: Option<String> },

    #[error("Input device is busy")]
    DeviceBusy,

    #[error("Requested capture constraints not supported: {detail}")]
    UnsupportedConstraints { detail: String },

    #[error("Audio backend error: {0}")]
    Backend(String),

    #[error("Fatal capture error: {0}")]
    Fatal(String),
}

impl From<cpal::BuildStreamError> for CaptureError {
    fn from(e: cpal::BuildStreamError) -> Self {
        match e {
            cpal::BuildStreamError::DeviceNotAvailable => {
                CaptureError::DeviceNotFound { name: None }
            }
            cpal::BuildStreamError::StreamConfigNotSupported => {
                CaptureError::UnsupportedConstraints {
                    detail: "stream config rejected by device".into(),
                }
            }
            cpal::BuildStreamError::InvalidArgument => CaptureError::UnsupportedConstraints {
                detail: "invalid stream argument".into(),
            },
            other => classify_backend_error(other.to_string()),
        }
    }
}

impl From<cpal::PlayStreamError> for CaptureError {
    fn from(e: cpal::PlayStreamError) -> Self {
        match e {
            cpal::PlayStreamError::DeviceNotAvailable => {
                CaptureError::DeviceNotFound { name: None }
            }
            other => classify_backend_error(other.to_string()),
        }
    }
}

impl From<cpal::DefaultStreamConfigError> for CaptureError {
    fn from(e: cpal::DefaultStreamConfigError) -> Self {
        match e {
            cpal::DefaultStreamConfigError::DeviceNotAvailable => {
                CaptureError::DeviceNotFound { name: None }
            }
            cpal::DefaultStreamConfigError::StreamTypeNotSupported => {
                CaptureError::UnsupportedConstraints {
                    detail: "stream type not supported".into(),
                }
            }
            other => classify_backend_error(other.to_string()),
        }
    }
}

impl From<cpal::SupportedStreamConfigsError> for CaptureError {
    fn from(e: cpal::SupportedStreamConfigsError) -> Self {
        match e {
            cpal::SupportedStreamConfigsError::DeviceNotAvailable => {
                CaptureError::DeviceNotFound { name: None }
            }
            other => classify_backend_error(other.to_string()),
        }
    }
}

/// Best-effort mapping of backend-specific error text onto the taxonomy.
/// Hosts report permission and exclusive-use failures as opaque strings.
fn classify_backend_error(msg: String) -> CaptureError {
    let lower = msg.to_lowercase();
    if lower.contains("permission") || lower.contains("access denied") {
        CaptureError::PermissionDenied
    } else if lower.contains("busy") || lower.contains("in use") {
        CaptureError::DeviceBusy
    } else {
        CaptureError::Backend(msg)
    }
}

/// Errors from the remote recognition session lifecycle.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to start recognition session: {0}")]
    StartFailed(String),

    #[error("Credential fetch failed: {0}")]
    AuthFailed(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Recognizer error: {kind} {reason}")]
    Remote { kind: String, reason: String },

    #[error("Session closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_text_classification() {
        assert!(matches!(
            classify_backend_error("ALSA: Permission denied".into()),
            CaptureError::PermissionDenied
        ));
        assert!(matches!(
            classify_backend_error("device is busy".into()),
            CaptureError::DeviceBusy
        ));
        assert!(matches!(
            classify_backend_error("unknown host failure".into()),
            CaptureError::Backend(_)
        ));
    }

    #[test]
    fn build_stream_error_mapping() {
        let e: CaptureError = cpal::BuildStreamError::DeviceNotAvailable.into();
        assert!(matches!(e, CaptureError::DeviceNotFound { name: None }));

        let e: CaptureError = cpal::BuildStreamError::StreamConfigNotSupported.into();
        assert!(matches!(e, CaptureError::UnsupportedConstraints { .. }));
    }
}
