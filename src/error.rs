//! Error types for voicegate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoicegateError {
    // Configuration errors — fatal at construction
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio framing errors — a bad frame is skipped, never aborts the stream
    #[error("Invalid audio input: {message}")]
    InvalidAudio { message: String },

    #[error("Audio encoding failed: {message}")]
    AudioEncoding { message: String },

    // Codec errors — predictor corruption requires an explicit session reset
    #[error("Codec state error: {message}")]
    CodecState { message: String },

    // Transport errors
    #[error("Transient network error: {message}")]
    TransientNetwork { message: String },

    #[error("Circuit breaker open, retry after {retry_after_ms}ms")]
    CircuitOpen { retry_after_ms: u64 },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VoicegateError {
    /// Returns true if the error is retryable through backoff and reconnect.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            VoicegateError::TransientNetwork { .. } | VoicegateError::CircuitOpen { .. }
        )
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VoicegateError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_invalid_value_display() {
        let error = VoicegateError::ConfigInvalidValue {
            key: "vad.speech_threshold".to_string(),
            message: "must exceed silence_threshold".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for vad.speech_threshold: must exceed silence_threshold"
        );
    }

    #[test]
    fn test_invalid_audio_display() {
        let error = VoicegateError::InvalidAudio {
            message: "byte length 321 is not a multiple of 2".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid audio input: byte length 321 is not a multiple of 2"
        );
    }

    #[test]
    fn test_codec_state_display() {
        let error = VoicegateError::CodecState {
            message: "odd sample count 319".to_string(),
        };
        assert_eq!(error.to_string(), "Codec state error: odd sample count 319");
    }

    #[test]
    fn test_circuit_open_display() {
        let error = VoicegateError::CircuitOpen {
            retry_after_ms: 2500,
        };
        assert_eq!(error.to_string(), "Circuit breaker open, retry after 2500ms");
    }

    #[test]
    fn test_is_transient() {
        let transient = VoicegateError::TransientNetwork {
            message: "connection reset".to_string(),
        };
        assert!(transient.is_transient());

        let open = VoicegateError::CircuitOpen { retry_after_ms: 100 };
        assert!(open.is_transient());

        let fatal = VoicegateError::InvalidAudio {
            message: "odd byte length".to_string(),
        };
        assert!(!fatal.is_transient());
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: VoicegateError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_str = "invalid = toml = syntax";
        let toml_error = toml::from_str::<toml::Value>(toml_str).unwrap_err();
        let error: VoicegateError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<VoicegateError>();
        assert_sync::<VoicegateError>();
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);
    }
}
