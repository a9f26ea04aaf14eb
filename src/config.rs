use crate::defaults;
use crate::error::{Result, VoicegateError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub vad: VadConfig,
    pub transport: TransportConfig,
}

/// Audio framing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Frame size in samples.
    pub frame_size: usize,
}

/// Voice activity detection configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VadConfig {
    /// Smoothed RMS above this is speech (0.0 to 1.0).
    pub speech_threshold: f32,
    /// Smoothed RMS below this is silence; must stay below speech_threshold.
    pub silence_threshold: f32,
    /// Exponential smoothing factor for frame energy (0.0 to 1.0).
    pub smoothing: f32,
    /// Consecutive speech frames required to confirm speech.
    pub min_speech_frames: u32,
    /// Consecutive silent frames required to end speech.
    pub silence_frames: u32,
    /// Pre-speech prefix window in frames.
    pub prefix_frames: usize,
    /// Calibration window in frames.
    pub calibration_frames: u32,
    /// Milliseconds without new audio before a session force-finalizes.
    pub speech_timeout_ms: u64,
}

/// Resilient transport configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    /// Consecutive failures before the circuit breaker opens.
    pub failure_threshold: u32,
    /// Milliseconds before an open breaker permits one trial attempt.
    pub recovery_timeout_ms: u64,
    /// Base reconnect delay in milliseconds.
    pub backoff_base_ms: u64,
    /// Maximum reconnect delay in milliseconds.
    pub backoff_max_ms: u64,
    /// Backoff growth factor per attempt.
    pub backoff_multiplier: f64,
    /// Maximum random jitter added to each delay, in milliseconds.
    pub backoff_jitter_ms: u64,
    /// Reconnect attempts before the transport fails terminally.
    pub max_retries: u32,
    /// Keep-alive heartbeat interval in milliseconds.
    pub keep_alive_interval_ms: u64,
    /// Outbound message queue capacity.
    pub queue_capacity: usize,
    /// Command/event channel buffer size.
    pub channel_buffer_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            frame_size: defaults::FRAME_SIZE,
        }
    }
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            speech_threshold: defaults::SPEECH_THRESHOLD,
            silence_threshold: defaults::SILENCE_THRESHOLD,
            smoothing: defaults::ENERGY_SMOOTHING,
            min_speech_frames: defaults::MIN_SPEECH_FRAMES,
            silence_frames: defaults::SILENCE_FRAMES,
            prefix_frames: defaults::PREFIX_FRAMES,
            calibration_frames: defaults::CALIBRATION_FRAMES,
            speech_timeout_ms: defaults::SPEECH_TIMEOUT_MS,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            failure_threshold: defaults::FAILURE_THRESHOLD,
            recovery_timeout_ms: defaults::RECOVERY_TIMEOUT_MS,
            backoff_base_ms: defaults::BACKOFF_BASE_MS,
            backoff_max_ms: defaults::BACKOFF_MAX_MS,
            backoff_multiplier: defaults::BACKOFF_MULTIPLIER,
            backoff_jitter_ms: defaults::BACKOFF_JITTER_MS,
            max_retries: defaults::MAX_RETRIES,
            keep_alive_interval_ms: defaults::KEEP_ALIVE_INTERVAL_MS,
            queue_capacity: defaults::QUEUE_CAPACITY,
            channel_buffer_size: defaults::CHANNEL_BUFFER_SIZE,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    ///
    /// Missing fields use default values. Invalid TOML or invalid values
    /// are errors — a bad configuration is fatal at construction.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VoicegateError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                VoicegateError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist.
    ///
    /// Only a missing file falls back to defaults; invalid TOML or invalid
    /// values still error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(VoicegateError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOICEGATE_SAMPLE_RATE → audio.sample_rate
    /// - VOICEGATE_SPEECH_THRESHOLD → vad.speech_threshold
    /// - VOICEGATE_SILENCE_THRESHOLD → vad.silence_threshold
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(rate) = std::env::var("VOICEGATE_SAMPLE_RATE") {
            if let Ok(rate) = rate.parse() {
                self.audio.sample_rate = rate;
            }
        }

        if let Ok(threshold) = std::env::var("VOICEGATE_SPEECH_THRESHOLD") {
            if let Ok(threshold) = threshold.parse() {
                self.vad.speech_threshold = threshold;
            }
        }

        if let Ok(threshold) = std::env::var("VOICEGATE_SILENCE_THRESHOLD") {
            if let Ok(threshold) = threshold.parse() {
                self.vad.silence_threshold = threshold;
            }
        }

        self
    }

    /// Validate all sections. Invalid values are fatal at construction.
    pub fn validate(&self) -> Result<()> {
        self.audio.validate()?;
        self.vad.validate()?;
        self.transport.validate()?;
        Ok(())
    }
}

fn invalid(key: &str, message: &str) -> VoicegateError {
    VoicegateError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

impl AudioConfig {
    /// Validates the audio section.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(invalid("audio.sample_rate", "must be positive"));
        }
        if self.frame_size == 0 {
            return Err(invalid("audio.frame_size", "must be positive"));
        }
        Ok(())
    }
}

impl VadConfig {
    /// Validates the VAD section, including the hysteresis gap.
    pub fn validate(&self) -> Result<()> {
        if !(self.speech_threshold > 0.0 && self.speech_threshold <= 1.0) {
            return Err(invalid("vad.speech_threshold", "must be in (0, 1]"));
        }
        if self.silence_threshold <= 0.0 {
            return Err(invalid("vad.silence_threshold", "must be positive"));
        }
        if self.silence_threshold >= self.speech_threshold {
            return Err(invalid(
                "vad.silence_threshold",
                "must stay below speech_threshold to form a hysteresis gap",
            ));
        }
        if !(self.smoothing > 0.0 && self.smoothing <= 1.0) {
            return Err(invalid("vad.smoothing", "must be in (0, 1]"));
        }
        if self.min_speech_frames == 0 {
            return Err(invalid("vad.min_speech_frames", "must be positive"));
        }
        if self.silence_frames == 0 {
            return Err(invalid("vad.silence_frames", "must be positive"));
        }
        if self.prefix_frames == 0 {
            return Err(invalid("vad.prefix_frames", "must be positive"));
        }
        Ok(())
    }
}

impl TransportConfig {
    /// Validates the transport section.
    pub fn validate(&self) -> Result<()> {
        if self.failure_threshold == 0 {
            return Err(invalid("transport.failure_threshold", "must be positive"));
        }
        if self.recovery_timeout_ms == 0 {
            return Err(invalid("transport.recovery_timeout_ms", "must be positive"));
        }
        if self.keep_alive_interval_ms == 0 {
            return Err(invalid(
                "transport.keep_alive_interval_ms",
                "must be positive",
            ));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(invalid("transport.backoff_multiplier", "must be >= 1.0"));
        }
        if self.backoff_max_ms < self.backoff_base_ms {
            return Err(invalid(
                "transport.backoff_max_ms",
                "must be >= backoff_base_ms",
            ));
        }
        if self.queue_capacity == 0 {
            return Err(invalid("transport.queue_capacity", "must be positive"));
        }
        if self.channel_buffer_size == 0 {
            return Err(invalid("transport.channel_buffer_size", "must be positive"));
        }
        Ok(())
    }
}
