//! Default configuration constants for voicegate.
//!
//! This module provides shared constants used across different configuration types
//! to ensure consistency and eliminate duplication.

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech recognition and provides a good balance
/// between quality and computational efficiency for voice applications.
pub const SAMPLE_RATE: u32 = 16000;

/// Default frame size in samples.
///
/// 320 samples is one 20ms time-slice at 16kHz, the cadence the whole
/// per-frame pipeline (VAD, codec) is budgeted against.
pub const FRAME_SIZE: usize = 320;

/// Default speech threshold for the energy gate.
///
/// Smoothed RMS (0.0 to 1.0) above this value classifies a frame as speech.
/// Tuned for typical microphone input levels.
pub const SPEECH_THRESHOLD: f32 = 0.02;

/// Default silence threshold for the energy gate.
///
/// Smoothed RMS below this value classifies a frame as silence. Kept below
/// the speech threshold so the gate has a hysteresis gap and does not flap
/// near a single boundary.
pub const SILENCE_THRESHOLD: f32 = 0.01;

/// Default exponential smoothing factor for frame energy.
///
/// smoothed = alpha * raw + (1 - alpha) * smoothed_prev. Higher values react
/// faster to onsets; lower values reject short spikes.
pub const ENERGY_SMOOTHING: f32 = 0.3;

/// Default number of consecutive speech frames before speech is confirmed.
///
/// 5 frames (100ms at the default cadence) filters out clicks and pops that
/// cross the threshold for only a frame or two.
pub const MIN_SPEECH_FRAMES: u32 = 5;

/// Default number of consecutive silent frames before speech is considered ended.
///
/// 40 frames (800ms) allows for natural pauses without prematurely ending
/// the utterance.
pub const SILENCE_FRAMES: u32 = 40;

/// Default pre-speech prefix window in frames.
///
/// Frames kept in a ring buffer while idle and prepended when speech starts.
/// Captures soft onsets (plosives, fricatives) that occur before energy
/// crosses the speech threshold. 15 frames is 300ms at the default cadence.
pub const PREFIX_FRAMES: usize = 15;

/// Default calibration window in frames.
///
/// 100 frames (2s) of ambient audio is enough for a stable average/max
/// energy estimate.
pub const CALIBRATION_FRAMES: u32 = 100;

/// Default speech timeout in milliseconds.
///
/// If no new audio arrives for this long while an utterance is active, the
/// session finalizes anyway, bounding worst-case latency on VAD misfires.
pub const SPEECH_TIMEOUT_MS: u64 = 2000;

/// Samples buffered by the streaming codec before an encoded block is emitted.
///
/// Matches one default frame so steady-state streaming produces one 160-byte
/// block per 20ms frame.
pub const CODEC_BLOCK_SAMPLES: usize = 320;

/// Default consecutive connection failures before the circuit breaker opens.
pub const FAILURE_THRESHOLD: u32 = 5;

/// Default circuit breaker recovery timeout in milliseconds.
///
/// After this elapses an open breaker permits exactly one trial connection.
pub const RECOVERY_TIMEOUT_MS: u64 = 30_000;

/// Base delay (ms) for the exponential backoff on reconnect.
pub const BACKOFF_BASE_MS: u64 = 1_000;

/// Maximum backoff delay (ms) between reconnect attempts.
pub const BACKOFF_MAX_MS: u64 = 30_000;

/// Multiplier applied to the backoff delay per attempt.
pub const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Maximum random jitter (ms) added to each backoff delay.
///
/// Randomization avoids synchronized retry storms when many clients lose the
/// same server.
pub const BACKOFF_JITTER_MS: u64 = 250;

/// Maximum reconnect attempts before giving up on a transport.
pub const MAX_RETRIES: u32 = 10;

/// Default keep-alive interval in milliseconds.
pub const KEEP_ALIVE_INTERVAL_MS: u64 = 15_000;

/// Maximum messages held in the outbound priority queue while disconnected.
///
/// Prevents unbounded memory growth during long outages; low-priority
/// entries are evicted first once full.
pub const QUEUE_CAPACITY: usize = 256;

/// Buffer size for the transport command and event channels.
pub const CHANNEL_BUFFER_SIZE: usize = 100;
