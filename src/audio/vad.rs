//! Voice Activity Detection (VAD) module.
//!
//! Classifies each fixed-size frame as speech or silence using smoothed
//! RMS energy against two thresholds with a hysteresis gap, and emits
//! transmit/flush decisions. Owns the pre-speech prefix buffer so onset
//! audio is never clipped.

use crate::audio::frame::SpeechEvent;
use crate::audio::prefix_buffer::PrefixRingBuffer;
use crate::config::VadConfig;

/// Current state of voice activity detection.
///
/// There is deliberately no terminal "speech end" state: end-of-utterance is
/// reported as an event and the gate returns to `Silence`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadState {
    /// No speech detected; frames accumulate in the prefix buffer.
    Silence,
    /// Energy crossed the speech threshold; speech not yet confirmed.
    SpeechStart,
    /// Speech confirmed after `min_speech_frames` consecutive frames.
    SpeechActive,
}

/// Per-frame decision emitted by the analyzer.
#[derive(Debug, Clone)]
pub struct FrameDecision {
    /// Whether this frame should be transmitted downstream.
    pub should_transmit: bool,
    /// Whether the prefix window should be flushed ahead of this frame.
    pub send_prefix: bool,
    /// The buffered prefix as little-endian PCM16 bytes, set at onset.
    pub prefix_audio: Option<Vec<u8>>,
    /// Speech boundary event, if one occurred on this frame.
    pub event: Option<SpeechEvent>,
    /// Raw RMS energy of this frame (0.0 to 1.0).
    pub energy: f32,
    /// Exponentially smoothed energy.
    pub smoothed_energy: f32,
}

impl FrameDecision {
    fn idle(energy: f32, smoothed_energy: f32) -> Self {
        Self {
            should_transmit: false,
            send_prefix: false,
            prefix_audio: None,
            event: None,
            energy,
            smoothed_energy,
        }
    }
}

/// Advisory threshold suggestions produced by a calibration run.
///
/// Never auto-applied — field tuning decides whether to adopt them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationReport {
    /// Frames measured.
    pub frames: u32,
    /// Average RMS energy over the window.
    pub average_energy: f32,
    /// Maximum RMS energy over the window.
    pub max_energy: f32,
    /// Suggested speech threshold: 3x the observed maximum.
    pub suggested_speech_threshold: f32,
    /// Suggested silence threshold: 0.6x the suggested speech threshold.
    pub suggested_silence_threshold: f32,
}

#[derive(Debug)]
struct Calibration {
    remaining: u32,
    frames: u32,
    energy_sum: f64,
    max_energy: f32,
}

/// Frame energy analyzer: the per-frame voice activity gate.
pub struct FrameEnergyAnalyzer {
    config: VadConfig,
    state: VadState,
    smoothed_energy: f32,
    speech_frames: u32,
    silence_frames: u32,
    prefix: PrefixRingBuffer,
    calibration: Option<Calibration>,
    last_report: Option<CalibrationReport>,
}

impl FrameEnergyAnalyzer {
    /// Creates a new analyzer with the given configuration and frame size.
    pub fn new(config: VadConfig, frame_size: usize) -> Self {
        let prefix = PrefixRingBuffer::new(config.prefix_frames, frame_size);
        Self {
            config,
            state: VadState::Silence,
            smoothed_energy: 0.0,
            speech_frames: 0,
            silence_frames: 0,
            prefix,
            calibration: None,
            last_report: None,
        }
    }

    /// Processes one frame and returns the transmit/flush decision.
    ///
    /// Frames must arrive in strict capture order. An empty frame is a
    /// no-op returning the default non-transmitting result.
    pub fn process_frame(&mut self, samples: &[i16]) -> FrameDecision {
        if samples.is_empty() {
            return FrameDecision::idle(0.0, self.smoothed_energy);
        }

        let energy = calculate_rms(samples);

        // Calibration suspends the state machine entirely.
        if self.calibration.is_some() {
            self.accumulate_calibration(energy);
            return FrameDecision::idle(energy, self.smoothed_energy);
        }

        self.smoothed_energy =
            self.config.smoothing * energy + (1.0 - self.config.smoothing) * self.smoothed_energy;
        let smoothed = self.smoothed_energy;

        match self.state {
            VadState::Silence => {
                if smoothed > self.config.speech_threshold {
                    // Onset: flush the prefix window, then stream this frame.
                    let prefix_audio = self.prefix.all_frames_as_bytes();
                    self.prefix.clear();
                    self.state = VadState::SpeechStart;
                    self.speech_frames = 1;
                    self.silence_frames = 0;
                    FrameDecision {
                        should_transmit: true,
                        send_prefix: true,
                        prefix_audio: Some(prefix_audio),
                        event: Some(SpeechEvent::Started),
                        energy,
                        smoothed_energy: smoothed,
                    }
                } else {
                    self.prefix.add_frame(samples);
                    FrameDecision::idle(energy, smoothed)
                }
            }
            VadState::SpeechStart => {
                self.speech_frames += 1;
                if smoothed < self.config.silence_threshold {
                    self.silence_frames += 1;
                    if self.silence_frames >= self.config.silence_frames {
                        // False start: revert without an end event.
                        self.state = VadState::Silence;
                        self.speech_frames = 0;
                        self.silence_frames = 0;
                        return FrameDecision::idle(energy, smoothed);
                    }
                } else {
                    self.silence_frames = 0;
                }

                if self.speech_frames >= self.config.min_speech_frames {
                    self.state = VadState::SpeechActive;
                }

                FrameDecision {
                    should_transmit: true,
                    send_prefix: false,
                    prefix_audio: None,
                    event: None,
                    energy,
                    smoothed_energy: smoothed,
                }
            }
            VadState::SpeechActive => {
                if smoothed < self.config.silence_threshold {
                    self.silence_frames += 1;
                    if self.silence_frames >= self.config.silence_frames {
                        // True end of utterance.
                        self.state = VadState::Silence;
                        self.speech_frames = 0;
                        self.silence_frames = 0;
                        return FrameDecision {
                            should_transmit: false,
                            send_prefix: false,
                            prefix_audio: None,
                            event: Some(SpeechEvent::Ended),
                            energy,
                            smoothed_energy: smoothed,
                        };
                    }
                } else {
                    self.silence_frames = 0;
                }

                FrameDecision {
                    should_transmit: true,
                    send_prefix: false,
                    prefix_audio: None,
                    event: None,
                    energy,
                    smoothed_energy: smoothed,
                }
            }
        }
    }

    /// Starts a calibration run over the next `frames` frames.
    ///
    /// While calibrating, frames are measured but never gated or buffered.
    pub fn start_calibration(&mut self, frames: u32) {
        self.calibration = Some(Calibration {
            remaining: frames.max(1),
            frames: 0,
            energy_sum: 0.0,
            max_energy: 0.0,
        });
        self.last_report = None;
    }

    fn accumulate_calibration(&mut self, energy: f32) {
        let finished = {
            let cal = match self.calibration.as_mut() {
                Some(cal) => cal,
                None => return,
            };
            cal.frames += 1;
            cal.energy_sum += energy as f64;
            cal.max_energy = cal.max_energy.max(energy);
            cal.remaining -= 1;
            cal.remaining == 0
        };

        if finished {
            if let Some(cal) = self.calibration.take() {
                let suggested_speech = cal.max_energy * 3.0;
                self.last_report = Some(CalibrationReport {
                    frames: cal.frames,
                    average_energy: (cal.energy_sum / cal.frames as f64) as f32,
                    max_energy: cal.max_energy,
                    suggested_speech_threshold: suggested_speech,
                    suggested_silence_threshold: suggested_speech * 0.6,
                });
            }
        }
    }

    /// Returns true while a calibration window is in progress.
    pub fn is_calibrating(&self) -> bool {
        self.calibration.is_some()
    }

    /// Returns the report from the most recently completed calibration run.
    pub fn calibration_report(&self) -> Option<CalibrationReport> {
        self.last_report
    }

    /// Returns the current VAD state.
    pub fn state(&self) -> VadState {
        self.state
    }

    /// Returns the current smoothed energy estimate.
    pub fn smoothed_energy(&self) -> f32 {
        self.smoothed_energy
    }

    /// Resets energy tracking, counters, state, and the prefix buffer.
    pub fn reset(&mut self) {
        self.state = VadState::Silence;
        self.smoothed_energy = 0.0;
        self.speech_frames = 0;
        self.silence_frames = 0;
        self.prefix.clear();
        self.calibration = None;
        self.last_report = None;
    }
}

/// Calculates the Root Mean Square (RMS) of audio samples.
///
/// # Returns
/// Normalized RMS value (0.0 to 1.0), where:
/// - 0.0 represents silence
/// - ~0.707 represents a full-scale sine wave
/// - 1.0 represents maximum amplitude
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    let mean_square = sum_squares / samples.len() as f64;
    mean_square.sqrt() as f32
}
