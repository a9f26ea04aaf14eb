//! Per-session ingestion dataflow.
//!
//! One [`IngestSession`] composes the energy gate, the pre-speech
//! prefix window, and the streaming codec into a single `process_frame`
//! call, so a capture loop only has to forward PCM frames in order and
//! ship the returned encoded audio. Sessions are independent; run one
//! per concurrent audio source.

use crate::audio::frame::{samples_from_le_bytes, AudioFrame, SpeechEvent};
use crate::audio::vad::{CalibrationReport, FrameEnergyAnalyzer, VadState};
use crate::clock::{Clock, SystemClock};
use crate::codec::stream::{AdpcmStreamProcessor, StreamConfig};
use crate::config::VadConfig;
use crate::error::{Result, VoicegateError};
use std::time::{Duration, Instant};
use tracing::debug;

/// Encoded audio produced by one processed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtteranceEvent {
    /// Speech onset. `audio` holds the encoded prefix window plus the
    /// triggering frame, and may be empty if less than one codec block
    /// has accumulated.
    Started { audio: Vec<u8> },
    /// A completed codec block while speech is active.
    Audio { audio: Vec<u8> },
    /// End of utterance. `audio` holds the final flushed block, which
    /// may be empty.
    Ended { audio: Vec<u8> },
}

/// VAD-gated, prefix-stitched, codec-framed frame processor.
///
/// The codec predictor resets at every onset so each utterance decodes
/// independently of the previous one.
pub struct IngestSession<C: Clock = SystemClock> {
    analyzer: FrameEnergyAnalyzer,
    codec: AdpcmStreamProcessor,
    clock: C,
    speech_timeout: Duration,
    last_audio_at: Option<Instant>,
    last_sequence: Option<u64>,
}

impl IngestSession<SystemClock> {
    pub fn new(config: VadConfig, frame_size: usize) -> Self {
        Self::with_clock(config, frame_size, StreamConfig::default(), SystemClock)
    }
}

impl<C: Clock> IngestSession<C> {
    pub fn with_clock(
        config: VadConfig,
        frame_size: usize,
        stream: StreamConfig,
        clock: C,
    ) -> Self {
        let speech_timeout = Duration::from_millis(config.speech_timeout_ms);
        Self {
            analyzer: FrameEnergyAnalyzer::new(config, frame_size),
            codec: AdpcmStreamProcessor::with_config(stream),
            clock,
            speech_timeout,
            last_audio_at: None,
            last_sequence: None,
        }
    }

    /// Processes a sequenced frame, rejecting out-of-order delivery.
    ///
    /// The codec's running predictor makes reordered frames produce
    /// corrupt audio downstream, so a non-increasing sequence number is
    /// an error rather than a silent glitch.
    pub fn process(&mut self, frame: &AudioFrame) -> Result<Option<UtteranceEvent>> {
        if let Some(last) = self.last_sequence {
            if frame.sequence <= last {
                return Err(VoicegateError::InvalidAudio {
                    message: format!(
                        "frame {} arrived after frame {}, expected strict capture order",
                        frame.sequence, last
                    ),
                });
            }
        }
        self.last_sequence = Some(frame.sequence);
        self.process_frame(&frame.samples)
    }

    /// Processes one PCM frame, returning any encoded audio to ship.
    ///
    /// Frames must arrive in strict capture order.
    pub fn process_frame(&mut self, samples: &[i16]) -> Result<Option<UtteranceEvent>> {
        let decision = self.analyzer.process_frame(samples);

        match decision.event {
            Some(SpeechEvent::Started) => {
                self.codec.reset();
                let mut audio = Vec::new();
                if let Some(prefix_bytes) = decision.prefix_audio {
                    if !prefix_bytes.is_empty() {
                        let prefix = samples_from_le_bytes(&prefix_bytes)?;
                        if let Some(encoded) = self.codec.push(&prefix)? {
                            audio.extend(encoded);
                        }
                    }
                }
                if let Some(encoded) = self.codec.push(samples)? {
                    audio.extend(encoded);
                }
                self.last_audio_at = Some(self.clock.now());
                debug!(prefix_bytes = audio.len(), "utterance started");
                Ok(Some(UtteranceEvent::Started { audio }))
            }
            Some(SpeechEvent::Ended) => {
                let audio = self.codec.flush()?.unwrap_or_default();
                self.last_audio_at = None;
                debug!(tail_bytes = audio.len(), "utterance ended");
                Ok(Some(UtteranceEvent::Ended { audio }))
            }
            None => {
                if !decision.should_transmit {
                    return Ok(None);
                }
                self.last_audio_at = Some(self.clock.now());
                Ok(self
                    .codec
                    .push(samples)?
                    .map(|audio| UtteranceEvent::Audio { audio }))
            }
        }
    }

    /// Forces finalization if no audio arrived within the speech
    /// timeout while an utterance was active. Call periodically from
    /// the capture loop's timer.
    pub fn check_timeout(&mut self) -> Result<Option<UtteranceEvent>> {
        if !self.is_speaking() {
            return Ok(None);
        }
        let stale = self
            .last_audio_at
            .is_some_and(|last| self.clock.now().duration_since(last) >= self.speech_timeout);
        if !stale {
            return Ok(None);
        }
        debug!("speech timeout, forcing finalization");
        self.finalize()
    }

    /// Ends the session deterministically, flushing any active
    /// utterance.
    pub fn finish(&mut self) -> Result<Option<UtteranceEvent>> {
        if !self.is_speaking() {
            return Ok(None);
        }
        self.finalize()
    }

    pub fn is_speaking(&self) -> bool {
        self.analyzer.state() != VadState::Silence
    }

    pub fn state(&self) -> VadState {
        self.analyzer.state()
    }

    pub fn start_calibration(&mut self, frames: u32) {
        self.analyzer.start_calibration(frames);
    }

    pub fn is_calibrating(&self) -> bool {
        self.analyzer.is_calibrating()
    }

    pub fn calibration_report(&self) -> Option<CalibrationReport> {
        self.analyzer.calibration_report()
    }

    fn finalize(&mut self) -> Result<Option<UtteranceEvent>> {
        let audio = self.codec.flush()?.unwrap_or_default();
        self.analyzer.reset();
        self.last_audio_at = None;
        Ok(Some(UtteranceEvent::Ended { audio }))
    }
}
