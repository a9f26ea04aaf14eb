//! Frame types and PCM conversion for the ingestion pipeline.
//!
//! Conversion between little-endian bytes and 16-bit samples is explicit and
//! bounds-checked at the API boundary — no implicit coercion anywhere else.

use crate::error::{Result, VoicegateError};

/// Audio frame with metadata for tracking through the pipeline.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Sequence number for ordering frames.
    pub sequence: u64,
    /// Audio samples as 16-bit PCM.
    pub samples: Vec<i16>,
}

impl AudioFrame {
    /// Creates a new audio frame.
    pub fn new(sequence: u64, samples: Vec<i16>) -> Self {
        Self { sequence, samples }
    }

    /// Creates a frame from little-endian PCM16 bytes.
    ///
    /// Rejects buffers whose length is not a multiple of the sample width.
    pub fn from_le_bytes(sequence: u64, bytes: &[u8]) -> Result<Self> {
        Ok(Self::new(sequence, samples_from_le_bytes(bytes)?))
    }

    /// Returns the duration of this frame in milliseconds.
    pub fn duration_ms(&self, sample_rate: u32) -> u32 {
        (self.samples.len() as u32 * 1000) / sample_rate
    }
}

/// Speech boundary events reported by the ingestion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechEvent {
    /// Speech onset confirmed; the prefix window is being flushed.
    Started,
    /// End of utterance detected after the configured trailing silence.
    Ended,
}

/// Converts little-endian PCM16 bytes to signed 16-bit samples.
///
/// Returns an error if the byte length is odd.
pub fn samples_from_le_bytes(bytes: &[u8]) -> Result<Vec<i16>> {
    if bytes.len() % 2 != 0 {
        return Err(VoicegateError::InvalidAudio {
            message: format!("byte length {} is not a multiple of 2", bytes.len()),
        });
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Converts signed 16-bit samples to little-endian PCM16 bytes.
pub fn samples_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_frame_creation() {
        let samples = vec![100i16, 200, 300];
        let frame = AudioFrame::new(42, samples.clone());

        assert_eq!(frame.sequence, 42);
        assert_eq!(frame.samples, samples);
    }

    #[test]
    fn test_audio_frame_duration() {
        let samples = vec![0i16; 16000]; // 1 second at 16kHz
        let frame = AudioFrame::new(0, samples);

        assert_eq!(frame.duration_ms(16000), 1000);
    }

    #[test]
    fn test_samples_from_le_bytes_round_trip() {
        let samples = vec![0i16, 1, -1, i16::MAX, i16::MIN, 12345];
        let bytes = samples_to_le_bytes(&samples);
        assert_eq!(bytes.len(), samples.len() * 2);

        let decoded = samples_from_le_bytes(&bytes).unwrap();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_samples_from_le_bytes_little_endian_order() {
        // 0x0201 little-endian: low byte first
        let decoded = samples_from_le_bytes(&[0x01, 0x02]).unwrap();
        assert_eq!(decoded, vec![0x0201]);
    }

    #[test]
    fn test_samples_from_le_bytes_rejects_odd_length() {
        let result = samples_from_le_bytes(&[0x01, 0x02, 0x03]);
        assert!(matches!(result, Err(VoicegateError::InvalidAudio { .. })));
    }

    #[test]
    fn test_frame_from_le_bytes() {
        let frame = AudioFrame::from_le_bytes(7, &[0x00, 0x00, 0xFF, 0x7F]).unwrap();
        assert_eq!(frame.sequence, 7);
        assert_eq!(frame.samples, vec![0, i16::MAX]);
    }

    #[test]
    fn test_speech_event_equality() {
        assert_eq!(SpeechEvent::Started, SpeechEvent::Started);
        assert_ne!(SpeechEvent::Started, SpeechEvent::Ended);
    }
}
