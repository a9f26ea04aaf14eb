//! RIFF/WAVE wrapping for downstream consumers.
//!
//! Decoded or raw PCM handed to batch consumers (speech recognition,
//! debugging) is wrapped in a standard 44-byte WAVE header: PCM, mono,
//! 16-bit, at the configured sample rate.

use crate::error::{Result, VoicegateError};
use std::io::Cursor;

/// Size of the standard RIFF/WAVE header produced by [`pcm_to_wav`].
pub const WAV_HEADER_LEN: usize = 44;

/// Wraps mono PCM16 samples in an in-memory WAV container.
pub fn pcm_to_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| VoicegateError::AudioEncoding {
                message: format!("Failed to create WAV writer: {}", e),
            })?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| VoicegateError::AudioEncoding {
                    message: format!("Failed to write WAV sample: {}", e),
                })?;
        }
        writer.finalize().map_err(|e| VoicegateError::AudioEncoding {
            message: format!("Failed to finalize WAV data: {}", e),
        })?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_header_size_and_payload() {
        let samples = vec![0i16; 320];
        let wav = pcm_to_wav(&samples, 16000).unwrap();

        // 44-byte header + 2 bytes per sample
        assert_eq!(wav.len(), WAV_HEADER_LEN + samples.len() * 2);
    }

    #[test]
    fn test_wav_riff_markers() {
        let wav = pcm_to_wav(&[0i16; 4], 16000).unwrap();

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(&wav[36..40], b"data");
    }

    #[test]
    fn test_wav_format_fields() {
        let wav = pcm_to_wav(&[0i16; 4], 16000).unwrap();

        // PCM format tag, mono, 16kHz, 16-bit — all little-endian
        assert_eq!(u16::from_le_bytes([wav[20], wav[21]]), 1);
        assert_eq!(u16::from_le_bytes([wav[22], wav[23]]), 1);
        assert_eq!(
            u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]),
            16000
        );
        assert_eq!(u16::from_le_bytes([wav[34], wav[35]]), 16);
    }

    #[test]
    fn test_wav_round_trip() {
        let samples = vec![0i16, 1000, -1000, i16::MAX, i16::MIN];
        let wav = pcm_to_wav(&samples, 16000).unwrap();

        let mut reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_wav_empty_samples() {
        let wav = pcm_to_wav(&[], 16000).unwrap();
        assert_eq!(wav.len(), WAV_HEADER_LEN);
    }
}
