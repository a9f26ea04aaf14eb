//! Adaptive differential (IMA ADPCM style) 4-bit codec.
//!
//! Each 16-bit sample is reduced to a 4-bit code against a running
//! predictor, giving fixed 4:1 compression. The step-size and
//! index-adjustment tables are a wire contract with the remote decoder:
//! both ends must use these exact values bit-for-bit, and both ends must
//! reset predictor state at matching session boundaries.

use crate::error::{Result, VoicegateError};

/// Quantizer step sizes, indexed by the running step index (0..=88).
pub const STEP_TABLE: [i32; 89] = [
    7, 8, 9, 10, 11, 12, 13, 14, 16, 17, 19, 21, 23, 25, 28, 31, 34, 37, 41, 45, 50, 55, 60, 66,
    73, 80, 88, 97, 107, 118, 130, 143, 157, 173, 190, 209, 230, 253, 279, 307, 337, 371, 408,
    449, 494, 544, 598, 658, 724, 796, 876, 963, 1060, 1166, 1282, 1411, 1552, 1707, 1878, 2066,
    2272, 2499, 2749, 3024, 3327, 3660, 4026, 4428, 4871, 5358, 5894, 6484, 7132, 7845, 8630,
    9493, 10442, 11487, 12635, 13899, 15289, 16818, 18500, 20350, 22385, 24623, 27086, 29794,
    32767,
];

/// Step index adjustments, keyed by the 4-bit code.
pub const INDEX_TABLE: [i8; 16] = [-1, -1, -1, -1, 2, 4, 6, 8, -1, -1, -1, -1, 2, 4, 6, 8];

/// Highest valid step index.
pub const MAX_STEP_INDEX: u8 = 88;

/// Running predictor state: previous reconstructed value and step index.
///
/// One independent instance per direction and per logical stream; reset to
/// (0, 0) at every stream start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CodecState {
    /// Previous predicted/reconstructed sample value.
    pub valprev: i16,
    /// Current index into the step-size table (0..=88).
    pub index: u8,
}

impl CodecState {
    /// Creates a state from explicit values, validating the index range.
    ///
    /// Used when resuming a stream from a remotely acknowledged predictor;
    /// an out-of-range index means the predictor is corrupt and the session
    /// must be reset rather than patched.
    pub fn with_values(valprev: i16, index: u8) -> Result<Self> {
        if index > MAX_STEP_INDEX {
            return Err(VoicegateError::CodecState {
                message: format!("step index {} out of range 0..=88", index),
            });
        }
        Ok(Self { valprev, index })
    }

    /// Quantizes one sample to a 4-bit code and advances the predictor.
    fn encode_sample(&mut self, sample: i16) -> u8 {
        let step = STEP_TABLE[self.index as usize];
        let mut diff = sample as i32 - self.valprev as i32;

        let mut code: u8 = 0;
        if diff < 0 {
            code = 8;
            diff = -diff;
        }

        // Three sequential threshold comparisons set bits 2/1/0, and diffq
        // is rebuilt from the coded bits so the encoder predicts exactly
        // what the decoder will reconstruct.
        let mut diffq = step >> 3;
        if diff >= step {
            code |= 4;
            diff -= step;
            diffq += step;
        }
        if diff >= step >> 1 {
            code |= 2;
            diff -= step >> 1;
            diffq += step >> 1;
        }
        if diff >= step >> 2 {
            code |= 1;
            diffq += step >> 2;
        }

        self.advance(code, diffq);
        code
    }

    /// Reconstructs one sample from a 4-bit code and advances the predictor.
    fn decode_sample(&mut self, code: u8) -> i16 {
        let step = STEP_TABLE[self.index as usize];

        let mut diffq = step >> 3;
        if code & 4 != 0 {
            diffq += step;
        }
        if code & 2 != 0 {
            diffq += step >> 1;
        }
        if code & 1 != 0 {
            diffq += step >> 2;
        }

        self.advance(code, diffq);
        self.valprev
    }

    fn advance(&mut self, code: u8, diffq: i32) {
        let valprev = if code & 8 != 0 {
            self.valprev as i32 - diffq
        } else {
            self.valprev as i32 + diffq
        };
        self.valprev = valprev.clamp(i16::MIN as i32, i16::MAX as i32) as i16;

        let index = self.index as i32 + INDEX_TABLE[code as usize] as i32;
        self.index = index.clamp(0, MAX_STEP_INDEX as i32) as u8;
    }
}

/// Stateful ADPCM encoder.
#[derive(Debug, Default)]
pub struct AdpcmEncoder {
    state: CodecState,
}

impl AdpcmEncoder {
    /// Creates an encoder with freshly reset (0, 0) predictor state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes samples, packing two 4-bit codes per byte.
    ///
    /// The earlier sample of each pair lands in the low nibble; n samples
    /// produce n/2 bytes. The sample count must be even — parity handling
    /// belongs to the streaming wrapper, not the raw encoder.
    pub fn encode(&mut self, samples: &[i16]) -> Result<Vec<u8>> {
        if samples.len() % 2 != 0 {
            return Err(VoicegateError::InvalidAudio {
                message: format!("encode requires an even sample count, got {}", samples.len()),
            });
        }

        let mut out = Vec::with_capacity(samples.len() / 2);
        for pair in samples.chunks_exact(2) {
            let low = self.state.encode_sample(pair[0]);
            let high = self.state.encode_sample(pair[1]);
            out.push(low | (high << 4));
        }
        Ok(out)
    }

    /// Returns the current predictor state.
    pub fn state(&self) -> CodecState {
        self.state
    }

    /// Resets the predictor to (0, 0). Mandatory at every stream start.
    pub fn reset(&mut self) {
        self.state = CodecState::default();
    }
}

/// Stateful ADPCM decoder.
#[derive(Debug, Default)]
pub struct AdpcmDecoder {
    state: CodecState,
}

impl AdpcmDecoder {
    /// Creates a decoder with freshly reset (0, 0) predictor state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes packed codes back to samples, two per input byte.
    ///
    /// Output is the reconstruction sequence the encoder itself predicted —
    /// lossy relative to the original signal but deterministic.
    pub fn decode(&mut self, bytes: &[u8]) -> Vec<i16> {
        let mut out = Vec::with_capacity(bytes.len() * 2);
        for &byte in bytes {
            out.push(self.state.decode_sample(byte & 0x0F));
            out.push(self.state.decode_sample(byte >> 4));
        }
        out
    }

    /// Returns the current predictor state.
    pub fn state(&self) -> CodecState {
        self.state
    }

    /// Resets the predictor to (0, 0). Mandatory at every stream start.
    pub fn reset(&mut self) {
        self.state = CodecState::default();
    }
}
