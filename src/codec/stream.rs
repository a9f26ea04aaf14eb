//! Streaming wrapper around the ADPCM codec.
//!
//! Accepts arbitrary-sized PCM chunks, emits encoded blocks on even-sample
//! boundaries, and owns the parity handling the raw encoder refuses to do.

use crate::codec::adpcm::{AdpcmDecoder, AdpcmEncoder, CodecState};
use crate::defaults;
use crate::error::Result;

/// Configuration for the ADPCM stream processor.
#[derive(Debug, Clone, Copy)]
pub struct StreamConfig {
    /// Samples buffered before an encoded block is emitted. Must be even.
    pub block_samples: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            block_samples: defaults::CODEC_BLOCK_SAMPLES,
        }
    }
}

/// Buffers PCM chunks and emits block-aligned encoded ADPCM.
///
/// Holds one encoder and one decoder predictor — one instance per logical
/// stream, never shared across sessions. `reset()` is mandatory at every
/// independent session start.
pub struct AdpcmStreamProcessor {
    config: StreamConfig,
    encoder: AdpcmEncoder,
    decoder: AdpcmDecoder,
    buffer: Vec<i16>,
}

impl AdpcmStreamProcessor {
    /// Creates a processor with default block size.
    pub fn new() -> Self {
        Self::with_config(StreamConfig::default())
    }

    /// Creates a processor with custom configuration.
    ///
    /// An odd block size is rounded down to the nearest even count.
    pub fn with_config(config: StreamConfig) -> Self {
        let block_samples = (config.block_samples & !1).max(2);
        Self {
            config: StreamConfig { block_samples },
            encoder: AdpcmEncoder::new(),
            decoder: AdpcmDecoder::new(),
            buffer: Vec::with_capacity(block_samples),
        }
    }

    /// Feeds a PCM chunk; returns encoded bytes once full blocks are available.
    pub fn push(&mut self, samples: &[i16]) -> Result<Option<Vec<u8>>> {
        self.buffer.extend_from_slice(samples);

        if self.buffer.len() < self.config.block_samples {
            return Ok(None);
        }

        // Encode every complete block, keeping any tail for the next push.
        let whole = self.buffer.len() - (self.buffer.len() % self.config.block_samples);
        let tail = self.buffer.split_off(whole);
        let blocks = std::mem::replace(&mut self.buffer, tail);
        let encoded = self.encoder.encode(&blocks)?;
        Ok(Some(encoded))
    }

    /// Flushes the remaining buffered samples as a final partial block.
    ///
    /// A trailing odd sample is zero-padded to preserve the even-count
    /// contract of the raw encoder.
    pub fn flush(&mut self) -> Result<Option<Vec<u8>>> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        if self.buffer.len() % 2 != 0 {
            self.buffer.push(0);
        }
        let samples = std::mem::take(&mut self.buffer);
        let encoded = self.encoder.encode(&samples)?;
        Ok(Some(encoded))
    }

    /// Decodes received bytes through the stream's decoder predictor.
    pub fn decode(&mut self, bytes: &[u8]) -> Vec<i16> {
        self.decoder.decode(bytes)
    }

    /// Reinitializes both predictors to (0, 0) and drops buffered samples.
    pub fn reset(&mut self) {
        self.encoder.reset();
        self.decoder.reset();
        self.buffer.clear();
    }

    /// Returns the encoder's current predictor state.
    pub fn encoder_state(&self) -> CodecState {
        self.encoder.state()
    }

    /// Returns the decoder's current predictor state.
    pub fn decoder_state(&self) -> CodecState {
        self.decoder.state()
    }

    /// Samples currently buffered awaiting a full block.
    pub fn pending_samples(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for AdpcmStreamProcessor {
    fn default() -> Self {
        Self::new()
    }
}
