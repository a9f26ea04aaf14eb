//! Stateful 4-bit adaptive differential codec with streaming wrapper.

pub mod adpcm;
pub mod stream;

pub use adpcm::{AdpcmDecoder, AdpcmEncoder, CodecState, INDEX_TABLE, MAX_STEP_INDEX, STEP_TABLE};
pub use stream::{AdpcmStreamProcessor, StreamConfig};
