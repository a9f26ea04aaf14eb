//! voicegate - Real-time voice ingestion core
//!
//! Energy-gated voice activity detection with pre-speech padding, a
//! streaming 4-bit adaptive differential codec, and a reconnecting
//! transport with a priority backlog. Feed PCM16 frames into an
//! [`IngestSession`] and ship the encoded utterances it emits through a
//! [`ResilientTransport`].

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

pub mod audio;
pub mod clock;
pub mod codec;
pub mod config;
pub mod defaults;
pub mod error;
pub mod session;
pub mod transport;

pub use audio::{
    calculate_rms, AudioFrame, FrameEnergyAnalyzer, PrefixRingBuffer, SpeechEvent, VadState,
};
pub use clock::{Clock, MockClock, SystemClock};
pub use codec::{AdpcmDecoder, AdpcmEncoder, AdpcmStreamProcessor, CodecState};
pub use config::{AudioConfig, Config, TransportConfig, VadConfig};
pub use error::{Result, VoicegateError};
pub use session::{IngestSession, UtteranceEvent};
pub use transport::{
    ConnectionState, MessagePriority, ResilientTransport, TransportCommand, TransportEvent,
};
