//! Audio framing, voice activity detection, and prefix padding.

pub mod frame;
pub mod prefix_buffer;
pub mod vad;
pub mod wav;

pub use frame::{samples_from_le_bytes, samples_to_le_bytes, AudioFrame, SpeechEvent};
pub use prefix_buffer::PrefixRingBuffer;
pub use vad::{calculate_rms, CalibrationReport, FrameDecision, FrameEnergyAnalyzer, VadState};
pub use wav::{pcm_to_wav, WAV_HEADER_LEN};
