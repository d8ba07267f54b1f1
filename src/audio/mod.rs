//! Audio capture and framing
//!
//! The framer turns the callback's float blocks into fixed 800-sample
//! PCM16 frames; capture owns the cpal stream and feeds the framer from
//! the real-time audio thread.

mod capture;
mod framer;

pub use capture::{AudioCapture, samples_to_wav};
pub use framer::{AudioFrame, AudioFramer, FRAME_BYTES, FRAME_SIZE, SAMPLE_RATE, sample_to_pcm16};
