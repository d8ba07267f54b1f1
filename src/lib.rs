//! Podium Gateway - voice-driven presentation navigation
//!
//! A presenter speaks; slides advance when spoken trigger words show up in
//! the live transcript. This crate provides the real-time pipeline:
//! microphone capture and PCM16 framing, a server-side relay to the
//! streaming transcription service, and the matching/navigation logic
//! that turns transcript turns into slide changes.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                  Capture Session                     │
//! │   Microphone  │  Audio Framer  │  Relay socket       │
//! └───────────────────────┬──────────────────────────────┘
//!             binary PCM16 frames │ ▲ JSON transcript events
//! ┌───────────────────────▼──────────────────────────────┐
//! │                    Relay Service                     │
//! │   one client leg ↔ one upstream leg, per session     │
//! └───────────────────────┬──────────────────────────────┘
//!                         │
//! ┌───────────────────────▼──────────────────────────────┐
//! │        Streaming transcription service (external)    │
//! └──────────────────────────────────────────────────────┘
//!
//! transcript turns → Trigger Matcher → Navigation → slide index
//! ```

pub mod audio;
pub mod config;
pub mod deck;
pub mod error;
pub mod navigation;
pub mod protocol;
pub mod relay;
pub mod session;
pub mod trigger;

pub use config::Config;
pub use deck::{PresentationState, Section};
pub use error::{Error, Result};
pub use navigation::{NavOutcome, Navigator, NavigatorConfig};
pub use protocol::RelayEvent;
pub use session::{CaptureSession, SessionState};
pub use trigger::{TriggerMatch, match_trigger};
