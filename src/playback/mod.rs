// SPDX-License-Identifier: MPL-2.0

//! Playback of a single video session onto the wallpaper surface.
//!
//! # Module Structure
//!
//! - [`backend`]: the traits a decoder implements, plus the gain and session id types
//! - [`session`]: the state-tagged session and its transitions
//! - [`controller`]: [`PlaybackController`], which serializes everything that touches a session
//! - `video_player`: the GStreamer `playbin` backend (feature `video`)
//!
//! # States
//!
//! ```text
//! NoMedia ──start──▶ Preparing ──prepared──▶ Playing ◀──resume (looping)── Paused
//!                        │                    │  │ ──────pause──────────────▶
//!                        ▼                    │  └─end of stream (not looping)─▶ FrozenAtEnd
//!                      Failed ◀───error───────┘
//! ```
//!
//! Teardown returns any state to `NoMedia`, releasing the pipeline.

pub mod backend;
pub mod controller;
pub mod session;
#[cfg(feature = "video")]
pub mod video_player;

pub use backend::{
    EventSink, Gain, MediaBackend, MediaPipeline, PipelineEvent, SessionId,
};
pub use controller::PlaybackController;
pub use session::{PlaybackState, freeze_position};

#[cfg(test)]
pub(crate) mod fake;
