// SPDX-License-Identifier: MPL-2.0

//! Video wallpaper engine.
//!
//! Plays one user-chosen video on a wallpaper surface, pausing while the
//! wallpaper is hidden and either looping or freezing on the last frame once
//! the video ends. Audio is driven by a process-wide [`MuteChannel`].

pub mod engine;
mod error;
pub mod mute;
pub mod playback;
pub mod source;

pub use engine::{VideoEngine, WallpaperEngine};
pub use error::Error;
pub use mute::{MuteChannel, MuteSubscription, mute_music, unmute_music};
pub use playback::{PlaybackController, PlaybackState};
pub use source::VideoSource;
pub use video_wallpaper_config as config;
