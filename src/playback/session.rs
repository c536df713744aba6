// SPDX-License-Identifier: MPL-2.0

//! State-tagged playback session.
//!
//! Whether a decode/render resource exists is encoded in the type: only
//! [`Session::Live`] holds a pipeline, so "no resource" is a state that is
//! checked rather than assumed.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::backend::{Gain, MediaPipeline, PipelineEvent, SessionId};
use crate::Error;

/// Observable state of the controller's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    NoMedia,
    Preparing,
    Playing,
    Paused,
    FrozenAtEnd,
    Failed,
}

/// Stages in which the pipeline is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Preparing,
    Playing,
    Paused,
    FrozenAtEnd,
}

pub(crate) struct LiveSession<P> {
    pub id: SessionId,
    pub pipeline: P,
    pub stage: Stage,
    pub looping: bool,
    pub muted: bool,
    /// Last visibility reported by the host.
    pub visible: bool,
    /// Whether the pipeline has ever been started.
    pub played: bool,
    pub duration: Duration,
}

pub(crate) enum Session<P> {
    NoMedia,
    Live(LiveSession<P>),
    Failed {
        id: SessionId,
        looping: bool,
        reason: Error,
    },
}

impl<P> Session<P> {
    pub fn state(&self) -> PlaybackState {
        match self {
            Session::NoMedia => PlaybackState::NoMedia,
            Session::Failed { .. } => PlaybackState::Failed,
            Session::Live(live) => match live.stage {
                Stage::Preparing => PlaybackState::Preparing,
                Stage::Playing => PlaybackState::Playing,
                Stage::Paused => PlaybackState::Paused,
                Stage::FrozenAtEnd => PlaybackState::FrozenAtEnd,
            },
        }
    }

    pub fn id(&self) -> Option<SessionId> {
        match self {
            Session::NoMedia => None,
            Session::Live(live) => Some(live.id),
            Session::Failed { id, .. } => Some(*id),
        }
    }

    pub fn looping(&self) -> Option<bool> {
        match self {
            Session::NoMedia => None,
            Session::Live(live) => Some(live.looping),
            Session::Failed { looping, .. } => Some(*looping),
        }
    }
}

/// Where a non-looping stream parks once it ends: 99.9% of the way in,
/// rounded up to the nanosecond but always short of the end.
#[must_use]
pub fn freeze_position(duration: Duration) -> Duration {
    let total = duration.as_nanos();
    if total == 0 {
        return Duration::ZERO;
    }
    let target = (total * 999).div_ceil(1000).min(total - 1);
    Duration::from_nanos(u64::try_from(target).unwrap_or(u64::MAX))
}

impl<P: MediaPipeline> LiveSession<P> {
    /// Apply a pipeline event. An `Err` means the session must fail.
    pub fn apply(&mut self, event: PipelineEvent) -> Result<(), Error> {
        match event {
            PipelineEvent::Prepared { duration } => self.prepared(duration),
            PipelineEvent::Error(reason) => Err(Error::prepare(reason)),
            PipelineEvent::EndOfStream => {
                self.end_of_stream();
                Ok(())
            }
        }
    }

    fn prepared(&mut self, duration: Duration) -> Result<(), Error> {
        if self.stage != Stage::Preparing {
            debug!(session = %self.id, stage = ?self.stage, "Ignoring repeated prepare completion");
            return Ok(());
        }
        if duration.is_zero() {
            return Err(Error::prepare("media reports no duration"));
        }

        self.duration = duration;
        self.apply_gain();

        if !self.visible {
            if let Err(why) = self.pipeline.pause() {
                warn!(session = %self.id, ?why, "Failed to hold hidden video");
            }
            self.stage = Stage::Paused;
            info!(
                session = %self.id,
                duration_ms = duration.as_millis(),
                "Video prepared while hidden, holding at first frame"
            );
            return Ok(());
        }

        self.pipeline.start().map_err(Error::prepare)?;
        self.stage = Stage::Playing;
        self.played = true;
        info!(
            session = %self.id,
            duration_ms = duration.as_millis(),
            looping = self.looping,
            muted = self.muted,
            "Playback started"
        );
        Ok(())
    }

    fn end_of_stream(&mut self) {
        if self.looping {
            debug!(session = %self.id, "End of stream on looping session, decoder restarts it");
            return;
        }
        if self.stage != Stage::Playing {
            debug!(session = %self.id, stage = ?self.stage, "Ignoring end of stream");
            return;
        }

        let target = freeze_position(self.duration);
        if let Err(why) = self.pipeline.seek(target) {
            warn!(session = %self.id, ?why, "Failed to seek to last frame");
        }
        if let Err(why) = self.pipeline.pause() {
            warn!(session = %self.id, ?why, "Failed to pause on last frame");
        }
        self.stage = Stage::FrozenAtEnd;
        debug!(session = %self.id, position_ms = target.as_millis(), "Seeked to last frame and paused");
    }

    /// Visibility lost. Only a playing session has anything to pause; a
    /// preparing one will hold once prepared.
    pub fn pause(&mut self) {
        self.visible = false;
        if self.stage != Stage::Playing {
            return;
        }
        match self.pipeline.pause() {
            Ok(()) => {
                self.stage = Stage::Paused;
                debug!(session = %self.id, "Paused");
            }
            Err(why) => warn!(session = %self.id, ?why, "Failed to pause"),
        }
    }

    /// Visibility regained. Looping content restarts from the top, and a video
    /// held before it ever played starts now; anything else stays where it is.
    pub fn resume(&mut self) -> Result<(), Error> {
        self.visible = true;
        if self.stage == Stage::Paused && !self.played {
            self.pipeline.start().map_err(Error::prepare)?;
            self.stage = Stage::Playing;
            self.played = true;
            debug!(session = %self.id, "Started held video");
            return Ok(());
        }
        if !self.looping {
            debug!(session = %self.id, stage = ?self.stage, "Not looping, leaving playback as is");
            return Ok(());
        }
        if self.stage != Stage::Paused {
            return Ok(());
        }

        if let Err(why) = self.pipeline.seek(Duration::ZERO) {
            warn!(session = %self.id, ?why, "Failed to rewind before restart");
        }
        self.pipeline.start().map_err(Error::prepare)?;
        self.stage = Stage::Playing;
        debug!(session = %self.id, "Restarted from the beginning");
        Ok(())
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        // The gain is applied on the way into `Playing`.
        if self.stage != Stage::Preparing {
            self.apply_gain();
        }
    }

    fn apply_gain(&mut self) {
        if let Err(why) = self.pipeline.set_volume(Gain::for_muted(self.muted)) {
            warn!(session = %self.id, ?why, "Failed to set volume");
        }
    }

    /// Stop if needed and free the pipeline.
    pub fn release(mut self) {
        if self.stage == Stage::Playing {
            if let Err(why) = self.pipeline.stop() {
                warn!(session = %self.id, ?why, "Failed to stop before release");
            }
        }
        self.pipeline.release();
        debug!(session = %self.id, "Released pipeline");
    }
}
