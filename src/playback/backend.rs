// SPDX-License-Identifier: MPL-2.0

//! The seam between the playback state machine and a concrete decoder.

use std::{fmt, sync::Arc, time::Duration};

use crate::source::VideoSource;

/// Per-channel audio gain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gain {
    pub left: f32,
    pub right: f32,
}

impl Gain {
    pub const MUTED: Gain = Gain {
        left: 0.0,
        right: 0.0,
    };
    pub const FULL: Gain = Gain {
        left: 1.0,
        right: 1.0,
    };

    #[must_use]
    pub fn for_muted(muted: bool) -> Self {
        if muted { Self::MUTED } else { Self::FULL }
    }
}

/// Identity of one playback session. Never reused within a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub(crate) u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Asynchronous notifications from a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Preparation finished. `duration` is whatever the decoder reported,
    /// possibly zero.
    Prepared { duration: Duration },
    /// The decoder hit an error, during or after preparation.
    Error(String),
    /// Playback reached the end of a non-looping stream.
    EndOfStream,
}

type Deliver = Arc<dyn Fn(SessionId, PipelineEvent) + Send + Sync>;

/// Where a pipeline reports its [`PipelineEvent`]s.
///
/// Each sink is tagged with the session it was handed to, so events from a
/// pipeline that has since been torn down are recognised and dropped.
#[derive(Clone)]
pub struct EventSink {
    session: SessionId,
    deliver: Deliver,
}

impl EventSink {
    pub(crate) fn new(session: SessionId, deliver: Deliver) -> Self {
        Self { session, deliver }
    }

    #[must_use]
    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn emit(&self, event: PipelineEvent) {
        (self.deliver)(self.session, event);
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// Opens decode/render pipelines bound to a host surface.
pub trait MediaBackend: Send + 'static {
    /// Host surface handle the video is rendered onto.
    type Surface: Send;
    type Pipeline: MediaPipeline;

    /// Create a pipeline for `source` rendering onto `surface`.
    ///
    /// With `looping` set the pipeline restarts by itself at end of stream
    /// and never emits [`PipelineEvent::EndOfStream`].
    fn open(
        &self,
        source: &VideoSource,
        surface: &Self::Surface,
        looping: bool,
    ) -> eyre::Result<Self::Pipeline>;
}

/// A live decode/render resource.
pub trait MediaPipeline: Send + 'static {
    /// Fill the whole surface, cropping whatever overflows instead of
    /// letterboxing.
    fn crop_to_fill(&mut self) -> eyre::Result<()>;

    /// Begin preparing the media without blocking.
    ///
    /// Completion is reported through `events` from another thread, never
    /// from inside this call.
    fn prepare_async(&mut self, events: EventSink) -> eyre::Result<()>;

    fn start(&mut self) -> eyre::Result<()>;

    fn pause(&mut self) -> eyre::Result<()>;

    fn stop(&mut self) -> eyre::Result<()>;

    fn seek(&mut self, position: Duration) -> eyre::Result<()>;

    fn set_volume(&mut self, gain: Gain) -> eyre::Result<()>;

    fn position(&self) -> Option<Duration>;

    /// Free the underlying resource. Events emitted afterwards are ignored.
    fn release(self)
    where
        Self: Sized,
    {
        drop(self);
    }
}
