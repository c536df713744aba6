// SPDX-License-Identifier: MPL-2.0

//! Playback controller: owns the one session bound to the wallpaper surface.
//!
//! Every mutation goes through a single lock, whether it comes from a
//! lifecycle callback, a pipeline event, or a mute signal. Pipeline events
//! carry the [`SessionId`] they were issued for, so a completion that races a
//! teardown finds a different (or no) session and is dropped.
//!
//! Mute signals change the live session's gain. One that arrives while no
//! session is live is held and decides the opening gain of the next session;
//! otherwise each session opens muted unless the unmute marker is present.

use std::{
    mem,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use tracing::{debug, error, info, warn};
use video_wallpaper_config::{ConfigSource, Preferences};

use super::{
    backend::{EventSink, MediaBackend, MediaPipeline, PipelineEvent, SessionId},
    session::{LiveSession, PlaybackState, Session, Stage},
};
use crate::{Error, source::VideoSource};

struct Inner<B: MediaBackend> {
    backend: B,
    session: Session<B::Pipeline>,
    next_id: u64,
    /// Last mute signal received with no live session.
    pending_muted: Option<bool>,
}

/// Drives a single video session through its states.
///
/// Cloning yields another handle to the same controller.
pub struct PlaybackController<B: MediaBackend> {
    inner: Arc<Mutex<Inner<B>>>,
    config: Arc<dyn ConfigSource>,
}

impl<B: MediaBackend> Clone for PlaybackController<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            config: Arc::clone(&self.config),
        }
    }
}

fn lock<B: MediaBackend>(inner: &Mutex<Inner<B>>) -> MutexGuard<'_, Inner<B>> {
    // A panic elsewhere must not take the wallpaper down with it.
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<B: MediaBackend> PlaybackController<B> {
    pub fn new(backend: B, config: Arc<dyn ConfigSource>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                backend,
                session: Session::NoMedia,
                next_id: 0,
                pending_muted: None,
            })),
            config,
        }
    }

    /// Start a new session for `source` on `surface`, replacing any current
    /// one. Returns as soon as preparation has been requested.
    pub fn start(&self, source: &VideoSource, surface: &B::Surface) -> PlaybackState {
        let mut inner = lock(&self.inner);
        inner.teardown();

        if let Err(why) = source.reverify() {
            warn!(%why, "Video source no longer usable, staying idle");
            return inner.session.state();
        }

        let preferences = self.config.preferences().unwrap_or_else(|why| {
            warn!(%why, "Failed to read preferences, using defaults");
            Preferences::default()
        });
        let looping = preferences.video_looping;
        // The marker only decides the opening gain; later signals still apply.
        let pending = inner.pending_muted.take();
        let muted = !self.config.unmute_marker() && pending.unwrap_or(true);

        inner.next_id += 1;
        let id = SessionId(inner.next_id);

        let mut pipeline = match inner.backend.open(source, surface, looping) {
            Ok(pipeline) => pipeline,
            Err(why) => {
                inner.fail_new(id, looping, Error::prepare(why));
                return inner.session.state();
            }
        };

        if let Err(why) = pipeline.crop_to_fill() {
            warn!(session = %id, ?why, "Failed to set crop-to-fill scaling");
        }

        let events = EventSink::new(id, self.deliver());
        if let Err(why) = pipeline.prepare_async(events) {
            pipeline.release();
            inner.fail_new(id, looping, Error::prepare(why));
            return inner.session.state();
        }

        info!(
            session = %id,
            path = %source.path().display(),
            looping,
            muted,
            "Preparing video"
        );
        inner.session = Session::Live(LiveSession {
            id,
            pipeline,
            stage: Stage::Preparing,
            looping,
            muted,
            visible: true,
            played: false,
            duration: Duration::ZERO,
        });
        PlaybackState::Preparing
    }

    /// Pause for visibility loss. A preparing session remembers it and
    /// holds at the first frame once prepared.
    pub fn pause(&self) {
        if let Session::Live(live) = &mut lock(&self.inner).session {
            live.pause();
        }
    }

    /// Resume for visibility gain. Only looping sessions restart, or one that
    /// was held before it ever played.
    pub fn resume(&self) {
        let mut inner = lock(&self.inner);
        let Session::Live(live) = &mut inner.session else {
            return;
        };
        if let Err(reason) = live.resume() {
            inner.fail(reason);
        }
    }

    /// Apply a mute signal to the live session, or hold it for the next one.
    pub fn set_muted(&self, muted: bool) {
        let mut guard = lock(&self.inner);
        let inner = &mut *guard;
        match &mut inner.session {
            Session::Live(live) => live.set_muted(muted),
            _ => {
                debug!(muted, "No live session, holding mute state for the next one");
                inner.pending_muted = Some(muted);
            }
        }
    }

    /// Release the session's resources and return to `NoMedia`.
    pub fn teardown(&self) {
        lock(&self.inner).teardown();
    }

    /// Feed an event from the pipeline of session `id`.
    pub fn handle_event(&self, id: SessionId, event: PipelineEvent) {
        lock(&self.inner).handle_event(id, event);
    }

    #[must_use]
    pub fn state(&self) -> PlaybackState {
        lock(&self.inner).session.state()
    }

    /// Playback position of the live pipeline.
    #[must_use]
    pub fn position(&self) -> Option<Duration> {
        match &lock(&self.inner).session {
            Session::Live(live) => live.pipeline.position(),
            _ => None,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        lock(&self.inner).session.id()
    }

    /// Looping preference of the current session.
    #[must_use]
    pub fn is_looping(&self) -> Option<bool> {
        lock(&self.inner).session.looping()
    }

    /// Why the current session failed, if it did.
    #[must_use]
    pub fn failure(&self) -> Option<Error> {
        match &lock(&self.inner).session {
            Session::Failed { reason, .. } => Some(reason.clone()),
            _ => None,
        }
    }

    fn deliver(&self) -> Arc<dyn Fn(SessionId, PipelineEvent) + Send + Sync> {
        let inner: Weak<Mutex<Inner<B>>> = Arc::downgrade(&self.inner);
        Arc::new(move |id, event| match inner.upgrade() {
            Some(inner) => lock(&inner).handle_event(id, event),
            None => debug!(session = %id, ?event, "Controller gone, dropping pipeline event"),
        })
    }
}

impl<B: MediaBackend> Inner<B> {
    fn handle_event(&mut self, id: SessionId, event: PipelineEvent) {
        let Session::Live(live) = &mut self.session else {
            debug!(session = %id, ?event, "No live session, dropping pipeline event");
            return;
        };
        if live.id != id {
            debug!(session = %id, current = %live.id, ?event, "Dropping event from stale session");
            return;
        }
        if let Err(reason) = live.apply(event) {
            self.fail(reason);
        }
    }

    /// Release the live session and record the failure.
    fn fail(&mut self, reason: Error) {
        let (id, looping) = match mem::replace(&mut self.session, Session::NoMedia) {
            Session::Live(live) => {
                let key = (live.id, live.looping);
                live.release();
                key
            }
            Session::Failed { id, looping, .. } => (id, looping),
            Session::NoMedia => return,
        };
        self.fail_new(id, looping, reason);
    }

    fn fail_new(&mut self, id: SessionId, looping: bool, reason: Error) {
        error!(session = %id, %reason, "Playback failed");
        self.session = Session::Failed {
            id,
            looping,
            reason,
        };
    }

    fn teardown(&mut self) {
        match mem::replace(&mut self.session, Session::NoMedia) {
            Session::Live(live) => {
                let id = live.id;
                live.release();
                info!(session = %id, "Session torn down");
            }
            Session::Failed { id, .. } => debug!(session = %id, "Cleared failed session"),
            Session::NoMedia => {}
        }
    }
}

impl<B: MediaBackend> std::fmt::Debug for PlaybackController<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("PlaybackController")
            .field("session", &inner.session.id())
            .field("state", &inner.session.state())
            .field("pending_muted", &inner.pending_muted)
            .finish()
    }
}
