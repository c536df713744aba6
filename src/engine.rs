// SPDX-License-Identifier: MPL-2.0

//! Host-facing wallpaper engine.
//!
//! The host runtime decides when the engine is created and destroyed and
//! when its surface comes and goes; [`WallpaperEngine`] is the whole
//! contract between the two. [`VideoEngine`] turns those callbacks into
//! [`PlaybackController`] calls and keeps the mute subscription alive for
//! as long as the engine exists.

use std::sync::Arc;

use tracing::{debug, info, warn};
use video_wallpaper_config::ConfigSource;

use crate::{
    mute::{MuteChannel, MuteSubscription},
    playback::{MediaBackend, PlaybackController, PlaybackState},
    source::VideoSource,
};

/// Lifecycle callbacks a host runtime delivers to a wallpaper engine.
///
/// None of these fail: whatever goes wrong is logged and the engine carries
/// on without media.
pub trait WallpaperEngine {
    type Surface;

    fn on_engine_create(&mut self);

    fn on_surface_created(&mut self, surface: &Self::Surface);

    fn on_visibility_changed(&mut self, visible: bool);

    fn on_surface_destroyed(&mut self, surface: &Self::Surface);

    fn on_engine_destroy(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    New,
    Created,
    Destroyed,
}

/// Plays the configured video on the wallpaper surface.
pub struct VideoEngine<B: MediaBackend> {
    config: Arc<dyn ConfigSource>,
    mute: MuteChannel,
    controller: PlaybackController<B>,
    video_source: Option<VideoSource>,
    subscription: Option<MuteSubscription>,
    lifecycle: Lifecycle,
}

impl<B: MediaBackend> VideoEngine<B> {
    pub fn new(backend: B, config: Arc<dyn ConfigSource>, mute: MuteChannel) -> Self {
        let controller = PlaybackController::new(backend, Arc::clone(&config));
        Self {
            config,
            mute,
            controller,
            video_source: None,
            subscription: None,
            lifecycle: Lifecycle::New,
        }
    }

    #[must_use]
    pub fn controller(&self) -> &PlaybackController<B> {
        &self.controller
    }

    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.controller.state()
    }

    #[must_use]
    pub fn video_source(&self) -> Option<&VideoSource> {
        self.video_source.as_ref()
    }

    fn is_destroyed(&self, callback: &str) -> bool {
        if self.lifecycle == Lifecycle::Destroyed {
            warn!(callback, "Lifecycle callback after engine destroyed, ignoring");
            return true;
        }
        false
    }
}

impl<B: MediaBackend> WallpaperEngine for VideoEngine<B> {
    type Surface = B::Surface;

    fn on_engine_create(&mut self) {
        if self.is_destroyed("on_engine_create") {
            return;
        }

        self.video_source = match VideoSource::resolve(self.config.as_ref()) {
            Ok(source) => {
                info!(path = %source.path().display(), "Video wallpaper source resolved");
                Some(source)
            }
            Err(why) => {
                warn!(%why, "No usable video, wallpaper stays blank");
                None
            }
        };

        let controller = self.controller.clone();
        self.subscription = Some(self.mute.subscribe(move |muted| controller.set_muted(muted)));
        self.lifecycle = Lifecycle::Created;
    }

    fn on_surface_created(&mut self, surface: &B::Surface) {
        if self.is_destroyed("on_surface_created") {
            return;
        }
        let Some(source) = &self.video_source else {
            warn!("Surface created but no video source, not playing");
            return;
        };
        self.controller.start(source, surface);
    }

    fn on_visibility_changed(&mut self, visible: bool) {
        if self.is_destroyed("on_visibility_changed") {
            return;
        }
        debug!(visible, state = ?self.controller.state(), "Visibility changed");
        if visible {
            self.controller.resume();
        } else {
            self.controller.pause();
        }
    }

    fn on_surface_destroyed(&mut self, _surface: &B::Surface) {
        self.controller.teardown();
    }

    fn on_engine_destroy(&mut self) {
        self.controller.teardown();
        if self.subscription.take().is_some() {
            debug!("Unsubscribed from mute channel");
        }
        if self.lifecycle != Lifecycle::Destroyed {
            info!("Video wallpaper engine destroyed");
            self.lifecycle = Lifecycle::Destroyed;
        }
    }
}

impl<B: MediaBackend> Drop for VideoEngine<B> {
    fn drop(&mut self) {
        // Hosts are expected to call on_engine_destroy; make sure anyway.
        self.on_engine_destroy();
    }
}
