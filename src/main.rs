// SPDX-License-Identifier: MPL-2.0

//! Standalone host for the video wallpaper engine.
//!
//! Plays the configured video into the window named by
//! `VIDEO_WALLPAPER_WINDOW`, or into a window of its own when unset.
//! `SIGUSR1` toggles mute, `SIGUSR2` toggles visibility, and `SIGINT` or
//! `SIGTERM` shut down cleanly.

use std::sync::Arc;

use calloop::{
    EventLoop, LoopSignal,
    signals::{Signal, Signals},
};
use eyre::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use video_wallpaper::{
    MuteChannel, VideoEngine, WallpaperEngine,
    config::FileConfig,
    playback::video_player::{GstBackend, GstSurface},
};

const WINDOW_ENV: &str = "VIDEO_WALLPAPER_WINDOW";

struct Host {
    engine: VideoEngine<GstBackend>,
    surface: GstSurface,
    visible: bool,
    mute: MuteChannel,
    signal: LoopSignal,
}

impl Host {
    fn on_signal(&mut self, signal: Signal) {
        match signal {
            Signal::SIGUSR1 => {
                let muted = !self.mute.is_muted();
                info!(muted, "Toggling mute");
                self.mute.send(muted);
            }
            Signal::SIGUSR2 => {
                self.visible = !self.visible;
                self.engine.on_visibility_changed(self.visible);
            }
            Signal::SIGINT | Signal::SIGTERM => {
                info!(?signal, "Shutting down");
                self.engine.on_surface_destroyed(&self.surface);
                self.engine.on_engine_destroy();
                self.signal.stop();
            }
            other => warn!(signal = ?other, "Unexpected signal"),
        }
    }
}

fn window_handle() -> Option<usize> {
    let raw = std::env::var(WINDOW_ENV).ok()?;
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x") {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => raw.parse(),
    };
    match parsed {
        Ok(handle) => Some(handle),
        Err(why) => {
            warn!(%why, value = raw, "Ignoring malformed {WINDOW_ENV}");
            None
        }
    }
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = FileConfig::new().wrap_err("failed to locate wallpaper data directory")?;
    info!(root = %config.root().display(), "Reading wallpaper configuration");

    let backend = GstBackend::new().wrap_err("failed to initialize GStreamer")?;
    let mute = MuteChannel::global().clone();

    let mut event_loop: EventLoop<Host> =
        EventLoop::try_new().wrap_err("failed to create event loop")?;

    let signals = Signals::new(&[
        Signal::SIGINT,
        Signal::SIGTERM,
        Signal::SIGUSR1,
        Signal::SIGUSR2,
    ])
    .wrap_err("failed to install signal handlers")?;

    event_loop
        .handle()
        .insert_source(signals, |event, _, host: &mut Host| {
            host.on_signal(event.signal());
        })
        .map_err(|why| eyre::eyre!("failed to register signal source: {why}"))?;

    let mut host = Host {
        engine: VideoEngine::new(backend, Arc::new(config), mute.clone()),
        surface: GstSurface::new(window_handle(), 0, 0),
        visible: true,
        mute,
        signal: event_loop.get_signal(),
    };

    host.engine.on_engine_create();
    host.engine.on_surface_created(&host.surface);

    event_loop
        .run(None, &mut host, |_| {})
        .wrap_err("event loop failed")?;

    info!(state = ?host.engine.state(), "Exited");
    Ok(())
}
