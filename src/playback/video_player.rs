// SPDX-License-Identifier: MPL-2.0

//! GStreamer `playbin` backend.
//!
//! Each [`VideoPlayer`] owns one `playbin` whose video sink is a small bin:
//!
//! ```text
//! playbin ─▶ aspectratiocrop ─▶ videoconvert ─▶ autovideosink
//!    └─────▶ (audio) autoaudiosink, gain via playbin `volume`
//! ```
//!
//! The sink is bound to the host surface through `VideoOverlay` when the
//! host hands us a native window handle. Crop-to-fill is done by cropping
//! the frame to the surface aspect ratio before the sink scales it.
//!
//! Bus messages are watched on a dedicated thread that turns them into
//! [`PipelineEvent`]s. Looping is handled on that thread by seeking back to
//! the start, so looping sessions never see end of stream.

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use gstreamer::prelude::*;
use gstreamer_video::prelude::*;
use tracing::{debug, error, info, warn};

use super::backend::{EventSink, Gain, MediaBackend, MediaPipeline, PipelineEvent};
use crate::source::VideoSource;

/// How long the bus watcher blocks before rechecking for shutdown.
const BUS_POLL_INTERVAL_MS: u64 = 100;

/// Host surface for the GStreamer backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GstSurface {
    /// Native window handle to render into. `None` lets the sink open its own window.
    pub window_handle: Option<usize>,
    pub width: u32,
    pub height: u32,
}

impl GstSurface {
    #[must_use]
    pub fn new(window_handle: Option<usize>, width: u32, height: u32) -> Self {
        Self {
            window_handle,
            width,
            height,
        }
    }
}

/// Opens [`VideoPlayer`]s.
#[derive(Debug)]
pub struct GstBackend;

impl GstBackend {
    /// Initialize GStreamer for this process.
    ///
    /// # Errors
    ///
    /// Fails if GStreamer cannot be initialized.
    pub fn new() -> eyre::Result<Self> {
        gstreamer::init()?;
        demote_broken_nvidia_decoders();
        Ok(Self)
    }
}

impl MediaBackend for GstBackend {
    type Surface = GstSurface;
    type Pipeline = VideoPlayer;

    fn open(
        &self,
        source: &VideoSource,
        surface: &GstSurface,
        looping: bool,
    ) -> eyre::Result<VideoPlayer> {
        VideoPlayer::new(source.path(), *surface, looping)
    }
}

/// NVIDIA decoders can be registered on machines where CUDA does not work,
/// and `playbin` would then pick them over a working software decoder.
/// Rank any that fail to instantiate out of automatic selection.
fn demote_broken_nvidia_decoders() {
    static DEMOTED: std::sync::Once = std::sync::Once::new();

    DEMOTED.call_once(|| {
        for name in ["nvh264dec", "nvh265dec", "nvvp9dec", "nvav1dec"] {
            let Some(factory) = gstreamer::ElementFactory::find(name) else {
                continue;
            };
            if factory.create().build().is_err() {
                warn!(decoder = name, "NVIDIA decoder failed to instantiate, demoting");
                factory.set_rank(gstreamer::Rank::NONE);
            }
        }
    });
}

/// One `playbin` bound to one surface.
pub struct VideoPlayer {
    pipeline: gstreamer::Element,
    /// Missing when `aspectratiocrop` is not installed.
    crop: Option<gstreamer::Element>,
    surface: GstSurface,
    source_path: PathBuf,
    looping: bool,
    /// Tells the bus watcher to exit.
    shutdown: Arc<AtomicBool>,
}

impl VideoPlayer {
    /// Build a stopped pipeline for `path`.
    ///
    /// # Errors
    ///
    /// Fails if the path cannot be turned into a URI or the pipeline cannot
    /// be built.
    pub fn new(path: &Path, surface: GstSurface, looping: bool) -> eyre::Result<Self> {
        let uri = gstreamer::glib::filename_to_uri(path, None)?;

        debug!(
            path = %path.display(),
            width = surface.width,
            height = surface.height,
            looping,
            "Creating playbin"
        );

        let pipeline = gstreamer::ElementFactory::make("playbin")
            .name("wallpaper")
            .property("uri", uri.as_str())
            .build()?;

        let (video_sink, crop) = Self::video_sink()?;
        pipeline.set_property("video-sink", &video_sink);

        if let Some(handle) = surface.window_handle {
            Self::bind_window(&pipeline, handle, surface)?;
        }

        Ok(Self {
            pipeline,
            crop,
            surface,
            source_path: path.to_path_buf(),
            looping,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Video sink bin, with the cropper if this system has it.
    fn video_sink() -> eyre::Result<(gstreamer::Bin, Option<gstreamer::Element>)> {
        match gstreamer::parse::bin_from_description(
            "aspectratiocrop name=crop ! videoconvert ! autovideosink",
            true,
        ) {
            Ok(bin) => {
                let crop = bin.by_name("crop");
                Ok((bin, crop))
            }
            Err(why) => {
                warn!(%why, "aspectratiocrop unavailable, video will be letterboxed");
                let bin =
                    gstreamer::parse::bin_from_description("videoconvert ! autovideosink", true)?;
                Ok((bin, None))
            }
        }
    }

    /// Hand the native window to whichever sink asks for one.
    fn bind_window(
        pipeline: &gstreamer::Element,
        handle: usize,
        surface: GstSurface,
    ) -> eyre::Result<()> {
        let bus = pipeline
            .bus()
            .ok_or_else(|| eyre::eyre!("Pipeline has no bus"))?;

        bus.set_sync_handler(move |_, msg| {
            if !gstreamer_video::is_video_overlay_prepare_window_handle_message(msg) {
                return gstreamer::BusSyncReply::Pass;
            }
            let Some(overlay) = msg
                .src()
                .and_then(|src| src.dynamic_cast_ref::<gstreamer_video::VideoOverlay>())
            else {
                return gstreamer::BusSyncReply::Pass;
            };

            // SAFETY: the host guarantees the handle outlives the surface,
            // and the surface outlives this pipeline.
            unsafe { overlay.set_window_handle(handle) };

            let (width, height) = (
                i32::try_from(surface.width).unwrap_or(i32::MAX),
                i32::try_from(surface.height).unwrap_or(i32::MAX),
            );
            if width > 0 && height > 0 {
                if let Err(why) = overlay.set_render_rectangle(0, 0, width, height) {
                    warn!(%why, "Failed to set render rectangle");
                }
            }
            debug!(handle, "Bound video sink to host surface");
            gstreamer::BusSyncReply::Drop
        });
        Ok(())
    }

    fn spawn_bus_watch(&self, events: EventSink) -> eyre::Result<()> {
        let bus = self
            .pipeline
            .bus()
            .ok_or_else(|| eyre::eyre!("Pipeline has no bus"))?;
        let watch = BusWatch {
            pipeline: self.pipeline.clone(),
            bus,
            events,
            looping: self.looping,
            shutdown: Arc::clone(&self.shutdown),
            source_path: self.source_path.clone(),
        };

        thread::Builder::new()
            .name(format!("wallpaper-bus-{}", watch.events.session()))
            .spawn(move || watch.run())?;
        Ok(())
    }

    fn set_state(&self, state: gstreamer::State) -> eyre::Result<()> {
        self.pipeline
            .set_state(state)
            .map_err(|e| eyre::eyre!("Failed to set pipeline to {:?}: {:?}", state, e))?;
        Ok(())
    }

    fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            error!(?e, path = %self.source_path.display(), "Failed to stop video pipeline");
        }
    }
}

impl MediaPipeline for VideoPlayer {
    fn crop_to_fill(&mut self) -> eyre::Result<()> {
        let Some(crop) = &self.crop else {
            eyre::bail!("no aspectratiocrop element available");
        };

        let (Ok(width), Ok(height)) = (
            i32::try_from(self.surface.width),
            i32::try_from(self.surface.height),
        ) else {
            eyre::bail!("surface too large to crop for");
        };
        if width == 0 || height == 0 {
            debug!("Surface size unknown, not cropping");
            return Ok(());
        }

        crop.set_property("aspect-ratio", gstreamer::Fraction::new(width, height));
        debug!(width, height, "Cropping to surface aspect ratio");
        Ok(())
    }

    fn prepare_async(&mut self, events: EventSink) -> eyre::Result<()> {
        self.spawn_bus_watch(events)?;
        // Preroll happens in the background; the watcher reports it.
        if let Err(e) = self.set_state(gstreamer::State::Paused) {
            self.shutdown();
            return Err(e);
        }
        Ok(())
    }

    fn start(&mut self) -> eyre::Result<()> {
        self.set_state(gstreamer::State::Playing)
    }

    fn pause(&mut self) -> eyre::Result<()> {
        self.set_state(gstreamer::State::Paused)
    }

    fn stop(&mut self) -> eyre::Result<()> {
        self.set_state(gstreamer::State::Ready)
    }

    fn seek(&mut self, position: Duration) -> eyre::Result<()> {
        let nanos = u64::try_from(position.as_nanos()).unwrap_or(u64::MAX);
        self.pipeline.seek_simple(
            gstreamer::SeekFlags::FLUSH | gstreamer::SeekFlags::ACCURATE,
            gstreamer::ClockTime::from_nseconds(nanos),
        )?;
        Ok(())
    }

    fn set_volume(&mut self, gain: Gain) -> eyre::Result<()> {
        // playbin has a single linear volume; both channels always match here.
        let volume = (f64::from(gain.left) + f64::from(gain.right)) / 2.0;
        self.pipeline.set_property("volume", volume);
        Ok(())
    }

    fn position(&self) -> Option<Duration> {
        self.pipeline
            .query_position::<gstreamer::ClockTime>()
            .map(|position| Duration::from_nanos(position.nseconds()))
    }
}

impl Drop for VideoPlayer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Bus watcher state, moved onto its own thread.
struct BusWatch {
    pipeline: gstreamer::Element,
    bus: gstreamer::Bus,
    events: EventSink,
    looping: bool,
    shutdown: Arc<AtomicBool>,
    source_path: PathBuf,
}

impl BusWatch {
    fn run(self) {
        use gstreamer::MessageView;

        let mut prepared = false;
        let mut loops = 0u32;

        while !self.shutdown.load(Ordering::Acquire) {
            let timeout = gstreamer::ClockTime::from_mseconds(BUS_POLL_INTERVAL_MS);
            let Some(msg) = self.bus.timed_pop(timeout) else {
                continue;
            };
            if self.shutdown.load(Ordering::Acquire) {
                break;
            }

            match msg.view() {
                MessageView::StateChanged(change) => {
                    let ours = change.src() == Some(self.pipeline.upcast_ref::<gstreamer::Object>());
                    if !ours {
                        continue;
                    }
                    debug!(old = ?change.old(), new = ?change.current(), "Pipeline state changed");
                    if !prepared
                        && change.current() == gstreamer::State::Paused
                        && change.pending() == gstreamer::State::VoidPending
                    {
                        prepared = true;
                        let duration = self
                            .pipeline
                            .query_duration::<gstreamer::ClockTime>()
                            .map(|d| Duration::from_nanos(d.nseconds()))
                            .unwrap_or_default();
                        info!(
                            path = %self.source_path.display(),
                            duration_ms = duration.as_millis(),
                            "Video prepared"
                        );
                        self.events.emit(PipelineEvent::Prepared { duration });
                    }
                }
                MessageView::Eos(_) => {
                    if !self.looping {
                        self.events.emit(PipelineEvent::EndOfStream);
                        continue;
                    }
                    loops += 1;
                    debug!(loops, path = %self.source_path.display(), "Video EOS, seeking to start");
                    if let Err(e) = self.pipeline.seek_simple(
                        gstreamer::SeekFlags::FLUSH | gstreamer::SeekFlags::KEY_UNIT,
                        gstreamer::ClockTime::ZERO,
                    ) {
                        error!(?e, "Failed to seek to start for loop");
                        self.events
                            .emit(PipelineEvent::Error(format!("loop seek failed: {e}")));
                    }
                }
                MessageView::Error(err) => {
                    error!(
                        src = ?err.src().map(|s| s.path_string()),
                        error = %err.error(),
                        debug = ?err.debug(),
                        "GStreamer pipeline error"
                    );
                    self.events.emit(PipelineEvent::Error(err.error().to_string()));
                }
                MessageView::Warning(warning) => {
                    warn!(
                        src = ?warning.src().map(|s| s.path_string()),
                        error = %warning.error(),
                        "GStreamer pipeline warning"
                    );
                }
                _ => {}
            }
        }

        debug!(session = %self.events.session(), "Bus watcher exiting");
    }
}
