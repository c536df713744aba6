// SPDX-License-Identifier: MPL-2.0

//! In-memory backend and config used by the unit tests.

use std::{
    io,
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use video_wallpaper_config::{ConfigSource, Error as ConfigError, Preferences};

use super::backend::{EventSink, Gain, MediaBackend, MediaPipeline, PipelineEvent};
use crate::source::VideoSource;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CropToFill,
    Prepare,
    Start,
    Pause,
    Stop,
    Seek(Duration),
    Volume(Gain),
    Release,
}

#[derive(Debug, Default)]
struct PipelineLog {
    looping: bool,
    surface: u32,
    calls: Vec<Call>,
    events: Option<EventSink>,
    duration: Duration,
    position: Duration,
    volume: Option<Gain>,
    playing: bool,
    released: bool,
}

/// Stand-in for a host surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeSurface(pub u32);

#[derive(Clone, Default)]
pub struct FakeBackend {
    pipelines: Arc<Mutex<Vec<Arc<Mutex<PipelineLog>>>>>,
    fail_open: Arc<AtomicBool>,
    fail_prepare: Arc<AtomicBool>,
}

impl FakeBackend {
    pub fn fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn fail_prepare(&self, fail: bool) {
        self.fail_prepare.store(fail, Ordering::SeqCst);
    }

    /// Number of pipelines ever opened.
    pub fn opened(&self) -> usize {
        self.pipelines.lock().unwrap().len()
    }

    /// Number of pipelines opened and not yet released.
    pub fn live(&self) -> usize {
        self.pipelines
            .lock()
            .unwrap()
            .iter()
            .filter(|log| !log.lock().unwrap().released)
            .count()
    }

    pub fn pipeline(&self, index: usize) -> FakeHandle {
        FakeHandle(Arc::clone(&self.pipelines.lock().unwrap()[index]))
    }

    pub fn last(&self) -> FakeHandle {
        let pipelines = self.pipelines.lock().unwrap();
        FakeHandle(Arc::clone(pipelines.last().expect("no pipeline opened")))
    }
}

impl MediaBackend for FakeBackend {
    type Surface = FakeSurface;
    type Pipeline = FakePipeline;

    fn open(
        &self,
        _source: &VideoSource,
        surface: &FakeSurface,
        looping: bool,
    ) -> eyre::Result<FakePipeline> {
        if self.fail_open.load(Ordering::SeqCst) {
            eyre::bail!("decoder unavailable");
        }
        let log = Arc::new(Mutex::new(PipelineLog {
            looping,
            surface: surface.0,
            ..PipelineLog::default()
        }));
        self.pipelines.lock().unwrap().push(Arc::clone(&log));
        Ok(FakePipeline {
            log,
            fail_prepare: self.fail_prepare.load(Ordering::SeqCst),
        })
    }
}

pub struct FakePipeline {
    log: Arc<Mutex<PipelineLog>>,
    fail_prepare: bool,
}

impl FakePipeline {
    fn record(&self, call: Call) -> std::sync::MutexGuard<'_, PipelineLog> {
        let mut log = self.log.lock().unwrap();
        assert!(!log.released, "{call:?} on a released pipeline");
        log.calls.push(call);
        log
    }
}

impl MediaPipeline for FakePipeline {
    fn crop_to_fill(&mut self) -> eyre::Result<()> {
        self.record(Call::CropToFill);
        Ok(())
    }

    fn prepare_async(&mut self, events: EventSink) -> eyre::Result<()> {
        let mut log = self.record(Call::Prepare);
        if self.fail_prepare {
            eyre::bail!("unsupported codec");
        }
        log.events = Some(events);
        Ok(())
    }

    fn start(&mut self) -> eyre::Result<()> {
        self.record(Call::Start).playing = true;
        Ok(())
    }

    fn pause(&mut self) -> eyre::Result<()> {
        self.record(Call::Pause).playing = false;
        Ok(())
    }

    fn stop(&mut self) -> eyre::Result<()> {
        self.record(Call::Stop).playing = false;
        Ok(())
    }

    fn seek(&mut self, position: Duration) -> eyre::Result<()> {
        self.record(Call::Seek(position)).position = position;
        Ok(())
    }

    fn set_volume(&mut self, gain: Gain) -> eyre::Result<()> {
        self.record(Call::Volume(gain)).volume = Some(gain);
        Ok(())
    }

    fn position(&self) -> Option<Duration> {
        Some(self.log.lock().unwrap().position)
    }

    fn release(self) {
        let mut log = self.record(Call::Release);
        log.playing = false;
        log.released = true;
    }
}

/// Test-side view of one opened pipeline.
#[derive(Clone)]
pub struct FakeHandle(Arc<Mutex<PipelineLog>>);

impl FakeHandle {
    fn emit(&self, event: PipelineEvent) {
        // Never hold the log while the controller reacts; it calls back in.
        let events = self.0.lock().unwrap().events.clone();
        events.expect("prepare was never requested").emit(event);
    }

    pub fn prepared(&self, duration: Duration) {
        self.0.lock().unwrap().duration = duration;
        self.emit(PipelineEvent::Prepared { duration });
    }

    pub fn error(&self, reason: &str) {
        self.emit(PipelineEvent::Error(reason.to_string()));
    }

    /// Play to the end and report it, as a non-looping decoder would.
    pub fn end_of_stream(&self) {
        {
            let mut log = self.0.lock().unwrap();
            log.position = log.duration;
            log.playing = false;
        }
        self.emit(PipelineEvent::EndOfStream);
    }

    /// Move the playhead as if time had passed.
    pub fn advance_to(&self, position: Duration) {
        self.0.lock().unwrap().position = position;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().calls.clone()
    }

    pub fn position(&self) -> Duration {
        self.0.lock().unwrap().position
    }

    pub fn volume(&self) -> Option<Gain> {
        self.0.lock().unwrap().volume
    }

    pub fn is_playing(&self) -> bool {
        self.0.lock().unwrap().playing
    }

    pub fn is_released(&self) -> bool {
        self.0.lock().unwrap().released
    }

    pub fn is_looping(&self) -> bool {
        self.0.lock().unwrap().looping
    }

    pub fn surface(&self) -> u32 {
        self.0.lock().unwrap().surface
    }
}

/// Config held in memory, adjustable mid-test.
#[derive(Debug, Default)]
pub struct MemoryConfig {
    pub video_path: Mutex<Option<PathBuf>>,
    pub looping: AtomicBool,
    pub unmute_marker: AtomicBool,
    pub broken_preferences: AtomicBool,
}

impl MemoryConfig {
    pub fn with_video(path: impl Into<PathBuf>) -> Self {
        Self {
            video_path: Mutex::new(Some(path.into())),
            ..Self::default()
        }
    }

    pub fn set_looping(&self, looping: bool) {
        self.looping.store(looping, Ordering::SeqCst);
    }

    pub fn set_unmute_marker(&self, present: bool) {
        self.unmute_marker.store(present, Ordering::SeqCst);
    }
}

impl ConfigSource for MemoryConfig {
    fn video_path(&self) -> Result<PathBuf, ConfigError> {
        self.video_path
            .lock()
            .unwrap()
            .clone()
            .ok_or(ConfigError::EmptyVideoPath)
    }

    fn preferences(&self) -> Result<Preferences, ConfigError> {
        if self.broken_preferences.load(Ordering::SeqCst) {
            return Err(ConfigError::Io(io::Error::other(
                "preferences.ron: permission denied",
            )));
        }
        Ok(Preferences::default().video_looping(self.looping.load(Ordering::SeqCst)))
    }

    fn unmute_marker(&self) -> bool {
        self.unmute_marker.load(Ordering::SeqCst)
    }
}
