// SPDX-License-Identifier: MPL-2.0-only

use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

pub const NAME: &str = "video-wallpaper";
/// File holding the absolute path of the selected video.
pub const VIDEO_PATH_FILE: &str = "video_live_wallpaper_file_path";
/// Zero-byte marker whose presence forces unmuted playback at session start.
pub const UNMUTE_MARKER_FILE: &str = "unmute";
pub const PREFERENCES_FILE: &str = "preferences.ron";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no data directory available for {NAME}")]
    NoDataDir,
    #[error("video path file is empty")]
    EmptyVideoPath,
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse preferences: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("failed to serialize preferences: {0}")]
    Serialize(#[from] ron::Error),
}

/// Playback preferences chosen by the user
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Setters)]
#[serde(default)]
#[must_use]
pub struct Preferences {
    /// restart the video when it ends instead of freezing on the last frame
    pub video_looping: bool,
}

/// Read side of the persisted wallpaper configuration.
///
/// An absent video path is an expected answer, so callers get an `Err` they are
/// meant to log and move past rather than propagate.
pub trait ConfigSource: Send + Sync {
    /// Path of the video selected by the user, exactly as stored.
    ///
    /// # Errors
    ///
    /// Fails if no path was ever stored, or the stored file is unreadable or empty.
    fn video_path(&self) -> Result<PathBuf, Error>;

    /// # Errors
    ///
    /// Fails if the preferences exist but cannot be read or parsed.
    fn preferences(&self) -> Result<Preferences, Error>;

    /// Whether the unmute marker is present.
    fn unmute_marker(&self) -> bool;
}

/// [`ConfigSource`] backed by plain files in the app's private storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileConfig {
    root: PathBuf,
}

impl FileConfig {
    /// Config rooted at `$XDG_DATA_HOME/video-wallpaper`.
    ///
    /// # Errors
    ///
    /// Fails if the platform has no data directory.
    pub fn new() -> Result<Self, Error> {
        dirs::data_dir()
            .map(|dir| Self::with_root(dir.join(NAME)))
            .ok_or(Error::NoDataDir)
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Store the path of the video to play.
    ///
    /// # Errors
    ///
    /// Fails if the storage directory or the path file cannot be written.
    pub fn set_video_path(&self, path: &Path) -> Result<(), Error> {
        fs::create_dir_all(&self.root)?;
        fs::write(
            self.file(VIDEO_PATH_FILE),
            path.as_os_str().as_encoded_bytes(),
        )?;
        Ok(())
    }

    /// # Errors
    ///
    /// Fails if the preferences cannot be serialized or written.
    pub fn set_preferences(&self, preferences: Preferences) -> Result<(), Error> {
        fs::create_dir_all(&self.root)?;
        let contents = ron::ser::to_string_pretty(&preferences, ron::ser::PrettyConfig::default())?;
        fs::write(self.file(PREFERENCES_FILE), contents)?;
        Ok(())
    }

    /// Update only the looping flag, keeping whatever else is stored.
    ///
    /// # Errors
    ///
    /// Fails if the preferences cannot be read back or written.
    pub fn set_looping(&self, looping: bool) -> Result<(), Error> {
        let preferences = self.preferences().unwrap_or_else(|why| {
            tracing::warn!(%why, "stored preferences unreadable, overwriting");
            Preferences::default()
        });
        self.set_preferences(preferences.video_looping(looping))
    }

    /// Create or remove the unmute marker.
    ///
    /// # Errors
    ///
    /// Fails if the marker cannot be created or removed.
    pub fn set_unmute_marker(&self, present: bool) -> Result<(), Error> {
        let marker = self.file(UNMUTE_MARKER_FILE);
        if present {
            fs::create_dir_all(&self.root)?;
            fs::File::create(marker)?;
        } else if let Err(why) = fs::remove_file(marker) {
            if why.kind() != io::ErrorKind::NotFound {
                return Err(why.into());
            }
        }
        Ok(())
    }
}

impl ConfigSource for FileConfig {
    fn video_path(&self) -> Result<PathBuf, Error> {
        let contents = fs::read_to_string(self.file(VIDEO_PATH_FILE))?;
        let trimmed = contents.trim();
        if trimmed.is_empty() {
            return Err(Error::EmptyVideoPath);
        }
        Ok(PathBuf::from(trimmed))
    }

    fn preferences(&self) -> Result<Preferences, Error> {
        match fs::read_to_string(self.file(PREFERENCES_FILE)) {
            Ok(contents) => Ok(ron::from_str(&contents)?),
            Err(why) if why.kind() == io::ErrorKind::NotFound => Ok(Preferences::default()),
            Err(why) => Err(why.into()),
        }
    }

    fn unmute_marker(&self) -> bool {
        self.file(UNMUTE_MARKER_FILE).exists()
    }
}
