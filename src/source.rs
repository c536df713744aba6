// SPDX-License-Identifier: MPL-2.0

//! Video source resolution and verification.
//!
//! The stored path is only trusted after it has been checked to be an
//! absolute path to a regular file we can open for reading. Extensions are
//! advisory: the decoder has the final say on what it can play.

use std::{
    fs::File,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};
use video_wallpaper_config::ConfigSource;

use crate::Error;

/// Container extensions we expect to hold playable video. Checked
/// case-insensitively.
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4",  // MPEG-4 container (typically H.264/H.265 codec)
    "webm", // WebM container (VP8/VP9/AV1)
    "mkv",  // Matroska container (any codec)
    "avi",  // AVI container (legacy format)
    "mov",  // QuickTime container (typically H.264)
    "m4v",  // MPEG-4 Video (Apple variant of MP4)
    "ogv",  // Ogg Video container (Theora codec)
    "3gp",  // 3GPP container, common for phone recordings
];

/// Check if a path has a known video container extension.
#[must_use]
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// A verified, absolute path to the video to play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSource {
    path: PathBuf,
}

impl VideoSource {
    /// Read the stored path from `config` and verify it.
    ///
    /// # Errors
    ///
    /// [`Error::ConfigUnavailable`] if no path is stored or the file fails
    /// verification.
    pub fn resolve(config: &dyn ConfigSource) -> Result<Self, Error> {
        let path = config
            .video_path()
            .map_err(|why| Error::config(None, why))?;
        Self::verify(path)
    }

    /// # Errors
    ///
    /// [`Error::ConfigUnavailable`] if `path` is relative, missing, not a
    /// regular file, or cannot be opened for reading.
    pub fn verify(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();

        if !path.is_absolute() {
            return Err(Error::config(Some(path), "path is not absolute"));
        }

        let metadata = match path.metadata() {
            Ok(metadata) => metadata,
            Err(why) => return Err(Error::config(Some(path), why)),
        };
        if !metadata.is_file() {
            return Err(Error::config(Some(path), "not a regular file"));
        }

        if let Err(why) = File::open(&path) {
            return Err(Error::config(Some(path), why));
        }

        if !is_video_file(&path) {
            warn!(path = %path.display(), "Unrecognized video extension, letting the decoder decide");
        }

        debug!(path = %path.display(), "Video source verified");
        Ok(Self { path })
    }

    /// Check again that the file is still there and readable.
    ///
    /// # Errors
    ///
    /// Same as [`VideoSource::verify`].
    pub fn reverify(&self) -> Result<(), Error> {
        Self::verify(self.path.clone()).map(|_| ())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_is_video_file() {
        assert!(is_video_file(Path::new("test.mp4")));
        assert!(is_video_file(Path::new("test.MP4")));
        assert!(is_video_file(Path::new("test.WebM")));
        assert!(is_video_file(Path::new("/sdcard/DCIM/clip.3gp")));
        assert!(is_video_file(Path::new("my.video.file.mkv")));
        assert!(!is_video_file(Path::new("test.gif")));
        assert!(!is_video_file(Path::new("test.png")));
        assert!(!is_video_file(Path::new("test")));
    }

    #[test]
    fn verify_accepts_readable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waves.mp4");
        fs::write(&path, b"not really a video").unwrap();

        let source = VideoSource::verify(&path).unwrap();
        assert_eq!(source.path(), path);
        assert!(source.reverify().is_ok());
    }

    #[test]
    fn verify_accepts_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waves.bin");
        fs::write(&path, b"").unwrap();
        assert!(VideoSource::verify(&path).is_ok());
    }

    #[test]
    fn verify_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.mp4");
        assert!(matches!(
            VideoSource::verify(&path),
            Err(Error::ConfigUnavailable { path: Some(p), .. }) if p == path
        ));
    }

    #[test]
    fn verify_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(VideoSource::verify(dir.path()).is_err());
    }

    #[test]
    fn verify_rejects_relative_path() {
        assert!(VideoSource::verify("videos/waves.mp4").is_err());
    }

    #[test]
    fn reverify_notices_deleted_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waves.mp4");
        fs::write(&path, b"").unwrap();
        let source = VideoSource::verify(&path).unwrap();

        fs::remove_file(&path).unwrap();
        assert!(source.reverify().is_err());
    }
}
