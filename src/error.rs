// SPDX-License-Identifier: MPL-2.0

use std::path::PathBuf;

/// Failures the engine recovers from locally. None of these reach the host.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The configured video is missing, unreadable, or was never configured.
    #[error("video source unavailable{}: {reason}", path_suffix(.path))]
    ConfigUnavailable {
        path: Option<PathBuf>,
        reason: String,
    },
    /// The decoder could not prepare the media, or reported no usable duration.
    #[error("failed to prepare playback: {reason}")]
    PrepareFailed { reason: String },
}

impl Error {
    pub(crate) fn config(path: Option<PathBuf>, reason: impl ToString) -> Self {
        Self::ConfigUnavailable {
            path,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn prepare(reason: impl ToString) -> Self {
        Self::PrepareFailed {
            reason: reason.to_string(),
        }
    }
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" ({})", p.display()))
        .unwrap_or_default()
}
