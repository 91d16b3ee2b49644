//! Temporary audio artifacts with scoped release.
//!
//! Every artifact is backed by a named temp file. Calling
//! [`AudioArtifact::release`] deletes the file and reports failures; if an
//! artifact is dropped without being released (early return, panic), the
//! drop handler deletes it instead. The backing file is taken out of the
//! artifact on first release, so deletion happens exactly once.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to create audio artifact: {0}")]
    Create(#[source] std::io::Error),

    #[error("failed to read audio artifact {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to release audio artifact {path}: {source}")]
    Release {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("audio artifact already released")]
    Released,
}

/// Container format of an audio payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    /// Browser voice recordings (opus in webm).
    Webm,
    Mp3,
    Wav,
}

impl AudioFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Webm => "webm",
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
        }
    }

    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Webm => "audio/webm",
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/wav",
        }
    }

    /// Guess the format from a file name, falling back to webm.
    #[must_use]
    pub fn from_file_name(name: &str) -> Self {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("mp3") => Self::Mp3,
            Some("wav") => Self::Wav,
            _ => Self::Webm,
        }
    }
}

/// A transient audio payload owned by exactly one turn.
#[derive(Debug)]
pub struct AudioArtifact {
    file: Option<NamedTempFile>,
    path: PathBuf,
    format: AudioFormat,
}

impl AudioArtifact {
    #[must_use]
    pub const fn format(&self) -> AudioFormat {
        self.format
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name used when uploading the payload to a remote service.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path.file_name().map_or_else(
            || format!("audio.{}", self.format.extension()),
            |n| n.to_string_lossy().into_owned(),
        )
    }

    pub async fn read(&self) -> Result<Vec<u8>, ArtifactError> {
        if self.file.is_none() {
            return Err(ArtifactError::Released);
        }
        tokio::fs::read(&self.path)
            .await
            .map_err(|source| ArtifactError::Read {
                path: self.path.clone(),
                source,
            })
    }

    /// Delete the backing file.
    pub fn release(mut self) -> Result<(), ArtifactError> {
        self.close()
    }

    fn close(&mut self) -> Result<(), ArtifactError> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        file.close().map_err(|source| ArtifactError::Release {
            path: self.path.clone(),
            source,
        })?;
        debug!("Released audio artifact {}", self.path.display());
        Ok(())
    }
}

impl Drop for AudioArtifact {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Resource cleanup failure: {e}");
        }
    }
}

/// Where artifacts are created. `None` means the system temp directory.
#[derive(Debug, Clone, Default)]
pub struct ArtifactDir {
    root: Option<PathBuf>,
}

impl ArtifactDir {
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self { root: Some(root) }
    }

    #[must_use]
    pub const fn system_temp() -> Self {
        Self { root: None }
    }

    /// Write `bytes` into a fresh artifact of the given format.
    pub fn create(&self, format: AudioFormat, bytes: &[u8]) -> Result<AudioArtifact, ArtifactError> {
        let suffix = format!(".{}", format.extension());
        let mut builder = tempfile::Builder::new();
        builder.prefix("fluency-").suffix(&suffix);

        let mut file = match &self.root {
            Some(root) => builder.tempfile_in(root),
            None => builder.tempfile(),
        }
        .map_err(ArtifactError::Create)?;

        // A failed write drops `file`, which removes it.
        file.write_all(bytes).map_err(ArtifactError::Create)?;
        file.flush().map_err(ArtifactError::Create)?;

        let artifact = AudioArtifact {
            path: file.path().to_path_buf(),
            file: Some(file),
            format,
        };

        debug!(
            "Created audio artifact {} ({} bytes)",
            artifact.path.display(),
            bytes.len()
        );
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    async fn create_then_read_returns_payload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let artifacts = ArtifactDir::new(dir.path().to_path_buf());

        let artifact = artifacts
            .create(AudioFormat::Webm, b"voice")
            .expect("create artifact");

        assert!(artifact.path().starts_with(dir.path()));
        assert!(artifact.file_name().ends_with(".webm"));
        assert_eq!(artifact.read().await.expect("read artifact"), b"voice");
    }

    #[test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    fn release_deletes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let artifact = ArtifactDir::new(dir.path().to_path_buf())
            .create(AudioFormat::Mp3, b"reply")
            .expect("create artifact");
        let path = artifact.path().to_path_buf();
        assert!(path.exists());

        artifact.release().expect("release artifact");
        assert!(!path.exists());
    }

    #[test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    fn drop_deletes_unreleased_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = {
            let artifact = ArtifactDir::new(dir.path().to_path_buf())
                .create(AudioFormat::Webm, b"voice")
                .expect("create artifact");
            artifact.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn format_from_file_name() {
        assert_eq!(AudioFormat::from_file_name("reply.MP3"), AudioFormat::Mp3);
        assert_eq!(AudioFormat::from_file_name("take.wav"), AudioFormat::Wav);
        assert_eq!(AudioFormat::from_file_name("blob"), AudioFormat::Webm);
    }
}
