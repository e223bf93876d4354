//! Release artifact downloads.
//!
//! Files are streamed to disk and hashed on the way through. When the
//! registry published a SHA-256 digest the file is only kept if it matches;
//! a failed or rejected download leaves nothing behind.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use modsync_common::ArtifactFile;
use sha2::{Digest, Sha256};

/// Fetches one release file to a local path.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use modsync_updater::download::HttpDownloader;
///
/// let _downloader = HttpDownloader::new(Duration::from_secs(30), "modsync-docs");
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArtifactDownloader {
    /// Download `file` into `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] when the request, the digest check, or the
    /// write fails. `dest` does not exist afterwards in that case.
    fn download(&self, file: &ArtifactFile, dest: &Path) -> Result<(), DownloadError>;
}

/// Errors arising from artifact downloads.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// The request failed or returned a non-success status other than 404.
    #[error("download failed for {url}: {reason}")]
    HttpError {
        /// The URL that was requested.
        url: String,
        /// What went wrong.
        reason: String,
    },

    /// The server answered 404.
    #[error("artifact not found: {url}")]
    NotFound {
        /// The URL that was requested.
        url: String,
    },

    /// The bytes do not match the published digest.
    #[error("checksum mismatch for {url}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The URL that was downloaded.
        url: String,
        /// Digest published by the registry.
        expected: String,
        /// Digest of what arrived.
        actual: String,
    },

    /// Writing the local file failed.
    #[error("I/O error writing download: {0}")]
    Io(#[from] io::Error),
}

/// [`ArtifactDownloader`] over `ureq`.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    agent: ureq::Agent,
    user_agent: String,
}

impl HttpDownloader {
    /// Build a downloader with a global per-request timeout.
    #[must_use]
    pub fn new(timeout: Duration, user_agent: impl Into<String>) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            user_agent: user_agent.into(),
        }
    }

    fn fetch(&self, file: &ArtifactFile, dest: &Path) -> Result<(), DownloadError> {
        let url = file.download_url.as_str();
        let response = self
            .agent
            .get(url)
            .header("User-Agent", self.user_agent.as_str())
            .call()
            .map_err(|e| classify(url, &e))?;

        let mut sink = HashingWriter::new(File::create(dest)?);
        io::copy(&mut response.into_body().as_reader(), &mut sink)?;
        let actual = sink.finish()?;

        match file.sha256.as_deref() {
            Some(expected) => check_digest(url, expected, actual),
            None => Ok(()),
        }
    }
}

impl ArtifactDownloader for HttpDownloader {
    fn download(&self, file: &ArtifactFile, dest: &Path) -> Result<(), DownloadError> {
        let result = self.fetch(file, dest);
        if result.is_err() && dest.exists() {
            if let Err(e) = std::fs::remove_file(dest) {
                log::warn!("failed to remove partial download {}: {e}", dest.display());
            }
        }
        result
    }
}

/// Writes through to a file while hashing everything written.
struct HashingWriter {
    file: File,
    hasher: Sha256,
}

impl HashingWriter {
    fn new(file: File) -> Self {
        Self {
            file,
            hasher: Sha256::new(),
        }
    }

    /// Flush the file and return the lower-case hex digest.
    fn finish(mut self) -> io::Result<String> {
        self.file.flush()?;
        Ok(format!("{:x}", self.hasher.finalize()))
    }
}

impl Write for HashingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.file.write(buf)?;
        self.hasher.update(buf.get(..written).unwrap_or_default());
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Compare a computed digest with a published one, ignoring case and
/// surrounding whitespace in the published form.
fn check_digest(url: &str, expected: &str, actual: String) -> Result<(), DownloadError> {
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(DownloadError::ChecksumMismatch {
            url: url.to_owned(),
            expected: expected.to_owned(),
            actual,
        })
    }
}

fn classify(url: &str, err: &ureq::Error) -> DownloadError {
    match err {
        ureq::Error::StatusCode(404) => DownloadError::NotFound {
            url: url.to_owned(),
        },
        other => DownloadError::HttpError {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}
