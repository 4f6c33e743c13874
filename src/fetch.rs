use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::{DynamicImage, ImageError};
use reqwest::blocking::Client;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to download image from {url} timed out. Please try again.")]
    DownloadTimeout { url: String },
    #[error("Failed to download image from {url}: {detail}")]
    DownloadError { url: String, detail: String },
    #[error("Failed to identify image content. It may be corrupted.")]
    UndecodableContent(#[source] ImageError),
    #[error("Permission denied: Cannot save image to {}.", path.display())]
    WriteDenied { path: PathBuf },
    #[error("Failed to save image: {0}")]
    Unexpected(String),
}

/// A decoded image and the file it was written to.
#[derive(Debug)]
pub struct ImageAsset {
    pub path: PathBuf,
    pub image: DynamicImage,
}

pub struct ImageFetcher {
    client: Client,
}

impl ImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| FetchError::Unexpected(err.to_string()))?;
        Ok(Self { client })
    }

    /// Downloads `url`, checks it decodes as an image and writes it to
    /// `destination`, replacing any existing file. Nothing is written
    /// unless the download and decode both succeed.
    pub fn fetch_and_store(&self, url: &str, destination: &Path) -> Result<ImageAsset, FetchError> {
        debug!(%url, "downloading image");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| classify_download(url, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::DownloadError {
                url: url.to_string(),
                detail: format!("HTTP {status}"),
            });
        }

        let bytes = response
            .bytes()
            .map_err(|err| classify_download(url, err))?;
        let image = image::load_from_memory(&bytes).map_err(FetchError::UndecodableContent)?;
        debug!(
            width = image.width(),
            height = image.height(),
            "decoded downloaded image"
        );

        image
            .save(destination)
            .map_err(|err| classify_write(destination, err))?;
        debug!(path = %destination.display(), "image written");

        Ok(ImageAsset {
            path: destination.to_path_buf(),
            image,
        })
    }
}

fn classify_download(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::DownloadTimeout {
            url: url.to_string(),
        }
    } else {
        FetchError::DownloadError {
            url: url.to_string(),
            detail: err.to_string(),
        }
    }
}

fn classify_write(path: &Path, err: ImageError) -> FetchError {
    match err {
        ImageError::IoError(io_err) if io_err.kind() == io::ErrorKind::PermissionDenied => {
            FetchError::WriteDenied {
                path: path.to_path_buf(),
            }
        }
        other => FetchError::Unexpected(other.to_string()),
    }
}
