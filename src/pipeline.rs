use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};

use crate::apply::{WallpaperError, WallpaperSetter};
use crate::config::Config;
use crate::credential::Credential;
use crate::fetch::{FetchError, ImageFetcher};
use crate::generate::{GenerateError, ImageGenerator};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Wallpaper(#[from] WallpaperError),
}

/// Generates an image for `prompt`, saves it to `config.output` and applies
/// it with `setter`. Each stage runs once; the first failure ends the run.
pub fn run(
    config: &Config,
    credential: &Credential,
    prompt: &str,
    setter: &dyn WallpaperSetter,
) -> Result<PathBuf, PipelineError> {
    println!("Generating image...");
    let generated = ImageGenerator::new(config, credential)?.generate(prompt)?;
    if let Some(revised) = &generated.revised_prompt {
        info!(%revised, "service revised the prompt");
    }

    println!("Saving image...");
    let asset = ImageFetcher::new(config.download_timeout)?
        .fetch_and_store(&generated.url, &config.output)?;
    debug!(
        path = %asset.path.display(),
        width = asset.image.width(),
        height = asset.image.height(),
        "image saved"
    );

    println!("Setting wallpaper...");
    setter.apply(&asset.path)?;
    println!("Wallpaper set successfully!");

    Ok(asset.path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use serde_json::json;
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::path::Path;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingSetter {
        applied: RefCell<Vec<PathBuf>>,
    }

    impl WallpaperSetter for RecordingSetter {
        fn apply(&self, image_path: &Path) -> Result<(), WallpaperError> {
            self.applied.borrow_mut().push(image_path.to_path_buf());
            Ok(())
        }
    }

    fn png_bytes() -> Vec<u8> {
        let img = RgbImage::from_pixel(8, 8, Rgb([10, 120, 240]));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn config_for(server: &MockServer, dir: &TempDir) -> Config {
        Config {
            api_base: server.url("/v1"),
            output: dir.path().join("generated_image.png"),
            ..Config::default()
        }
    }

    fn mock_generation(server: &MockServer, image_path: &str) {
        let image_url = server.url(image_path);
        server.mock(move |when, then| {
            when.method(POST).path("/v1/images/generations");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"created": 1, "data": [{"url": image_url}]}));
        });
    }

    #[test]
    fn successful_run_writes_one_file_and_applies_it_once() {
        let server = MockServer::start();
        mock_generation(&server, "/files/img.png");
        let download = server.mock(|when, then| {
            when.method(GET).path("/files/img.png");
            then.status(200).body(png_bytes());
        });
        let dir = TempDir::new().unwrap();
        let config = config_for(&server, &dir);
        let setter = RecordingSetter::default();

        let path = run(&config, &Credential::new("sk-test"), "a red fox", &setter).unwrap();

        download.assert();
        assert_eq!(path, config.output);
        assert!(config.output.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        assert_eq!(setter.applied.borrow().as_slice(), &[config.output.clone()]);
    }

    #[test]
    fn rate_limit_aborts_before_download() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/images/generations");
            then.status(429);
        });
        let dir = TempDir::new().unwrap();
        let config = config_for(&server, &dir);
        let setter = RecordingSetter::default();

        let err = run(&config, &Credential::new("sk-test"), "a red fox", &setter).unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Generate(GenerateError::RateLimitExceeded)
        ));
        assert!(err.to_string().contains("Rate limit exceeded"));
        assert!(!config.output.exists());
        assert!(setter.applied.borrow().is_empty());
    }

    #[test]
    fn undecodable_download_aborts_before_wallpaper() {
        let server = MockServer::start();
        mock_generation(&server, "/files/img.png");
        server.mock(|when, then| {
            when.method(GET).path("/files/img.png");
            then.status(200).body("definitely not a png");
        });
        let dir = TempDir::new().unwrap();
        let config = config_for(&server, &dir);
        let setter = RecordingSetter::default();

        let err = run(&config, &Credential::new("sk-test"), "a red fox", &setter).unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Fetch(FetchError::UndecodableContent(_))
        ));
        assert!(!config.output.exists());
        assert!(setter.applied.borrow().is_empty());
    }

    #[test]
    fn wallpaper_failure_is_reported() {
        struct FailingSetter;
        impl WallpaperSetter for FailingSetter {
            fn apply(&self, _image_path: &Path) -> Result<(), WallpaperError> {
                Err(WallpaperError::UnsupportedPlatform {
                    os: "haiku".to_string(),
                })
            }
        }

        let server = MockServer::start();
        mock_generation(&server, "/files/img.png");
        server.mock(|when, then| {
            when.method(GET).path("/files/img.png");
            then.status(200).body(png_bytes());
        });
        let dir = TempDir::new().unwrap();
        let config = config_for(&server, &dir);

        let err = run(&config, &Credential::new("sk-test"), "a red fox", &FailingSetter)
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "OS haiku is not supported for setting wallpaper."
        );
    }
}
