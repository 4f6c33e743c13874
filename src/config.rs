use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_KEY_VAR: &str = "OPENAI_API_KEY";
pub const DEFAULT_ENV_FILE: &str = ".env";
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "dall-e-3";
pub const DEFAULT_OUTPUT: &str = "generated_image.png";

/// Image resolution requested from the generation service.
pub const IMAGE_SIZE: &str = "1024x1024";
/// Quality tier requested from the generation service.
pub const IMAGE_QUALITY: &str = "standard";

pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Everything one pipeline run needs. Built once in `main` and handed to
/// each stage by reference.
#[derive(Debug, Clone)]
pub struct Config {
    pub key_var: String,
    pub env_file: PathBuf,
    pub api_base: String,
    pub model: String,
    pub size: String,
    pub quality: String,
    pub output: PathBuf,
    pub download_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            key_var: DEFAULT_KEY_VAR.to_string(),
            env_file: PathBuf::from(DEFAULT_ENV_FILE),
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            size: IMAGE_SIZE.to_string(),
            quality: IMAGE_QUALITY.to_string(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            download_timeout: DOWNLOAD_TIMEOUT,
            request_timeout: REQUEST_TIMEOUT,
        }
    }
}

impl Config {
    /// Endpoint for image generation, tolerating a trailing slash on the base.
    pub fn generations_url(&self) -> String {
        format!("{}/images/generations", self.api_base.trim_end_matches('/'))
    }
}
