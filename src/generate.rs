use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::credential::Credential;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Rate limit exceeded. Please wait and try again.")]
    RateLimitExceeded,
    #[error("The request to OpenAI timed out. Please try again.")]
    RequestTimeout,
    #[error("OpenAI API error ({status}): {message}")]
    ServiceError { status: StatusCode, message: String },
    #[error("Failed to generate image: {0}")]
    Unexpected(String),
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
    quality: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
    revised_prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Where the generated image can be downloaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub url: String,
    pub revised_prompt: Option<String>,
}

pub struct ImageGenerator<'a> {
    client: Client,
    config: &'a Config,
    credential: &'a Credential,
}

impl<'a> ImageGenerator<'a> {
    pub fn new(config: &'a Config, credential: &'a Credential) -> Result<Self, GenerateError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| GenerateError::Unexpected(err.to_string()))?;
        Ok(Self {
            client,
            config,
            credential,
        })
    }

    /// Requests exactly one image for `prompt`. Single attempt, no retry.
    pub fn generate(&self, prompt: &str) -> Result<GenerationResult, GenerateError> {
        let body = ImageRequest {
            model: &self.config.model,
            prompt,
            n: 1,
            size: &self.config.size,
            quality: &self.config.quality,
        };
        let url = self.config.generations_url();
        debug!(%url, model = %self.config.model, "requesting image generation");

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.credential.expose())
            .json(&body)
            .send()
            .map_err(classify_transport)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("generation service rate limited the request");
            return Err(GenerateError::RateLimitExceeded);
        }
        if !status.is_success() {
            let text = response.text().map_err(classify_transport)?;
            return Err(GenerateError::ServiceError {
                status,
                message: service_message(&text),
            });
        }

        let parsed: ImageResponse = response.json().map_err(classify_transport)?;
        let first = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| GenerateError::Unexpected("response contained no images".into()))?;
        let url = first
            .url
            .ok_or_else(|| GenerateError::Unexpected("response contained no image URL".into()))?;

        debug!(%url, "image generated");
        Ok(GenerationResult {
            url,
            revised_prompt: first.revised_prompt,
        })
    }
}

fn classify_transport(err: reqwest::Error) -> GenerateError {
    if err.is_timeout() {
        GenerateError::RequestTimeout
    } else {
        GenerateError::Unexpected(err.to_string())
    }
}

/// Pulls `error.message` out of an API error body, falling back to the raw text.
fn service_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if body.trim().is_empty() => "no error details returned".to_string(),
        Err(_) => body.trim().to_string(),
    }
}
