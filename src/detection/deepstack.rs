//! DeepStack object detection over HTTP.

use super::{Detection, DetectionClient, DetectionResponse};
use crate::error::ClassifierError;
use crate::geometry::BoundingBox;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const DETECTION_PATH: &str = "/v1/vision/detection";

/// Client for a DeepStack (or CodeProject.AI compatible) detection server.
///
/// Blocking: build and call it off the async runtime.
pub struct DeepStackClient {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    success: bool,
    #[serde(default)]
    predictions: Vec<RawPrediction>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPrediction {
    label: String,
    confidence: f32,
    x_min: i32,
    y_min: i32,
    x_max: i32,
    y_max: i32,
}

impl DeepStackClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClassifierError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClassifierError::Request {
                details: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), DETECTION_PATH),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn detection_form(image: &[u8], min_confidence: f32) -> Result<Form, ClassifierError> {
    let part = Part::bytes(image.to_vec())
        .file_name("frame.jpg")
        .mime_str("image/jpeg")
        .map_err(|e| ClassifierError::Request {
            details: e.to_string(),
        })?;
    Ok(Form::new()
        .part("image", part)
        .text("min_confidence", min_confidence.to_string()))
}

impl DetectionClient for DeepStackClient {
    fn name(&self) -> &'static str {
        "deepstack"
    }

    fn detect(&self, image: &[u8], min_confidence: f32) -> Result<DetectionResponse, ClassifierError> {
        debug!(
            "Posting {} byte image to {} (min_confidence {})",
            image.len(),
            self.endpoint,
            min_confidence
        );

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(detection_form(image, min_confidence)?)
            .send()
            .map_err(|e| ClassifierError::Request {
                details: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().map_err(|e| ClassifierError::Response {
            details: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(ClassifierError::Rejected {
                details: format!("HTTP {}: {}", status.as_u16(), text.trim()),
            });
        }

        parse_response(&text)
    }
}

fn parse_response(text: &str) -> Result<DetectionResponse, ClassifierError> {
    let raw: RawResponse = serde_json::from_str(text).map_err(|e| ClassifierError::Response {
        details: e.to_string(),
    })?;

    if !raw.success {
        return Err(ClassifierError::Rejected {
            details: raw
                .error
                .unwrap_or_else(|| "success=false without error message".to_string()),
        });
    }

    Ok(DetectionResponse::new(
        raw.predictions
            .into_iter()
            .map(|p| {
                Detection::new(
                    p.label,
                    p.confidence,
                    BoundingBox::new(p.x_min, p.y_min, p.x_max, p.y_max),
                )
            })
            .collect(),
    ))
}
