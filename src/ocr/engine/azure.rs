use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::ocr::{OcrBackend, OcrError, OcrFuture, OcrLine};

const API_PATH: &str = "computervision/imageanalysis:analyze";
const API_VERSION: &str = "2024-02-01";

/// Azure AI Vision image analysis with the `read` feature. Lines come back
/// with native four-point polygons, so rotated spine text keeps its shape.
#[derive(Debug, Clone)]
pub struct AzureVision {
    endpoint: String,
    key: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl AzureVision {
    pub fn new(
        endpoint: impl Into<String>,
        key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, OcrError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| OcrError::BackendNotAvailable(format!("http client: {}", err)))?;
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            key: key.into(),
            timeout,
            client,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/{}?features=read&api-version={}",
            self.endpoint, API_PATH, API_VERSION
        )
    }

    fn map_transport_error(&self, err: reqwest::Error) -> OcrError {
        if err.is_timeout() {
            OcrError::Timeout(self.timeout.as_secs())
        } else {
            OcrError::BackendFailed(format!("Azure Vision request failed: {}", err))
        }
    }
}

impl OcrBackend for AzureVision {
    fn name(&self) -> &'static str {
        "azure"
    }

    fn recognize<'a>(&'a self, image: &'a [u8], content_type: &'a str) -> OcrFuture<'a> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.url())
                .header("Ocp-Apim-Subscription-Key", &self.key)
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(image.to_vec())
                .send()
                .await
                .map_err(|err| self.map_transport_error(err))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|err| self.map_transport_error(err))?;
            if !status.is_success() {
                return Err(status_error(status, &text, self.timeout.as_secs()));
            }
            let lines = parse_read_result(&text)?;
            debug!("azure vision recognized {} line(s)", lines.len());
            Ok(lines)
        })
    }
}

fn status_error(status: StatusCode, body: &str, timeout_secs: u64) -> OcrError {
    let message = extract_azure_error(body).unwrap_or_else(|| body.trim().to_string());
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNSUPPORTED_MEDIA_TYPE => {
            OcrError::UnsupportedImage(message)
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => OcrError::BackendNotAvailable(
            format!("Azure Vision rejected the credentials ({}): {}", status, message),
        ),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => OcrError::Timeout(timeout_secs),
        _ => OcrError::BackendFailed(format!("Azure Vision API error ({}): {}", status, message)),
    }
}

pub(super) fn parse_read_result(text: &str) -> Result<Vec<OcrLine>, OcrError> {
    let payload: AnalyzeResponse = serde_json::from_str(text)
        .map_err(|err| OcrError::BackendFailed(format!("invalid Azure Vision response: {}", err)))?;
    let Some(read) = payload.read_result else {
        return Ok(Vec::new());
    };
    let lines = read
        .blocks
        .into_iter()
        .flat_map(|block| block.lines)
        .filter(|line| !line.text.trim().is_empty())
        .map(|line| {
            let polygon = line
                .bounding_polygon
                .iter()
                .flat_map(|point| [point.x, point.y])
                .collect();
            OcrLine::new(line.text.trim(), polygon)
        })
        .collect();
    Ok(lines)
}

fn extract_azure_error(body: &str) -> Option<String> {
    let payload: AzureErrorResponse = serde_json::from_str(body).ok()?;
    let error = payload.error?;
    match (error.code, error.message) {
        (Some(code), Some(message)) => Some(format!("{}: {}", code, message)),
        (None, Some(message)) => Some(message),
        (Some(code), None) => Some(code),
        (None, None) => None,
    }
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    #[serde(rename = "readResult")]
    read_result: Option<ReadResult>,
}

#[derive(Debug, Deserialize)]
struct ReadResult {
    #[serde(default)]
    blocks: Vec<ReadBlock>,
}

#[derive(Debug, Deserialize)]
struct ReadBlock {
    #[serde(default)]
    lines: Vec<ReadLine>,
}

#[derive(Debug, Deserialize)]
struct ReadLine {
    text: String,
    #[serde(rename = "boundingPolygon", default)]
    bounding_polygon: Vec<ReadPoint>,
}

#[derive(Debug, Deserialize)]
struct ReadPoint {
    x: f32,
    y: f32,
}

#[derive(Debug, Deserialize)]
struct AzureErrorResponse {
    error: Option<AzureErrorBody>,
}

#[derive(Debug, Deserialize)]
struct AzureErrorBody {
    code: Option<String>,
    message: Option<String>,
}
