//! OCR collaborator contract.
//!
//! Backends turn image bytes into [`OcrLine`]s; everything downstream only
//! sees those lines (and the words the text filter derives from them).

mod engine;
pub(crate) mod geom;

use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

use crate::filter::{self, ExtractedWord};
use crate::settings::Settings;

pub use engine::{AzureVision, OcrBackendImpl, Tesseract, build_backend};

pub const SUPPORTED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/bmp",
    "image/gif",
    "image/tiff",
    "image/webp",
];

/// One run of recognized text and its bounding polygon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrLine {
    pub text: String,
    pub polygon: Vec<f32>,
}

impl OcrLine {
    pub fn new(text: impl Into<String>, polygon: Vec<f32>) -> Self {
        Self {
            text: text.into(),
            polygon,
        }
    }

    /// A line the backend reported without any geometry.
    pub fn text_only(text: impl Into<String>) -> Self {
        Self::new(text, Vec::new())
    }

    pub fn height(&self) -> f32 {
        geom::height(&self.polygon)
    }

    pub fn width(&self) -> f32 {
        geom::width(&self.polygon)
    }

    pub fn is_vertical(&self) -> bool {
        geom::is_vertical(&self.polygon)
    }

    /// Orientation-independent font size; zero for degenerate geometry.
    pub fn text_size(&self) -> f32 {
        geom::text_size(&self.polygon)
    }
}

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR timed out after {0}s")]
    Timeout(u64),

    #[error("OCR failed: {0}")]
    BackendFailed(String),

    #[error("unsupported image: {0}")]
    UnsupportedImage(String),

    #[error("OCR backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Output of OCR plus text filtering for one image.
#[derive(Debug, Clone)]
pub struct CoverAnalysisResult {
    pub words: Vec<ExtractedWord>,
    pub lines: Vec<OcrLine>,
}

impl CoverAnalysisResult {
    pub fn from_lines(lines: Vec<OcrLine>, settings: &Settings) -> Self {
        let words = filter::filter_lines(&lines, settings);
        Self { words, lines }
    }

    pub fn extracted_text(&self) -> String {
        filter::join_words(&self.words)
    }

    pub fn raw_lines(&self) -> Vec<&str> {
        self.lines.iter().map(|line| line.text.as_str()).collect()
    }
}

pub type OcrFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<OcrLine>, OcrError>> + Send + 'a>>;

pub trait OcrBackend: Send + Sync {
    fn name(&self) -> &'static str;
    fn recognize<'a>(&'a self, image: &'a [u8], content_type: &'a str) -> OcrFuture<'a>;
}

/// Resolves `auto` by sniffing the bytes and rejects anything that is not a
/// supported raster image.
pub fn resolve_content_type(image: &[u8], requested: &str) -> Result<String, OcrError> {
    let requested = requested.trim().to_lowercase();
    let content_type = if requested.is_empty() || requested == "auto" {
        infer::get(image)
            .map(|kind| kind.mime_type().to_string())
            .ok_or_else(|| OcrError::UnsupportedImage("could not detect image type".to_string()))?
    } else if requested == "image/jpg" {
        "image/jpeg".to_string()
    } else {
        requested
    };
    if !SUPPORTED_CONTENT_TYPES.contains(&content_type.as_str()) {
        return Err(OcrError::UnsupportedImage(format!(
            "content type '{}' is not supported",
            content_type
        )));
    }
    Ok(content_type)
}
