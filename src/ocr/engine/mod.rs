mod azure;
mod parse;
mod tesseract;

use anyhow::{Result, anyhow};
use std::time::Duration;

use super::{OcrBackend, OcrFuture};
use crate::settings::{OcrBackendKind, Settings};

pub use azure::AzureVision;
pub use tesseract::Tesseract;

#[derive(Debug, Clone)]
pub enum OcrBackendImpl {
    Tesseract(Tesseract),
    Azure(AzureVision),
}

impl OcrBackend for OcrBackendImpl {
    fn name(&self) -> &'static str {
        match self {
            OcrBackendImpl::Tesseract(backend) => backend.name(),
            OcrBackendImpl::Azure(backend) => backend.name(),
        }
    }

    fn recognize<'a>(&'a self, image: &'a [u8], content_type: &'a str) -> OcrFuture<'a> {
        match self {
            OcrBackendImpl::Tesseract(backend) => backend.recognize(image, content_type),
            OcrBackendImpl::Azure(backend) => backend.recognize(image, content_type),
        }
    }
}

pub fn build_backend(settings: &Settings) -> Result<OcrBackendImpl> {
    let timeout = Duration::from_secs(settings.ocr_timeout_secs);
    match settings.ocr_backend {
        OcrBackendKind::Tesseract => Ok(OcrBackendImpl::Tesseract(Tesseract::new(
            settings.ocr_languages.clone(),
            timeout,
        ))),
        OcrBackendKind::Azure => {
            let endpoint = settings.azure_endpoint.clone().ok_or_else(|| {
                anyhow!("azure backend requires ocr.azure_endpoint or AZURE_VISION_ENDPOINT")
            })?;
            let key = settings
                .azure_key
                .clone()
                .ok_or_else(|| anyhow!("azure backend requires ocr.azure_key or AZURE_VISION_KEY"))?;
            Ok(OcrBackendImpl::Azure(AzureVision::new(endpoint, key, timeout)?))
        }
    }
}
