use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::parse::parse_tsv_lines;
use crate::ocr::{OcrBackend, OcrError, OcrFuture};

/// Local `tesseract` binary, run in sparse-text mode which suits covers.
#[derive(Debug, Clone)]
pub struct Tesseract {
    languages: String,
    timeout: Duration,
}

impl Tesseract {
    pub fn new(languages: impl Into<String>, timeout: Duration) -> Self {
        Self {
            languages: languages.into(),
            timeout,
        }
    }
}

impl OcrBackend for Tesseract {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn recognize<'a>(&'a self, image: &'a [u8], _content_type: &'a str) -> OcrFuture<'a> {
        Box::pin(async move {
            let bytes = image.to_vec();
            let tmp = tokio::task::spawn_blocking(move || write_png_temp(&bytes))
                .await
                .map_err(|err| OcrError::BackendFailed(format!("image task failed: {}", err)))??;
            let tsv = run_tesseract_tsv(tmp.path(), &self.languages, self.timeout).await?;
            let lines = parse_tsv_lines(&tsv);
            debug!("tesseract recognized {} line(s)", lines.len());
            Ok(lines)
        })
    }
}

fn write_png_temp(bytes: &[u8]) -> Result<tempfile::NamedTempFile, OcrError> {
    let image = image::load_from_memory(bytes)
        .map_err(|err| OcrError::UnsupportedImage(format!("failed to decode image: {}", err)))?;
    let mut tmp = tempfile::Builder::new()
        .prefix("cover-match-")
        .suffix(".png")
        .tempfile()?;
    image
        .write_to(&mut tmp, image::ImageFormat::Png)
        .map_err(|err| OcrError::BackendFailed(format!("failed to write temp image: {}", err)))?;
    tmp.flush()?;
    Ok(tmp)
}

async fn run_tesseract_tsv(
    path: &Path,
    languages: &str,
    timeout: Duration,
) -> Result<String, OcrError> {
    let mut command = Command::new("tesseract");
    command
        .arg(path)
        .arg("stdout")
        .arg("-l")
        .arg(languages)
        .arg("--psm")
        .arg("11")
        .arg("tsv")
        .kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, command.output()).await {
        Err(_) => return Err(OcrError::Timeout(timeout.as_secs())),
        Ok(Err(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(OcrError::BackendNotAvailable(
                "tesseract binary not found in PATH".to_string(),
            ));
        }
        Ok(Err(err)) => return Err(OcrError::Io(err)),
        Ok(Ok(output)) => output,
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(OcrError::BackendFailed(format!(
            "tesseract failed: {}",
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn garbage_bytes_are_an_unsupported_image() {
        let backend = Tesseract::new("eng", Duration::from_secs(5));
        let err = backend
            .recognize(b"definitely not an image", "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::UnsupportedImage(_)));
    }
}
