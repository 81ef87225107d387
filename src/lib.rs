use anyhow::{Context, Result, anyhow};
use std::collections::hash_map::DefaultHasher;
use std::fmt::Write as _;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod cancel;
pub mod catalog;
pub mod filter;
pub mod logging;
pub mod merge;
pub mod ocr;
pub mod pipeline;
pub mod scoring;
pub mod search;
pub mod settings;
pub mod sharpen;

#[cfg(test)]
mod test_util;

pub use cancel::{CancelHandle, CancelSignal, Cancelled, cancel_pair};
pub use catalog::{
    BookLookup, BookLookupResult, CatalogEntry, ExternalBook, GoogleBooks, LocalBook,
    LocalCatalog, MemoryCatalog,
};
pub use filter::ExtractedWord;
pub use merge::MatchedBook;
pub use ocr::{CoverAnalysisResult, OcrBackend, OcrError, OcrLine};
pub use pipeline::{CoverAnalysisResponse, CoverAnalyzer, CoverReport, FailureKind};
pub use settings::{OcrBackendKind, Settings};

#[derive(Debug, Clone)]
pub struct Config {
    pub image: PathBuf,
    pub content_type: String,
    pub backend: Option<String>,
    pub catalog_path: Option<String>,
    pub settings_path: Option<String>,
    pub request_id: Option<String>,
    pub show_lines: bool,
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub text: String,
    pub success: bool,
}

pub async fn run(config: Config, cancel: CancelSignal) -> Result<RunOutput> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let mut settings = settings::load_settings(settings_path)?;
    if let Some(backend) = config.backend.as_deref() {
        settings.ocr_backend = OcrBackendKind::parse(backend)
            .ok_or_else(|| anyhow!("unknown OCR backend '{}'", backend))?;
    }
    if let Some(path) = config.catalog_path {
        settings.catalog_path = Some(path);
    }
    settings.validate()?;

    let image = tokio::fs::read(&config.image)
        .await
        .with_context(|| format!("failed to read image {}", config.image.display()))?;
    let request_id = config
        .request_id
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| derive_request_id(&image));

    let ocr = ocr::build_backend(&settings)?;
    let lookup = GoogleBooks::from_settings(&settings)?;
    let catalog = match settings.catalog_path.as_deref() {
        Some(path) => MemoryCatalog::from_json_file(Path::new(path))?,
        None => MemoryCatalog::default(),
    };
    let analyzer = CoverAnalyzer::new(settings, ocr, lookup, catalog)?;
    let report = analyzer
        .analyze(&image, &config.content_type, &request_id, &cancel)
        .await;

    let mut text = String::new();
    if config.show_lines {
        if let Some(analysis) = report.analysis.as_ref() {
            text.push_str(&format_lines(analysis));
        }
    }
    text.push_str(
        &serde_json::to_string_pretty(&report.response)
            .with_context(|| "failed to serialize response")?,
    );
    Ok(RunOutput {
        text,
        success: report.response.success,
    })
}

fn format_lines(analysis: &CoverAnalysisResult) -> String {
    let mut out = String::new();
    for line in &analysis.lines {
        let orientation = if line.is_vertical() { "v" } else { "h" };
        let _ = writeln!(out, "{:>8.1} {} {}", line.text_size(), orientation, line.text);
    }
    out
}

fn derive_request_id(image: &[u8]) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    let mut hasher = DefaultHasher::new();
    image.hash(&mut hasher);
    format!("{:x}-{:016x}", millis, hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::geom::rect_polygon;

    #[test]
    fn request_ids_carry_image_hash() {
        let first = derive_request_id(b"cover-a");
        let second = derive_request_id(b"cover-b");
        let suffix = |id: &str| id.rsplit('-').next().map(str::to_string);
        assert_ne!(suffix(&first), suffix(&second));
        assert_eq!(suffix(&first), suffix(&derive_request_id(b"cover-a")));
    }

    #[test]
    fn formats_lines_with_size_and_orientation() {
        let analysis = CoverAnalysisResult::from_lines(
            vec![
                OcrLine::new("DUNE", rect_polygon(0.0, 0.0, 300.0, 60.0)),
                OcrLine::new("ACE", vec![20.0, 0.0, 20.0, 80.0, 8.0, 80.0, 8.0, 0.0]),
            ],
            &Settings::default(),
        );
        assert_eq!(
            format_lines(&analysis),
            "    60.0 h DUNE\n    12.0 v ACE\n"
        );
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let config = Config {
            image: PathBuf::from("cover.jpg"),
            content_type: "auto".to_string(),
            backend: Some("paper".to_string()),
            catalog_path: None,
            settings_path: None,
            request_id: None,
            show_lines: false,
        };
        crate::test_util::with_temp_home(|_| {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("runtime");
            let err = runtime
                .block_on(run(config, CancelSignal::never()))
                .unwrap_err();
            assert!(err.to_string().contains("unknown OCR backend 'paper'"));
        });
    }
}
