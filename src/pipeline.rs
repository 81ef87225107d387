//! Top-level entry point: image in, ranked catalog matches out.

use anyhow::Result;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::cancel::{CancelSignal, Cancelled};
use crate::catalog::{BookLookup, LocalCatalog};
use crate::merge::{MatchedBook, MergeError, merge_results};
use crate::ocr::{CoverAnalysisResult, OcrBackend, OcrError, resolve_content_type};
use crate::search::search_with_retry;
use crate::settings::Settings;

const EXACT_MATCH_SCORE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    OcrTimeout,
    OcrFailed,
    UnsupportedImage,
    OcrUnavailable,
    InputUnreadable,
    Cancelled,
    CatalogUnavailable,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::OcrTimeout => "ocr_timeout",
            FailureKind::OcrFailed => "ocr_failed",
            FailureKind::UnsupportedImage => "unsupported_image",
            FailureKind::OcrUnavailable => "ocr_unavailable",
            FailureKind::InputUnreadable => "input_unreadable",
            FailureKind::Cancelled => "cancelled",
            FailureKind::CatalogUnavailable => "catalog_unavailable",
        }
    }
}

impl From<&OcrError> for FailureKind {
    fn from(err: &OcrError) -> Self {
        match err {
            OcrError::Timeout(_) => FailureKind::OcrTimeout,
            OcrError::BackendFailed(_) | OcrError::Io(_) => FailureKind::OcrFailed,
            OcrError::UnsupportedImage(_) => FailureKind::UnsupportedImage,
            OcrError::BackendNotAvailable(_) => FailureKind::OcrUnavailable,
        }
    }
}

/// Expected ways a request can fail. All of them end up in the response
/// rather than being returned to the caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ocr(#[from] OcrError),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    #[error("failed to read image: {0}")]
    Input(std::io::Error),

    #[error("local catalog lookup failed: {0:#}")]
    Catalog(anyhow::Error),
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::Ocr(err) => FailureKind::from(err),
            PipelineError::Cancelled(_) => FailureKind::Cancelled,
            PipelineError::Input(_) => FailureKind::InputUnreadable,
            PipelineError::Catalog(_) => FailureKind::CatalogUnavailable,
        }
    }
}

impl From<MergeError> for PipelineError {
    fn from(err: MergeError) -> Self {
        match err {
            MergeError::Cancelled(cancelled) => PipelineError::Cancelled(cancelled),
            MergeError::Catalog(err) => PipelineError::Catalog(err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverAnalysisResponse {
    pub request_id: String,
    pub success: bool,
    pub error: Option<String>,
    pub failure_kind: Option<FailureKind>,
    pub extracted_text: String,
    pub matched_books: Vec<MatchedBook>,
    pub exact_match: Option<MatchedBook>,
}

impl CoverAnalysisResponse {
    pub fn failure(request_id: impl Into<String>, err: &PipelineError) -> Self {
        Self {
            request_id: request_id.into(),
            success: false,
            error: Some(err.to_string()),
            failure_kind: Some(err.kind()),
            extracted_text: String::new(),
            matched_books: Vec::new(),
            exact_match: None,
        }
    }
}

/// A response together with the OCR output it was built from, when OCR
/// got that far.
#[derive(Debug, Clone)]
pub struct CoverReport {
    pub response: CoverAnalysisResponse,
    pub analysis: Option<CoverAnalysisResult>,
}

pub struct CoverAnalyzer<O, L, C> {
    settings: Settings,
    ocr: O,
    lookup: L,
    catalog: C,
}

impl<O, L, C> CoverAnalyzer<O, L, C>
where
    O: OcrBackend,
    L: BookLookup,
    C: LocalCatalog,
{
    pub fn new(settings: Settings, ocr: O, lookup: L, catalog: C) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            ocr,
            lookup,
            catalog,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn ocr(&self) -> &O {
        &self.ocr
    }

    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// OCR plus text filtering, with no catalog work.
    pub async fn analyze_image(
        &self,
        image: &[u8],
        content_type: &str,
        cancel: &CancelSignal,
    ) -> Result<CoverAnalysisResult, PipelineError> {
        let content_type = resolve_content_type(image, content_type)?;
        debug!(
            "running {} OCR on {} bytes of {}",
            self.ocr.name(),
            image.len(),
            content_type
        );
        let lines = cancel
            .run(self.ocr.recognize(image, &content_type))
            .await??;
        let analysis = CoverAnalysisResult::from_lines(lines, &self.settings);
        debug!(
            "OCR produced {} line(s), {} word(s) after filtering",
            analysis.lines.len(),
            analysis.words.len()
        );
        Ok(analysis)
    }

    pub async fn analyze_cover<R>(
        &self,
        mut image: R,
        content_type: &str,
        request_id: &str,
        cancel: &CancelSignal,
    ) -> CoverAnalysisResponse
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut bytes = Vec::new();
        let read = match cancel.run(image.read_to_end(&mut bytes)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => Err(PipelineError::Input(err)),
            Err(cancelled) => Err(PipelineError::Cancelled(cancelled)),
        };
        if let Err(err) = read {
            warn!("request {}: {}", request_id, err);
            return CoverAnalysisResponse::failure(request_id, &err);
        }
        self.analyze_cover_bytes(&bytes, content_type, request_id, cancel)
            .await
    }

    pub async fn analyze_cover_bytes(
        &self,
        image: &[u8],
        content_type: &str,
        request_id: &str,
        cancel: &CancelSignal,
    ) -> CoverAnalysisResponse {
        self.analyze(image, content_type, request_id, cancel)
            .await
            .response
    }

    pub async fn analyze(
        &self,
        image: &[u8],
        content_type: &str,
        request_id: &str,
        cancel: &CancelSignal,
    ) -> CoverReport {
        let span = info_span!("analyze_cover", request_id = %request_id);
        async {
            let analysis = match self.analyze_image(image, content_type, cancel).await {
                Ok(analysis) => analysis,
                Err(err) => {
                    warn!("cover analysis failed: {}", err);
                    return CoverReport {
                        response: CoverAnalysisResponse::failure(request_id, &err),
                        analysis: None,
                    };
                }
            };
            let response = match self.match_books(&analysis, request_id, cancel).await {
                Ok(response) => response,
                Err(err) => {
                    warn!("book matching failed: {}", err);
                    CoverAnalysisResponse::failure(request_id, &err)
                }
            };
            CoverReport {
                response,
                analysis: Some(analysis),
            }
        }
        .instrument(span)
        .await
    }

    async fn match_books(
        &self,
        analysis: &CoverAnalysisResult,
        request_id: &str,
        cancel: &CancelSignal,
    ) -> Result<CoverAnalysisResponse, PipelineError> {
        let settings = &self.settings;
        let report =
            search_with_retry(&self.lookup, analysis.words.clone(), settings, cancel).await?;
        let mut ranked = merge_results(
            &self.catalog,
            &report.hits,
            &report.word_set,
            settings.min_word_match_threshold,
            cancel,
        )
        .await?;
        cancel.check()?;

        let exact_match = ranked
            .iter()
            .find(|book| book.score >= EXACT_MATCH_SCORE)
            .cloned();
        ranked.truncate(settings.max_results_per_response);
        info!(
            "{} match(es) after {} lookup attempt(s){}",
            ranked.len(),
            report.attempts,
            exact_match
                .as_ref()
                .map(|book| format!("; exact match '{}'", book.entry.title()))
                .unwrap_or_default()
        );

        Ok(CoverAnalysisResponse {
            request_id: request_id.to_string(),
            success: true,
            error: None,
            failure_kind: None,
            extracted_text: analysis.extracted_text(),
            matched_books: ranked,
            exact_match,
        })
    }
}
