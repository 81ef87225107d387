use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::retry::{Backoff, is_rate_limited, retry_after};
use super::{BookLookup, BookLookupResult, CatalogFuture};
use crate::settings::Settings;

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/books/v1";
const MAX_RESULTS_LIMIT: usize = 40;

/// Full-text volume search against the Google Books API.
#[derive(Debug, Clone)]
pub struct GoogleBooks {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    max_results: usize,
}

impl GoogleBooks {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        max_results: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .with_context(|| "failed to build HTTP client")?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            client,
            base_url,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            max_results: max_results.clamp(1, MAX_RESULTS_LIMIT),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            settings
                .lookup_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            settings.lookup_api_key.clone(),
            settings.lookup_max_results,
            Duration::from_secs(settings.lookup_timeout_secs),
        )
    }

    async fn search(&self, query: &str) -> Result<Vec<BookLookupResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/volumes", self.base_url);
        let max_results = self.max_results.to_string();
        let mut params = vec![("q", query), ("maxResults", max_results.as_str())];
        if let Some(key) = self.api_key.as_deref() {
            params.push(("key", key));
        }

        let mut backoff = Backoff::new("Google Books");
        loop {
            backoff.start_attempt();
            let response = self
                .client
                .get(&url)
                .query(&params)
                .send()
                .await
                .with_context(|| format!("Google Books request failed for '{}'", query))?;

            let status = response.status();
            let retry_after = retry_after(response.headers());
            let text = response.text().await.unwrap_or_default();
            if status.is_success() {
                let results = parse_volumes(&text)?;
                debug!("Google Books returned {} volume(s) for '{}'", results.len(), query);
                return Ok(results);
            }
            if is_rate_limited(status, &text) && backoff.can_retry() {
                backoff.wait(retry_after).await;
                continue;
            }
            return Err(anyhow!(
                "Google Books API error ({}): {}",
                status,
                extract_google_error(&text).unwrap_or(text)
            ));
        }
    }
}

impl BookLookup for GoogleBooks {
    fn search_by_text<'a>(&'a self, query: &'a str) -> CatalogFuture<'a, Vec<BookLookupResult>> {
        Box::pin(self.search(query))
    }
}

#[derive(Deserialize)]
struct VolumesResponse {
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Volume {
    volume_info: Option<VolumeInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeInfo {
    title: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    image_links: Option<ImageLinks>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageLinks {
    thumbnail: Option<String>,
    small_thumbnail: Option<String>,
}

fn parse_volumes(body: &str) -> Result<Vec<BookLookupResult>> {
    let payload: VolumesResponse =
        serde_json::from_str(body).with_context(|| "failed to parse Google Books response")?;
    Ok(payload
        .items
        .into_iter()
        .filter_map(|volume| volume.volume_info)
        .filter_map(|info| {
            let title = info.title?.trim().to_string();
            if title.is_empty() {
                return None;
            }
            let author = info
                .authors
                .iter()
                .map(|author| author.trim())
                .filter(|author| !author.is_empty())
                .collect::<Vec<_>>()
                .join(", ");
            let thumbnail = info
                .image_links
                .and_then(|links| links.thumbnail.or(links.small_thumbnail));
            Some(BookLookupResult {
                title,
                author,
                thumbnail,
            })
        })
        .collect())
}

fn extract_google_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<GoogleError>,
    }

    #[derive(Deserialize)]
    struct GoogleError {
        message: Option<String>,
        status: Option<String>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let error = parsed.error?;
    let mut parts = Vec::new();
    if let Some(message) = error.message.filter(|message| !message.trim().is_empty()) {
        parts.push(message);
    }
    if let Some(status) = error.status.filter(|status| !status.trim().is_empty()) {
        parts.push(format!("status: {}", status));
    }
    if parts.is_empty() {
        Some("unknown error".to_string())
    } else {
        Some(parts.join(" | "))
    }
}
