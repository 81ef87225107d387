use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const BASE_DIR_ENV: &str = "COVER_MATCH_DIR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrBackendKind {
    Tesseract,
    Azure,
}

impl OcrBackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OcrBackendKind::Tesseract => "tesseract",
            OcrBackendKind::Azure => "azure",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "tesseract" => Some(OcrBackendKind::Tesseract),
            "azure" | "azure-vision" => Some(OcrBackendKind::Azure),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub text_size_filter_threshold_percentage: f32,
    pub min_title_length: usize,
    pub max_title_length: usize,
    pub min_search_words: usize,
    pub max_search_words: usize,
    pub min_word_match_threshold: f64,
    pub max_lookup_retries: usize,
    pub sharpen_min_words_required: usize,
    pub sharpen_min_tiers_required: usize,
    pub sharpen_tier_grouping_tolerance: f32,
    pub sharpen_min_gap_threshold: f32,
    pub sharpen_min_words_after_cut: usize,
    pub max_results_per_response: usize,
    pub ocr_backend: OcrBackendKind,
    pub ocr_languages: String,
    pub ocr_timeout_secs: u64,
    pub azure_endpoint: Option<String>,
    pub azure_key: Option<String>,
    pub lookup_base_url: Option<String>,
    pub lookup_api_key: Option<String>,
    pub lookup_max_results: usize,
    pub lookup_timeout_secs: u64,
    pub catalog_path: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            text_size_filter_threshold_percentage: 0.2,
            min_title_length: 3,
            max_title_length: 200,
            min_search_words: 2,
            max_search_words: 8,
            min_word_match_threshold: 0.5,
            max_lookup_retries: 3,
            sharpen_min_words_required: 3,
            sharpen_min_tiers_required: 2,
            sharpen_tier_grouping_tolerance: 0.1,
            sharpen_min_gap_threshold: 0.25,
            sharpen_min_words_after_cut: 1,
            max_results_per_response: 10,
            ocr_backend: OcrBackendKind::Tesseract,
            ocr_languages: "eng".to_string(),
            ocr_timeout_secs: 30,
            azure_endpoint: None,
            azure_key: None,
            lookup_base_url: None,
            lookup_api_key: None,
            lookup_max_results: 20,
            lookup_timeout_secs: 10,
            catalog_path: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    filter: Option<FilterSettings>,
    matching: Option<MatchingSettings>,
    sharpen: Option<SharpenSettings>,
    ocr: Option<OcrSettings>,
    lookup: Option<LookupSettings>,
    catalog: Option<CatalogSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct FilterSettings {
    text_size_threshold: Option<f32>,
    min_title_length: Option<usize>,
    max_title_length: Option<usize>,
    min_search_words: Option<usize>,
    max_search_words: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct MatchingSettings {
    min_word_match_threshold: Option<f64>,
    max_lookup_retries: Option<usize>,
    max_results: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct SharpenSettings {
    min_words_required: Option<usize>,
    min_tiers_required: Option<usize>,
    tier_grouping_tolerance: Option<f32>,
    min_gap_threshold: Option<f32>,
    min_words_after_cut: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSettings {
    backend: Option<String>,
    languages: Option<String>,
    timeout_secs: Option<u64>,
    azure_endpoint: Option<String>,
    azure_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LookupSettings {
    base_url: Option<String>,
    api_key: Option<String>,
    max_results: Option<usize>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogSettings {
    path: Option<String>,
}

/// Loads settings from the working directory, the settings home and an
/// optional explicit file, in that order. Later files win key by key.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed)?;
        }
    }

    settings.apply_env();
    settings.validate()?;
    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) -> Result<()> {
        if let Some(filter) = incoming.filter {
            set_if_some(
                &mut self.text_size_filter_threshold_percentage,
                filter.text_size_threshold,
            );
            set_if_some(&mut self.min_title_length, filter.min_title_length);
            set_if_some(&mut self.max_title_length, filter.max_title_length);
            set_if_some(&mut self.min_search_words, filter.min_search_words);
            set_if_some(&mut self.max_search_words, filter.max_search_words);
        }
        if let Some(matching) = incoming.matching {
            set_if_some(
                &mut self.min_word_match_threshold,
                matching.min_word_match_threshold,
            );
            set_if_some(&mut self.max_lookup_retries, matching.max_lookup_retries);
            set_if_some(&mut self.max_results_per_response, matching.max_results);
        }
        if let Some(sharpen) = incoming.sharpen {
            set_if_some(
                &mut self.sharpen_min_words_required,
                sharpen.min_words_required,
            );
            set_if_some(
                &mut self.sharpen_min_tiers_required,
                sharpen.min_tiers_required,
            );
            set_if_some(
                &mut self.sharpen_tier_grouping_tolerance,
                sharpen.tier_grouping_tolerance,
            );
            set_if_some(&mut self.sharpen_min_gap_threshold, sharpen.min_gap_threshold);
            set_if_some(
                &mut self.sharpen_min_words_after_cut,
                sharpen.min_words_after_cut,
            );
        }
        if let Some(ocr) = incoming.ocr {
            if let Some(backend) = ocr.backend {
                self.ocr_backend = OcrBackendKind::parse(&backend)
                    .ok_or_else(|| anyhow!("unknown ocr backend '{}'", backend))?;
            }
            if let Some(languages) = ocr.languages {
                if !languages.trim().is_empty() {
                    self.ocr_languages = languages;
                }
            }
            set_if_some(&mut self.ocr_timeout_secs, ocr.timeout_secs);
            set_non_empty(&mut self.azure_endpoint, ocr.azure_endpoint);
            set_non_empty(&mut self.azure_key, ocr.azure_key);
        }
        if let Some(lookup) = incoming.lookup {
            set_non_empty(&mut self.lookup_base_url, lookup.base_url);
            set_non_empty(&mut self.lookup_api_key, lookup.api_key);
            set_if_some(&mut self.lookup_max_results, lookup.max_results);
            set_if_some(&mut self.lookup_timeout_secs, lookup.timeout_secs);
        }
        if let Some(catalog) = incoming.catalog {
            set_non_empty(&mut self.catalog_path, catalog.path);
        }
        Ok(())
    }

    fn apply_env(&mut self) {
        set_non_empty(&mut self.azure_endpoint, get_env("AZURE_VISION_ENDPOINT"));
        set_non_empty(&mut self.azure_key, get_env("AZURE_VISION_KEY"));
        set_non_empty(&mut self.lookup_base_url, get_env("GOOGLE_BOOKS_BASE_URL"));
        set_non_empty(&mut self.lookup_api_key, get_env("GOOGLE_BOOKS_API_KEY"));
    }

    /// Rejects tunables that would break the pipeline's invariants.
    pub fn validate(&self) -> Result<()> {
        check_fraction(
            "filter.text_size_threshold",
            f64::from(self.text_size_filter_threshold_percentage),
        )?;
        check_fraction(
            "matching.min_word_match_threshold",
            self.min_word_match_threshold,
        )?;
        if !(0.0..1.0).contains(&self.sharpen_tier_grouping_tolerance) {
            return Err(anyhow!(
                "sharpen.tier_grouping_tolerance must be in [0, 1) (got {})",
                self.sharpen_tier_grouping_tolerance
            ));
        }
        if !(0.0..1.0).contains(&self.sharpen_min_gap_threshold) {
            return Err(anyhow!(
                "sharpen.min_gap_threshold must be in [0, 1) (got {})",
                self.sharpen_min_gap_threshold
            ));
        }
        if self.min_title_length > self.max_title_length {
            return Err(anyhow!(
                "filter.min_title_length ({}) exceeds filter.max_title_length ({})",
                self.min_title_length,
                self.max_title_length
            ));
        }
        if self.max_search_words == 0 {
            return Err(anyhow!("filter.max_search_words must be at least 1"));
        }
        if self.min_search_words > self.max_search_words {
            return Err(anyhow!(
                "filter.min_search_words ({}) exceeds filter.max_search_words ({})",
                self.min_search_words,
                self.max_search_words
            ));
        }
        if self.max_lookup_retries == 0 {
            return Err(anyhow!("matching.max_lookup_retries must be at least 1"));
        }
        if self.max_results_per_response == 0 {
            return Err(anyhow!("matching.max_results must be at least 1"));
        }
        if self.sharpen_min_tiers_required < 2 {
            return Err(anyhow!("sharpen.min_tiers_required must be at least 2"));
        }
        if self.ocr_timeout_secs == 0 || self.lookup_timeout_secs == 0 {
            return Err(anyhow!("timeouts must be at least one second"));
        }
        Ok(())
    }
}

fn check_fraction(name: &str, value: f64) -> Result<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(anyhow!("{} must be in (0, 1] (got {})", name, value))
    }
}

fn set_if_some<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn set_non_empty(target: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value {
        if !value.trim().is_empty() {
            *target = Some(value.trim().to_string());
        }
    }
}

fn get_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn home_dir() -> Option<PathBuf> {
    if let Some(dir) = get_env(BASE_DIR_ENV) {
        return Some(PathBuf::from(dir.trim()));
    }
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".cover-match"))
        }
    })
}
