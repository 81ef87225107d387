use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use cover_match::catalog::CatalogFuture;
use cover_match::ocr::OcrFuture;
use cover_match::{
    BookLookup, BookLookupResult, CancelSignal, CatalogEntry, CoverAnalysisResponse,
    CoverAnalyzer, LocalBook, MemoryCatalog, OcrBackend, OcrLine, Settings,
};

const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

struct ScriptedOcr(Vec<OcrLine>);

impl OcrBackend for ScriptedOcr {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn recognize<'a>(&'a self, _image: &'a [u8], _content_type: &'a str) -> OcrFuture<'a> {
        let lines = self.0.clone();
        Box::pin(async move { Ok(lines) })
    }
}

/// Answers known queries and records every query it receives.
#[derive(Default)]
struct QueryLookup {
    answers: HashMap<String, Vec<BookLookupResult>>,
    queries: Mutex<Vec<String>>,
}

impl QueryLookup {
    fn answer(mut self, query: &str, results: Vec<BookLookupResult>) -> Self {
        self.answers.insert(query.to_string(), results);
        self
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().expect("queries lock").clone()
    }
}

impl BookLookup for QueryLookup {
    fn search_by_text<'a>(&'a self, query: &'a str) -> CatalogFuture<'a, Vec<BookLookupResult>> {
        Box::pin(async move {
            self.queries
                .lock()
                .expect("queries lock")
                .push(query.to_string());
            Ok(self.answers.get(query).cloned().unwrap_or_default())
        })
    }
}

fn rect(x: f32, y: f32, width: f32, height: f32) -> Vec<f32> {
    vec![
        x,
        y,
        x + width,
        y,
        x + width,
        y + height,
        x,
        y + height,
    ]
}

fn line(text: &str, size: f32, top: f32) -> OcrLine {
    OcrLine::new(text, rect(20.0, top, 30.0 * text.len() as f32, size))
}

fn book(title: &str, author: &str) -> BookLookupResult {
    BookLookupResult::new(title, author)
}

fn analyzer(
    settings: Settings,
    lines: Vec<OcrLine>,
    lookup: QueryLookup,
    local: Vec<LocalBook>,
) -> Result<CoverAnalyzer<ScriptedOcr, QueryLookup, MemoryCatalog>> {
    CoverAnalyzer::new(
        settings,
        ScriptedOcr(lines),
        lookup,
        MemoryCatalog::new(local)?,
    )
}

async fn analyze(
    analyzer: &CoverAnalyzer<ScriptedOcr, QueryLookup, MemoryCatalog>,
    request_id: &str,
) -> CoverAnalysisResponse {
    analyzer
        .analyze_cover(PNG_MAGIC, "auto", request_id, &CancelSignal::never())
        .await
}

fn titles(response: &CoverAnalysisResponse) -> Vec<&str> {
    response
        .matched_books
        .iter()
        .map(|book| book.entry.title())
        .collect()
}

#[tokio::test]
async fn large_title_and_author_give_exact_match() -> Result<()> {
    let lookup = QueryLookup::default().answer(
        "MISTBORN Brandon Sanderson A Novel",
        vec![book("Mistborn", "Brandon Sanderson")],
    );
    let analyzer = analyzer(
        Settings::default(),
        vec![
            line("MISTBORN", 40.0, 30.0),
            line("Brandon Sanderson", 20.0, 600.0),
            line("A Novel", 8.0, 90.0),
        ],
        lookup,
        Vec::new(),
    )?;
    let response = analyze(&analyzer, "mistborn").await;

    assert!(response.success);
    assert_eq!(response.extracted_text, "MISTBORN Brandon Sanderson A Novel");
    let exact = response.exact_match.expect("exact match");
    assert_eq!(exact.entry.title(), "Mistborn");
    assert_eq!(exact.score, 1.0);
    Ok(())
}

#[tokio::test]
async fn missing_geometry_falls_back_without_sharpening() -> Result<()> {
    let analyzer = analyzer(
        Settings::default(),
        vec![
            OcrLine::text_only("THE WAY OF KINGS"),
            OcrLine::text_only("#1 NYT bestseller"),
        ],
        QueryLookup::default(),
        Vec::new(),
    )?;
    let response = analyze(&analyzer, "no-geometry").await;

    assert!(response.success);
    assert_eq!(response.extracted_text, "THE WAY KINGS NYT bestseller");
    assert!(response.matched_books.is_empty());
    assert_eq!(analyzer_queries(&analyzer), vec!["THE WAY KINGS NYT bestseller"]);
    Ok(())
}

#[tokio::test]
async fn sharpened_retry_finds_the_book() -> Result<()> {
    let lookup = QueryLookup::default().answer("MISTBORN", vec![book("Mistborn", "")]);
    let analyzer = analyzer(
        Settings::default(),
        vec![
            line("MISTBORN", 40.0, 30.0),
            line("Award Winner", 28.0, 100.0),
            line("the final empire", 20.0, 160.0),
        ],
        lookup,
        Vec::new(),
    )?;
    let response = analyze(&analyzer, "sharpen").await;

    assert!(response.success);
    assert_eq!(
        analyzer_queries(&analyzer),
        vec!["MISTBORN Award Winner the final empire", "MISTBORN"]
    );
    assert_eq!(titles(&response), vec!["Mistborn"]);
    Ok(())
}

#[tokio::test]
async fn uniform_type_halts_after_one_attempt() -> Result<()> {
    let analyzer = analyzer(
        Settings::default(),
        vec![
            line("SOME TITLE", 20.0, 30.0),
            line("Some Author", 20.0, 60.0),
        ],
        QueryLookup::default(),
        Vec::new(),
    )?;
    let response = analyze(&analyzer, "uniform").await;

    assert!(response.success);
    assert!(response.matched_books.is_empty());
    assert!(response.exact_match.is_none());
    assert_eq!(analyzer_queries(&analyzer).len(), 1);
    Ok(())
}

#[tokio::test]
async fn local_entry_replaces_external_duplicate() -> Result<()> {
    let mut external = book("Snow Crash", "Neal Stephenson");
    external.thumbnail = Some("https://covers.example/snow-crash.jpg".to_string());
    let lookup = QueryLookup::default().answer("SNOW CRASH NEAL STEPHENSON", vec![external]);
    let analyzer = analyzer(
        Settings::default(),
        vec![
            line("SNOW CRASH", 96.0, 40.0),
            line("NEAL STEPHENSON", 48.0, 700.0),
        ],
        lookup,
        vec![LocalBook {
            id: 7,
            title: "Snow Crash".to_string(),
            author: "Neal Stephenson".to_string(),
            thumbnail: None,
        }],
    )?;
    let response = analyze(&analyzer, "snow-crash").await;

    assert_eq!(response.matched_books.len(), 1);
    assert!(matches!(
        response.matched_books[0].entry,
        CatalogEntry::Local(LocalBook { id: 7, .. })
    ));
    assert_eq!(response.matched_books[0].score, 1.0);

    let mut value = serde_json::to_value(&response)?;
    strip_scores(&mut value);
    insta::assert_json_snapshot!(value, @r###"
    {
      "error": null,
      "exact_match": {
        "author": "Neal Stephenson",
        "id": 7,
        "source": "local",
        "thumbnail": null,
        "title": "Snow Crash"
      },
      "extracted_text": "SNOW CRASH NEAL STEPHENSON",
      "failure_kind": null,
      "matched_books": [
        {
          "author": "Neal Stephenson",
          "id": 7,
          "source": "local",
          "thumbnail": null,
          "title": "Snow Crash"
        }
      ],
      "request_id": "snow-crash",
      "success": true
    }
    "###);
    Ok(())
}

#[tokio::test]
async fn response_is_capped_to_top_results() -> Result<()> {
    let settings = Settings {
        max_results_per_response: 5,
        ..Settings::default()
    };
    let author = "Neal Stephenson";
    let lookup = QueryLookup::default().answer(
        "NEAL STEPHENSON COLLECTION",
        vec![
            book("Anathem", author),
            book("Seveneves", author),
            book("Collection Two", author),
            book("Reamde", author),
            book("Cryptonomicon", author),
            book("Collection", author),
            book("Quicksilver", author),
            book("Zodiac", author),
        ],
    );
    let analyzer = analyzer(
        settings,
        vec![line("NEAL STEPHENSON COLLECTION", 40.0, 30.0)],
        lookup,
        Vec::new(),
    )?;
    let response = analyze(&analyzer, "capped").await;

    assert_eq!(
        titles(&response),
        vec!["Collection", "Collection Two", "Anathem", "Seveneves", "Reamde"]
    );
    let exact = response.exact_match.expect("exact match");
    assert_eq!(exact.entry.title(), "Collection");
    assert!(
        response
            .matched_books
            .windows(2)
            .all(|pair| pair[0].score >= pair[1].score)
    );
    Ok(())
}

fn analyzer_queries(analyzer: &CoverAnalyzer<ScriptedOcr, QueryLookup, MemoryCatalog>) -> Vec<String> {
    analyzer.lookup().queries()
}

fn strip_scores(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            map.remove("score");
            map.values_mut().for_each(strip_scores);
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(strip_scores),
        _ => {}
    }
}
