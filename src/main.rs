use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::warn;

#[derive(Parser, Debug)]
#[command(
    name = "cover-match",
    version,
    about = "Identify a book from a photo of its cover"
)]
struct Cli {
    /// Cover image (jpeg/png/bmp/gif/tiff/webp)
    image: PathBuf,

    /// Image content type, or "auto" to detect from the bytes
    #[arg(short = 't', long = "content-type", default_value = "auto")]
    content_type: String,

    /// OCR backend (tesseract, azure)
    #[arg(short = 'b', long = "backend")]
    backend: Option<String>,

    /// Local catalog JSON file
    #[arg(short = 'c', long = "catalog")]
    catalog: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Request id used in log output (default: derived from time and image)
    #[arg(long = "request-id")]
    request_id: Option<String>,

    /// Print recognized lines with their text size before the result
    #[arg(long = "show-lines")]
    show_lines: bool,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    cover_match::logging::init(cli.verbose)?;

    let (handle, signal) = cover_match::cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling");
            handle.cancel();
        }
    });

    let output = cover_match::run(
        cover_match::Config {
            image: cli.image,
            content_type: cli.content_type,
            backend: cli.backend,
            catalog_path: cli.catalog,
            settings_path: cli.read_settings,
            request_id: cli.request_id,
            show_lines: cli.show_lines,
        },
        signal,
    )
    .await?;

    println!("{}", output.text);
    if output.success {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
