use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tubekit::config::Config;
use tubekit::download::YtDlp;
use tubekit::shortener::TinyUrl;
use tubekit::transcript::YtDlpTranscripts;
use tubekit::{
    utils, Cli, Commands, DownloadMode, DownloadOrchestrator, DownloadRequest, DownloadStatus,
    QrCompositor, QrRequest, TranscriptFetcher, UrlShortener, VideoOptions,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "tubekit=debug" } else { "tubekit=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load().await?;

    match cli.command {
        Commands::Video {
            url,
            output,
            audio_only,
            transcript,
            start,
            end,
        } => {
            let request = DownloadRequest {
                source_url: url,
                destination: output,
                mode: DownloadMode::Video(VideoOptions {
                    audio_only,
                    want_transcript: transcript,
                    start_time: start,
                    end_time: end,
                }),
            };
            run_download(&config, &request, cli.quiet).await?;
        }
        Commands::Playlist {
            url,
            output,
            start_index,
        } => {
            let request = DownloadRequest {
                source_url: url,
                destination: output,
                mode: DownloadMode::Playlist { start_index },
            };
            run_download(&config, &request, cli.quiet).await?;
        }
        Commands::Transcript { url, output } => {
            warn_missing_dependencies(&config).await;
            fs_err::create_dir_all(&output)?;

            let fetcher = TranscriptFetcher::new(YtDlpTranscripts::from_config(
                &config.downloader,
                &config.transcript,
            ));
            let outcome = fetcher.fetch(&url, &output).await;
            if outcome.is_saved() {
                println!("{}", style(outcome.message()).green());
            } else {
                println!("{}", style(outcome.message()).yellow());
            }
        }
        Commands::Shorten { url } => {
            let url = utils::validate_and_normalize_url(&url)?;
            let shortened = UrlShortener::new(TinyUrl::from_config(&config.shortener))
                .shorten(&url)
                .await;

            println!("{}", shortened.url);
            if let Some(error) = shortened.error {
                eprintln!("{} {}", style("Error shortening URL:").red(), error);
            }
        }
        Commands::Qr {
            url,
            title,
            shorten,
            output,
        } => {
            let payload = if shorten {
                let shortened = UrlShortener::new(TinyUrl::from_config(&config.shortener))
                    .shorten(&url)
                    .await;
                if let Some(error) = &shortened.error {
                    eprintln!(
                        "{} {} (encoding the original URL)",
                        style("Error shortening URL:").red(),
                        error
                    );
                }
                shortened.url
            } else {
                url
            };

            let mut request = QrRequest::new(payload);
            if let Some(title) = title {
                request = request.with_title(title);
            }

            let png = QrCompositor::from_config(&config.qr).compose(&request)?;
            write_file(&output, &png)?;
            println!("QR code saved to: {}", output.display());
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                println!("Configuration file: {}", Config::config_path()?.display());
                println!("Run `tubekit config --show` to print the current values.");
            }
        }
        Commands::Check => {
            let missing = utils::check_dependencies(&config.downloader).await;
            if missing.is_empty() {
                println!("{}", style("All external tools are available.").green());
            } else {
                println!("{}", style("Missing external tools:").red());
                for dep in missing {
                    println!("   • {}", dep);
                }
            }
        }
    }

    Ok(())
}

async fn run_download(config: &Config, request: &DownloadRequest, quiet: bool) -> Result<()> {
    warn_missing_dependencies(config).await;

    let orchestrator = DownloadOrchestrator::from_config(
        YtDlp::from_config(&config.downloader),
        TranscriptFetcher::new(YtDlpTranscripts::from_config(
            &config.downloader,
            &config.transcript,
        )),
        &config.downloader,
    );

    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(100)
    };
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .context("Invalid progress bar template")?,
    );

    let bar = progress.clone();
    let mut sink = move |status: &DownloadStatus| {
        bar.set_position(status.progress_percent as u64);
        bar.set_message(status.message.clone());
    };

    tracing::info!("Starting download for URL: {}", request.source_url);
    let status = orchestrator.download(request, &mut sink).await;
    progress.finish_and_clear();

    if status.message.starts_with("Error occurred") {
        println!("{}", style(&status.message).red());
    } else {
        println!("{} ({}%)", style(&status.message).green(), status.progress_percent);
    }

    Ok(())
}

/// Missing tools are reported but not fatal; yt-dlp surfaces the real error
async fn warn_missing_dependencies(config: &Config) {
    let missing = utils::check_dependencies(&config.downloader).await;
    if !missing.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs_err::create_dir_all(parent)?;
    }
    fs_err::write(path, bytes)?;
    Ok(())
}
