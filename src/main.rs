//! epg-sync
//! Mirrors M3U playlists and XMLTV guides, filters each guide down to the
//! channels its playlist actually carries, and publishes the merged guide
//! to a git remote when it changed.

use std::fs;
use std::path::Path;

use log::{error, info, warn};

mod batch;
mod config;
mod epg;
mod error;
mod fetch;
mod git;
mod m3u;

use config::{SyncConfig, CONFIG_FILE};
use error::Result;
use fetch::Fetcher;
use git::GitPublisher;

/// Local clone used for publishing.
const REPO_DIR: &str = "repo";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stdout)
        .init();

    let mut config = SyncConfig::load(Path::new(CONFIG_FILE));
    config.apply_env();

    if let Err(e) = run(&config) {
        error!("Sync failed: {e}");
        std::process::exit(1);
    }
}

fn run(config: &SyncConfig) -> Result<()> {
    info!("Starting EPG sync");
    let fetcher = Fetcher::new(config.download.clone());

    // The mirror directory is rebuilt from scratch every run.
    let output_dir = config.output_dir();
    if output_dir.exists() {
        fs::remove_dir_all(&output_dir)?;
    }
    fs::create_dir_all(&output_dir)?;

    // Stage 1: mirror-only files, fetched concurrently. Failures here are
    // per-file and never abort the run.
    if !config.downloads.is_empty() {
        let report = batch::mirror(&fetcher, &config.downloads, &output_dir, config.workers);
        if !report.all_ok() {
            warn!("{} mirror download(s) failed", report.failed.len());
        }
    }

    // Stage 2: fetch, parse and merge each playlist/EPG pair.
    let mut merged: Vec<(String, String)> = Vec::new();
    for source in &config.sources {
        info!("Processing source {}", source.name);
        let playlist_name = format!("{}.m3u", source.name);
        let epg_name = format!("{}.epg.xml", source.name);

        let playlist_text =
            fetcher.fetch_to_file(&source.playlist_url, &output_dir.join(&playlist_name))?;
        let epg_text = fetcher.fetch_to_file(&source.epg_url, &output_dir.join(&epg_name))?;

        let channels = m3u::parse_playlist(&playlist_text);
        let guide = epg::parse_epg(&epg_text)?;
        info!(
            "{}: {} playlist channels, {} guide channels, {} programmes",
            source.name,
            channels.len(),
            guide.channel_count(),
            guide.programme_count()
        );

        let outcome = epg::merge(&channels, &guide)?;
        if config.report_orphans {
            for name in &outcome.unmatched_playlist {
                warn!("{}: playlist channel '{}' has no guide data", source.name, name);
            }
            for id in &outcome.orphan_epg_ids {
                warn!("{}: guide channel '{}' is not in the playlist", source.name, id);
            }
        }
        info!(
            "{}: merged {} channels with {} programmes",
            source.name, outcome.matched_channels, outcome.programme_count
        );

        // The merged guide supersedes the raw mirror copy under the same name.
        fs::write(output_dir.join(&epg_name), &outcome.xml)?;
        merged.push((epg_name, outcome.xml));
    }

    // Stage 3: commit and push the merged guides.
    match config.git.token.as_deref() {
        None => warn!("GITHUB_TOKEN is not set, skipping publish"),
        Some(token) => {
            let publisher = GitPublisher::open_or_clone(&config.git, token, Path::new(REPO_DIR))?;
            for (file_name, xml) in &merged {
                publisher.publish(file_name, xml)?;
            }
        }
    }

    info!("EPG sync finished");
    Ok(())
}
