//! Configuration management
//! Loaded from an optional JSON file beside the binary; git coordinates can
//! be overridden from the environment at startup.

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

/// Config file looked up in the working directory.
pub const CONFIG_FILE: &str = "epg-sync.json";

/// A playlist/EPG pair that gets merged and published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSet {
    /// Base name for output files: `<name>.m3u` and `<name>.epg.xml`.
    pub name: String,
    pub playlist_url: String,
    pub epg_url: String,
}

/// A mirror-only download (no merge involvement).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDownload {
    pub file_name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 2000,
            connect_timeout_secs: 30,
            read_timeout_secs: 120,
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    #[serde(default = "default_repo")]
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Never read from the config file; populated from `GITHUB_TOKEN`.
    #[serde(skip)]
    pub token: Option<String>,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            repo: default_repo(),
            branch: default_branch(),
            token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceSet>,
    #[serde(default)]
    pub downloads: Vec<FileDownload>,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// When set, channels dropped on either side of the merge are logged.
    #[serde(default)]
    pub report_orphans: bool,
    #[serde(default)]
    pub git: GitConfig,
}

fn default_output_dir() -> String {
    "iMPlayer".to_string()
}
fn default_workers() -> usize {
    crate::batch::DEFAULT_WORKERS
}
fn default_retries() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    2000
}
fn default_connect_timeout() -> u64 {
    30
}
fn default_read_timeout() -> u64 {
    120
}
fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}
fn default_repo() -> String {
    "josieljefferson12/iMPlayer".to_string()
}
fn default_branch() -> String {
    "main".to_string()
}

fn default_sources() -> Vec<SourceSet> {
    vec![
        SourceSet {
            name: "Playlists".to_string(),
            playlist_url: "http://m3u4u.com/m3u/3wk1y24kx7uzdevxygz7".to_string(),
            epg_url: "http://m3u4u.com/epg/3wk1y24kx7uzdevxygz7".to_string(),
        },
        SourceSet {
            name: "PiauiTV".to_string(),
            playlist_url: "http://m3u4u.com/m3u/jq2zy9epr3bwxmgwyxr5".to_string(),
            epg_url: "http://m3u4u.com/epg/jq2zy9epr3bwxmgwyxr5".to_string(),
        },
        SourceSet {
            name: "M3U_FILE".to_string(),
            playlist_url: "http://m3u4u.com/m3u/782dyqdrqkh1xegen4zp".to_string(),
            epg_url: "http://m3u4u.com/epg/782dyqdrqkh1xegen4zp".to_string(),
        },
    ]
}

impl SyncConfig {
    /// Load from `path` when it exists, otherwise the built-in defaults.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str::<SyncConfig>(&content) {
                    Ok(config) => return config,
                    Err(e) => warn!("Ignoring malformed {}: {}", path.display(), e),
                },
                Err(e) => warn!("Cannot read {}: {}", path.display(), e),
            }
        }
        Self::with_defaults()
    }

    /// Defaults mirror the reference deployment.
    pub fn with_defaults() -> Self {
        Self {
            output_dir: default_output_dir(),
            sources: default_sources(),
            downloads: Vec::new(),
            download: DownloadConfig::default(),
            workers: default_workers(),
            report_orphans: false,
            git: GitConfig::default(),
        }
    }

    /// Environment overrides, applied once at the entry point.
    pub fn apply_env(&mut self) {
        if let Ok(repo) = std::env::var("GITHUB_REPO") {
            self.git.repo = repo;
        }
        if let Ok(branch) = std::env::var("GITHUB_BRANCH") {
            self.git.branch = branch;
        }
        self.git.token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.output_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::with_defaults();
        assert_eq!(config.output_dir, "iMPlayer");
        assert_eq!(config.workers, 5);
        assert_eq!(config.sources.len(), 3);
        assert_eq!(config.download.max_retries, 3);
        assert_eq!(config.download.user_agent, "Mozilla/5.0");
        assert_eq!(config.git.branch, "main");
        assert!(config.git.token.is_none());
    }

    #[test]
    fn test_partial_json_falls_back_to_field_defaults() {
        let json = r#"{
            "output_dir": "mirror",
            "sources": [
                {"name": "One", "playlist_url": "http://x/m3u", "epg_url": "http://x/epg"}
            ],
            "download": {"max_retries": 5}
        }"#;
        let config: SyncConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.output_dir, "mirror");
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.download.max_retries, 5);
        assert_eq!(config.download.retry_delay_ms, 2000);
        assert_eq!(config.workers, 5);
        assert!(!config.report_orphans);
    }

    #[test]
    fn test_token_never_comes_from_json() {
        let json = r#"{"git": {"repo": "me/repo", "branch": "dev", "token": "leaked"}}"#;
        let config: SyncConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.git.repo, "me/repo");
        assert_eq!(config.git.branch, "dev");
        assert!(config.git.token.is_none());
    }
}
