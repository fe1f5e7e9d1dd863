//! Git publisher
//! Shells out to the git binary: clone-if-absent, stage, commit with a
//! timestamped message, push. Only pushes when the file actually changed.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{Local, NaiveDateTime};
use log::info;

use crate::config::GitConfig;
use crate::error::{Error, Result};

pub struct GitPublisher {
    repo_dir: PathBuf,
    branch: String,
    /// Kept only to scrub credentials out of git's error output.
    token: String,
}

impl GitPublisher {
    /// Reuse `repo_dir` when it already holds a clone, otherwise clone the
    /// configured repository into it.
    pub fn open_or_clone(config: &GitConfig, token: &str, repo_dir: &Path) -> Result<Self> {
        let publisher = Self {
            repo_dir: repo_dir.to_path_buf(),
            branch: config.branch.clone(),
            token: token.to_string(),
        };

        if !repo_dir.join(".git").exists() {
            info!("Cloning {} into {}", config.repo, repo_dir.display());
            let remote = remote_url(&config.repo, token);
            let output = Command::new("git")
                .args(["clone", "--branch", &config.branch, "--single-branch", &remote])
                .arg(repo_dir)
                .output()?;
            if !output.status.success() {
                return Err(publisher.git_error("clone", &output.stderr));
            }
        }

        Ok(publisher)
    }

    /// Write `content` to `file_name` inside the clone, then commit and push
    /// it when the working tree shows a change. Returns whether a push
    /// happened.
    pub fn publish(&self, file_name: &str, content: &str) -> Result<bool> {
        let file_path = self.repo_dir.join(file_name);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&file_path, content)?;

        self.git(&["add", file_name])?;

        let status = self.git(&["status", "--porcelain", "--", file_name])?;
        if status.trim().is_empty() {
            info!("No changes in {}, skipping push", file_name);
            return Ok(false);
        }

        let message = commit_message(Local::now().naive_local());
        self.git(&["commit", "-m", &message])?;

        let refspec = format!("{}:{}", self.branch, self.branch);
        self.git(&["push", "origin", &refspec])?;

        info!("Pushed {}", file_name);
        Ok(true)
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.repo_dir)
            .args(args)
            .output()?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(self.git_error(args.first().unwrap_or(&"?"), &output.stderr))
        }
    }

    fn git_error(&self, command: &str, stderr: &[u8]) -> Error {
        let mut detail = String::from_utf8_lossy(stderr).trim().to_string();
        if !self.token.is_empty() {
            detail = detail.replace(&self.token, "***");
        }
        Error::Git {
            command: command.to_string(),
            detail,
        }
    }
}

fn remote_url(repo: &str, token: &str) -> String {
    format!("https://{token}@github.com/{repo}.git")
}

fn commit_message(now: NaiveDateTime) -> String {
    format!("Automatic EPG update - {}", now.format("%d-%m-%Y %H:%M:%S"))
}
