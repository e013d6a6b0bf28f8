use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;

const UNKNOWN: &str = "unknown";

/// Firmware revision and config version shown in the run banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildIdentity {
    pub git_hash: String,
    pub config_version: String,
}

impl BuildIdentity {
    /// Resolve both identifiers relative to a firmware checkout.
    pub fn resolve(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            git_hash: read_git_hash(root),
            config_version: read_config_version(config_version_path(root)),
        }
    }

    /// Banner lines printed before any scenario runs.
    pub fn banner(&self) -> Vec<String> {
        vec![
            "=== Core Mirror Control Deck Smoke Test ===".to_string(),
            format!("Firmware git hash : {}", self.git_hash),
            format!("Config version    : {}", self.config_version),
            "-------------------------------------------".to_string(),
        ]
    }
}

impl fmt::Display for BuildIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (config {})", self.git_hash, self.config_version)
    }
}

/// Location of the config version file inside a checkout.
pub fn config_version_path(root: &Path) -> PathBuf {
    root.join("config").join("version.txt")
}

/// Short revision of `HEAD` in `root`, or `"unknown"` if git is missing or fails.
pub fn read_git_hash(root: &Path) -> String {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .current_dir(root)
        .output();
    match output {
        Ok(output) if output.status.success() => {
            let text: String = output
                .stdout
                .iter()
                .filter(|byte| byte.is_ascii())
                .map(|byte| char::from(*byte))
                .collect();
            non_empty_or_unknown(&text)
        }
        _ => UNKNOWN.to_string(),
    }
}

/// Trimmed contents of the version file, or `"unknown"` if missing or blank.
pub fn read_config_version(path: impl AsRef<Path>) -> String {
    match fs::read_to_string(path) {
        Ok(text) => non_empty_or_unknown(&text),
        Err(_) => UNKNOWN.to_string(),
    }
}

fn non_empty_or_unknown(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        UNKNOWN.to_string()
    } else {
        trimmed.to_string()
    }
}
