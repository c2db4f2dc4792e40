use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use tracing::debug;

use crate::overlay::{DEFAULT_COLLAPSED_LINES, DEFAULT_PREVIEW_CHARS};
use crate::visibility::DEFAULT_VISIBILITY_THRESHOLD;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RemoteConfig {
    pub url: String,
    pub anon_key: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct UploadConfig {
    #[serde(default)]
    pub imgbb_api_key: Option<String>,
    #[serde(default)]
    pub cloudinary_cloud_name: Option<String>,
    #[serde(default)]
    pub cloudinary_upload_preset: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FeedSettings {
    pub visibility_threshold: f32,
    /// Items this far from the active one stay mounted.
    pub mount_window: usize,
    pub description_preview_chars: usize,
    pub collapsed_description_lines: u32,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            visibility_threshold: DEFAULT_VISIBILITY_THRESHOLD,
            mount_window: 2,
            description_preview_chars: DEFAULT_PREVIEW_CHARS,
            collapsed_description_lines: DEFAULT_COLLAPSED_LINES,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub feed: FeedSettings,
}

impl Config {
    /// Read `path` (or `config.toml` in the platform config dir when it exists),
    /// then apply `REELMART_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => Self::from_file(p)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(p) => Self::from_file(&p)?,
                None => Self::default(),
            },
        };
        cfg.apply_env(|k| std::env::var(k).ok());
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        debug!(path = %path.display(), "loaded config file");
        toml::from_str(&raw).with_context(|| format!("parsing config: {}", path.display()))
    }

    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |k: &str| var(k).filter(|v| !v.trim().is_empty());
        if let Some(v) = var("REELMART_DATABASE_URL") { self.database_url = Some(v); }
        if let Some(v) = var("REELMART_REMOTE_URL") {
            self.remote.get_or_insert_with(RemoteConfig::default).url = v;
        }
        if let Some(v) = var("REELMART_REMOTE_ANON_KEY") {
            self.remote.get_or_insert_with(RemoteConfig::default).anon_key = v;
        }
        if let Some(v) = var("REELMART_IMGBB_API_KEY") { self.upload.imgbb_api_key = Some(v); }
        if let Some(v) = var("REELMART_CLOUDINARY_CLOUD_NAME") { self.upload.cloudinary_cloud_name = Some(v); }
        if let Some(v) = var("REELMART_CLOUDINARY_UPLOAD_PRESET") { self.upload.cloudinary_upload_preset = Some(v); }
        if let Some(v) = var("REELMART_VISIBILITY_THRESHOLD")
            .and_then(|s| s.parse::<f32>().ok())
            .filter(|t| t.is_finite() && *t > 0.0 && *t <= 1.0)
        {
            self.feed.visibility_threshold = v;
        }
        if let Some(v) = var("REELMART_MOUNT_WINDOW").and_then(|s| s.parse().ok()) {
            self.feed.mount_window = v;
        }
    }

    /// Remote settings when both the project url and key are present.
    pub fn remote(&self) -> Option<&RemoteConfig> {
        self.remote.as_ref().filter(|r| !r.url.trim().is_empty() && !r.anon_key.trim().is_empty())
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("dev", "reelmart", "reelmart").map(|p| p.config_dir().join("config.toml"))
}
