use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

/// Target length for generated summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MaxLength {
    Short,
    Medium,
    Long,
}

impl MaxLength {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
        }
    }

    /// Output token limit passed to the provider per request.
    pub fn max_output_tokens(self) -> u32 {
        match self {
            Self::Short => 300,
            Self::Medium => 600,
            Self::Long => 1200,
        }
    }
}

/// Immutable runtime settings. Built once at startup and passed explicitly
/// into each pipeline call; nothing reads the environment after load.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub preferred_length: MaxLength,
    pub auto_summarize: bool,
    pub cache_path: PathBuf,
    pub request_timeout: Duration,
    pub max_requests_per_hour: usize,
    pub min_request_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_owned(),
            model: "gpt-4o-mini".to_owned(),
            preferred_length: MaxLength::Medium,
            auto_summarize: false,
            cache_path: PathBuf::from(".pagegist/cache.json"),
            request_timeout: Duration::from_secs(120),
            max_requests_per_hour: 20,
            min_request_interval: Duration::from_secs(1),
        }
    }
}

/// Optional YAML settings file; every field overrides the default when set.
#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    preferred_length: Option<MaxLength>,
    auto_summarize: Option<bool>,
    cache_path: Option<PathBuf>,
    request_timeout_secs: Option<u64>,
    max_requests_per_hour: Option<usize>,
    min_request_interval_ms: Option<u64>,
}

impl Settings {
    /// Defaults, overridden by the settings file (if given), overridden by
    /// environment variables.
    pub fn load(file: Option<&Path>) -> anyhow::Result<Self> {
        let mut settings = Self::default();

        if let Some(path) = file {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("read settings file: {}", path.display()))?;
            let parsed: SettingsFile = serde_yaml::from_str(&contents)
                .with_context(|| format!("parse settings file: {}", path.display()))?;
            settings.apply_file(parsed);
        }

        settings.apply_env();
        Ok(settings)
    }

    fn apply_file(&mut self, file: SettingsFile) {
        if let Some(api_key) = file.api_key {
            self.api_key = Some(api_key);
        }
        if let Some(base_url) = file.base_url {
            self.base_url = base_url;
        }
        if let Some(model) = file.model {
            self.model = model;
        }
        if let Some(length) = file.preferred_length {
            self.preferred_length = length;
        }
        if let Some(auto) = file.auto_summarize {
            self.auto_summarize = auto;
        }
        if let Some(path) = file.cache_path {
            self.cache_path = path;
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(max) = file.max_requests_per_hour {
            self.max_requests_per_hour = max;
        }
        if let Some(ms) = file.min_request_interval_ms {
            self.min_request_interval = Duration::from_millis(ms);
        }
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("PAGEGIST_API_KEY") {
            self.api_key = Some(key);
        } else if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.api_key = Some(key);
        }
        if let Ok(base_url) = std::env::var("PAGEGIST_BASE_URL") {
            self.base_url = base_url;
        }
        if let Ok(model) = std::env::var("PAGEGIST_MODEL") {
            self.model = model;
        }
        if let Ok(path) = std::env::var("PAGEGIST_CACHE") {
            self.cache_path = PathBuf::from(path);
        }
    }
}
