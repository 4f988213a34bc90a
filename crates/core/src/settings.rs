//! Settings loaded from the analysis template
//!
//! The template is an INI file (by default `<root>/Analysis_Template.ini`):
//!
//! ```ini
//! [Analysis]
//! Prompt = describe
//! Rules = be concise
//!
//! [Backend]
//! kind = deepseek
//!
//! [Deepseek]
//! api_key = sk-...
//! ```
//!
//! Section and key names are case-insensitive. Every value can be overridden from the
//! environment, e.g. `LOOKOUT_DEEPSEEK__API_KEY`.

use crate::error::ConfigError;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;
use std::fmt;
use ini::Ini;
use std::io;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

/// Name of the template file looked up in the watched root
pub const CONFIG_FILE_NAME: &str = "Analysis_Template.ini";

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "LOOKOUT";

pub const DEFAULT_PROMPT: &str = "default prompt";
pub const DEFAULT_RULES: &str = "default rules";

/// Prompt and rules handed to the analyzer for every image
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub prompt: String,
    pub rules: String,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            rules: DEFAULT_RULES.to_string(),
        }
    }
}

/// Dispatch and housekeeping limits
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WatcherSettings {
    /// Maximum number of dispatch tasks running at once
    pub max_in_flight: usize,
    /// Capacity of the channel between the notify thread and the dispatcher
    pub queue_capacity: usize,
    /// How long shutdown waits for in-flight analyses (0 = don't wait)
    pub drain_timeout_secs: u64,
    /// How often stale debounce entries are evicted (0 = never)
    pub prune_interval_secs: u64,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            max_in_flight: 8,
            queue_capacity: 256,
            drain_timeout_secs: 30,
            prune_interval_secs: 60,
        }
    }
}

impl WatcherSettings {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }

    pub fn prune_interval(&self) -> Option<Duration> {
        (self.prune_interval_secs > 0).then(|| Duration::from_secs(self.prune_interval_secs))
    }
}

/// Which analyzer implementation handles images
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum BackendKind {
    /// Offline: records prompt and rules only
    #[default]
    Template,
    Deepseek,
    Qwen,
    Kimi,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Template => "template",
            BackendKind::Deepseek => "deepseek",
            BackendKind::Qwen => "qwen",
            BackendKind::Kimi => "kimi",
        }
    }

    /// Whether this backend talks to a hosted API
    pub fn is_remote(self) -> bool {
        !matches!(self, BackendKind::Template)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "template" => Ok(BackendKind::Template),
            "deepseek" => Ok(BackendKind::Deepseek),
            "qwen" | "qwen2.5" | "qwen2_5" => Ok(BackendKind::Qwen),
            "kimi" | "moonshot" => Ok(BackendKind::Kimi),
            other => Err(format!(
                "unknown backend '{}' (expected template, deepseek, qwen or kimi)",
                other
            )),
        }
    }
}

impl TryFrom<String> for BackendKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Backend selection and transport policy
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub kind: BackendKind,
    pub request_timeout_secs: u64,
    /// Extra attempts for network and rate-limit failures
    pub retries: u32,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            kind: BackendKind::Template,
            request_timeout_secs: 60,
            retries: 0,
        }
    }
}

impl BackendSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Per-vendor overrides; unset fields fall back to the vendor's defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VendorSettings {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    /// Longest edge of the uploaded thumbnail, where the vendor downsizes
    pub thumbnail_size: Option<u32>,
}

impl VendorSettings {
    /// API key, treating a blank `api_key =` line as unset
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

/// Everything read from the template file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub analysis: WatchConfig,
    pub watcher: WatcherSettings,
    pub backend: BackendSettings,
    pub deepseek: VendorSettings,
    pub qwen: VendorSettings,
    pub kimi: VendorSettings,
}

impl Settings {
    /// Load settings from an INI file plus `LOOKOUT_*` environment overrides
    ///
    /// A missing file is not an error: a warning is logged and defaults apply.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        match std::fs::read_to_string(path) {
            Ok(text) => {
                debug!(path = %path.display(), "Loading analysis template");
                builder = builder.add_source(File::from_str(&normalize_ini(&text)?, FileFormat::Ini));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Config file not found, using default prompt and rules");
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        }

        let builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Self::build(builder)
    }

    /// Parse settings from INI text, without environment overrides
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        Self::build(Config::builder().add_source(File::from_str(&normalize_ini(text)?, FileFormat::Ini)))
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Vendor section for a backend; `None` for the offline template
    pub fn vendor(&self, kind: BackendKind) -> Option<&VendorSettings> {
        match kind {
            BackendKind::Template => None,
            BackendKind::Deepseek => Some(&self.deepseek),
            BackendKind::Qwen => Some(&self.qwen),
            BackendKind::Kimi => Some(&self.kimi),
        }
    }

    /// Check limits and that the selected vendor has credentials
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watcher.max_in_flight == 0 {
            return Err(ConfigError::Invalid(
                "watcher.max_in_flight must be at least 1".to_string(),
            ));
        }
        if self.watcher.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "watcher.queue_capacity must be at least 1".to_string(),
            ));
        }

        let kind = self.backend.kind;
        if let Some(vendor) = self.vendor(kind) {
            if vendor.api_key().is_none() {
                return Err(ConfigError::Invalid(format!(
                    "backend '{}' selected but [{}] api_key is not set",
                    kind, kind
                )));
            }
        }

        Ok(())
    }
}

/// Re-render INI text with lowercase section and key names
///
/// Fields are matched by their lowercase names, so `[Analysis] Prompt` and
/// `[analysis] prompt` read the same value. Values are left untouched.
fn normalize_ini(text: &str) -> Result<String, ConfigError> {
    let parsed = Ini::load_from_str(text).map_err(|e| ConfigError::Syntax(e.to_string()))?;

    let mut normalized = Ini::new();
    for (section, properties) in parsed.iter() {
        let section = section.map(str::to_ascii_lowercase);
        for (key, value) in properties.iter() {
            normalized
                .with_section(section.clone())
                .set(key.to_ascii_lowercase(), value);
        }
    }

    let mut buffer = Vec::new();
    normalized
        .write_to(&mut buffer)
        .map_err(|e| ConfigError::Syntax(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| ConfigError::Syntax(e.to_string()))
}
