//! Application configuration for SiteSense.
//!
//! User config lives at `~/.sitesense/sitesense.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SiteSenseError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "sitesense.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".sitesense";

/// Lower bound for any delay between requests to the same host or provider.
pub const MIN_REQUEST_DELAY: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Config structs (matching sitesense.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Headless browser settings.
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Crawl policies.
    #[serde(default)]
    pub crawl_policies: CrawlPoliciesConfig,

    /// OpenRouter settings.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Enrichment tuning.
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// How long in-flight requests may keep running after a shutdown signal.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl ServerConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".into()
}
fn default_shutdown_timeout() -> u64 {
    10
}

/// When a navigation is considered finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitStrategy {
    /// The `load` event fired.
    Load,
    /// The `DOMContentLoaded` event fired.
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    /// No network activity for a short settle window.
    #[default]
    #[serde(rename = "networkidle")]
    NetworkIdle,
}

/// `[browser]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run without a visible window.
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Explicit Chrome/Chromium binary; auto-detected when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,

    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,

    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,

    /// Accept-Language / UI locale for every page.
    #[serde(default = "default_locale")]
    pub locale: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-operation and per-navigation timeout.
    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u64,

    #[serde(default)]
    pub wait_strategy: WaitStrategy,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            locale: default_locale(),
            user_agent: default_user_agent(),
            navigation_timeout_secs: default_navigation_timeout(),
            wait_strategy: WaitStrategy::default(),
        }
    }
}

impl BrowserConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }
}

fn default_true() -> bool {
    true
}
fn default_viewport_width() -> u32 {
    1920
}
fn default_viewport_height() -> u32 {
    1080
}
fn default_locale() -> String {
    "en-US".into()
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0.0.0 Safari/537.36"
        .into()
}
fn default_navigation_timeout() -> u64 {
    30
}

/// `[crawl_policies]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlPoliciesConfig {
    /// Whether to consult robots.txt before scraping.
    #[serde(default = "default_true")]
    pub respect_robots_txt: bool,

    /// Treat an unreachable or unreadable robots.txt as "allowed".
    #[serde(default = "default_true")]
    pub robots_fail_open: bool,

    /// Delay between page fetches in one crawl (floored at one second).
    #[serde(default = "default_fetch_delay")]
    pub fetch_delay_ms: u64,

    /// Default page budget for a crawl.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Wall-clock ceiling for one crawl.
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: u64,

    /// URL path include patterns.
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// URL path exclude patterns.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

impl Default for CrawlPoliciesConfig {
    fn default() -> Self {
        Self {
            respect_robots_txt: true,
            robots_fail_open: true,
            fetch_delay_ms: default_fetch_delay(),
            max_pages: default_max_pages(),
            max_duration_secs: default_max_duration(),
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
        }
    }
}

fn default_fetch_delay() -> u64 {
    1_000
}
fn default_max_pages() -> usize {
    10
}
fn default_max_duration() -> u64 {
    240
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Default model to use for enrichment.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// OpenAI-compatible API root.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-call timeout; a timeout counts as a provider failure.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_request_timeout() -> u64 {
    60
}

/// `[enrichment]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Products per enhancement call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between enhancement batches (floored at one second).
    #[serde(default = "default_batch_delay")]
    pub batch_delay_ms: u64,

    /// Default FAQ count when the caller does not specify one.
    #[serde(default = "default_max_faqs")]
    pub max_faqs: usize,

    /// Character cap for extracted text.
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay(),
            max_faqs: default_max_faqs(),
            max_text_chars: default_max_text_chars(),
        }
    }
}

fn default_batch_size() -> usize {
    5
}
fn default_batch_delay() -> u64 {
    1_000
}
fn default_max_faqs() -> usize {
    10
}
fn default_max_text_chars() -> usize {
    30_000
}

// ---------------------------------------------------------------------------
// Crawl config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime crawl configuration, merged from config file + request/CLI flags.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Maximum number of successfully extracted pages.
    pub max_pages: usize,
    /// Pause between consecutive fetches.
    pub fetch_delay: Duration,
    /// Wall-clock ceiling for the whole crawl.
    pub max_duration: Duration,
    /// URL path include glob patterns.
    pub include_patterns: Vec<String>,
    /// URL path exclude glob patterns.
    pub exclude_patterns: Vec<String>,
}

impl CrawlConfig {
    /// Override the page budget.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }
}

impl From<&AppConfig> for CrawlConfig {
    fn from(config: &AppConfig) -> Self {
        let policies = &config.crawl_policies;
        Self {
            max_pages: policies.max_pages,
            fetch_delay: Duration::from_millis(policies.fetch_delay_ms).max(MIN_REQUEST_DELAY),
            max_duration: Duration::from_secs(policies.max_duration_secs),
            include_patterns: policies.include_patterns.clone(),
            exclude_patterns: policies.exclude_patterns.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.sitesense/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SiteSenseError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.sitesense/sitesense.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SiteSenseError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        SiteSenseError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SiteSenseError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SiteSenseError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SiteSenseError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the OpenRouter API key from the configured env var.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.openrouter.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(SiteSenseError::config(format!(
            "OpenRouter API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://openrouter.ai/keys"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("bind"));
        assert!(toml_str.contains("OPENROUTER_API_KEY"));
        assert!(toml_str.contains("networkidle"));
    }

    #[test]
    fn server_section_defaults_shutdown_timeout() {
        let parsed: AppConfig = toml::from_str("[server]\nbind = \"0.0.0.0:8080\"\n").unwrap();
        assert_eq!(parsed.server.bind, "0.0.0.0:8080");
        assert_eq!(parsed.server.shutdown_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.browser.navigation_timeout_secs, 30);
        assert_eq!(parsed.enrichment.batch_size, 5);
        assert!(parsed.crawl_policies.robots_fail_open);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[browser]
wait_strategy = "domcontentloaded"
headless = false

[crawl_policies]
robots_fail_open = false
max_pages = 3
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.browser.wait_strategy, WaitStrategy::DomContentLoaded);
        assert!(!config.browser.headless);
        assert_eq!(config.browser.viewport_width, 1920);
        assert!(!config.crawl_policies.robots_fail_open);
        assert_eq!(config.crawl_policies.max_pages, 3);
        assert_eq!(config.server.bind, "127.0.0.1:3000");
    }

    #[test]
    fn crawl_config_floors_fetch_delay() {
        let mut app = AppConfig::default();
        app.crawl_policies.fetch_delay_ms = 10;
        let crawl = CrawlConfig::from(&app);
        assert_eq!(crawl.fetch_delay, MIN_REQUEST_DELAY);
        assert_eq!(crawl.max_pages, 10);
        assert_eq!(crawl.max_duration, Duration::from_secs(240));
    }

    #[test]
    fn api_key_resolution() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.openrouter.api_key_env = "SS_TEST_NONEXISTENT_KEY_12345".into();
        let result = resolve_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
