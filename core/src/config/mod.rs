use crate::error::ConfigError;
use crate::trace::DEFAULT_PROJECT;
use crate::trace::sanitize::{DEFAULT_MAX_LIST_ITEMS, DEFAULT_MAX_STRING_LENGTH};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

const ROAM_DIR: &str = ".roam";

pub const KNOWN_PROVIDERS: &[&str] = &["gemini", "openai", "ollama"];

/// Built-in services: name, default base URL, call timeout in seconds and the
/// environment variable holding the service API key.
const DEFAULT_SERVICES: &[(&str, &str, u64, &str)] = &[
    ("youtube", "http://localhost:8000", 30, "YOUTUBE_API_KEY"),
    ("exa", "http://localhost:8001", 30, "EXA_API_KEY"),
    ("maps", "http://localhost:8002", 45, "GOOGLE_MAPS_API_KEY"),
    ("calendar", "http://localhost:8003", 45, "GOOGLE_CALENDAR_API_KEY"),
    ("tts", "http://localhost:8004", 120, "ELEVENLABS_API_KEY"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub health_gate: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: None,
            timeout_secs: 30,
            health_gate: true,
        }
    }
}

impl ServiceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    pub enabled: bool,
    pub project: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub max_string_length: usize,
    pub max_list_items: usize,
    pub sanitize: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            project: DEFAULT_PROJECT.to_string(),
            file: Some(PathBuf::from("traces.jsonl")),
            endpoint: None,
            api_key: None,
            max_string_length: DEFAULT_MAX_STRING_LENGTH,
            max_list_items: DEFAULT_MAX_LIST_ITEMS,
            sanitize: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: String,
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f64,
    pub max_iterations: usize,
    pub results_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roster: Option<PathBuf>,
    pub services: BTreeMap<String, ServiceConfig>,
    pub trace: TraceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            provider: "gemini".to_string(),
            api_key: String::new(),
            base_url: None,
            model: "gemini-2.0-flash".to_string(),
            temperature: 0.7,
            max_iterations: 10,
            results_dir: PathBuf::from("results"),
            roster: None,
            services: default_services(),
            trace: TraceConfig::default(),
        }
    }
}

pub fn default_services() -> BTreeMap<String, ServiceConfig> {
    DEFAULT_SERVICES
        .iter()
        .map(|(name, url, timeout_secs, _)| {
            (
                name.to_string(),
                ServiceConfig {
                    base_url: url.to_string(),
                    timeout_secs: *timeout_secs,
                    ..Default::default()
                },
            )
        })
        .collect()
}

fn service_key_var(name: &str) -> String {
    DEFAULT_SERVICES
        .iter()
        .find(|(service, ..)| *service == name)
        .map(|(.., var)| var.to_string())
        .unwrap_or_else(|| format!("{}_API_KEY", name.to_uppercase()))
}

pub fn get_roam_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(ROAM_DIR)
}

pub fn get_config_path() -> PathBuf {
    get_roam_dir().join("config.toml")
}

pub fn ensure_roam_dir() -> Result<PathBuf> {
    let roam_dir = get_roam_dir();

    if !roam_dir.exists() {
        std::fs::create_dir_all(&roam_dir).with_context(|| {
            format!("Failed to create roam directory at {}", roam_dir.display())
        })?;
    }

    Ok(roam_dir)
}

impl Config {
    /// Loads the explicit file if given, else the default file if present,
    /// else the defaults; then applies environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => load_config_from(path)?,
            None if config_exists() => load_config()?,
            None => Config::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        self.apply_env_with(|var| std::env::var(var).ok().filter(|v| !v.is_empty()));
    }

    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("ROAM_PROVIDER") {
            self.provider = provider;
        }
        if let Some(model) = lookup("ROAM_MODEL") {
            self.model = model;
        }
        if let Some(base_url) = lookup("ROAM_BASE_URL") {
            self.base_url = Some(base_url);
        }
        if let Some(raw) = lookup("ROAM_TEMPERATURE") {
            match raw.parse::<f64>() {
                Ok(temperature) => self.temperature = temperature,
                Err(_) => warn!(value = %raw, "Ignoring unparsable ROAM_TEMPERATURE"),
            }
        }
        if let Some(dir) = lookup("ROAM_RESULTS_DIR") {
            self.results_dir = PathBuf::from(dir);
        }

        for (name, service) in self.services.iter_mut() {
            if let Some(url) = lookup(&format!("{}_MCP_URL", name.to_uppercase())) {
                service.base_url = url;
            }
            if let Some(key) = lookup(&service_key_var(name)) {
                service.api_key = Some(key);
            }
        }

        if let Some(flag) = lookup("ROAM_TRACE") {
            self.trace.enabled = !matches!(flag.to_lowercase().as_str(), "0" | "false" | "off");
        }
        if let Some(endpoint) = lookup("ROAM_TRACE_ENDPOINT") {
            self.trace.endpoint = Some(endpoint);
        }
        if let Some(key) = lookup("ROAM_TRACE_API_KEY") {
            self.trace.api_key = Some(key);
        }
    }

    /// Startup check; a config that fails here must not be used to run stages.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !KNOWN_PROVIDERS.contains(&self.provider.to_lowercase().as_str()) {
            return Err(ConfigError::UnknownProvider(self.provider.clone()));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }

        for (name, service) in &self.services {
            let url = service.base_url.trim();
            if url.is_empty() {
                return Err(ConfigError::MissingServiceUrl(name.clone()));
            }
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidServiceUrl {
                    service: name.clone(),
                    url: url.to_string(),
                });
            }
        }

        Ok(())
    }

    fn fill_default_services(&mut self) {
        for (name, service) in default_services() {
            self.services.entry(name).or_insert(service);
        }
    }
}

pub fn load_config() -> Result<Config> {
    let config_path = get_config_path();

    if !config_path.exists() {
        anyhow::bail!("Config file not found. Run 'roam init' to set up your configuration.");
    }

    load_config_from(&config_path)
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", path.display()))?;
    config.fill_default_services();

    Ok(config)
}

pub fn save_config(config: &Config) -> Result<()> {
    ensure_roam_dir()?;
    save_config_to(config, &get_config_path())
}

pub fn save_config_to(config: &Config, path: &Path) -> Result<()> {
    let content =
        toml::to_string_pretty(config).with_context(|| "Failed to serialize config to TOML")?;

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(())
}

pub fn config_exists() -> bool {
    get_config_path().exists()
}
