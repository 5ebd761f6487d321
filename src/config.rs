//! Configuration loading.
//!
//! Settings come from an optional TOML file, a `.env` file and the process
//! environment, in increasing order of precedence. The result is one
//! [`Config`] value that the binary passes down explicitly; nothing below
//! `main` reads the environment.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub company: CompanyConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Resolved key; never read from the TOML file.
    #[serde(skip)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model_fast: String,
    #[serde(default = "default_model")]
    pub model_smart: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            api_key: None,
            model_fast: default_model(),
            model_smart: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
        }
    }
}

fn default_base_url() -> String {
    "https://api.moonshot.ai/v1".to_string()
}
fn default_api_key_env() -> String {
    "MOONSHOT_API_KEY".to_string()
}
fn default_model() -> String {
    "kimi-k2.5".to_string()
}
fn default_temperature() -> f32 {
    1.0
}
fn default_timeout_secs() -> u64 {
    300
}

/// Company context prepended to prompts so the model can tell "us" from clients and vendors.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CompanyConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub former_name: String,
    #[serde(default)]
    pub business: String,
    #[serde(default)]
    pub industries: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("knowledge_base")
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ScanConfig {
    /// Extra glob patterns (relative to the scanned directory) to skip.
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

/// How many characters of document text each request may carry.
#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    #[serde(default = "default_discovery_chars")]
    pub discovery_chars: usize,
    #[serde(default = "default_product_chars")]
    pub product_chars: usize,
    #[serde(default = "default_client_chars")]
    pub client_chars: usize,
    #[serde(default = "default_guide_chars")]
    pub guide_chars: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            discovery_chars: default_discovery_chars(),
            product_chars: default_product_chars(),
            client_chars: default_client_chars(),
            guide_chars: default_guide_chars(),
        }
    }
}

fn default_discovery_chars() -> usize {
    15_000
}
fn default_product_chars() -> usize {
    25_000
}
fn default_client_chars() -> usize {
    20_000
}
fn default_guide_chars() -> usize {
    30_000
}

impl CompanyConfig {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.business.is_empty() && self.industries.is_empty()
    }
}

/// Load configuration from `path` (if it exists) and the environment.
///
/// A missing file is not an error: defaults are used. `.env` in the current
/// directory is loaded first if present.
pub fn load_config(path: &Path) -> Result<Config> {
    let _ = dotenvy::dotenv();
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str::<Config>(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };
    apply_env(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

/// Overlay environment values onto `config`. `lookup` abstracts the environment for tests.
pub fn apply_env(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    config.llm.api_key = non_empty(&config.llm.api_key_env);
    if let Some(url) = non_empty("MOONSHOT_BASE_URL") {
        config.llm.base_url = url;
    }
    if let Some(v) = non_empty("COMPANY_NAME") {
        config.company.name = v;
    }
    if let Some(v) = non_empty("COMPANY_FORMER_NAME") {
        config.company.former_name = v;
    }
    if let Some(v) = non_empty("COMPANY_BUSINESS") {
        config.company.business = v;
    }
    if let Some(v) = non_empty("COMPANY_INDUSTRIES") {
        config.company.industries = v;
    }
}

pub fn validate(config: &Config) -> Result<()> {
    if !config.llm.base_url.starts_with("http") {
        bail!("llm.base_url must be an http(s) URL");
    }
    if config.llm.model_fast.trim().is_empty() || config.llm.model_smart.trim().is_empty() {
        bail!("llm.model_fast and llm.model_smart must not be empty");
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        bail!("llm.temperature must be in [0.0, 2.0]");
    }
    if config.llm.timeout_secs == 0 {
        bail!("llm.timeout_secs must be > 0");
    }
    let limits = &config.limits;
    if limits.discovery_chars == 0
        || limits.product_chars == 0
        || limits.client_chars == 0
        || limits.guide_chars == 0
    {
        bail!("limits.* must be > 0");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        validate(&config).unwrap();
        assert_eq!(config.llm.model_fast, "kimi-k2.5");
        assert_eq!(config.llm.max_retries, 0);
        assert_eq!(config.limits.discovery_chars, 15_000);
        assert_eq!(config.output.dir, PathBuf::from("knowledge_base"));
    }

    #[test]
    fn parses_partial_file() {
        let config: Config = toml::from_str(
            r#"
[llm]
model_smart = "gpt-4o"
max_retries = 2

[company]
name = "Acme Automation"
"#,
        )
        .unwrap();
        assert_eq!(config.llm.model_smart, "gpt-4o");
        assert_eq!(config.llm.model_fast, "kimi-k2.5");
        assert_eq!(config.llm.max_retries, 2);
        assert_eq!(config.company.name, "Acme Automation");
        assert_eq!(config.limits.guide_chars, 30_000);
    }

    #[test]
    fn environment_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("MOONSHOT_API_KEY", "sk-test"),
            ("COMPANY_NAME", "Acme"),
            ("COMPANY_INDUSTRIES", "Mining, Ports"),
            ("MOONSHOT_BASE_URL", "  "),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        config.company.name = "From File".into();
        apply_env(&mut config, |k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.company.name, "Acme");
        assert_eq!(config.company.industries, "Mining, Ports");
        assert_eq!(config.llm.base_url, "https://api.moonshot.ai/v1");
    }

    #[test]
    fn custom_key_variable() {
        let mut config = Config::default();
        config.llm.api_key_env = "OPENAI_API_KEY".into();
        apply_env(&mut config, |k| (k == "OPENAI_API_KEY").then(|| "sk-o".to_string()));
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-o"));
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = Config::default();
        config.llm.temperature = 3.0;
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.limits.product_chars = 0;
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.llm.base_url = "ftp://nope".into();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn example_file_parses() {
        let config: Config = toml::from_str(include_str!("../docwiki.example.toml")).unwrap();
        validate(&config).unwrap();
        assert_eq!(config.scan.exclude_globs, ["**/archive/**"]);
        assert_eq!(config.limits.guide_chars, 30_000);
    }
}
