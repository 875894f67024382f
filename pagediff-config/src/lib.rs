//! Loader for PageDiff configuration with YAML + environment overlays.
//!
//! Precedence, lowest first: built-in defaults, YAML files (in the order
//! attached), inline YAML snippets, then `PAGEDIFF__SECTION__KEY`
//! environment variables. After merging, every string value has `${VAR}`
//! and `${VAR:-fallback}` placeholders expanded from the process
//! environment, so `oracle.auth_token` defaults to `$OPENAI_API_KEY` and
//! `user_agent` to `$USER_AGENT` without any component reading the
//! environment itself.
use config::{Config, Environment, File, FileFormat};
use pagediff_common::observability::LogFormat;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

pub use config::ConfigError;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PageDiffConfig {
    pub user_agent: String,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub log: LogSettings,
}

/// Scoring oracle connection. The tag is `provider`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum OracleConfig {
    Openai {
        #[serde(default = "default_model")]
        model: String,
        #[serde(default)]
        auth_token: String,
        #[serde(default = "default_temperature")]
        temperature: f32,
        #[serde(default)]
        max_tokens: Option<u32>,
        #[serde(default = "default_openai_endpoint")]
        endpoint: String,
    },
}

impl Default for OracleConfig {
    fn default() -> Self {
        OracleConfig::Openai {
            model: default_model(),
            auth_token: String::new(),
            temperature: default_temperature(),
            max_tokens: None,
            endpoint: default_openai_endpoint(),
        }
    }
}

impl OracleConfig {
    pub fn model(&self) -> &str {
        match self {
            OracleConfig::Openai { model, .. } => model,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub wait_seconds: u64,
    pub scroll: bool,
    pub settle_delay_ms: u64,
    pub scroll_pause_ms: u64,
    pub max_scrolls: u32,
    pub ready_selector: String,
    pub wait_selectors: Vec<String>,
    pub login: Option<LoginConfig>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".into(),
            headless: true,
            window_width: 1920,
            window_height: 1080,
            wait_seconds: 10,
            scroll: false,
            settle_delay_ms: 3000,
            scroll_pause_ms: 2000,
            max_scrolls: 10,
            ready_selector: "div".into(),
            wait_selectors: Vec::new(),
            login: None,
        }
    }
}

/// Credentials for pages behind a login form. Accepted and carried through
/// to the browser settings, but no login flow is performed.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoginConfig {
    pub login_url: String,
    pub username_selector: String,
    pub password_selector: String,
    pub submit_selector: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContentConfig {
    pub max_tokens: usize,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self { max_tokens: 3000 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            connect_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogSettings {
    pub format: LogFormat,
    pub emit_stderr: bool,
    pub to_file: bool,
    pub dir: Option<PathBuf>,
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            emit_stderr: true,
            to_file: false,
            dir: None,
            filter: "info".into(),
        }
    }
}

fn default_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".into()
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hiding the `config` crate wiring (defaults + YAML + env overrides).
pub struct PageDiffConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    env_prefix: &'static str,
}

impl Default for PageDiffConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PageDiffConfigLoader {
    /// Start from built-in defaults; `PAGEDIFF__` env overrides apply at load.
    ///
    /// ```
    /// use pagediff_config::PageDiffConfigLoader;
    ///
    /// let config = PageDiffConfigLoader::new()
    ///     .with_yaml_str("content:\n  max_tokens: 500")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.content.max_tokens, 500);
    /// assert_eq!(config.browser.wait_seconds, 10);
    /// assert_eq!(config.oracle.model(), "gpt-3.5-turbo");
    /// ```
    pub fn new() -> Self {
        let fallback_ua = format!("${{USER_AGENT:-{DEFAULT_USER_AGENT}}}");
        let builder = Config::builder()
            .set_default("user_agent", fallback_ua)
            .and_then(|b| b.set_default("oracle.provider", "openai"))
            .and_then(|b| b.set_default("oracle.auth_token", "${OPENAI_API_KEY:-}"))
            .unwrap_or_else(|_| Config::builder());
        Self {
            builder,
            env_prefix: "PAGEDIFF",
        }
    }

    /// Attach a YAML/TOML/JSON file that must exist; format inferred by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that is skipped when absent, so deployments can rely
    /// purely on environment variables.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use pagediff_config::{OracleConfig, PageDiffConfigLoader};
    ///
    /// let cfg = PageDiffConfigLoader::new()
    ///     .with_yaml_str(
    ///         r##"
    /// user_agent: "pagediff-test/1.0"
    /// oracle:
    ///   provider: openai
    ///   model: gpt-4o-mini
    ///   auth_token: "sk-inline"
    /// browser:
    ///   scroll: true
    ///   wait_selectors: ["#app", ".loaded"]
    /// "##,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.user_agent, "pagediff-test/1.0");
    /// assert!(cfg.browser.scroll);
    /// assert_eq!(cfg.browser.wait_selectors.len(), 2);
    /// assert!(matches!(cfg.oracle, OracleConfig::Openai { ref auth_token, .. } if auth_token == "sk-inline"));
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self.builder.add_source(File::from_str(yaml, FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources.
    ///
    /// ```
    /// use pagediff_config::PageDiffConfigLoader;
    ///
    /// unsafe { std::env::set_var("PD_DOC_TOKEN", "injected-from-env"); }
    ///
    /// let config = PageDiffConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// oracle:
    ///   provider: openai
    ///   auth_token: "${PD_DOC_TOKEN}"
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// match &config.oracle {
    ///     pagediff_config::OracleConfig::Openai { auth_token, endpoint, .. } => {
    ///         assert_eq!(auth_token, "injected-from-env");
    ///         assert_eq!(endpoint, "https://api.openai.com/v1");
    ///     }
    /// }
    ///
    /// unsafe { std::env::remove_var("PD_DOC_TOKEN"); }
    /// ```
    pub fn load(self) -> Result<PageDiffConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix(self.env_prefix)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("browser.wait_selectors"),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}
