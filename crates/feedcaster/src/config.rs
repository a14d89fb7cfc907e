use anyhow::{Context, Result};
use feedcaster_core::{PipelineConfig, SourceKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ACCESS_TOKEN_ENV: &str = "FEEDCASTER_ACCESS_TOKEN";
pub const IMGUR_CLIENT_ID_ENV: &str = "FEEDCASTER_IMGUR_CLIENT_ID";

/// Contents of `feedcaster.toml`: one posting account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BotConfig {
    /// Account the credentials must belong to. Required.
    pub account: String,

    /// Mastodon instance host, e.g. `botsin.space`.
    pub instance: String,

    pub source: SourceKind,

    pub state: StateConfig,

    pub records: RecordsConfig,

    pub http: HttpConfig,

    pub imgur: ImgurConfig,

    #[serde(flatten)]
    pub pipeline: PipelineConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            account: String::new(),
            instance: "botsin.space".to_string(),
            source: SourceKind::Feed,
            state: StateConfig::default(),
            records: RecordsConfig::default(),
            http: HttpConfig::default(),
            imgur: ImgurConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StateBackend {
    /// `<account>.json`, pretty printed.
    #[default]
    Json,
    /// `<account>.redb`.
    Redb,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct StateConfig {
    pub backend: StateBackend,
    /// Directory holding the state file. Defaults to `./data`.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct RecordsConfig {
    /// JSON array of flat records. Required for the records source.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            user_agent: format!("feedcaster/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ImgurConfig {
    /// API client id. Falls back to `FEEDCASTER_IMGUR_CLIENT_ID`. Album
    /// lookups are skipped without one.
    pub client_id: Option<String>,
}

impl BotConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Every problem found, so `config validate` can list them all.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.account.trim().is_empty() {
            errors.push("account is required".to_string());
        }
        if self.instance.trim().is_empty() {
            errors.push("instance is required".to_string());
        }
        if self.http.timeout_secs == 0 {
            errors.push("http.timeout_secs must be > 0".to_string());
        }

        match self.source {
            SourceKind::Folder if self.pipeline.index.folder.is_none() => {
                errors.push("index.folder is required for the folder source".to_string())
            }
            SourceKind::Feed if self.pipeline.feed.url.is_none() => {
                errors.push("feed.url is required for the feed source".to_string())
            }
            SourceKind::Records if self.records.path.is_none() => {
                errors.push("records.path is required for the records source".to_string())
            }
            _ => {}
        }

        if let Err(e) = self.pipeline.validate() {
            errors.push(e.to_string());
        }

        errors
    }

    /// State file location; `data_dir` overrides the configured directory.
    pub fn state_path(&self, data_dir: Option<&Path>) -> PathBuf {
        let dir = data_dir
            .map(Path::to_path_buf)
            .or_else(|| self.state.dir.clone())
            .unwrap_or_else(|| PathBuf::from("./data"));
        let extension = match self.state.backend {
            StateBackend::Json => "json",
            StateBackend::Redb => "redb",
        };
        dir.join(format!("{}.{}", self.account.trim_start_matches('@'), extension))
    }

    pub fn base_url(&self) -> String {
        let host = self.instance.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        }
    }

    pub fn imgur_client_id(&self) -> Option<String> {
        self.imgur
            .client_id
            .clone()
            .or_else(|| std::env::var(IMGUR_CLIENT_ID_ENV).ok())
            .filter(|id| !id.is_empty())
    }
}

pub fn access_token() -> Result<String> {
    match std::env::var(ACCESS_TOKEN_ENV) {
        Ok(token) if !token.trim().is_empty() => Ok(token),
        _ => anyhow::bail!("{} is not set", ACCESS_TOKEN_ENV),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedcaster_core::{ComposeMode, VariableSource};

    const EXAMPLE: &str = r#"
account = "catbot"
instance = "botsin.space"
source = "feed"

[feed]
url = "https://www.reddit.com/r/cats/new.json"
root_node = "data.children"
timestamp_field = "data.created_utc"

[filter]
authors = ["spamuser"]
text = ["rt @"]

[filter.weights]
base = 0.9

[compose]
mode = "feed"
format = "{title} {link}"

[[compose.variables]]
token = "{title}"
truncate = true
source = { kind = "path", path = "data.title" }

[[compose.variables]]
token = "{link}"
source = { kind = "path", path = "data.permalink", prefix = "https://reddit.com" }
"#;

    #[test]
    fn parses_full_example() {
        let config = BotConfig::parse(EXAMPLE).unwrap();
        assert_eq!(config.account, "catbot");
        assert_eq!(config.source, SourceKind::Feed);
        assert_eq!(config.pipeline.filter.weights.base, 0.9);
        assert_eq!(config.pipeline.filter.weights.urls, 0.8);
        assert_eq!(config.pipeline.compose.mode, Some(ComposeMode::Feed));
        assert_eq!(config.pipeline.compose.variables.len(), 2);
        assert!(config.pipeline.compose.variables[0].truncate);
        assert!(matches!(
            &config.pipeline.compose.variables[1].source,
            VariableSource::Path { prefix: Some(p), .. } if p == "https://reddit.com"
        ));
        assert!(config.validate().is_empty(), "{:?}", config.validate());
    }

    #[test]
    fn reports_missing_required_keys() {
        let config = BotConfig::parse("source = \"folder\"").unwrap();
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.contains("account")));
        assert!(errors.iter().any(|e| e.contains("index.folder")));
        assert!(errors.iter().any(|e| e.contains("compose.format")));
    }

    #[test]
    fn state_path_uses_account_and_backend() {
        let mut config = BotConfig::parse(EXAMPLE).unwrap();
        assert_eq!(config.state_path(None), PathBuf::from("./data/catbot.json"));
        config.state.backend = StateBackend::Redb;
        assert_eq!(
            config.state_path(Some(Path::new("/var/lib/fc"))),
            PathBuf::from("/var/lib/fc/catbot.redb")
        );
    }

    #[test]
    fn round_trips_through_toml() {
        let config = BotConfig::parse(EXAMPLE).unwrap();
        let shown = toml::to_string_pretty(&config).unwrap();
        assert_eq!(BotConfig::parse(&shown).unwrap(), config);
    }

    #[test]
    fn instance_becomes_https_url() {
        let config = BotConfig::default();
        assert_eq!(config.base_url(), "https://botsin.space");
    }
}
