use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SOCRATA_DOMAIN: &str = "data.cincinnati-oh.gov";
pub const DEFAULT_SOCRATA_DATASET: &str = "gexm-h6bt";
pub const DEFAULT_PAGE_SIZE: usize = 50_000;
pub const DEFAULT_PAGE_DELAY_MS: u64 = 500;
pub const DEFAULT_HUB_ENDPOINT: &str = "https://huggingface.co";
pub const DEFAULT_HUB_REPO: &str = "mlsystemsg1/cincinnati-crime-data";
pub const DEFAULT_TABLE_FILE: &str = "calls_for_service_latest.csv";
pub const DEFAULT_INFERENCE_ENDPOINT: &str = "https://api-inference.huggingface.co";
pub const DEFAULT_MODEL: &str = "google/flan-t5-small";

/// Environment variable holding the Hub write token
pub const HUB_TOKEN_ENV: &str = "HF_TOKEN";

/// Where the assistant reads the table from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableSource {
    /// The file the refresh job writes under the data directory
    Local,
    /// Download the published copy from the dataset repository first
    Hub,
}

impl From<&str> for TableSource {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "hub" => TableSource::Hub,
            _ => TableSource::Local,
        }
    }
}

/// Configuration shared by the assistant and the refresh job
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub table_file: String,
    pub table_source: TableSource,

    pub socrata_domain: String,
    pub socrata_dataset: String,
    pub socrata_app_token: Option<String>,
    pub page_size: usize,
    pub page_delay: Duration,

    /// Project and coerce columns before saving
    pub normalize: bool,
    /// Publish the saved file to the dataset repository
    pub upload: bool,

    pub hub_endpoint: String,
    pub hub_repo: String,
    pub hub_token: Option<String>,

    pub inference_endpoint: String,
    pub model: String,
    pub max_new_tokens: usize,
}

impl Config {
    /// Create a new default configuration
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            table_file: DEFAULT_TABLE_FILE.to_string(),
            table_source: TableSource::Local,
            socrata_domain: DEFAULT_SOCRATA_DOMAIN.to_string(),
            socrata_dataset: DEFAULT_SOCRATA_DATASET.to_string(),
            socrata_app_token: None,
            page_size: DEFAULT_PAGE_SIZE,
            page_delay: Duration::from_millis(DEFAULT_PAGE_DELAY_MS),
            normalize: true,
            upload: true,
            hub_endpoint: DEFAULT_HUB_ENDPOINT.to_string(),
            hub_repo: DEFAULT_HUB_REPO.to_string(),
            hub_token: None,
            inference_endpoint: DEFAULT_INFERENCE_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_new_tokens: crate::answer::DEFAULT_MAX_NEW_TOKENS,
        }
    }

    /// Path of the stored table
    pub fn table_path(&self) -> PathBuf {
        self.data_dir.join(&self.table_file)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::Config("page size must be greater than zero".to_string()));
        }

        if self.table_file.trim().is_empty() {
            return Err(Error::Config("table file name is empty".to_string()));
        }

        // owner/name
        let parts: Vec<&str> = self.hub_repo.split('/').collect();
        if parts.len() != 2 || parts.iter().any(|p| p.is_empty()) {
            return Err(Error::Config(format!(
                "Dataset repository must look like owner/name, got '{}'",
                self.hub_repo
            )));
        }

        if self.max_new_tokens == 0 {
            return Err(Error::Config("max_new_tokens must be greater than zero".to_string()));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("data")
    }
}

/// Optional settings read from `crimebot.yml`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub data_dir: Option<PathBuf>,
    pub table_file: Option<String>,
    pub table_source: Option<String>,
    pub socrata_domain: Option<String>,
    pub socrata_dataset: Option<String>,
    pub page_size: Option<usize>,
    pub page_delay_ms: Option<u64>,
    pub normalize: Option<bool>,
    pub upload: Option<bool>,
    pub hub_endpoint: Option<String>,
    pub hub_repo: Option<String>,
    pub inference_endpoint: Option<String>,
    pub model: Option<String>,
    pub max_new_tokens: Option<usize>,
}

/// Config file looked for in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "crimebot.yml";

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    /// Find the config file: flag first, then `CRIMEBOT_CONFIG`, then
    /// `crimebot.yml` if it exists. An explicitly named file must exist.
    pub fn discover(explicit: Option<&Path>) -> Result<Option<Self>> {
        Self::discover_with(explicit, |key| std::env::var(key).ok())
    }

    /// Same as [`FileConfig::discover`] with an explicit environment lookup
    pub fn discover_with(
        explicit: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<Self>> {
        if let Some(path) = explicit {
            return Self::load(path).map(Some);
        }
        if let Some(path) = lookup("CRIMEBOT_CONFIG").filter(|p| !p.trim().is_empty()) {
            return Self::load(Path::new(&path)).map(Some);
        }
        let default = Path::new(DEFAULT_CONFIG_FILE);
        if default.is_file() {
            return Self::load(default).map(Some);
        }
        Ok(None)
    }
}

/// Builder for creating configurations
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Layer settings from a config file over the current ones
    pub fn file(mut self, file: FileConfig) -> Self {
        let c = &mut self.config;
        if let Some(v) = file.data_dir {
            c.data_dir = v;
        }
        if let Some(v) = file.table_file {
            c.table_file = v;
        }
        if let Some(v) = file.table_source {
            c.table_source = TableSource::from(v.as_str());
        }
        if let Some(v) = file.socrata_domain {
            c.socrata_domain = v;
        }
        if let Some(v) = file.socrata_dataset {
            c.socrata_dataset = v;
        }
        if let Some(v) = file.page_size {
            c.page_size = v;
        }
        if let Some(v) = file.page_delay_ms {
            c.page_delay = Duration::from_millis(v);
        }
        if let Some(v) = file.normalize {
            c.normalize = v;
        }
        if let Some(v) = file.upload {
            c.upload = v;
        }
        if let Some(v) = file.hub_endpoint {
            c.hub_endpoint = v;
        }
        if let Some(v) = file.hub_repo {
            c.hub_repo = v;
        }
        if let Some(v) = file.inference_endpoint {
            c.inference_endpoint = v;
        }
        if let Some(v) = file.model {
            c.model = v;
        }
        if let Some(v) = file.max_new_tokens {
            c.max_new_tokens = v;
        }
        self
    }

    /// Layer settings from the process environment
    pub fn env(self) -> Self {
        self.env_with(|key| std::env::var(key).ok())
    }

    /// Same as [`ConfigBuilder::env`] with an explicit lookup, for tests
    pub fn env_with(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let c = &mut self.config;
        if let Some(v) = lookup("CRIMEBOT_DATA_DIR") {
            c.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("CRIMEBOT_MODEL") {
            c.model = v;
        }
        if let Some(v) = lookup("HF_ENDPOINT") {
            c.hub_endpoint = v;
        }
        if let Some(v) = lookup(HUB_TOKEN_ENV).filter(|t| !t.trim().is_empty()) {
            c.hub_token = Some(v);
        }
        if let Some(v) = lookup("SOCRATA_APP_TOKEN").filter(|t| !t.trim().is_empty()) {
            c.socrata_app_token = Some(v);
        }
        self
    }

    /// Set the data directory
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    pub fn table_source(mut self, source: TableSource) -> Self {
        self.config.table_source = source;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn max_new_tokens(mut self, tokens: usize) -> Self {
        self.config.max_new_tokens = tokens;
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn page_delay(mut self, delay: Duration) -> Self {
        self.config.page_delay = delay;
        self
    }

    /// Skip column projection and coercion, save the table as fetched
    pub fn raw(mut self) -> Self {
        self.config.normalize = false;
        self
    }

    pub fn skip_upload(mut self) -> Self {
        self.config.upload = false;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ConfigBuilder::new().build().unwrap();
        assert_eq!(
            config.table_path(),
            PathBuf::from("data").join("calls_for_service_latest.csv")
        );
        assert_eq!(config.page_size, 50_000);
        assert_eq!(config.page_delay, Duration::from_millis(500));
        assert!(config.normalize);
        assert!(config.upload);
        assert_eq!(config.table_source, TableSource::Local);
    }

    #[test]
    fn test_precedence_file_then_env_then_flags() {
        let file: FileConfig = serde_yaml::from_str(
            "data_dir: from-file\nmodel: file/model\npage_size: 10\nnormalize: false\n",
        )
        .unwrap();

        let env: HashMap<&str, &str> = [
            ("CRIMEBOT_DATA_DIR", "from-env"),
            ("HF_TOKEN", "hf_secret"),
            ("SOCRATA_APP_TOKEN", ""),
        ]
        .into_iter()
        .collect();

        let config = ConfigBuilder::new()
            .file(file)
            .env_with(|k| env.get(k).map(|v| v.to_string()))
            .model("flag/model")
            .build()
            .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("from-env"));
        assert_eq!(config.model, "flag/model");
        assert_eq!(config.page_size, 10);
        assert!(!config.normalize);
        assert_eq!(config.hub_token.as_deref(), Some("hf_secret"));
        assert_eq!(config.socrata_app_token, None);
    }

    #[test]
    fn test_unknown_file_keys_rejected() {
        let parsed: std::result::Result<FileConfig, _> = serde_yaml::from_str("colour: blue\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_discover_ignores_empty_config_variable() {
        let found = FileConfig::discover_with(None, |k| {
            (k == "CRIMEBOT_CONFIG").then(|| "  ".to_string())
        })
        .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_discover_reads_config_variable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.yml");
        std::fs::write(&path, "page_size: 7\nupload: false\n").unwrap();
        let path_text = path.to_string_lossy().into_owned();

        let found = FileConfig::discover_with(None, |k| {
            (k == "CRIMEBOT_CONFIG").then(|| path_text.clone())
        })
        .unwrap()
        .unwrap();
        assert_eq!(found.page_size, Some(7));
        assert_eq!(found.upload, Some(false));

        let missing = FileConfig::discover_with(None, |_| Some("/nonexistent/crimebot.yml".to_string()));
        assert!(missing.is_err());
    }

    #[test]
    fn test_validate() {
        assert!(ConfigBuilder::new().page_size(0).build().is_err());
        assert!(ConfigBuilder::new().max_new_tokens(0).build().is_err());

        let mut config = Config::default();
        config.hub_repo = "no-owner".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_table_source_from_str() {
        assert_eq!(TableSource::from("HUB"), TableSource::Hub);
        assert_eq!(TableSource::from("local"), TableSource::Local);
        assert_eq!(TableSource::from("anything"), TableSource::Local);
    }
}
