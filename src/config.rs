use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::LengthWindow;
use crate::error::MycoError;

pub const DEFAULT_CONFIG_FILE: &str = "mycocosm-etl.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub table_url: Option<String>,
    #[serde(default)]
    pub portal_url_prefix: Option<String>,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub files_per_page: Option<u32>,
    #[serde(default)]
    pub request_delay_ms: Option<u64>,
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub custom_rules: Option<Vec<HeaderRuleEntry>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HeaderRuleEntry {
    pub portal: String,
    pub pattern: String,
}

/// Portal-specific identifier rule: the first capture group of `pattern`
/// becomes the numeric part of `<portal>-<number>`.
#[derive(Debug, Clone)]
pub struct PortalRule {
    pub portal: String,
    pub pattern: Regex,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_dir: Utf8PathBuf,
    pub table_url: String,
    pub portal_url_prefix: String,
    pub api_base_url: String,
    pub files_per_page: u32,
    pub request_delay: Duration,
    pub length_window: LengthWindow,
    pub custom_rules: Vec<PortalRule>,
}

impl PipelineConfig {
    pub fn with_data_dir(mut self, data_dir: Utf8PathBuf) -> Self {
        self.data_dir = data_dir;
        self
    }

    pub fn rule_for(&self, portal: &str) -> Option<&PortalRule> {
        self.custom_rules.iter().find(|rule| rule.portal == portal)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `mycocosm-etl.json` from the working directory when
    /// present. Without either, every setting takes its default.
    pub fn resolve(path: Option<&str>) -> Result<PipelineConfig, MycoError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| MycoError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| MycoError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<PipelineConfig, MycoError> {
        let files_per_page = config.files_per_page.unwrap_or(50);
        if files_per_page == 0 {
            return Err(MycoError::InvalidConfig(
                "files_per_page must be positive".to_string(),
            ));
        }

        let defaults = LengthWindow::default();
        let length_window = LengthWindow::new(
            config.min_length.unwrap_or(defaults.min),
            config.max_length.unwrap_or(defaults.max),
        )?;

        let custom_rules = config
            .custom_rules
            .unwrap_or_else(default_custom_rules)
            .into_iter()
            .map(|entry| {
                let pattern = Regex::new(&entry.pattern).map_err(|err| {
                    MycoError::InvalidConfig(format!("rule for {}: {err}", entry.portal))
                })?;
                if pattern.captures_len() < 2 {
                    return Err(MycoError::InvalidConfig(format!(
                        "rule for {} needs a capture group",
                        entry.portal
                    )));
                }
                Ok(PortalRule {
                    portal: entry.portal,
                    pattern,
                })
            })
            .collect::<Result<Vec<_>, MycoError>>()?;

        Ok(PipelineConfig {
            data_dir: Utf8PathBuf::from(config.data_dir.unwrap_or_else(|| "local_data".to_string())),
            table_url: config
                .table_url
                .unwrap_or_else(|| "https://mycocosm.jgi.doe.gov/fungi/fungi.info.html".to_string()),
            portal_url_prefix: config
                .portal_url_prefix
                .unwrap_or_else(|| "https://mycocosm.jgi.doe.gov/".to_string()),
            api_base_url: config
                .api_base_url
                .unwrap_or_else(|| "https://files.jgi.doe.gov/mycocosm_file_list/".to_string()),
            files_per_page,
            request_delay: Duration::from_millis(config.request_delay_ms.unwrap_or(1000)),
            length_window,
            custom_rules,
        })
    }
}

pub fn default_custom_rules() -> Vec<HeaderRuleEntry> {
    vec![
        HeaderRuleEntry {
            portal: "Altbr1".to_string(),
            pattern: r"^AB0*(\d+)\.\d+".to_string(),
        },
        HeaderRuleEntry {
            portal: "Pyrtr1".to_string(),
            pattern: r"^PTRG_0*(\d+)".to_string(),
        },
    ]
}
