//! Layered configuration: defaults < TOML file < environment < code.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::StepwiseError;
use crate::orchestrator::OrchestratorConfig;
use crate::tools::ExecutorConfig;
use crate::types::ModelConfig;

pub const DEFAULT_MAX_STEPS: usize = 20;
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const CONFIG_FILE_NAME: &str = "config.toml";

/// How to reach one remote tool host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteHostConfig {
    /// Child process speaking the protocol on stdio.
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: BTreeMap<String, String>,
    },
    /// Streamable HTTP endpoint.
    Http { url: String },
}

/// Engine settings.
///
/// Build with [`StepwiseConfig::load`] for the full layering, or start from
/// `Default` and override fields in code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepwiseConfig {
    pub max_steps: usize,
    pub tool_timeout_ms: Option<u64>,
    pub validate_arguments: bool,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub system_prompt: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub remote_hosts: BTreeMap<String, RemoteHostConfig>,
}

impl Default for StepwiseConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            tool_timeout_ms: None,
            validate_arguments: false,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: None,
            temperature: None,
            system_prompt: None,
            api_key: None,
            base_url: None,
            remote_hosts: BTreeMap::new(),
        }
    }
}

impl StepwiseConfig {
    /// Defaults, then the config file (if any), then the process environment.
    ///
    /// The file comes from `STEPWISE_CONFIG` or the platform config
    /// directory. A `.env` file in the working directory is loaded first.
    pub fn load() -> Result<Self, StepwiseError> {
        let _ = dotenvy::dotenv();
        let path = std::env::var_os("STEPWISE_CONFIG")
            .map(PathBuf::from)
            .or_else(Self::default_path);
        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Platform config location, e.g. `~/.config/stepwise/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "stepwise", "stepwise")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    pub fn from_file(path: &Path) -> Result<Self, StepwiseError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, StepwiseError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay environment values read through `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), StepwiseError> {
        if let Some(raw) = lookup("STEPWISE_MAX_STEPS") {
            self.max_steps = parse_env("STEPWISE_MAX_STEPS", &raw)?;
        }
        if let Some(raw) = lookup("STEPWISE_TOOL_TIMEOUT_MS") {
            self.tool_timeout_ms = Some(parse_env("STEPWISE_TOOL_TIMEOUT_MS", &raw)?);
        }
        if let Some(model) = lookup("STEPWISE_MODEL") {
            self.model = model;
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.base_url = Some(url);
        }
        self.validate()
    }

    fn validate(&self) -> Result<(), StepwiseError> {
        if self.max_steps == 0 {
            return Err(StepwiseError::Configuration(
                "max_steps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_ms.map(Duration::from_millis)
    }

    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            timeout: self.tool_timeout(),
            validate_arguments: self.validate_arguments,
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::builder()
            .max_steps(self.max_steps)
            .executor(self.executor_config())
            .build()
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, StepwiseError> {
    raw.trim()
        .parse()
        .map_err(|_| StepwiseError::Configuration(format!("invalid value for {key}: '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_sane() {
        let config = StepwiseConfig::default();
        assert_eq!(config.max_steps, DEFAULT_MAX_STEPS);
        assert_eq!(config.tool_timeout(), None);
        assert_eq!(config.model_config().model, DEFAULT_MODEL);
    }

    #[test]
    fn file_layer_overrides_defaults_and_env_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
max_steps = 5
tool_timeout_ms = 1500
model = "from-file"

[remote_hosts.files]
command = "file-server"
args = ["--root", "/tmp"]

[remote_hosts.search]
url = "http://localhost:9000/mcp"
"#,
        )
        .unwrap();

        let mut config = StepwiseConfig::from_file(&path).unwrap();
        assert_eq!(config.max_steps, 5);
        assert_eq!(config.tool_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(
            config.remote_hosts.get("search"),
            Some(&RemoteHostConfig::Http {
                url: "http://localhost:9000/mcp".into()
            })
        );
        assert!(matches!(
            config.remote_hosts.get("files"),
            Some(RemoteHostConfig::Stdio { command, args, .. }) if command == "file-server" && args.len() == 2
        ));

        config
            .apply_env(env(&[("STEPWISE_MODEL", "from-env"), ("STEPWISE_MAX_STEPS", "9")]))
            .unwrap();
        assert_eq!(config.model, "from-env");
        assert_eq!(config.max_steps, 9);
        assert_eq!(config.tool_timeout_ms, Some(1500));
    }

    #[test]
    fn invalid_env_value_is_a_configuration_error() {
        let mut config = StepwiseConfig::default();
        let err = config
            .apply_env(env(&[("STEPWISE_MAX_STEPS", "lots")]))
            .unwrap_err();
        assert!(matches!(err, StepwiseError::Configuration(ref m) if m.contains("STEPWISE_MAX_STEPS")));
    }

    #[test]
    fn zero_max_steps_is_rejected() {
        let err = StepwiseConfig::from_toml_str("max_steps = 0").unwrap_err();
        assert!(matches!(err, StepwiseError::Configuration(_)));
    }

    #[test]
    fn malformed_toml_is_reported() {
        let err = StepwiseConfig::from_toml_str("max_steps = [").unwrap_err();
        assert!(matches!(err, StepwiseError::Toml(_)));
    }

    #[test]
    fn derived_configs_carry_settings() {
        let config = StepwiseConfig {
            max_steps: 3,
            tool_timeout_ms: Some(250),
            validate_arguments: true,
            ..StepwiseConfig::default()
        };
        let orchestrator = config.orchestrator_config();
        assert_eq!(orchestrator.max_steps, 3);
        assert_eq!(orchestrator.executor.timeout, Some(Duration::from_millis(250)));
        assert!(orchestrator.executor.validate_arguments);
    }
}
