//! Configuration loader and validator for the wiki-to-posts service.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub server: Server,
    pub vertex: Vertex,
    #[serde(default)]
    pub prompt: Prompt,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

/// Vertex AI target and credential lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Vertex {
    pub location: String,
    pub model: String,
    pub max_output_tokens: u32,
    /// Service-account JSON used when the GOOGLE_* environment is not set.
    pub credential_file: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Prompt {
    /// Replaces the built-in template when set.
    #[serde(default)]
    pub template_file: Option<String>,
}

impl Config {
    pub fn credential_path(&self) -> PathBuf {
        PathBuf::from(&self.vertex.credential_file)
    }

    pub fn template_path(&self) -> Option<PathBuf> {
        self.prompt.template_file.as_ref().map(PathBuf::from)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: Server {
                host: "127.0.0.1".into(),
                port: 3000,
            },
            vertex: Vertex {
                location: "asia-northeast1".into(),
                model: "gemini-2.5-flash".into(),
                max_output_tokens: crate::generate::DEFAULT_MAX_OUTPUT_TOKENS,
                credential_file: "./credential.json".into(),
            },
            prompt: Prompt::default(),
        }
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Like [`load`], but a missing file yields the defaults.
pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        info!(path = %path.display(), "config file not found; using defaults");
        return Ok(Config::default());
    }
    load(Some(path))
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.server.host.trim().is_empty() {
        return Err(ConfigError::Invalid("server.host must be non-empty"));
    }
    if cfg.server.port == 0 {
        return Err(ConfigError::Invalid("server.port must be > 0"));
    }

    if cfg.vertex.location.trim().is_empty() {
        return Err(ConfigError::Invalid("vertex.location must be non-empty"));
    }
    if cfg.vertex.model.trim().is_empty() {
        return Err(ConfigError::Invalid("vertex.model must be non-empty"));
    }
    if cfg.vertex.max_output_tokens == 0 {
        return Err(ConfigError::Invalid("vertex.max_output_tokens must be > 0"));
    }
    if cfg.vertex.credential_file.trim().is_empty() {
        return Err(ConfigError::Invalid("vertex.credential_file must be non-empty"));
    }

    if let Some(file) = &cfg.prompt.template_file {
        if file.trim().is_empty() {
            return Err(ConfigError::Invalid("prompt.template_file must be non-empty when set"));
        }
    }

    Ok(())
}

/// Example YAML matching [`Config::default`].
pub fn example() -> &'static str {
    r#"server:
  host: "127.0.0.1"
  port: 3000

vertex:
  location: "asia-northeast1"
  model: "gemini-2.5-flash"
  max_output_tokens: 8192
  credential_file: "./credential.json"

prompt:
  template_file: null
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn prompt_section_is_optional() {
        let yaml = example().replace("prompt:\n  template_file: null\n", "");
        let cfg: Config = serde_yaml::from_str(&yaml).unwrap();
        assert!(cfg.template_path().is_none());
    }

    #[test]
    fn invalid_server() {
        let mut cfg = Config::default();
        cfg.server.host = " ".into();
        let err = validate(&cfg).unwrap_err();
        match err { ConfigError::Invalid(msg) => assert!(msg.contains("server.host")), _ => panic!("wrong error") }

        let mut cfg = Config::default();
        cfg.server.port = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn invalid_vertex_fields() {
        let mut cfg = Config::default();
        cfg.vertex.location = "".into();
        let err = validate(&cfg).unwrap_err();
        match err { ConfigError::Invalid(msg) => assert!(msg.contains("vertex.location")), _ => panic!("wrong error") }

        let mut cfg = Config::default();
        cfg.vertex.model = "".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg = Config::default();
        cfg.vertex.max_output_tokens = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg = Config::default();
        cfg.vertex.credential_file = "".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn empty_template_file_is_invalid() {
        let mut cfg = Config::default();
        cfg.prompt.template_file = Some("".into());
        let err = validate(&cfg).unwrap_err();
        match err { ConfigError::Invalid(msg) => assert!(msg.contains("template_file")), _ => panic!("wrong error") }
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example().replace("port: 3000", "port: 8080")).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.server.port, 8080);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let td = tempdir().unwrap();
        let cfg = load_or_default(&td.path().join("absent.yaml")).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(matches!(
            load(Some(&td.path().join("absent.yaml"))),
            Err(ConfigError::Io(_))
        ));
    }
}
