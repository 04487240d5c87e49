// Server configuration: file, then LOSSTEACH_* environment, then CLI flags

use lossteach_core::config::{load_config, parse_config, ConfigError};
use lossteach_core::AnalysisConfig;
use lossteach_eye::VisionConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub const ENV_PREFIX: &str = "LOSSTEACH_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Requests served at once before callers queue
    pub max_concurrency: usize,
    /// Largest request body, multipart framing included
    pub max_body_bytes: usize,
    /// Transport-level timeout, above the analysis budget
    pub request_timeout_secs: u64,
    pub log_level: String,
    pub analysis: AnalysisConfig,
    pub vision: VisionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_concurrency: 10,
            max_body_bytes: 25 * 1024 * 1024,
            request_timeout_secs: 35,
            log_level: "info".to_string(),
            analysis: AnalysisConfig::default(),
            vision: VisionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        load_config(path)
    }

    /// Load configuration from string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        parse_config(content)
    }

    /// Defaults overlaid with environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    /// Overlay `LOSSTEACH_*` variables from a lookup. Unparseable values are
    /// logged and ignored.
    pub fn apply_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(host) = var("HOST") {
            self.host = host;
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(path) = var("MODEL_PATH") {
            self.vision.model_path = PathBuf::from(path);
        }

        parse_var(var("PORT"), "PORT", &mut self.port);
        parse_var(
            var("MAX_CONCURRENCY"),
            "MAX_CONCURRENCY",
            &mut self.max_concurrency,
        );
        parse_var(
            var("REQUEST_TIMEOUT_SECS"),
            "REQUEST_TIMEOUT_SECS",
            &mut self.request_timeout_secs,
        );
        parse_var(var("TIMEOUT_SECS"), "TIMEOUT_SECS", &mut self.analysis.timeout_secs);
        parse_var(var("CONVERSION_RATE"), "CONVERSION_RATE", &mut self.analysis.conversion_rate);
        parse_var(var("SCORE_THRESHOLD"), "SCORE_THRESHOLD", &mut self.analysis.score_threshold);
        parse_var(
            var("PARALLEL_INSTANCES"),
            "PARALLEL_INSTANCES",
            &mut self.analysis.parallel_instances,
        );
        parse_var(var("RESIZE_INPUT"), "RESIZE_INPUT", &mut self.vision.resize_input);
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::ValidationError(format!("Invalid bind address: {}", e)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::ValidationError("port cannot be 0".to_string()));
        }

        if self.max_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "max_concurrency must be > 0".to_string(),
            ));
        }

        if self.max_body_bytes < self.vision.max_upload_bytes {
            return Err(ConfigError::ValidationError(
                "max_body_bytes must be >= vision.max_upload_bytes".to_string(),
            ));
        }

        if self.request_timeout_secs < self.analysis.timeout_secs {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be >= analysis.timeout_secs".to_string(),
            ));
        }

        self.socket_addr()?;
        self.analysis.validate()?;
        self.vision.validate().map_err(ConfigError::ValidationError)?;

        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(value: Option<String>, name: &str, target: &mut T) {
    if let Some(raw) = value {
        match raw.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!("Ignoring invalid {}{}={:?}", ENV_PREFIX, name, raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.port, 8000);
        assert_eq!(config.max_concurrency, 10);
    }

    #[test]
    fn test_from_str_toml_sections() {
        let config = ServerConfig::from_str(
            r#"
port = 9100

[analysis]
conversion_rate = 0.005
parallel_instances = true

[vision]
model_path = "/srv/models/fragments.onnx"
"#,
        )
        .unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.analysis.conversion_rate, 0.005);
        assert!(config.analysis.parallel_instances);
        assert_eq!(config.vision.model_path, PathBuf::from("/srv/models/fragments.onnx"));
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn test_from_file_yaml() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "host: 127.0.0.1\nmax_concurrency: 2").unwrap();
        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.max_concurrency, 2);
    }

    #[test]
    fn test_env_overlay() {
        let vars: HashMap<String, String> = [
            ("LOSSTEACH_PORT", "9000"),
            ("LOSSTEACH_MODEL_PATH", "/tmp/m.onnx"),
            ("LOSSTEACH_SCORE_THRESHOLD", "0.6"),
            ("LOSSTEACH_MAX_CONCURRENCY", "lots"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let mut config = ServerConfig::default();
        config.apply_vars(|key| vars.get(key).cloned());
        assert_eq!(config.port, 9000);
        assert_eq!(config.vision.model_path, PathBuf::from("/tmp/m.onnx"));
        assert_eq!(config.analysis.score_threshold, 0.6);
        assert_eq!(config.max_concurrency, 10);
    }

    #[test]
    fn test_validation_errors() {
        let config = ServerConfig {
            max_concurrency: 0,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            request_timeout_secs: 5,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            host: "not a host".to_string(),
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.analysis.conversion_rate = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }
}
