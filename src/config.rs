use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub executor: ExecutorConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ExecutorConfig {
    pub default_timeout_secs: u64,
    pub max_timeout_secs: u64,
    pub output_cap_bytes: usize,
    pub kill_grace_ms: u64,
    pub python_interpreter: String,
    pub shell: String,
}

/// OS resource limits applied to the child before exec. A value of 0 disables the limit.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct LimitsConfig {
    pub max_memory_mb: u64,
    pub max_file_size_mb: u64,
}

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const MAX_TIMEOUT_SECS: u64 = 120;
pub const OUTPUT_CAP_BYTES: usize = 100 * 1024;

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_timeout_secs: MAX_TIMEOUT_SECS,
            output_cap_bytes: OUTPUT_CAP_BYTES,
            kill_grace_ms: 500,
            python_interpreter: "python3".to_string(),
            shell: "bash".to_string(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_memory_mb: 1024,
            max_file_size_mb: 100,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            executor: ExecutorConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

impl ExecutorConfig {
    /// Clamp a caller-supplied timeout into `[1, max_timeout_secs]`.
    pub fn clamp_timeout(&self, requested_secs: u64) -> Duration {
        let ceiling = self.max_timeout_secs.max(1);
        Duration::from_secs(requested_secs.clamp(1, ceiling))
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

impl Config {
    /// Parse config from a TOML string.
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Load config from ~/.script-runner/config.toml, falling back to defaults.
    pub fn load() -> Self {
        let config_path = if let Some(home) = dirs::home_dir() {
            home.join(".script-runner").join("config.toml")
        } else {
            return Self::default();
        };

        if !config_path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match Self::from_toml(&contents) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse {}: {}. Using defaults.",
                        config_path.display(),
                        e
                    );
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Failed to read {}: {}. Using defaults.",
                    config_path.display(),
                    e
                );
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();
        assert_eq!(config.executor.default_timeout_secs, 30);
        assert_eq!(config.executor.max_timeout_secs, 120);
        assert_eq!(config.executor.output_cap_bytes, 102_400);
        assert_eq!(config.executor.python_interpreter, "python3");
        assert_eq!(config.executor.shell, "bash");
        assert_eq!(config.limits.max_memory_mb, 1024);
    }

    #[test]
    fn test_config_roundtrip_toml() {
        let config = Config::default();
        let toml_str = config.to_toml().unwrap();
        let parsed = Config::from_toml(&toml_str).unwrap();
        assert_eq!(parsed.executor, config.executor);
        assert_eq!(parsed.limits, config.limits);
    }

    #[test]
    fn test_config_parse_custom_values() {
        let toml_str = r#"
[executor]
default_timeout_secs = 10
max_timeout_secs = 60
output_cap_bytes = 4096
kill_grace_ms = 100
python_interpreter = "/usr/bin/python3.12"
shell = "sh"

[limits]
max_memory_mb = 0
max_file_size_mb = 5
"#;
        let config = Config::from_toml(toml_str).unwrap();
        assert_eq!(config.executor.max_timeout_secs, 60);
        assert_eq!(config.executor.output_cap_bytes, 4096);
        assert_eq!(config.executor.python_interpreter, "/usr/bin/python3.12");
        assert_eq!(config.executor.shell, "sh");
        assert_eq!(config.limits.max_memory_mb, 0);
        assert_eq!(config.limits.max_file_size_mb, 5);
    }

    #[test]
    fn test_config_parse_invalid_toml() {
        assert!(Config::from_toml("this is not valid toml {{{").is_err());
    }

    #[test]
    fn test_config_parse_missing_section() {
        let toml_str = r#"
[executor]
default_timeout_secs = 30
max_timeout_secs = 120
output_cap_bytes = 102400
kill_grace_ms = 500
python_interpreter = "python3"
shell = "bash"
"#;
        assert!(Config::from_toml(toml_str).is_err());
    }

    #[test]
    fn test_clamp_timeout_caps_at_ceiling() {
        let cfg = ExecutorConfig::default();
        assert_eq!(cfg.clamp_timeout(10_000), Duration::from_secs(120));
        assert_eq!(cfg.clamp_timeout(5), Duration::from_secs(5));
    }

    #[test]
    fn test_clamp_timeout_zero_becomes_one_second() {
        let cfg = ExecutorConfig::default();
        assert_eq!(cfg.clamp_timeout(0), Duration::from_secs(1));
    }
}
