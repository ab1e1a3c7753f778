//! Configuration module for appd.
//!
//! This module loads the YAML configuration file and turns its unit
//! declarations into a validated [`Config`](crate::service::Config).

pub mod directive;
mod logging;

pub use directive::{apply_directive, arg_rule, ArgRule};
pub use logging::{LogFormat, LogLevel, LogOutput, LoggingConfig};

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::AppdError;
use crate::service::{Config, Unit};

/// Default configuration file search paths.
pub const DEFAULT_CONFIG_PATHS: [&str; 4] = [
    "/etc/appd/config.yaml",
    "/etc/appd/config.yml",
    "appd.yaml",
    "appd.yml",
];

/// Environment variable overriding `logging.level`.
pub const ENV_LOG_LEVEL: &str = "APPD_LOG_LEVEL";

/// Environment variable overriding `logging.format`.
pub const ENV_LOG_FORMAT: &str = "APPD_LOG_FORMAT";

/// Environment variable overriding `logging.output`.
pub const ENV_LOG_OUTPUT: &str = "APPD_LOG_OUTPUT";

/// A `args`/`before`/`after` value given either as a list or a single string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Tokens {
    /// A single token.
    One(String),
    /// A list of tokens.
    Many(Vec<String>),
}

impl Tokens {
    /// Returns the tokens, splitting a single string shell-style.
    fn to_vec(&self, unit: &str, key: &str) -> Result<Vec<String>, AppdError> {
        match self {
            Tokens::One(s) => shell_words::split(s).map_err(|e| {
                AppdError::config_with_source(
                    format!("unit {:?}: failed to parse {} {:?}", unit, key, s),
                    e,
                )
            }),
            Tokens::Many(v) => Ok(v.clone()),
        }
    }
}

/// One unit as declared in the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitDecl {
    /// `command` or `app`.
    #[serde(default)]
    pub kind: String,

    /// Unit alias.
    #[serde(default)]
    pub name: String,

    /// Executable with optional inline arguments, split shell-style.
    pub cmd: String,

    /// Additional arguments appended after the inline ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Tokens>,

    /// Exclude the unit from start and stop.
    #[serde(default)]
    pub noop: bool,

    /// Working directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,

    /// Standard output file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,

    /// Standard error file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,

    /// Activation priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u64>,

    /// Units that should start after this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Tokens>,

    /// Units that should start before this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Tokens>,

    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl UnitDecl {
    /// Builds the unit by applying each declared key as a directive.
    pub fn to_unit(&self) -> Result<Unit, AppdError> {
        let mut unit = Unit::new(&self.kind, &self.name)?;

        let cmd = shell_words::split(&self.cmd).map_err(|e| {
            AppdError::config_with_source(
                format!("unit {:?}: failed to parse cmd {:?}", self.name, self.cmd),
                e,
            )
        })?;
        apply_directive(&mut unit, "cmd", &cmd)?;

        if let Some(args) = &self.args {
            apply_directive(&mut unit, "args", &args.to_vec(&self.name, "args")?)?;
        }
        if self.noop {
            apply_directive(&mut unit, "noop", &[])?;
        }

        let single = [
            ("workdir", &self.workdir),
            ("stdout", &self.stdout),
            ("stderr", &self.stderr),
            ("description", &self.description),
        ];
        for (key, value) in single {
            if let Some(value) = value {
                apply_directive(&mut unit, key, std::slice::from_ref(value))?;
            }
        }

        if let Some(priority) = self.priority {
            apply_directive(&mut unit, "priority", &[priority.to_string()])?;
        }
        if let Some(before) = &self.before {
            apply_directive(&mut unit, "before", &before.to_vec(&self.name, "before")?)?;
        }
        if let Some(after) = &self.after {
            apply_directive(&mut unit, "after", &after.to_vec(&self.name, "after")?)?;
        }

        Ok(unit)
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Unit declarations in start order.
    pub units: Vec<UnitDecl>,
}

impl AppConfig {
    /// Loads configuration from an optional path.
    /// If path is None, uses default search paths.
    /// Environment overrides are applied on top.
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self, AppdError> {
        let mut config = match path {
            Some(p) => Self::load_from_path(p)?,
            None => Self::load_from_default_paths()?,
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    fn load_from_default_paths() -> Result<Self, AppdError> {
        for path in &DEFAULT_CONFIG_PATHS {
            if Path::new(path).exists() {
                return Self::load_from_path(path);
            }
        }

        // No config file found, use defaults
        Ok(Self::default())
    }

    /// Applies `APPD_LOG_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), AppdError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), AppdError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = level.parse()?;
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            self.logging.format = format.parse()?;
        }
        if let Some(output) = lookup(ENV_LOG_OUTPUT) {
            self.logging.output = output.parse()?;
        }
        Ok(())
    }

    /// Loads configuration from a YAML file.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, AppdError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            AppdError::config_with_source(
                format!("Failed to read config file '{}'", path.as_ref().display()),
                e,
            )
        })?;

        Self::load_from_str(&content)
    }

    /// Loads configuration from a YAML string.
    pub fn load_from_str(content: &str) -> Result<Self, AppdError> {
        let config: AppConfig = serde_yaml::from_str(content)
            .map_err(|e| AppdError::config_with_source("Failed to parse config", e))?;

        config.unit_config()?.validate()?;
        Ok(config)
    }

    /// Builds the unit config, rejecting invalid or duplicate units.
    pub fn unit_config(&self) -> Result<Config, AppdError> {
        let mut config = Config::new();
        for decl in &self.units {
            config.add_unit(decl.to_unit()?)?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::UnitKind;
    use std::io::Write;
    use tracing::Span;

    const SAMPLE: &str = r#"
logging:
  level: debug
  format: json
units:
  - kind: command
    name: hostname
    cmd: hostname
  - kind: app
    name: test-py-http-server
    cmd: python3 -m http.server 4080
    after: hostname
  - kind: app
    name: test-py-http-server-4081
    cmd: python3
    args: ["-m", "http.server", "4081"]
    priority: 100
"#;

    #[test]
    fn test_load_from_str() {
        let config = AppConfig::load_from_str(SAMPLE).unwrap();
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.units.len(), 3);

        let units = config.unit_config().unwrap();
        let server = units.get("test-py-http-server").unwrap();
        assert_eq!(server.kind, UnitKind::App);
        assert_eq!(server.command, "python3");
        assert_eq!(server.arguments, ["-m", "http.server", "4080"]);
        assert_eq!(server.after, ["hostname"]);

        let other = units.get("test-py-http-server-4081").unwrap();
        assert_eq!(other.arguments, ["-m", "http.server", "4081"]);
        assert_eq!(other.priority, 100);
    }

    #[test]
    fn test_finalized_config_json_shape() {
        let config = AppConfig::load_from_str(SAMPLE).unwrap();
        let mut units = config.unit_config().unwrap();
        units.services(&Span::none()).unwrap();

        let json = serde_json::to_value(&units).unwrap();
        assert_eq!(
            json["units"][0],
            serde_json::json!({"name": "hostname", "cmd": "hostname", "kind": "command", "seq": 1})
        );
        assert_eq!(
            json["units"][2],
            serde_json::json!({
                "name": "test-py-http-server-4081",
                "cmd": "python3",
                "args": ["-m", "http.server", "4081"],
                "kind": "app",
                "priority": 100,
                "seq": 3
            })
        );
    }

    #[test]
    fn test_quoted_cmd() {
        let yaml = r#"
units:
  - kind: command
    name: greeting
    cmd: echo "hello world" --flag
"#;
        let config = AppConfig::load_from_str(yaml).unwrap();
        let units = config.unit_config().unwrap();
        let unit = units.get("greeting").unwrap();
        assert_eq!(unit.command, "echo");
        assert_eq!(unit.arguments, ["hello world", "--flag"]);
    }

    #[test]
    fn test_plain_string_args_are_split() {
        let yaml = r#"
units:
  - kind: command
    name: hostname
    cmd: hostname
  - kind: app
    name: web-server
    cmd: python3
    args: -m http.server 4081
    after: hostname
  - kind: command
    name: greeting
    cmd: echo
    args: "'hello world' again"
"#;
        let config = AppConfig::load_from_str(yaml).unwrap();
        let units = config.unit_config().unwrap();

        let web = units.get("web-server").unwrap();
        assert_eq!(web.arguments, ["-m", "http.server", "4081"]);
        assert_eq!(web.after, ["hostname"]);

        let greeting = units.get("greeting").unwrap();
        assert_eq!(greeting.arguments, ["hello world", "again"]);

        let yaml = "units:\n  - kind: app\n    name: web-server\n    cmd: sleep\n    args: \"'unterminated\"\n";
        let err = AppConfig::load_from_str(yaml).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_logging_overrides() {
        let mut config = AppConfig::load_from_str(SAMPLE).unwrap();
        let vars: std::collections::HashMap<&str, &str> = [
            (ENV_LOG_LEVEL, "warn"),
            (ENV_LOG_OUTPUT, "stdout"),
        ]
        .into_iter()
        .collect();

        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.output, LogOutput::Stdout);

        let err = config
            .apply_overrides(|key| (key == ENV_LOG_FORMAT).then(|| "xml".to_string()))
            .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_unsupported_key_rejected() {
        let yaml = r#"
units:
  - kind: app
    name: web-server
    cmd: sleep 10
    restart: always
"#;
        let err = AppConfig::load_from_str(yaml).unwrap_err();
        assert!(err.is_config_error());
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("restart"));
    }

    #[test]
    fn test_duplicate_unit_rejected() {
        let yaml = r#"
units:
  - kind: command
    name: hostname
    cmd: hostname
  - kind: app
    name: hostname
    cmd: sleep 10
"#;
        let err = AppConfig::load_from_str(yaml).unwrap_err();
        assert!(matches!(err, AppdError::DuplicateUnit { .. }));
    }

    #[test]
    fn test_invalid_units_rejected() {
        let yaml = "units:\n  - kind: daemon\n    name: web-server\n    cmd: sleep 10\n";
        let err = AppConfig::load_from_str(yaml).unwrap_err();
        assert!(matches!(err, AppdError::UnsupportedKind { .. }));

        let yaml = "units:\n  - kind: app\n    name: ab\n    cmd: sleep 10\n";
        let err = AppConfig::load_from_str(yaml).unwrap_err();
        assert!(matches!(err, AppdError::InvalidAlias { .. }));

        let yaml = "units:\n  - kind: app\n    name: web-server\n    cmd: \"\"\n";
        let err = AppConfig::load_from_str(yaml).unwrap_err();
        assert!(matches!(err, AppdError::TooFewArgs { .. }));

        let yaml = "units:\n  - kind: app\n    name: web-server\n    cmd: sleep 10\n    args: []\n";
        let err = AppConfig::load_from_str(yaml).unwrap_err();
        assert!(matches!(err, AppdError::TooFewArgs { .. }));
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.units.len(), 3);

        let err = AppConfig::load_from_path("/nonexistent/appd.yaml").unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_default_config_is_empty() {
        let config = AppConfig::default();
        assert!(config.units.is_empty());
        assert!(config.unit_config().unwrap().is_empty());
    }
}
