use serde::{Deserialize, Serialize};
use std::{env, fmt, path::PathBuf, str::FromStr};
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// How the rewritten tree is printed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Compact JSON, one line
    Json,
    /// Indented JSON
    #[default]
    Pretty,
    /// Human-readable expression syntax
    Text,
}

#[derive(Debug, Error)]
#[error("unknown output format `{0}` (expected json, pretty or text)")]
pub struct UnknownOutputFormat(String);

impl FromStr for OutputFormat {
    type Err = UnknownOutputFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "pretty" => Ok(OutputFormat::Pretty),
            "text" => Ok(OutputFormat::Text),
            _ => Err(UnknownOutputFormat(s.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Json => "json",
            OutputFormat::Pretty => "pretty",
            OutputFormat::Text => "text",
        };
        f.write_str(name)
    }
}

/// Deepest query tree the CLI accepts.
///
/// serde_json refuses input nested deeper than 128, and an operator call nests
/// its arguments two JSON levels below itself, so deeper trees could not be
/// read back in the first place.
pub const MAX_TREE_DEPTH: usize = 60;

#[allow(clippy::ptr_arg)]
fn validate_path(path: &PathBuf) -> Result<(), ValidationError> {
    if path.as_os_str().is_empty() {
        return Err(ValidationError::new("empty_path"));
    }
    Ok(())
}

/// Rewrite run configuration with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
pub struct RewriteConfig {
    /// Entity model YAML file
    #[validate(custom(function = "validate_path", message = "Model path cannot be empty"))]
    pub model_path: PathBuf,

    /// Query tree JSON file
    #[validate(custom(function = "validate_path", message = "Query path cannot be empty"))]
    pub query_path: PathBuf,

    /// Deepest query tree accepted before rewriting
    #[validate(range(
        min = 1,
        max = MAX_TREE_DEPTH,
        message = "Max tree depth must be between 1 and 60"
    ))]
    pub max_tree_depth: usize,

    pub output_format: OutputFormat,

    /// Rewrite the output a second time and fail unless nothing changes
    pub verify_idempotence: bool,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("model.yaml"),
            query_path: PathBuf::from("query.json"),
            max_tree_depth: MAX_TREE_DEPTH,
            output_format: OutputFormat::default(),
            verify_idempotence: false,
        }
    }
}

impl RewriteConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            model_path: env::var("NAVREWRITE_MODEL")
                .unwrap_or_else(|_| "model.yaml".to_string())
                .into(),
            query_path: env::var("NAVREWRITE_QUERY")
                .unwrap_or_else(|_| "query.json".to_string())
                .into(),
            max_tree_depth: parse_env_var("NAVREWRITE_MAX_TREE_DEPTH", &MAX_TREE_DEPTH.to_string())?,
            output_format: parse_env_var("NAVREWRITE_OUTPUT", "pretty")?,
            verify_idempotence: parse_env_var("NAVREWRITE_VERIFY", "false")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from CLI arguments with validation
    pub fn from_cli(cli: CliConfig) -> Result<Self, ConfigError> {
        let config = Self {
            model_path: cli.model_path,
            query_path: cli.query_path,
            max_tree_depth: cli.max_tree_depth,
            output_format: cli.output_format,
            verify_idempotence: cli.verify_idempotence,
        };

        config.validate()?;
        Ok(config)
    }
}

/// CLI configuration (parsed from command line arguments)
#[derive(Clone, Debug)]
pub struct CliConfig {
    pub model_path: PathBuf,
    pub query_path: PathBuf,
    pub max_tree_depth: usize,
    pub output_format: OutputFormat,
    pub verify_idempotence: bool,
}

/// Parse an environment variable with a default value
fn parse_env_var<T: FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}
