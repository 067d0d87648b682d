//! CLI configuration
//!
//! Settings come from an optional YAML file; command-line flags override
//! whatever the file says.

use clap::{Args, ValueEnum};
use merlin_eql::{ColumnPathTranslator, TransformOptions, DEFAULT_CATEGORY_FIELD};
use merlin_schema::{FieldDef, SchemaError, SchemaRegistry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// How EQL field names become SQL column references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FieldNamePolicy {
    /// Use field names as written
    #[default]
    Identity,
    /// `process.name` -> `"process::name"`
    ColumnPath,
    /// Resolve through the configured schema
    Schema,
}

/// Inline schema definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchemaConfig {
    pub fields: Vec<FieldDef>,
    /// alias -> field path
    pub aliases: BTreeMap<String, String>,
}

impl SchemaConfig {
    pub fn build_registry(&self) -> Result<SchemaRegistry, ConfigError> {
        let registry = SchemaRegistry::from_definitions(self.fields.clone())?;
        for (alias, target) in &self.aliases {
            registry.register_alias(alias, target)?;
        }
        Ok(registry)
    }
}

/// Configuration file contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub category_field: String,
    pub extract_parameters: bool,
    /// Treat soft translation errors as failures
    pub strict: bool,
    pub field_names: FieldNamePolicy,
    /// Table used for the statements printed by the REPL
    pub table: String,
    pub schema: SchemaConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            category_field: DEFAULT_CATEGORY_FIELD.to_string(),
            extract_parameters: false,
            strict: false,
            field_names: FieldNamePolicy::Identity,
            table: "events".to_string(),
            schema: SchemaConfig::default(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error accessing {0:?}: {1}")]
    IoError(PathBuf, std::io::Error),

    #[error("Parse error in {0:?}: {1}")]
    ParseError(PathBuf, String),

    #[error("Invalid schema: {0}")]
    Schema(#[from] SchemaError),

    #[error("field_names is 'schema' but no schema fields are configured")]
    EmptySchema,
}

/// Flags that override the configuration file
#[derive(Args, Debug, Clone, Default)]
pub struct Overrides {
    /// Column holding the event category
    #[arg(long, global = true)]
    pub category_field: Option<String>,

    /// Field name translation policy
    #[arg(long, global = true, value_enum)]
    pub field_names: Option<FieldNamePolicy>,

    /// Replace constants with query parameters
    #[arg(long, global = true)]
    pub extract_parameters: bool,

    /// Fail when a translation reports soft errors
    #[arg(long, global = true)]
    pub strict: bool,

    /// Table name for generated statements
    #[arg(long, global = true)]
    pub table: Option<String>,
}

impl CliConfig {
    /// Load configuration from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;

        let config = Self::from_yaml(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        // an empty document deserialises as unit, not as an empty map
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(field) = &overrides.category_field {
            self.category_field = field.clone();
        }
        if let Some(policy) = overrides.field_names {
            self.field_names = policy;
        }
        if let Some(table) = &overrides.table {
            self.table = table.clone();
        }
        self.extract_parameters |= overrides.extract_parameters;
        self.strict |= overrides.strict;
    }

    /// Translator settings described by this configuration
    pub fn transform_options(&self) -> Result<TransformOptions, ConfigError> {
        let options = TransformOptions::default()
            .with_category_field(self.category_field.clone())
            .with_extract_parameters(self.extract_parameters);

        let options = match self.field_names {
            FieldNamePolicy::Identity => options,
            FieldNamePolicy::ColumnPath => options.with_field_name_translator(ColumnPathTranslator),
            FieldNamePolicy::Schema => {
                if self.schema.fields.is_empty() {
                    return Err(ConfigError::EmptySchema);
                }
                let registry = self.schema.build_registry()?;
                debug!(fields = registry.len(), "schema registry built");
                options.with_shared_translator(Arc::new(registry))
            }
        };

        Ok(options)
    }
}
