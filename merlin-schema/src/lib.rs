//! Merlin Field Schema
//!
//! Maps EQL field paths (`process.name`) onto the SQL columns that store them.
//! The registry is shared between concurrent translations, so it is built on
//! `DashMap` and every method takes `&self`.

use ahash::RandomState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;

/// Field identifier
pub type FieldId = u32;

/// Column data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldDataType {
    Int64,
    UInt64,
    Float64,
    String,
    Bool,
    DateTime,
    Ip,
    Array,
}

impl std::fmt::Display for FieldDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldDataType::Int64 => "Int64",
            FieldDataType::UInt64 => "UInt64",
            FieldDataType::Float64 => "Float64",
            FieldDataType::String => "String",
            FieldDataType::Bool => "Bool",
            FieldDataType::DateTime => "DateTime",
            FieldDataType::Ip => "IP",
            FieldDataType::Array => "Array",
        };
        f.write_str(name)
    }
}

/// Field definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// EQL field path (e.g., "process.executable")
    pub path: String,
    /// SQL column expression; defaults to `path` when empty
    #[serde(default)]
    pub column: String,
    pub data_type: FieldDataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldDef {
    pub fn new(path: impl Into<String>, column: impl Into<String>, data_type: FieldDataType) -> Self {
        Self {
            path: path.into(),
            column: column.into(),
            data_type,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Schema errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Field already exists: {0}")]
    FieldAlreadyExists(String),

    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Alias '{alias}' points to unknown field '{target}'")]
    AliasTargetNotFound { alias: String, target: String },
}

/// Schema registry that maintains field definitions and their aliases
#[derive(Debug)]
pub struct SchemaRegistry {
    /// Field ID to definition mapping
    fields: DashMap<FieldId, FieldDef, RandomState>,
    /// Field path (and alias) to ID mapping
    field_paths: DashMap<String, FieldId, RandomState>,
    /// Alias names, a subset of `field_paths`
    aliases: DashMap<String, FieldId, RandomState>,
    next_field_id: AtomicU32,
}

impl Clone for SchemaRegistry {
    fn clone(&self) -> Self {
        Self {
            fields: self.fields.clone(),
            field_paths: self.field_paths.clone(),
            aliases: self.aliases.clone(),
            next_field_id: AtomicU32::new(self.next_field_id.load(Ordering::SeqCst)),
        }
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry {
    /// Create an empty schema registry
    pub fn new() -> Self {
        Self {
            fields: DashMap::with_hasher(RandomState::new()),
            field_paths: DashMap::with_hasher(RandomState::new()),
            aliases: DashMap::with_hasher(RandomState::new()),
            next_field_id: AtomicU32::new(1),
        }
    }

    /// Build a registry from a list of definitions, failing on duplicates
    pub fn from_definitions(defs: Vec<FieldDef>) -> Result<Self, SchemaError> {
        let registry = Self::new();
        for def in defs {
            registry.register_field(def)?;
        }
        Ok(registry)
    }

    /// Register a field definition and return its ID
    pub fn register_field(&self, mut def: FieldDef) -> Result<FieldId, SchemaError> {
        if def.column.is_empty() {
            def.column = def.path.clone();
        }

        match self.field_paths.entry(def.path.clone()) {
            Entry::Occupied(_) => Err(SchemaError::FieldAlreadyExists(def.path)),
            Entry::Vacant(slot) => {
                let id = self.next_field_id.fetch_add(1, Ordering::SeqCst);
                slot.insert(id);
                self.fields.insert(id, def);
                Ok(id)
            }
        }
    }

    /// Make `alias` resolve to the same column as `target`
    pub fn register_alias(&self, alias: &str, target: &str) -> Result<FieldId, SchemaError> {
        let id = self
            .get_field_id(target)
            .ok_or_else(|| SchemaError::AliasTargetNotFound {
                alias: alias.to_string(),
                target: target.to_string(),
            })?;

        match self.field_paths.entry(alias.to_string()) {
            Entry::Occupied(_) => Err(SchemaError::FieldAlreadyExists(alias.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(id);
                self.aliases.insert(alias.to_string(), id);
                Ok(id)
            }
        }
    }

    /// Get field ID by path or alias
    pub fn get_field_id(&self, path: &str) -> Option<FieldId> {
        self.field_paths.get(path).map(|v| *v.value())
    }

    /// Get field definition by path or alias
    pub fn get_field(&self, path: &str) -> Option<FieldDef> {
        let id = self.get_field_id(path)?;
        self.fields.get(&id).map(|v| v.value().clone())
    }

    /// Column that stores `path`
    pub fn resolve_column(&self, path: &str) -> Result<String, SchemaError> {
        self.get_field(path)
            .map(|def| def.column)
            .ok_or_else(|| SchemaError::FieldNotFound(path.to_string()))
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    /// List all registered fields, ordered by ID
    pub fn list_fields(&self) -> Vec<(FieldId, FieldDef)> {
        let mut fields: Vec<_> = self
            .fields
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        fields.sort_by_key(|(id, _)| *id);
        fields
    }

    /// Number of registered fields, aliases excluded
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process_name() -> FieldDef {
        FieldDef::new("process.name", "process_name", FieldDataType::String)
    }

    #[test]
    fn test_register_field() {
        let registry = SchemaRegistry::new();
        let id = registry
            .register_field(process_name().with_description("Process image name"))
            .unwrap();
        assert_eq!(id, 1);

        let retrieved = registry.get_field("process.name").unwrap();
        assert_eq!(retrieved.column, "process_name");
        assert_eq!(retrieved.data_type, FieldDataType::String);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_column_defaults_to_path() {
        let registry = SchemaRegistry::new();
        registry
            .register_field(FieldDef::new("process.pid", "", FieldDataType::UInt64))
            .unwrap();
        assert_eq!(registry.resolve_column("process.pid").unwrap(), "process.pid");
    }

    #[test]
    fn test_duplicate_field() {
        let registry = SchemaRegistry::new();
        registry.register_field(process_name()).unwrap();
        let result = registry.register_field(process_name());
        assert!(matches!(result, Err(SchemaError::FieldAlreadyExists(_))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_aliases() {
        let registry = SchemaRegistry::from_definitions(vec![process_name()]).unwrap();
        registry.register_alias("name", "process.name").unwrap();

        assert!(registry.is_alias("name"));
        assert_eq!(registry.resolve_column("name").unwrap(), "process_name");
        assert_eq!(registry.len(), 1);

        let missing = registry.register_alias("user", "user.name");
        assert_eq!(
            missing,
            Err(SchemaError::AliasTargetNotFound {
                alias: "user".to_string(),
                target: "user.name".to_string(),
            })
        );

        let clash = registry.register_alias("process.name", "process.name");
        assert!(matches!(clash, Err(SchemaError::FieldAlreadyExists(_))));
    }

    #[test]
    fn test_resolve_unknown_field() {
        let registry = SchemaRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(
            registry.resolve_column("nope"),
            Err(SchemaError::FieldNotFound("nope".to_string()))
        );
    }

    #[test]
    fn test_list_fields_ordered() {
        let registry = SchemaRegistry::from_definitions(vec![
            process_name(),
            FieldDef::new("source.ip", "src_ip", FieldDataType::Ip),
        ])
        .unwrap();
        let paths: Vec<_> = registry
            .list_fields()
            .into_iter()
            .map(|(_, def)| def.path)
            .collect();
        assert_eq!(paths, vec!["process.name", "source.ip"]);
    }

    #[test]
    fn test_field_defs_from_yaml() {
        let yaml = r#"
- path: process.name
  column: proc_name
  data_type: string
- path: source.ip
  data_type: ip
  description: Source address
"#;
        let defs: Vec<FieldDef> = serde_yaml::from_str(yaml).unwrap();
        let registry = SchemaRegistry::from_definitions(defs).unwrap();
        assert_eq!(registry.resolve_column("process.name").unwrap(), "proc_name");
        assert_eq!(registry.resolve_column("source.ip").unwrap(), "source.ip");
        assert_eq!(
            registry.get_field("source.ip").unwrap().data_type,
            FieldDataType::Ip
        );
    }
}
