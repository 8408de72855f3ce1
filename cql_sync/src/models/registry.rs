//! Model registry for cql_sync
//!
//! This module manages the registration and discovery of declared model
//! schemas. Models are registered explicitly or loaded from schema files
//! (`.toml`, `.yaml`/`.yml`, `.json`) found under the configured paths; the
//! file stem is the model name.

use glob::Pattern;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::ModelsConfig;
use crate::error::{Error, Result};
use crate::schema::types::{FieldDef, ModelSchema};
use crate::schema::validator::validate_model_schema;
use crate::utils::naming::get_table_name;

/// Information about a registered model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub name: String,
    pub file_path: Option<PathBuf>,
    pub table_name: String,
    pub schema: ModelSchema,
}

/// Registry of declared models, keyed by model name
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelInfo>,
    config: ModelsConfig,
}

impl ModelRegistry {
    /// Create a new model registry
    pub fn new(config: &ModelsConfig) -> Self {
        Self {
            models: IndexMap::new(),
            config: config.clone(),
        }
    }

    /// Validate and register a model schema
    pub fn register(&mut self, name: &str, schema: ModelSchema) -> Result<&ModelInfo> {
        self.register_with_path(name, schema, None)
    }

    fn register_with_path(&mut self, name: &str, mut schema: ModelSchema, file_path: Option<PathBuf>) -> Result<&ModelInfo> {
        apply_schema_options(&mut schema);
        validate_model_schema(name, &schema)?;

        let table_name = schema.table_name.clone().unwrap_or_else(|| get_table_name(name));
        if self.models.contains_key(name) {
            return Err(Error::ModelRegistrationError(format!(
                "Model \"{}\" is already registered",
                name
            )));
        }
        if let Some(existing) = self.models.values().find(|m| m.table_name == table_name) {
            return Err(Error::ModelRegistrationError(format!(
                "Models \"{}\" and \"{}\" both map to table \"{}\"",
                existing.name, name, table_name
            )));
        }

        tracing::debug!(model = name, table = %table_name, "Registered model");
        let info = ModelInfo {
            name: name.to_string(),
            file_path,
            table_name,
            schema,
        };
        self.models.insert(name.to_string(), info);
        Ok(&self.models[name])
    }

    /// Load one schema file and register it under its file stem
    pub fn register_file(&mut self, path: &Path) -> Result<&ModelInfo> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::ModelRegistrationError(format!("Invalid model file name: {}", path.display())))?
            .to_string();
        let schema = load_schema_file(path)?;
        self.register_with_path(&name, schema, Some(path.to_owned()))
    }

    /// Scan the configured paths for schema files and register them
    pub fn scan_and_register(&mut self) -> Result<usize> {
        let exclude_patterns = self
            .config
            .exclude_paths
            .clone()
            .unwrap_or_default()
            .iter()
            .map(|pattern| {
                Pattern::new(pattern)
                    .map_err(|e| Error::ModelRegistrationError(format!("Invalid exclude pattern \"{}\": {}", pattern, e)))
            })
            .collect::<Result<Vec<Pattern>>>()?;

        let paths = self.config.paths.clone();
        let max_depth = if self.config.recursive_scan { usize::MAX } else { 1 };
        let mut registered = 0;

        for path in &paths {
            let base_path = Path::new(path);

            if !base_path.exists() {
                return Err(Error::ModelRegistrationError(format!("Path does not exist: {}", path)));
            }

            let mut files: Vec<PathBuf> = WalkDir::new(base_path)
                .follow_links(true)
                .max_depth(max_depth)
                .into_iter()
                .filter_map(|e| e.ok())
                .map(|entry| entry.into_path())
                .filter(|path| path.is_file() && is_schema_file(path))
                .filter(|path| !exclude_patterns.iter().any(|p| p.matches_path(path)))
                .collect();
            files.sort();

            for file in files {
                self.register_file(&file)?;
                registered += 1;
            }
        }

        tracing::info!(models = registered, "Model scan complete");
        Ok(registered)
    }

    pub fn get(&self, name: &str) -> Option<&ModelInfo> {
        self.models.get(name)
    }

    /// Registered models in registration order
    pub fn models(&self) -> impl Iterator<Item = &ModelInfo> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

fn is_schema_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("toml" | "yaml" | "yml" | "json")
    )
}

/// Parse a schema file according to its extension
pub fn load_schema_file(path: &Path) -> Result<ModelSchema> {
    let content = std::fs::read_to_string(path)?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&content)
            .map_err(|e| Error::SerializationError(format!("{}: {}", path.display(), e))),
        Some("yaml" | "yml") => Ok(serde_yaml::from_str(&content)?),
        Some("json") => Ok(serde_json::from_str(&content)?),
        _ => Err(Error::ModelRegistrationError(format!(
            "Unsupported model file: {}",
            path.display()
        ))),
    }
}

/// Add the timestamp and version columns the schema options ask for
fn apply_schema_options(schema: &mut ModelSchema) {
    if let Some(timestamps) = schema.options.timestamps.clone() {
        for field in [timestamps.created_at, timestamps.updated_at] {
            schema.fields.entry(field).or_insert_with(|| FieldDef::new("timestamp"));
        }
    }
    if let Some(versions) = schema.options.versions.clone() {
        schema
            .fields
            .entry(versions.key)
            .or_insert_with(|| FieldDef::new("timeuuid"));
    }
}
