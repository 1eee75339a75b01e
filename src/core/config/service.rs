use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::paths::AppPaths;
use super::types::AppConfig;
use super::validation::validate_config;
use crate::core::errors::ApiError;

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 8] = [
    "api_key",
    "secret",
    "password",
    "_token",
    "credential",
    "private_key",
    "bearer",
    "access_key",
];

const SENSITIVE_WHITELIST: [&str; 3] = ["max_tokens", "max_new_tokens", "tokenizer_path"];

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("COUNSEL_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let data_config = self.paths.data_dir.join("config.yml");
        if data_config.exists() {
            return data_config;
        }

        self.paths.project_root.join("config.yml")
    }

    /// Raw merged view of `config.yml` and `secrets.yaml`.
    pub fn load_raw(&self) -> Result<Value, ApiError> {
        let public_config = load_yaml_file(&self.config_path())?;
        let secrets_config = load_yaml_file(&self.paths.secrets_path)?;
        Ok(deep_merge(&public_config, &secrets_config))
    }

    /// Loads, applies environment overrides, and validates the configuration.
    pub fn load_config(&self) -> Result<AppConfig, ApiError> {
        let raw = self.load_raw()?;
        let mut config: AppConfig = serde_json::from_value(raw)
            .map_err(|e| ApiError::BadRequest(format!("Invalid configuration: {}", e)))?;
        apply_env_overrides(&mut config);
        validate_config(&config)?;
        Ok(config)
    }

    pub fn redact_sensitive_values(&self, value: &Value) -> Value {
        redact_sensitive_values(value)
    }
}

fn load_yaml_file(path: &Path) -> Result<Value, ApiError> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        ApiError::Internal(format!("Failed to read {}: {}", path.display(), e))
    })?;
    if contents.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    let value = serde_yaml::from_str::<Value>(&contents).map_err(|e| {
        ApiError::BadRequest(format!("Failed to parse {}: {}", path.display(), e))
    })?;
    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Map::new())),
        _ => Err(ApiError::BadRequest(format!(
            "{} must contain a mapping at the top level",
            path.display()
        ))),
    }
}

fn apply_env_overrides(config: &mut AppConfig) {
    if let Some(port) = env::var("PORT").ok().and_then(|v| v.parse::<u16>().ok()) {
        config.server.port = port;
    }
    if let Ok(host) = env::var("COUNSEL_HOST") {
        if !host.trim().is_empty() {
            config.server.host = host.trim().to_string();
        }
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    if SENSITIVE_WHITELIST
        .iter()
        .any(|allowed| *allowed == key_lower)
    {
        return false;
    }
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service_in(dir: &Path) -> ConfigService {
        let paths = AppPaths::from_dirs(dir.to_path_buf(), dir.to_path_buf());
        ConfigService::new(Arc::new(paths))
    }

    #[test]
    fn deep_merge_merges_objects_and_overrides_scalars() {
        let base = json!({
            "a": 1,
            "b": { "c": 2, "d": 3 },
            "arr": [1, 2]
        });
        let override_value = json!({
            "b": { "c": 99 },
            "arr": [3],
            "e": "x"
        });

        let merged = deep_merge(&base, &override_value);

        assert_eq!(
            merged,
            json!({
                "a": 1,
                "b": { "c": 99, "d": 3 },
                "arr": [3],
                "e": "x"
            })
        );
    }

    #[test]
    fn redact_hides_api_keys_but_not_token_budgets() {
        let input = json!({
            "retrieval": { "embedder": { "api_key": "sk-live", "model": "bge-m3" } },
            "summary": { "max_new_tokens": 400 }
        });

        let redacted = redact_sensitive_values(&input);

        assert_eq!(
            redacted,
            json!({
                "retrieval": { "embedder": { "api_key": "****", "model": "bge-m3" } },
                "summary": { "max_new_tokens": 400 }
            })
        );
    }

    #[test]
    fn missing_files_yield_default_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = service_in(dir.path());
        let config = service.load_config().expect("defaults");
        assert_eq!(config.session.history_window, 6);
        assert_eq!(config.retrieval.top_k, 3);
    }

    #[test]
    fn secrets_file_is_merged_over_public_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join("config.yml"),
            "retrieval:\n  top_k: 4\n  embedder:\n    model: e5\n",
        )
        .expect("write config");
        fs::write(
            dir.path().join("secrets.yaml"),
            "retrieval:\n  embedder:\n    api_key: hidden\n",
        )
        .expect("write secrets");

        let service = service_in(dir.path());
        let config = service.load_config().expect("load");
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.retrieval.embedder.model, "e5");
        assert_eq!(config.retrieval.embedder.api_key.as_deref(), Some("hidden"));
    }

    #[test]
    fn invalid_yaml_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("config.yml"), "- just\n- a list\n").expect("write");
        let service = service_in(dir.path());
        assert!(service.load_config().is_err());
    }
}
