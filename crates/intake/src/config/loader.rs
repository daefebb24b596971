use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    for table in [
        &config.persistence.summary_table,
        &config.persistence.expenses_table,
    ] {
        if !is_valid_table_name(table) {
            return Err(ConfigError::InvalidTableName {
                name: table.clone(),
            });
        }
    }

    if config.persistence.summary_table == config.persistence.expenses_table {
        return Err(ConfigError::Validation {
            message: "summary_table and expenses_table must differ".to_string(),
        });
    }

    if config.conversation.form_entries == 0 {
        return Err(ConfigError::Validation {
            message: "conversation.form_entries must be at least 1".to_string(),
        });
    }

    Ok(())
}

/// Table names are interpolated into SQL, so only identifier characters pass.
pub fn is_valid_table_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ClassifierStrategy, OcrProviderKind, PreprocessPolicy};

    #[test]
    fn test_load_minimal_config() {
        let config = load_config_from_str(r#"{ "version": "1.0" }"#).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.storage.root, "uploads");
        assert_eq!(config.ocr.provider, OcrProviderKind::Vision);
        assert_eq!(config.scan.strategy, ClassifierStrategy::LanguageModel);
        assert_eq!(config.persistence.summary_table, "report_summaries");
    }

    #[test]
    fn test_load_full_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "database_path": "/var/lib/intake/intake.db",
            "storage": { "root": "/srv/uploads", "public_base_url": "https://files.example.org" },
            "ocr": {
                "provider": "tesseract",
                "languages": ["eng", "ara"],
                "api_key": { "env_var": "VISION_KEY" }
            },
            "generation": { "model": "gpt-4o-mini", "max_tokens": 800, "temperature": 0.2 },
            "scan": { "strategy": "table", "preprocess": "upsample-threshold", "timeout_secs": 20 },
            "conversation": { "form_entries": 3 },
            "persistence": { "summary_table": "mag_f4_summary", "expenses_table": "mag_f4_expenses" },
            "logging": { "level": "debug", "json": true }
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.ocr.provider, OcrProviderKind::Tesseract);
        assert_eq!(config.ocr.languages, vec!["eng", "ara"]);
        assert_eq!(config.ocr.api_key.env_var.as_deref(), Some("VISION_KEY"));
        assert_eq!(config.generation.model, "gpt-4o-mini");
        assert_eq!(config.scan.strategy, ClassifierStrategy::Table);
        assert_eq!(config.scan.preprocess, PreprocessPolicy::UpsampleThreshold);
        assert_eq!(config.scan.timeout_secs, 20);
        assert_eq!(config.conversation.form_entries, 3);
        assert!(config.logging.json);
    }

    #[test]
    fn test_invalid_version() {
        let result = load_config_from_str(r#"{ "version": "2.0" }"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_unknown_field_rejected_by_schema() {
        let result = load_config_from_str(r#"{ "version": "1.0", "input_directory": "/in" }"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_zero_form_entries_rejected_by_schema() {
        let result =
            load_config_from_str(r#"{ "version": "1.0", "conversation": { "form_entries": 0 } }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_table_name_with_quote_rejected() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "persistence": { "summary_table": "x\"; DROP TABLE y; --" } }"#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidTableName { .. })));
    }

    #[test]
    fn test_same_table_names_rejected() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "persistence": { "summary_table": "t", "expenses_table": "t" } }"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_missing_file() {
        let result = load_config("/nonexistent/intake.json");
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }

    #[test]
    fn test_valid_table_names() {
        assert!(is_valid_table_name("report_summaries"));
        assert!(is_valid_table_name("MAG_F4_Summary"));
        assert!(!is_valid_table_name(""));
        assert!(!is_valid_table_name("1table"));
        assert!(!is_valid_table_name("MAG F4 Summary"));
    }
}
