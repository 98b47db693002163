//! Server and refactor configuration.
//!
//! Read from the LSP `initializationOptions` and optionally overridden by a
//! `tsrefactor.json` file at the workspace root.

use serde::Deserialize;
use std::path::Path;

use crate::error::{RefactorError, Result};

pub const CONFIG_FILE_NAME: &str = "tsrefactor.json";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RefactorConfig {
    /// Line prefix that introduces a move-by-marker expression.
    pub marker_prefix: String,
    /// Permutation used by the reorder action when none is supplied.
    pub default_permutation: Vec<usize>,
    pub const2let: Const2LetConfig,
    /// Quote character for generated import specifiers.
    pub quote: QuoteStyle,
    /// Run the import normalization pass after moving a declaration.
    pub organize_imports: bool,
    /// Directory names skipped while indexing.
    pub exclude: Vec<String>,
    pub diagnostics: DiagnosticsConfig,
}

impl Default for RefactorConfig {
    fn default() -> Self {
        Self {
            marker_prefix: "&%&%".to_string(),
            default_permutation: vec![1, 0],
            const2let: Const2LetConfig::default(),
            quote: QuoteStyle::Double,
            organize_imports: true,
            exclude: vec![
                "node_modules".to_string(),
                ".git".to_string(),
                "dist".to_string(),
            ],
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Const2LetConfig {
    /// Keyword that replaces `const`: `let` or `var`.
    pub change_to: String,
}

impl Default for Const2LetConfig {
    fn default() -> Self {
        Self {
            change_to: "let".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum QuoteStyle {
    Single,
    Double,
}

impl QuoteStyle {
    pub fn as_char(self) -> char {
        match self {
            QuoteStyle::Single => '\'',
            QuoteStyle::Double => '"',
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DiagnosticsConfig {
    /// Run `tsc --noEmit` on save and publish its diagnostics.
    pub enabled: bool,
    pub tsc_command: String,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            tsc_command: "tsc".to_string(),
        }
    }
}

impl RefactorConfig {
    /// Parse from `initializationOptions`; `null` yields the defaults.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        let config: RefactorConfig = serde_json::from_value(value.clone())
            .map_err(|e| RefactorError::InvalidConfiguration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `tsrefactor.json` from `root` if present.
    pub fn load_from_root(root: &Path) -> Result<Option<Self>> {
        let path = root.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let value: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| RefactorError::InvalidConfiguration(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&value).map(Some)
    }

    pub fn validate(&self) -> Result<()> {
        if self.marker_prefix.trim().is_empty() {
            return Err(RefactorError::InvalidConfiguration(
                "markerPrefix must not be empty".to_string(),
            ));
        }
        match self.const2let.change_to.as_str() {
            "let" | "var" => {}
            other => {
                return Err(RefactorError::InvalidConfiguration(format!(
                    "const2let.changeTo must be `let` or `var`, got `{}`",
                    other
                )))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_options_use_defaults() {
        let config = RefactorConfig::from_json(&serde_json::Value::Null).unwrap();
        assert_eq!(config, RefactorConfig::default());
        assert_eq!(config.marker_prefix, "&%&%");
    }

    #[test]
    fn test_partial_options_keep_other_defaults() {
        let value = serde_json::json!({
            "markerPrefix": "@@refactor",
            "const2let": { "changeTo": "var" }
        });
        let config = RefactorConfig::from_json(&value).unwrap();
        assert_eq!(config.marker_prefix, "@@refactor");
        assert_eq!(config.const2let.change_to, "var");
        assert_eq!(config.default_permutation, vec![1, 0]);
        assert!(config.organize_imports);
    }

    #[test]
    fn test_rejects_unknown_change_to() {
        let value = serde_json::json!({ "const2let": { "changeTo": "final" } });
        let err = RefactorConfig::from_json(&value).unwrap_err();
        assert!(matches!(err, RefactorError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_load_from_root() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{ "quote": "single", "exclude": ["build"] }"#,
        )
        .unwrap();
        let config = RefactorConfig::load_from_root(dir.path()).unwrap().unwrap();
        assert_eq!(config.quote, QuoteStyle::Single);
        assert_eq!(config.exclude, vec!["build".to_string()]);
    }
}
