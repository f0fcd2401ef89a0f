//! Configuration loading and management
//!
//! Handles parsing of `kb.toml` configuration files.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// File name of the configuration inside a board directory
pub const CONFIG_FILE: &str = "kb.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Board layout and task rules
    #[serde(default)]
    pub board: BoardConfig,

    /// Persisted snapshot settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// CSV import/export settings
    #[serde(default)]
    pub exchange: ExchangeConfig,

    /// Presentation settings
    #[serde(default)]
    pub display: DisplayConfig,
}

/// A board column: its status identifier and display title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

impl ColumnConfig {
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
        }
    }

    /// Display title, falling back to the id
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            self.id.as_str()
        } else {
            self.title.as_str()
        }
    }
}

/// Board configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Columns in display order
    #[serde(default = "default_columns")]
    pub columns: Vec<ColumnConfig>,

    /// Column for new tasks and for unknown statuses
    #[serde(default = "default_status")]
    pub default_status: String,

    /// Prefix for generated task ids
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,

    /// Reject unparsable due dates typed into the editor
    #[serde(default = "default_true")]
    pub strict_due_dates: bool,

    /// Legacy status names mapped onto column ids
    #[serde(default = "default_status_aliases")]
    pub status_aliases: BTreeMap<String, String>,
}

fn default_columns() -> Vec<ColumnConfig> {
    vec![
        ColumnConfig::new("pending", "Pending"),
        ColumnConfig::new("doing", "Doing"),
        ColumnConfig::new("done", "Done"),
    ]
}

fn default_status() -> String {
    "pending".to_string()
}

fn default_id_prefix() -> String {
    "card".to_string()
}

fn default_true() -> bool {
    true
}

fn default_status_aliases() -> BTreeMap<String, String> {
    let mut aliases = BTreeMap::new();
    aliases.insert("pendente".to_string(), "pending".to_string());
    aliases
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            columns: default_columns(),
            default_status: default_status(),
            id_prefix: default_id_prefix(),
            strict_due_dates: default_true(),
            status_aliases: default_status_aliases(),
        }
    }
}

/// Snapshot storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Key holding the board snapshot
    #[serde(default = "default_storage_key")]
    pub key: String,

    /// How long to wait for the store lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_storage_key() -> String {
    "kanbanTasks_v2".to_string()
}

fn default_lock_timeout_ms() -> u64 {
    crate::lock::DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            key: default_storage_key(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

/// Exchange (CSV) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Title given to imported records that have none
    #[serde(default = "default_placeholder_title")]
    pub placeholder_title: String,
}

fn default_placeholder_title() -> String {
    "Untitled task".to_string()
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            placeholder_title: default_placeholder_title(),
        }
    }
}

/// Display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// chrono format string for due date labels
    #[serde(default = "default_due_label")]
    pub due_label: String,
}

fn default_due_label() -> String {
    "Due: %d/%m/%Y".to_string()
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            due_label: default_due_label(),
        }
    }
}

impl Config {
    /// Load configuration from a `kb.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a path, or return defaults
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "ignoring invalid config");
                Self::default()
            }
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.board.validate()?;

        if self.storage.key.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "storage.key cannot be empty".to_string(),
            ));
        }
        if self.exchange.placeholder_title.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "exchange.placeholder_title cannot be empty".to_string(),
            ));
        }
        if !crate::projection::is_valid_date_format(&self.display.due_label) {
            return Err(Error::InvalidConfig(format!(
                "display.due_label '{}' is not a valid date format",
                self.display.due_label
            )));
        }
        Ok(())
    }
}

impl BoardConfig {
    fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(Error::InvalidConfig(
                "board.columns cannot be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            let trimmed = column.id.trim();
            if trimmed.is_empty() {
                return Err(Error::InvalidConfig(
                    "board.columns cannot include empty ids".to_string(),
                ));
            }
            if trimmed != column.id {
                return Err(Error::InvalidConfig(format!(
                    "board.columns id '{}' has surrounding whitespace",
                    column.id
                )));
            }
            if !seen.insert(trimmed.to_string()) {
                return Err(Error::InvalidConfig(format!(
                    "board.columns has duplicate id '{trimmed}'"
                )));
            }
        }

        if !seen.contains(self.default_status.trim()) {
            return Err(Error::InvalidConfig(format!(
                "board.default_status '{}' not in board.columns",
                self.default_status
            )));
        }

        for (alias, target) in &self.status_aliases {
            if !seen.contains(target.trim()) {
                return Err(Error::InvalidConfig(format!(
                    "board.status_aliases '{alias}' points at unknown column '{target}'"
                )));
            }
        }

        let prefix = self.id_prefix.trim();
        if prefix.is_empty() {
            return Err(Error::InvalidConfig(
                "board.id_prefix cannot be empty".to_string(),
            ));
        }
        if !prefix.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return Err(Error::InvalidConfig(
                "board.id_prefix must be alphanumeric".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_are_expected() {
        let cfg = Config::default();
        let ids: Vec<&str> = cfg.board.columns.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["pending", "doing", "done"]);
        assert_eq!(cfg.board.default_status, "pending");
        assert_eq!(cfg.board.id_prefix, "card");
        assert!(cfg.board.strict_due_dates);
        assert_eq!(
            cfg.board.status_aliases.get("pendente").map(String::as_str),
            Some("pending")
        );
        assert_eq!(cfg.storage.key, "kanbanTasks_v2");
        assert_eq!(cfg.exchange.placeholder_title, "Untitled task");
        assert_eq!(cfg.display.due_label, "Due: %d/%m/%Y");
        cfg.validate().expect("defaults validate");
    }

    #[test]
    fn load_parses_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        let content = r#"
[board]
columns = [
  { id = "todo", title = "To do" },
  { id = "review" },
  { id = "shipped", title = "Shipped" },
]
default_status = "todo"
id_prefix = "task"
strict_due_dates = false
status_aliases = { backlog = "todo" }

[storage]
key = "board"
lock_timeout_ms = 250

[exchange]
placeholder_title = "(no title)"

[display]
due_label = "%Y/%m/%d"
"#;
        fs::write(&path, content.trim()).expect("write config");

        let cfg = Config::load(&path).expect("load config");
        assert_eq!(cfg.board.columns.len(), 3);
        assert_eq!(cfg.board.columns[1].display_title(), "review");
        assert_eq!(cfg.board.columns[2].display_title(), "Shipped");
        assert_eq!(cfg.board.default_status, "todo");
        assert_eq!(cfg.board.id_prefix, "task");
        assert!(!cfg.board.strict_due_dates);
        assert_eq!(
            cfg.board.status_aliases.get("backlog").map(String::as_str),
            Some("todo")
        );
        assert_eq!(cfg.storage.key, "board");
        assert_eq!(cfg.storage.lock_timeout_ms, 250);
        assert_eq!(cfg.exchange.placeholder_title, "(no title)");
        assert_eq!(cfg.display.due_label, "%Y/%m/%d");
    }

    #[test]
    fn default_status_must_be_a_column() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        let content = r#"
[board]
columns = [{ id = "todo" }, { id = "done" }]
default_status = "pending"
status_aliases = {}
"#;
        fs::write(&path, content.trim()).expect("write config");

        let err = Config::load(&path).expect_err("invalid config");
        match err {
            Error::InvalidConfig(message) => assert!(message.contains("default_status")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn duplicate_columns_rejected() {
        let mut cfg = Config::default();
        cfg.board.columns.push(ColumnConfig::new("doing", "Again"));
        let err = cfg.validate().expect_err("duplicate");
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn alias_to_unknown_column_rejected() {
        let mut cfg = Config::default();
        cfg.board
            .status_aliases
            .insert("archived".to_string(), "attic".to_string());
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn load_or_default_falls_back_on_invalid_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[board]\ncolumns = 3").expect("write config");

        let cfg = Config::load_or_default(&path);
        assert_eq!(cfg.board.default_status, "pending");
    }

    #[test]
    fn load_or_default_when_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = Config::load_or_default(&dir.path().join(CONFIG_FILE));
        assert_eq!(cfg.storage.key, "kanbanTasks_v2");
    }

    #[test]
    fn save_writes_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.toml");
        Config::default().save(&path).expect("save config");

        let written = fs::read_to_string(&path).expect("read config");
        assert!(written.contains("default_status = \"pending\""));
        let reloaded = Config::load(&path).expect("reload");
        assert_eq!(reloaded.board.columns, default_columns());
    }
}
