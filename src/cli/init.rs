//! kb init command implementation
//!
//! Creates the board directory, the store directory and a default kb.toml.

use std::path::{Path, PathBuf};

use crate::cli::Globals;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::storage::Storage;

pub struct InitOptions {
    pub force: bool,
    pub globals: Globals,
}

#[derive(serde::Serialize)]
struct InitReport {
    dir: PathBuf,
    config: PathBuf,
    created: InitCreated,
}

#[derive(serde::Serialize)]
struct InitCreated {
    dir: bool,
    store: bool,
    config: bool,
}

pub fn run(options: InitOptions) -> Result<()> {
    let storage = Storage::resolve(options.globals.dir.as_deref())?;
    let config_path = options
        .globals
        .config
        .clone()
        .unwrap_or_else(|| storage.config_file());

    let created_dir = !storage.root().exists();
    let created_store = !storage.store_dir().exists();
    storage.init()?;
    let created_config = ensure_config(&config_path, options.force)?;

    let report = InitReport {
        dir: storage.root().to_path_buf(),
        config: config_path.clone(),
        created: InitCreated {
            dir: created_dir,
            store: created_store,
            config: created_config,
        },
    };

    let mut created_items = Vec::new();
    if created_dir {
        created_items.push("board directory");
    }
    if created_store {
        created_items.push("store/");
    }
    if created_config {
        created_items.push("kb.toml");
    }

    let header = if created_items.is_empty() {
        "kb init: nothing to do"
    } else {
        "kb init: initialized board"
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("dir", storage.root().display().to_string());
    human.push_summary("config", config_path.display().to_string());
    human.push_summary(
        "created",
        if created_items.is_empty() {
            "none".to_string()
        } else {
            created_items.join(", ")
        },
    );
    human.push_next_step("kb add \"first task\"");
    human.push_next_step("kb board");

    emit_success(options.globals.output(), "init", &report, Some(&human))
}

/// Write a default config unless one exists; returns whether it was written.
fn ensure_config(path: &Path, force: bool) -> Result<bool> {
    if path.exists() {
        if !path.is_file() {
            return Err(Error::OperationFailed(format!(
                "config path exists but is not a file: {}",
                path.display()
            )));
        }
        if !force {
            return Ok(false);
        }
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Config::default().save(path)?;
    tracing::debug!(path = %path.display(), "wrote default config");
    Ok(true)
}
