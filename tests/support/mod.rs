use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

/// A throwaway board directory.
pub struct TestBoard {
    dir: TempDir,
}

impl TestBoard {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.path().join("store").join("kanbanTasks_v2.json")
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// `kb` pointed at this board, run from inside it.
    pub fn cmd(&self) -> Command {
        let mut cmd = kb_cmd();
        cmd.current_dir(self.path());
        cmd.env("KB_DIR", self.path());
        cmd
    }

    /// Run `kb <args> --json` and return the `data` payload.
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self
            .cmd()
            .args(args)
            .arg("--json")
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let value: Value = serde_json::from_slice(&output).expect("json envelope");
        assert_eq!(value["status"], "success");
        value["data"].clone()
    }

    /// Create a task and return its id.
    pub fn add(&self, args: &[&str]) -> String {
        let mut full = vec!["add"];
        full.extend_from_slice(args);
        self.json(&full)["id"]
            .as_str()
            .expect("task id")
            .to_string()
    }
}

pub fn kb_cmd() -> Command {
    let mut cmd = Command::cargo_bin("kb").expect("binary");
    cmd.env_remove("KB_DIR");
    cmd.env_remove("KB_CONFIG");
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Titles of one column from `kb list --json` data.
pub fn column_titles(list: &Value, status: &str) -> Vec<String> {
    list["columns"]
        .as_array()
        .expect("columns")
        .iter()
        .find(|column| column["status"] == status)
        .map(|column| {
            column["visible"]
                .as_array()
                .expect("visible")
                .iter()
                .map(|task| task["title"].as_str().unwrap_or_default().to_string())
                .collect()
        })
        .unwrap_or_default()
}
