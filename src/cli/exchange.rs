//! CSV export and import, and snapshot resync.

use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::board::ImportReport;
use crate::cli::{load_context, push_load_warnings, Globals};
use crate::codec::exchange::export_file_name;
use crate::error::Result;
use crate::lock::write_atomic;
use crate::output::{emit_success, HumanOutput};

const STDIO: &str = "-";

pub struct ExportOptions {
    pub out: Option<PathBuf>,
    pub globals: Globals,
}

pub struct ImportOptions {
    pub file: PathBuf,
    pub globals: Globals,
}

pub struct SyncOptions {
    pub globals: Globals,
}

#[derive(Serialize)]
struct ExportOutput {
    path: PathBuf,
    tasks: usize,
}

#[derive(Serialize)]
struct ImportOutput {
    source: PathBuf,
    #[serde(flatten)]
    report: ImportReport,
}

#[derive(Serialize)]
struct SyncOutput {
    key: String,
    written: bool,
    tasks: usize,
}

pub fn run_export(options: ExportOptions) -> Result<()> {
    let ctx = load_context(&options.globals)?;
    let csv = ctx.board.export_csv();

    if options.out.as_deref().is_some_and(is_stdio) {
        print!("{csv}");
        return Ok(());
    }

    let path = options
        .out
        .unwrap_or_else(|| PathBuf::from(export_file_name(ctx.board.today())));
    write_atomic(&path, csv.as_bytes())?;
    tracing::debug!(path = %path.display(), tasks = ctx.board.len(), "board exported");

    let mut human = HumanOutput::new("Board exported");
    push_load_warnings(&mut human, &ctx.load);
    human.push_summary("File", path.display().to_string());
    human.push_summary("Tasks", ctx.board.len().to_string());

    let output = ExportOutput {
        path,
        tasks: ctx.board.len(),
    };
    emit_success(ctx.output(&options.globals), "export", &output, Some(&human))
}

pub fn run_import(options: ImportOptions) -> Result<()> {
    let raw = read_source(&options.file)?;
    let mut ctx = load_context(&options.globals)?;
    let report = ctx.board.import_csv(&raw)?;

    let mut human = HumanOutput::new(format!("Imported {} task(s)", report.imported.len()));
    push_load_warnings(&mut human, &ctx.load);
    human.push_summary("Source", options.file.display().to_string());
    human.push_summary("Imported", report.imported.len().to_string());
    if report.renamed > 0 {
        human.push_summary("Renamed", report.renamed.to_string());
    }
    for row in &report.skipped {
        human.push_warning(format!("line {}: {}", row.line, row.reason));
    }
    if !report.imported.is_empty() {
        human.push_next_step("kb list");
    }

    let output = ImportOutput {
        source: options.file,
        report,
    };
    emit_success(ctx.output(&options.globals), "import", &output, Some(&human))
}

pub fn run_sync(options: SyncOptions) -> Result<()> {
    let mut ctx = load_context(&options.globals)?;
    let written = ctx.board.resync()?;

    let header = if written {
        "Snapshot rewritten"
    } else {
        "Snapshot already up to date"
    };
    let mut human = HumanOutput::new(header);
    push_load_warnings(&mut human, &ctx.load);
    human.push_summary("Key", ctx.board.key().to_string());
    human.push_summary("Store", ctx.storage.store_dir().display().to_string());
    human.push_summary("Tasks", ctx.board.len().to_string());

    let output = SyncOutput {
        key: ctx.board.key().to_string(),
        written,
        tasks: ctx.board.len(),
    };
    emit_success(ctx.output(&options.globals), "sync", &output, Some(&human))
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == STDIO
}

fn read_source(path: &Path) -> Result<String> {
    if is_stdio(path) {
        let mut raw = String::new();
        std::io::stdin().read_to_string(&mut raw)?;
        return Ok(raw);
    }
    Ok(std::fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn dash_means_stdio() {
        assert!(is_stdio(Path::new("-")));
        assert!(!is_stdio(Path::new("./-")));
        assert!(!is_stdio(Path::new("tasks.csv")));
    }

    #[test]
    fn reads_file_source() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tasks.csv");
        std::fs::write(&path, "title\nA\n").unwrap();
        assert_eq!(read_source(&path).unwrap(), "title\nA\n");
        assert!(read_source(&temp.path().join("missing.csv")).is_err());
    }
}
