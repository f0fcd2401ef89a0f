//! Command-line interface for kb
//!
//! This module defines the CLI structure using clap derive macros.
//! Commands are grouped into submodules by concern.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::board::{Board, BoardOptions, LoadReport};
use crate::config::Config;
use crate::error::Result;
use crate::events::{EventDestination, EventSink};
use crate::expiry;
use crate::output::{HumanOutput, OutputOptions};
use crate::storage::{FileStore, Storage};

mod board;
mod exchange;
mod init;
mod report;
mod task;

/// kb - a kanban task board
///
/// Tasks live in ordered status columns and are persisted as a JSON
/// snapshot after every change. Boards can be exported to and imported
/// from CSV, and browsed interactively with `kb board`.
#[derive(Parser, Debug)]
#[command(name = "kb")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Board directory (defaults to the per-user data directory)
    #[arg(long, global = true, env = "KB_DIR")]
    pub dir: Option<PathBuf>,

    /// Config file (defaults to kb.toml in the board directory)
    #[arg(long, global = true, env = "KB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write board events as JSONL to a file, or "-" for stdout
    #[arg(long, global = true)]
    pub events: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the board directory and a default kb.toml
    Init {
        /// Overwrite an existing kb.toml with defaults
        #[arg(long)]
        force: bool,
    },

    /// Create a task
    Add {
        /// Task title
        title: String,

        /// Priority: low, medium, high
        #[arg(short, long)]
        priority: Option<String>,

        /// Column to place the task in
        #[arg(short, long)]
        status: Option<String>,

        /// Due date (YYYY-MM-DD)
        #[arg(short, long)]
        due: Option<String>,

        /// Mark the task completed
        #[arg(long)]
        done: bool,

        /// Tag (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },

    /// Edit a task; a stale id creates a new task instead
    Edit {
        /// Task ID
        id: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New priority
        #[arg(short, long)]
        priority: Option<String>,

        /// New column; the task moves to the end of it
        #[arg(short, long)]
        status: Option<String>,

        /// New due date (YYYY-MM-DD)
        #[arg(short, long, conflicts_with = "clear_due")]
        due: Option<String>,

        /// Remove the due date
        #[arg(long)]
        clear_due: bool,

        /// Mark the task completed
        #[arg(long, conflicts_with = "undone")]
        done: bool,

        /// Mark the task not completed
        #[arg(long)]
        undone: bool,

        /// Add a tag (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Drop existing tags before adding new ones
        #[arg(long)]
        clear_tags: bool,
    },

    /// Delete a task
    #[command(alias = "remove")]
    Rm {
        /// Task ID
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Flip a task's completed flag
    Toggle {
        /// Task ID
        id: String,
    },

    /// Move a task to a column position
    #[command(alias = "mv")]
    Move {
        /// Task ID
        id: String,

        /// Destination column
        status: String,

        /// Position in the destination column (defaults to the end)
        #[arg(short, long)]
        index: Option<usize>,
    },

    /// Show a task
    Show {
        /// Task ID
        id: String,
    },

    /// List tasks per column
    #[command(alias = "ls")]
    List {
        /// Only show this priority: all, low, medium, high
        #[arg(short, long)]
        priority: Option<String>,

        /// Case-insensitive title search
        #[arg(long)]
        search: Option<String>,

        /// Sort: none, priority, due-asc, due-desc
        #[arg(long)]
        sort: Option<String>,

        /// Also list tasks hidden by the filters
        #[arg(long)]
        hidden: bool,
    },

    /// Task counts by status, priority, completion, tag and due state
    Stats,

    /// Month calendar of due dates
    Calendar {
        /// Month as YYYY-MM (defaults to the current month)
        #[arg(short, long)]
        month: Option<String>,
    },

    /// Tasks due on a date
    Due {
        /// Date (YYYY-MM-DD)
        date: String,
    },

    /// Export the board as CSV
    Export {
        /// Output file, or "-" for stdout (defaults to kanban-tasks-<date>.csv)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Import tasks from a CSV file, or "-" for stdin
    Import {
        /// CSV file
        file: PathBuf,
    },

    /// Rewrite the stored snapshot from the current board
    Sync,

    /// Interactive board
    Board,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let globals = Globals {
            dir: self.dir,
            config: self.config,
            events: self.events,
            json: self.json,
            quiet: self.quiet,
        };

        match self.command {
            Commands::Init { force } => init::run(init::InitOptions { force, globals }),
            Commands::Add {
                title,
                priority,
                status,
                due,
                done,
                tags,
            } => task::run_add(task::AddOptions {
                title,
                priority,
                status,
                due,
                done,
                tags,
                globals,
            }),
            Commands::Edit {
                id,
                title,
                priority,
                status,
                due,
                clear_due,
                done,
                undone,
                tags,
                clear_tags,
            } => task::run_edit(task::EditOptions {
                id,
                title,
                priority,
                status,
                due,
                clear_due,
                completed: match (done, undone) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                },
                tags,
                clear_tags,
                globals,
            }),
            Commands::Rm { id, yes } => task::run_rm(task::RmOptions { id, yes, globals }),
            Commands::Toggle { id } => task::run_toggle(task::ToggleOptions { id, globals }),
            Commands::Move { id, status, index } => task::run_move(task::MoveOptions {
                id,
                status,
                index,
                globals,
            }),
            Commands::Show { id } => task::run_show(task::ShowOptions { id, globals }),
            Commands::List {
                priority,
                search,
                sort,
                hidden,
            } => task::run_list(task::ListOptions {
                priority,
                search,
                sort,
                hidden,
                globals,
            }),
            Commands::Stats => report::run_stats(report::StatsOptions { globals }),
            Commands::Calendar { month } => {
                report::run_calendar(report::CalendarOptions { month, globals })
            }
            Commands::Due { date } => report::run_due(report::DueOptions { date, globals }),
            Commands::Export { out } => {
                exchange::run_export(exchange::ExportOptions { out, globals })
            }
            Commands::Import { file } => {
                exchange::run_import(exchange::ImportOptions { file, globals })
            }
            Commands::Sync => exchange::run_sync(exchange::SyncOptions { globals }),
            Commands::Board => board::run(board::ViewerOptions { globals }),
        }
    }
}

/// Flags shared by every command.
#[derive(Debug, Clone)]
pub(crate) struct Globals {
    pub dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub events: Option<String>,
    pub json: bool,
    pub quiet: bool,
}

impl Globals {
    pub fn output(&self) -> OutputOptions {
        OutputOptions {
            json: self.json,
            quiet: self.quiet,
        }
    }

    /// Output options once event routing is known; events on stdout win.
    pub fn output_with_events(&self, events_to_stdout: bool) -> OutputOptions {
        OutputOptions {
            json: self.json && !events_to_stdout,
            quiet: self.quiet || events_to_stdout,
        }
    }
}

pub(crate) struct BoardContext {
    pub storage: Storage,
    pub config: Config,
    pub board: Board<FileStore>,
    pub load: LoadReport,
    pub events_to_stdout: bool,
}

impl BoardContext {
    pub fn output(&self, globals: &Globals) -> OutputOptions {
        globals.output_with_events(self.events_to_stdout)
    }
}

pub(crate) fn load_config(globals: &Globals, storage: &Storage) -> Result<Config> {
    match &globals.config {
        Some(path) => Config::load(path),
        None => Ok(Config::load_or_default(&storage.config_file())),
    }
}

/// Resolve the board directory, load config, open the board and attach the event sink.
pub(crate) fn load_context(globals: &Globals) -> Result<BoardContext> {
    let storage = Storage::resolve(globals.dir.as_deref())?;
    let config = load_config(globals, &storage)?;
    let store = storage.file_store(config.storage.lock_timeout_ms);
    let (mut board, load) = Board::open(store, BoardOptions::from_config(&config), expiry::today())?;

    let (sink, events_to_stdout) = open_event_sink(globals.events.as_deref())?;
    if let Some(sink) = sink {
        board.subscribe(sink.into_listener());
    }

    Ok(BoardContext {
        storage,
        config,
        board,
        load,
        events_to_stdout,
    })
}

pub(crate) fn open_event_sink(events: Option<&str>) -> Result<(Option<EventSink>, bool)> {
    let destination = EventDestination::parse(events);
    let sink = destination.as_ref().map(|dest| dest.open()).transpose()?;
    let events_to_stdout = matches!(destination, Some(EventDestination::Stdout));
    Ok((sink, events_to_stdout))
}

/// Surface anything notable from loading the snapshot.
pub(crate) fn push_load_warnings(human: &mut HumanOutput, load: &LoadReport) {
    if let Some(reason) = &load.recovered {
        let backup = load.backup_key.as_deref().unwrap_or("a backup key");
        human.push_warning(format!(
            "stored board was unreadable ({reason}); previous value kept under {backup}"
        ));
    }
    if load.reassigned > 0 {
        human.push_warning(format!(
            "{} stored task(s) had an unknown status and were placed in the default column",
            load.reassigned
        ));
    }
    if load.duplicates > 0 {
        human.push_warning(format!(
            "{} stored task(s) repeated an existing id and were dropped",
            load.duplicates
        ));
    }
    if load.skipped > 0 {
        human.push_warning(format!(
            "{} stored entr(ies) were not task records and were skipped",
            load.skipped
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_move_with_index() {
        let cli = Cli::try_parse_from(["kb", "--json", "move", "card-1", "done", "--index", "2"])
            .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Move { id, status, index } => {
                assert_eq!(id, "card-1");
                assert_eq!(status, "done");
                assert_eq!(index, Some(2));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn edit_rejects_conflicting_flags() {
        assert!(Cli::try_parse_from(["kb", "edit", "card-1", "--done", "--undone"]).is_err());
        assert!(
            Cli::try_parse_from(["kb", "edit", "card-1", "--due", "2024-01-01", "--clear-due"])
                .is_err()
        );
    }

    #[test]
    fn events_on_stdout_silence_normal_output() {
        let globals = Globals {
            dir: None,
            config: None,
            events: Some("-".to_string()),
            json: true,
            quiet: false,
        };
        let output = globals.output_with_events(true);
        assert!(!output.json);
        assert!(output.quiet);
    }

    #[test]
    fn load_warnings_mention_backup() {
        let load = LoadReport {
            recovered: Some("not a JSON array".to_string()),
            backup_key: Some("kanbanTasks_v2.bak".to_string()),
            ..LoadReport::default()
        };
        let mut human = HumanOutput::new("Tasks");
        push_load_warnings(&mut human, &load);
        let text = crate::output::format_human(&human);
        assert!(text.contains("kanbanTasks_v2.bak"));
    }
}
