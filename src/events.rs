//! Board change events.
//!
//! The board notifies subscribers with a [`BoardEvent`] after every committed
//! mutation. The CLI can forward them as JSON lines to stdout or a file.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};

pub const EVENT_SCHEMA_VERSION: &str = "kb.event.v1";

#[derive(Debug, Clone)]
pub enum EventDestination {
    Stdout,
    File(PathBuf),
}

impl EventDestination {
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        raw.and_then(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return None;
            }
            if trimmed == "-" {
                return Some(EventDestination::Stdout);
            }
            Some(EventDestination::File(PathBuf::from(trimmed)))
        })
    }

    pub fn open(&self) -> Result<EventSink> {
        match self {
            EventDestination::Stdout => Ok(EventSink::stdout()),
            EventDestination::File(path) => EventSink::file(path),
        }
    }
}

/// What changed on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BoardEvent {
    TaskCreated {
        task_id: String,
        status: String,
        index: usize,
    },
    TaskUpdated {
        task_id: String,
        status: String,
    },
    TaskMoved {
        task_id: String,
        from: String,
        to: String,
        index: usize,
    },
    TaskRemoved {
        task_id: String,
        status: String,
    },
    TaskCompletionToggled {
        task_id: String,
        completed: bool,
    },
    TasksImported {
        task_ids: Vec<String>,
        skipped: usize,
    },
    BoardResynced,
    BoardReloaded {
        tasks: usize,
    },
    ExpirationChanged {
        task_ids: Vec<String>,
    },
}

impl BoardEvent {
    /// Id of the single task this event is about, if any.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            BoardEvent::TaskCreated { task_id, .. }
            | BoardEvent::TaskUpdated { task_id, .. }
            | BoardEvent::TaskMoved { task_id, .. }
            | BoardEvent::TaskRemoved { task_id, .. }
            | BoardEvent::TaskCompletionToggled { task_id, .. } => Some(task_id),
            _ => None,
        }
    }
}

/// JSONL envelope around a board event.
#[derive(Debug, Clone, Serialize)]
pub struct Event<'a> {
    pub schema_version: &'static str,
    pub timestamp: DateTime<Utc>,
    pub session: Uuid,
    #[serde(flatten)]
    pub event: &'a BoardEvent,
}

impl<'a> Event<'a> {
    pub fn new(session: Uuid, event: &'a BoardEvent) -> Self {
        Self {
            schema_version: EVENT_SCHEMA_VERSION,
            timestamp: Utc::now(),
            session,
            event,
        }
    }
}

/// Event sink that writes JSONL output to a destination.
pub struct EventSink {
    writer: Box<dyn Write + Send>,
    session: Uuid,
}

impl EventSink {
    pub fn stdout() -> Self {
        Self::from_writer(Box::new(std::io::stdout()))
    }

    /// Append to a file, creating it if necessary.
    pub fn file(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self::from_writer(Box::new(file)))
    }

    pub fn from_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer,
            session: Uuid::new_v4(),
        }
    }

    pub fn session(&self) -> Uuid {
        self.session
    }

    /// Write a single event as JSONL.
    pub fn emit(&mut self, event: &BoardEvent) -> Result<()> {
        let serialized = serde_json::to_vec(&Event::new(self.session, event))?;
        self.writer.write_all(&serialized)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush().map_err(Error::Io)?;
        Ok(())
    }

    /// Turn the sink into a board listener; write failures are logged.
    pub fn into_listener(mut self) -> impl FnMut(&BoardEvent) + 'static {
        move |event| {
            if let Err(err) = self.emit(event) {
                tracing::warn!(error = %err, "failed to write board event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn destination_parse() {
        assert!(EventDestination::parse(None).is_none());
        assert!(EventDestination::parse(Some("  ")).is_none());
        assert!(matches!(
            EventDestination::parse(Some("-")),
            Some(EventDestination::Stdout)
        ));
        assert!(matches!(
            EventDestination::parse(Some("events.jsonl")),
            Some(EventDestination::File(path)) if path == PathBuf::from("events.jsonl")
        ));
    }

    #[test]
    fn file_sink_appends_flattened_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("events.jsonl");
        let mut sink = EventSink::file(&path).unwrap();
        let session = sink.session();

        sink.emit(&BoardEvent::TaskMoved {
            task_id: "card-1".to_string(),
            from: "pending".to_string(),
            to: "done".to_string(),
            index: 0,
        })
        .unwrap();
        let mut listener = sink.into_listener();
        listener(&BoardEvent::BoardResynced);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["schema_version"], EVENT_SCHEMA_VERSION);
        assert_eq!(lines[0]["event"], "task_moved");
        assert_eq!(lines[0]["to"], "done");
        assert_eq!(lines[0]["session"], session.to_string());
        assert_eq!(lines[1]["event"], "board_resynced");
    }

    #[test]
    fn task_id_accessor() {
        let removed = BoardEvent::TaskRemoved {
            task_id: "card-2".to_string(),
            status: "doing".to_string(),
        };
        assert_eq!(removed.task_id(), Some("card-2"));
        assert_eq!(BoardEvent::BoardResynced.task_id(), None);
    }
}
