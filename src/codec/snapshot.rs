//! Storage snapshot: a JSON array of flat task records in canonical order.
//!
//! ```json
//! [{"id":"card-01j...","title":"Pay rent","priority":"high","status":"pending",
//!   "dueDate":"2024-05-01","completed":false,"tags":["home"]}]
//! ```
//!
//! Decoding accepts the field spellings and loose types of older boards.

use serde::Serialize;
use serde_json::{Map, Value};

use super::{parse_flag, DecodedRecord};
use crate::error::{Error, Result};
use crate::task::{Priority, Task, TaskDraft};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotRecord<'a> {
    id: &'a str,
    title: &'a str,
    priority: Priority,
    status: &'a str,
    due_date: Option<String>,
    completed: bool,
    tags: &'a [String],
}

impl<'a> From<&'a Task> for SnapshotRecord<'a> {
    fn from(task: &'a Task) -> Self {
        Self {
            id: &task.id,
            title: &task.title,
            priority: task.priority,
            status: task.status.as_str(),
            due_date: task.due_date.map(|date| date.format("%Y-%m-%d").to_string()),
            completed: task.completed,
            tags: &task.tags,
        }
    }
}

/// Encode tasks in the order given.
pub fn encode<'a, I>(tasks: I) -> Result<String>
where
    I: IntoIterator<Item = &'a Task>,
{
    let records: Vec<SnapshotRecord<'_>> = tasks.into_iter().map(SnapshotRecord::from).collect();
    Ok(serde_json::to_string(&records)?)
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotDecode {
    pub records: Vec<DecodedRecord>,
    /// Array elements that were not objects
    pub skipped: usize,
}

/// Decode a stored snapshot. Anything but a JSON array is `MalformedPersistedData`.
pub fn decode(raw: &str, placeholder_title: &str) -> Result<SnapshotDecode> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|err| Error::MalformedPersistedData(format!("invalid JSON: {err}")))?;
    let Value::Array(items) = value else {
        return Err(Error::MalformedPersistedData(format!(
            "expected a JSON array, found {}",
            kind_of(&value)
        )));
    };

    let mut decoded = SnapshotDecode::default();
    for (index, item) in items.iter().enumerate() {
        match item {
            Value::Object(fields) => decoded
                .records
                .push(decode_record(fields, placeholder_title)),
            other => {
                tracing::warn!(index, kind = kind_of(other), "skipping non-object snapshot entry");
                decoded.skipped += 1;
            }
        }
    }
    Ok(decoded)
}

fn decode_record(fields: &Map<String, Value>, placeholder_title: &str) -> DecodedRecord {
    let id = fields.get("id").and_then(scalar_text);
    let title = fields
        .get("title")
        .and_then(scalar_text)
        .unwrap_or_else(|| placeholder_title.to_string());
    let due_date = ["dueDate", "due_date"]
        .iter()
        .find_map(|key| fields.get(*key))
        .and_then(scalar_text);
    let completed = ["completed", "concluida"]
        .iter()
        .find_map(|key| fields.get(*key))
        .map(|value| match value {
            Value::Bool(flag) => *flag,
            Value::String(text) => parse_flag(text),
            Value::Number(n) => n.as_i64().map(|n| n != 0).unwrap_or(false),
            _ => false,
        })
        .unwrap_or(false);
    let tags = match fields.get("tags") {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
        Some(other) => scalar_text(other).into_iter().collect(),
        None => Vec::new(),
    };

    DecodedRecord {
        id,
        draft: TaskDraft {
            title,
            priority: fields.get("priority").and_then(scalar_text),
            status: fields.get("status").and_then(scalar_text),
            due_date,
            completed,
            tags,
        },
    }
}

/// Non-blank string or number as text.
fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
