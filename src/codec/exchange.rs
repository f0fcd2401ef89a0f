//! CSV exchange format.
//!
//! Header `id,title,priority,status,dueDate,completed,tags`. Text fields are
//! always quoted with doubled-quote escaping; `dueDate` and `completed` are
//! bare. Tags are joined with `;`. Records end with `\n`.
//!
//! Decoding accepts `\r\n`, `\n` and bare `\r` line endings, headers in any
//! column order, and header-less files. Broken rows are skipped and reported.

use chrono::NaiveDate;
use serde::Serialize;

use super::{parse_flag, DecodedRecord};
use crate::error::Error;
use crate::task::{Task, TaskDraft};

pub const HEADER: [&str; 7] = [
    "id",
    "title",
    "priority",
    "status",
    "dueDate",
    "completed",
    "tags",
];

const TAG_DELIMITER: &str = ";";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    Title,
    Priority,
    Status,
    DueDate,
    Completed,
    Tags,
}

const CANONICAL: [Field; 7] = [
    Field::Id,
    Field::Title,
    Field::Priority,
    Field::Status,
    Field::DueDate,
    Field::Completed,
    Field::Tags,
];

impl Field {
    fn from_header(name: &str) -> Option<Field> {
        match name.trim().to_ascii_lowercase().as_str() {
            "id" => Some(Field::Id),
            "title" => Some(Field::Title),
            "priority" => Some(Field::Priority),
            "status" => Some(Field::Status),
            "duedate" | "due_date" | "due" => Some(Field::DueDate),
            "completed" | "concluida" => Some(Field::Completed),
            "tags" => Some(Field::Tags),
            _ => None,
        }
    }
}

/// Suggested file name for an export made on `date`.
pub fn export_file_name(date: NaiveDate) -> String {
    format!("kanban-tasks-{}.csv", date.format("%Y-%m-%d"))
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Encode tasks in the order given, header first.
pub fn encode<'a, I>(tasks: I) -> String
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut out = HEADER.join(",");
    out.push('\n');
    for task in tasks {
        let due = task
            .due_date
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        let row = [
            quote(&task.id),
            quote(&task.title),
            quote(task.priority.as_str()),
            quote(task.status.as_str()),
            due,
            task.completed.to_string(),
            quote(&task.tags.join(TAG_DELIMITER)),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// A row that could not be imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    /// 1-based line where the record starts
    pub line: usize,
    pub reason: String,
}

impl From<SkippedRow> for Error {
    fn from(row: SkippedRow) -> Self {
        Error::MalformedImportRow {
            line: row.line,
            reason: row.reason,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExchangeDecode {
    pub records: Vec<DecodedRecord>,
    pub skipped: Vec<SkippedRow>,
}

/// Decode a CSV document. Never fails as a whole; bad rows land in `skipped`.
pub fn decode(raw: &str, placeholder_title: &str) -> ExchangeDecode {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let mut decoded = ExchangeDecode::default();
    let mut layout: Option<Vec<Option<Field>>> = None;

    for record in tokenize(raw) {
        if let Some(reason) = record.error {
            tracing::warn!(line = record.line, %reason, "skipping import row");
            decoded.skipped.push(SkippedRow {
                line: record.line,
                reason,
            });
            continue;
        }
        if record.is_blank() {
            continue;
        }

        if layout.is_none() {
            let named: Vec<Option<Field>> = record
                .fields
                .iter()
                .map(|name| Field::from_header(name))
                .collect();
            if named.iter().any(Option::is_some) {
                layout = Some(named);
                continue;
            }
            tracing::debug!("no header row, reading columns in canonical order");
            layout = Some(CANONICAL.iter().copied().map(Some).collect());
        }
        let Some(columns) = layout.as_ref() else {
            continue;
        };

        if record.fields.len() > columns.len() {
            let reason = format!(
                "expected at most {} fields, found {}",
                columns.len(),
                record.fields.len()
            );
            tracing::warn!(line = record.line, %reason, "skipping import row");
            decoded.skipped.push(SkippedRow {
                line: record.line,
                reason,
            });
            continue;
        }

        decoded
            .records
            .push(build_record(columns, &record.fields, placeholder_title));
    }

    decoded
}

fn build_record(columns: &[Option<Field>], fields: &[String], placeholder_title: &str) -> DecodedRecord {
    let mut id = None;
    let mut draft = TaskDraft::default();

    for (column, value) in columns.iter().zip(fields) {
        let Some(column) = column else { continue };
        let trimmed = value.trim();
        let text = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        match column {
            Field::Id => id = text,
            Field::Title => draft.title = text.unwrap_or_default(),
            Field::Priority => draft.priority = text,
            Field::Status => draft.status = text,
            Field::DueDate => draft.due_date = text,
            Field::Completed => draft.completed = parse_flag(trimmed),
            Field::Tags => {
                draft.tags = trimmed
                    .split(TAG_DELIMITER)
                    .map(str::trim)
                    .filter(|tag| !tag.is_empty())
                    .map(str::to_string)
                    .collect()
            }
        }
    }

    if draft.title.is_empty() {
        draft.title = placeholder_title.to_string();
    }
    DecodedRecord { id, draft }
}

#[derive(Debug)]
struct RawRecord {
    line: usize,
    fields: Vec<String>,
    quoted: bool,
    error: Option<String>,
}

impl RawRecord {
    fn is_blank(&self) -> bool {
        !self.quoted && self.fields.len() == 1 && self.fields[0].trim().is_empty()
    }
}

/// RFC 4180 tokenizer. Line breaks inside quotes become `\n`.
fn tokenize(input: &str) -> Vec<RawRecord> {
    let mut records = Vec::new();
    let mut chars = input.chars().peekable();

    let mut fields: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut quoted = false;
    let mut line = 1;
    let mut record_line = 1;

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\r' | '\n' => {
                    if ch == '\r' && chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    field.push('\n');
                    line += 1;
                }
                _ => field.push(ch),
            }
            continue;
        }

        match ch {
            // Spaces before an opening quote are padding.
            '"' if field.trim().is_empty() => {
                field.clear();
                in_quotes = true;
                quoted = true;
            }
            ',' => fields.push(std::mem::take(&mut field)),
            '\r' | '\n' => {
                if ch == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                fields.push(std::mem::take(&mut field));
                records.push(RawRecord {
                    line: record_line,
                    fields: std::mem::take(&mut fields),
                    quoted,
                    error: None,
                });
                quoted = false;
                line += 1;
                record_line = line;
            }
            _ => field.push(ch),
        }
    }

    if in_quotes {
        records.push(RawRecord {
            line: record_line,
            fields: Vec::new(),
            quoted: true,
            error: Some("unterminated quoted field".to_string()),
        });
    } else if quoted || !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        records.push(RawRecord {
            line: record_line,
            fields,
            quoted,
            error: None,
        });
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Priority, Status};

    const PLACEHOLDER: &str = "Untitled task";

    fn task(id: &str, title: &str) -> Task {
        Task {
            id: id.to_string(),
            title: title.to_string(),
            priority: Priority::Medium,
            status: Status::new("pending"),
            due_date: None,
            completed: false,
            tags: Vec::new(),
            expired: false,
        }
    }

    #[test]
    fn encode_quotes_text_fields_only() {
        let mut first = task("card-1", "hello, \"world\"");
        first.due_date = NaiveDate::from_ymd_opt(2024, 3, 9);
        first.tags = vec!["a".to_string(), "b".to_string()];
        first.completed = true;

        let csv = encode([&first]);
        assert_eq!(
            csv,
            "id,title,priority,status,dueDate,completed,tags\n\
             \"card-1\",\"hello, \"\"world\"\"\",\"medium\",\"pending\",2024-03-09,true,\"a;b\"\n"
        );
    }

    #[test]
    fn decode_reads_what_encode_writes() {
        let mut multi = task("card-2", "line one\nline two");
        multi.tags = vec!["x".to_string()];
        let csv = encode([&task("card-1", "plain"), &multi]);

        let decoded = decode(&csv, PLACEHOLDER);
        assert!(decoded.skipped.is_empty());
        assert_eq!(decoded.records.len(), 2);
        assert_eq!(decoded.records[1].id.as_deref(), Some("card-2"));
        assert_eq!(decoded.records[1].draft.title, "line one\nline two");
        assert_eq!(decoded.records[1].draft.tags, vec!["x"]);
        assert_eq!(decoded.records[1].draft.priority.as_deref(), Some("medium"));
    }

    #[test]
    fn embedded_comma_does_not_split() {
        let csv = "id,title,priority,status,dueDate,completed,tags\n\"\",\"hello, world\",,,,,\n";
        let decoded = decode(csv, PLACEHOLDER);
        assert_eq!(decoded.records.len(), 1);
        assert_eq!(decoded.records[0].draft.title, "hello, world");
        assert_eq!(decoded.records[0].id, None);
    }

    #[test]
    fn spaces_before_an_opening_quote_are_ignored() {
        let decoded = decode("id,title\n1, \"hello, world\"\n", PLACEHOLDER);
        assert_eq!(decoded.records.len(), 1);
        assert!(decoded.skipped.is_empty());
        assert_eq!(decoded.records[0].draft.title, "hello, world");
        assert_eq!(decoded.records[0].id.as_deref(), Some("1"));
    }

    #[test]
    fn all_line_endings_decode_the_same() {
        let unix = "id,title\n\"1\",\"a\nb\"\n\"2\",\"c\"\n";
        let windows = unix.replace('\n', "\r\n");
        let classic = unix.replace('\n', "\r");

        for input in [unix.to_string(), windows, classic] {
            let decoded = decode(&input, PLACEHOLDER);
            let titles: Vec<&str> = decoded
                .records
                .iter()
                .map(|record| record.draft.title.as_str())
                .collect();
            assert_eq!(titles, vec!["a\nb", "c"], "input {input:?}");
            assert!(decoded.skipped.is_empty());
        }
    }

    #[test]
    fn header_columns_in_any_order() {
        let csv = "Tags,Title,Completed,Extra\n\"a; b\",\"Reorder\",TRUE,ignored\n";
        let decoded = decode(csv, PLACEHOLDER);
        let record = &decoded.records[0];
        assert_eq!(record.draft.title, "Reorder");
        assert!(record.draft.completed);
        assert_eq!(record.draft.tags, vec!["a", "b"]);
        assert_eq!(record.draft.priority, None);
    }

    #[test]
    fn header_less_files_use_canonical_order() {
        let csv = "\"card-9\",\"No header\",\"high\",\"done\",2024-01-01,false,\"\"\n";
        let decoded = decode(csv, PLACEHOLDER);
        let record = &decoded.records[0];
        assert_eq!(record.id.as_deref(), Some("card-9"));
        assert_eq!(record.draft.title, "No header");
        assert_eq!(record.draft.status.as_deref(), Some("done"));
        assert_eq!(record.draft.due_date.as_deref(), Some("2024-01-01"));
        assert!(record.draft.tags.is_empty());
    }

    #[test]
    fn missing_title_gets_placeholder_and_blank_lines_are_ignored() {
        let csv = "id,title,priority\n\n\"card-1\",,\"low\"\n   \n";
        let decoded = decode(csv, PLACEHOLDER);
        assert_eq!(decoded.records.len(), 1);
        assert_eq!(decoded.records[0].draft.title, PLACEHOLDER);
    }

    #[test]
    fn bad_rows_are_skipped_with_line_numbers() {
        let csv = "id,title\n\"1\",\"ok\"\n\"2\",\"too\",\"many\"\n\"3\",\"fine\"\n\"4\",\"open\n";
        let decoded = decode(csv, PLACEHOLDER);

        let titles: Vec<&str> = decoded
            .records
            .iter()
            .map(|record| record.draft.title.as_str())
            .collect();
        assert_eq!(titles, vec!["ok", "fine"]);
        assert_eq!(decoded.skipped.len(), 2);
        assert_eq!(decoded.skipped[0].line, 3);
        assert!(decoded.skipped[0].reason.contains("at most 2"));
        assert_eq!(decoded.skipped[1].line, 5);
        assert_eq!(decoded.skipped[1].reason, "unterminated quoted field");

        let err: Error = decoded.skipped[1].clone().into();
        assert!(matches!(err, Error::MalformedImportRow { line: 5, .. }));
    }

    #[test]
    fn line_numbers_count_breaks_inside_quotes() {
        let csv = "id,title\n\"1\",\"a\r\nb\"\n\"2\",\"x\",\"y\"\n";
        let decoded = decode(csv, PLACEHOLDER);
        assert_eq!(decoded.skipped[0].line, 4);
    }

    #[test]
    fn export_name_embeds_date() {
        let date = NaiveDate::from_ymd_opt(2024, 7, 4).unwrap();
        assert_eq!(export_file_name(date), "kanban-tasks-2024-07-04.csv");
    }
}
