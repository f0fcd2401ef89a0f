//! Read-only views over the board: filtered and sorted columns, aggregate
//! counts, and calendar month data.
//!
//! Nothing here mutates the board; every result owns cloned tasks.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::str::FromStr;

use chrono::format::{Item, StrftimeItems};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::board::{Board, Column};
use crate::error::{Error, Result};
use crate::expiry::DueStatus;
use crate::storage::KeyValueStore;
use crate::task::{Priority, Status, Task};

pub const DEFAULT_DUE_LABEL: &str = "Due: %d/%m/%Y";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityFilter {
    #[default]
    All,
    Only(Priority),
}

impl PriorityFilter {
    pub fn matches(&self, priority: Priority) -> bool {
        match self {
            PriorityFilter::All => true,
            PriorityFilter::Only(only) => *only == priority,
        }
    }

    /// all -> low -> medium -> high -> all
    pub fn next(&self) -> PriorityFilter {
        match self {
            PriorityFilter::All => PriorityFilter::Only(Priority::Low),
            PriorityFilter::Only(Priority::High) => PriorityFilter::All,
            PriorityFilter::Only(priority) => PriorityFilter::Only(priority.next()),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PriorityFilter::All => "all",
            PriorityFilter::Only(priority) => priority.as_str(),
        }
    }
}

impl FromStr for PriorityFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(PriorityFilter::All);
        }
        s.parse::<Priority>().map(PriorityFilter::Only)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    #[default]
    None,
    Priority,
    DueDateAsc,
    DueDateDesc,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::None => "none",
            SortKey::Priority => "priority",
            SortKey::DueDateAsc => "due-asc",
            SortKey::DueDateDesc => "due-desc",
        }
    }

    pub fn next(&self) -> SortKey {
        match self {
            SortKey::None => SortKey::Priority,
            SortKey::Priority => SortKey::DueDateAsc,
            SortKey::DueDateAsc => SortKey::DueDateDesc,
            SortKey::DueDateDesc => SortKey::None,
        }
    }
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(SortKey::None),
            "priority" => Ok(SortKey::Priority),
            "due-asc" | "due" => Ok(SortKey::DueDateAsc),
            "due-desc" => Ok(SortKey::DueDateDesc),
            other => Err(Error::InvalidArgument(format!(
                "unknown sort '{other}' (expected none, priority, due-asc or due-desc)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewSpec {
    pub priority_filter: PriorityFilter,
    pub search_text: String,
    pub sort_key: SortKey,
}

impl ViewSpec {
    pub fn is_identity(&self) -> bool {
        self.priority_filter == PriorityFilter::All
            && self.search_text.trim().is_empty()
            && self.sort_key == SortKey::None
    }

    pub fn matches(&self, task: &Task) -> bool {
        if !self.priority_filter.matches(task.priority) {
            return false;
        }
        let needle = self.search_text.trim();
        needle.is_empty() || task.title.to_lowercase().contains(&needle.to_lowercase())
    }
}

/// One column as rendered under a view spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnView {
    pub status: Status,
    pub title: String,
    pub visible: Vec<Task>,
    pub suppressed: Vec<Task>,
}

pub fn project(columns: &[Column], spec: &ViewSpec) -> Vec<ColumnView> {
    columns
        .iter()
        .map(|column| {
            let (mut visible, suppressed): (Vec<Task>, Vec<Task>) = column
                .tasks
                .iter()
                .cloned()
                .partition(|task| spec.matches(task));
            sort_tasks(&mut visible, spec.sort_key);
            ColumnView {
                status: column.status.clone(),
                title: column.title.clone(),
                visible,
                suppressed,
            }
        })
        .collect()
}

/// Stable sort; undated tasks go last for both due-date directions.
pub fn sort_tasks(tasks: &mut [Task], key: SortKey) {
    match key {
        SortKey::None => {}
        SortKey::Priority => tasks.sort_by_key(|task| task.priority.rank()),
        SortKey::DueDateAsc => tasks.sort_by(|a, b| match (a.due_date, b.due_date) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }),
        SortKey::DueDateDesc => tasks.sort_by(|a, b| match (a.due_date, b.due_date) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CountField {
    Status,
    Priority,
    Completed,
    Tag,
}

impl FromStr for CountField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "status" => Ok(CountField::Status),
            "priority" => Ok(CountField::Priority),
            "completed" => Ok(CountField::Completed),
            "tag" | "tags" => Ok(CountField::Tag),
            other => Err(Error::InvalidArgument(format!(
                "unknown count field '{other}'"
            ))),
        }
    }
}

/// Bucket name for tasks with no tags.
pub const NO_TAG_BUCKET: &str = "none";

pub fn count_by<'a, I>(tasks: I, field: CountField) -> BTreeMap<String, usize>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut counts = BTreeMap::new();
    for task in tasks {
        match field {
            CountField::Status => *counts.entry(task.status.to_string()).or_insert(0) += 1,
            CountField::Priority => {
                *counts.entry(task.priority.as_str().to_string()).or_insert(0) += 1
            }
            CountField::Completed => *counts.entry(task.completed.to_string()).or_insert(0) += 1,
            CountField::Tag if task.tags.is_empty() => {
                *counts.entry(NO_TAG_BUCKET.to_string()).or_insert(0) += 1
            }
            CountField::Tag => {
                for tag in &task.tags {
                    *counts.entry(tag.clone()).or_insert(0) += 1;
                }
            }
        }
    }
    counts
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DueCounts {
    pub overdue: usize,
    pub on_time: usize,
    pub no_date: usize,
}

pub fn due_status_counts<'a, I>(tasks: I, today: NaiveDate) -> DueCounts
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut counts = DueCounts::default();
    for task in tasks {
        match DueStatus::classify(task.due_date, today) {
            DueStatus::Overdue => counts.overdue += 1,
            DueStatus::OnTime => counts.on_time += 1,
            DueStatus::NoDate => counts.no_date += 1,
        }
    }
    counts
}

pub fn tasks_due_on<'a, I>(tasks: I, date: NaiveDate) -> Vec<Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    tasks
        .into_iter()
        .filter(|task| task.due_date == Some(date))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub task_ids: Vec<String>,
}

/// Month grid data; weeks start on Sunday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarMonth {
    pub year: i32,
    pub month: u32,
    /// Empty cells before the first day
    pub leading_blanks: u32,
    pub days: Vec<CalendarDay>,
}

pub fn calendar_month<'a, I>(tasks: I, year: i32, month: u32) -> Result<CalendarMonth>
where
    I: IntoIterator<Item = &'a Task>,
{
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| Error::InvalidArgument(format!("invalid month {year}-{month:02}")))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| Error::InvalidArgument(format!("invalid month {year}-{month:02}")))?;

    let mut days: Vec<CalendarDay> = first
        .iter_days()
        .take_while(|date| *date < next)
        .map(|date| CalendarDay {
            date,
            task_ids: Vec::new(),
        })
        .collect();

    for task in tasks {
        let Some(due) = task.due_date else { continue };
        if due.year() == year && due.month() == month {
            days[due.day0() as usize].task_ids.push(task.id.clone());
        }
    }

    Ok(CalendarMonth {
        year,
        month,
        leading_blanks: first.weekday().num_days_from_sunday(),
        days,
    })
}

/// Whether `format` is a usable chrono strftime pattern.
pub fn is_valid_date_format(format: &str) -> bool {
    StrftimeItems::new(format).all(|item| !matches!(item, Item::Error))
}

/// Render a due date label; an unusable format falls back to the default.
pub fn format_due_label(date: NaiveDate, format: &str) -> String {
    let format = if is_valid_date_format(format) {
        format
    } else {
        DEFAULT_DUE_LABEL
    };
    let mut out = String::new();
    if write!(out, "{}", date.format(format)).is_err() {
        return date.format("%Y-%m-%d").to_string();
    }
    out
}

// =============================================================================
// Board conveniences
// =============================================================================

impl<S: KeyValueStore> Board<S> {
    pub fn view(&self, spec: &ViewSpec) -> Vec<ColumnView> {
        project(self.columns(), spec)
    }

    pub fn count_by(&self, field: CountField) -> BTreeMap<String, usize> {
        count_by(self.tasks(), field)
    }

    pub fn due_status_counts(&self) -> DueCounts {
        due_status_counts(self.tasks(), self.today())
    }

    pub fn tasks_due_on(&self, date: NaiveDate) -> Vec<Task> {
        tasks_due_on(self.tasks(), date)
    }

    pub fn calendar_month(&self, year: i32, month: u32) -> Result<CalendarMonth> {
        calendar_month(self.tasks(), year, month)
    }
}
