//! Task commands: add, edit, rm, toggle, move, show, list.

use std::io::{BufRead, Write};
use std::str::FromStr;

use serde::Serialize;

use crate::board::{Board, Submission};
use crate::cli::{load_context, push_load_warnings, Globals};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::projection::{format_due_label, ColumnView, PriorityFilter, SortKey, ViewSpec};
use crate::storage::KeyValueStore;
use crate::task::{Priority, Task, TaskDraft};

pub struct AddOptions {
    pub title: String,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub due: Option<String>,
    pub done: bool,
    pub tags: Vec<String>,
    pub globals: Globals,
}

pub struct EditOptions {
    pub id: String,
    pub title: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub due: Option<String>,
    pub clear_due: bool,
    pub completed: Option<bool>,
    pub tags: Vec<String>,
    pub clear_tags: bool,
    pub globals: Globals,
}

pub struct RmOptions {
    pub id: String,
    pub yes: bool,
    pub globals: Globals,
}

pub struct ToggleOptions {
    pub id: String,
    pub globals: Globals,
}

pub struct MoveOptions {
    pub id: String,
    pub status: String,
    pub index: Option<usize>,
    pub globals: Globals,
}

pub struct ShowOptions {
    pub id: String,
    pub globals: Globals,
}

pub struct ListOptions {
    pub priority: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub hidden: bool,
    pub globals: Globals,
}

#[derive(Serialize)]
struct EditOutput {
    outcome: &'static str,
    task: Task,
}

#[derive(Serialize)]
struct RemoveOutput {
    removed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    task: Option<Task>,
}

#[derive(Serialize)]
struct ListOutput {
    view: ViewSpec,
    columns: Vec<ColumnView>,
}

pub fn run_add(options: AddOptions) -> Result<()> {
    let mut ctx = load_context(&options.globals)?;

    let mut draft = TaskDraft::new(options.title).completed(options.done);
    draft.priority = checked_priority(options.priority.as_deref())?;
    draft.status = checked_status(&ctx.board, options.status.as_deref())?;
    draft.due_date = options.due;
    draft.tags = options.tags;

    let task = ctx.board.create(draft)?;

    let mut human = HumanOutput::new("Task created");
    push_load_warnings(&mut human, &ctx.load);
    push_task_summary(&mut human, &task, &ctx.config.display.due_label);

    emit_success(ctx.output(&options.globals), "add", &task, Some(&human))
}

pub fn run_edit(options: EditOptions) -> Result<()> {
    let mut ctx = load_context(&options.globals)?;

    let existing = ctx.board.get(&options.id).cloned();
    let mut draft = match &existing {
        Some(task) => TaskDraft::from_task(task),
        None => TaskDraft::default(),
    };
    if let Some(title) = options.title {
        draft.title = title;
    }
    if let Some(priority) = checked_priority(options.priority.as_deref())? {
        draft.priority = Some(priority);
    }
    if let Some(status) = checked_status(&ctx.board, options.status.as_deref())? {
        draft.status = Some(status);
    }
    if options.clear_due {
        draft.due_date = None;
    } else if let Some(due) = options.due {
        draft.due_date = Some(due);
    }
    if let Some(completed) = options.completed {
        draft.completed = completed;
    }
    if options.clear_tags {
        draft.tags.clear();
    }
    draft.tags.extend(options.tags);

    let submission = ctx.board.submit(Some(options.id.as_str()), draft)?;

    let mut human = match &submission {
        Submission::Updated(_) => HumanOutput::new("Task updated"),
        Submission::Created(_) => {
            let mut human = HumanOutput::new("Task created");
            human.push_warning(format!(
                "task '{}' no longer exists; saved as a new task",
                options.id
            ));
            human
        }
    };
    push_load_warnings(&mut human, &ctx.load);
    push_task_summary(&mut human, submission.task(), &ctx.config.display.due_label);

    let output = EditOutput {
        outcome: match submission {
            Submission::Updated(_) => "updated",
            Submission::Created(_) => "created",
        },
        task: submission.into_task(),
    };

    emit_success(ctx.output(&options.globals), "edit", &output, Some(&human))
}

pub fn run_rm(options: RmOptions) -> Result<()> {
    let mut ctx = load_context(&options.globals)?;

    let title = ctx
        .board
        .get(&options.id)
        .map(|task| task.title.clone())
        .ok_or_else(|| Error::NotFound(options.id.clone()))?;

    if !options.yes && !confirm(&format!("Delete task '{title}'?"))? {
        let mut human = HumanOutput::new("Deletion cancelled");
        human.push_summary("ID", options.id.clone());
        let output = RemoveOutput {
            removed: false,
            task: None,
        };
        return emit_success(ctx.output(&options.globals), "rm", &output, Some(&human));
    }

    let task = ctx.board.remove(&options.id)?;

    let mut human = HumanOutput::new("Task deleted");
    push_load_warnings(&mut human, &ctx.load);
    human.push_summary("ID", task.id.clone());
    human.push_summary("Title", task.title.clone());

    let output = RemoveOutput {
        removed: true,
        task: Some(task),
    };
    emit_success(ctx.output(&options.globals), "rm", &output, Some(&human))
}

pub fn run_toggle(options: ToggleOptions) -> Result<()> {
    let mut ctx = load_context(&options.globals)?;
    let task = ctx.board.toggle_completed(&options.id)?;

    let header = if task.completed {
        "Task completed"
    } else {
        "Task reopened"
    };
    let mut human = HumanOutput::new(header);
    push_load_warnings(&mut human, &ctx.load);
    human.push_summary("ID", task.id.clone());
    human.push_summary("Completed", task.completed.to_string());

    emit_success(ctx.output(&options.globals), "toggle", &task, Some(&human))
}

pub fn run_move(options: MoveOptions) -> Result<()> {
    let mut ctx = load_context(&options.globals)?;
    let index = options.index.unwrap_or(usize::MAX);
    let task = ctx.board.move_to(&options.id, &options.status, index)?;

    let position = ctx
        .board
        .position(&task.id)
        .map(|(_, index)| index)
        .unwrap_or_default();

    let mut human = HumanOutput::new("Task moved");
    push_load_warnings(&mut human, &ctx.load);
    human.push_summary("ID", task.id.clone());
    human.push_summary("Status", task.status.to_string());
    human.push_summary("Position", position.to_string());

    emit_success(ctx.output(&options.globals), "move", &task, Some(&human))
}

pub fn run_show(options: ShowOptions) -> Result<()> {
    let ctx = load_context(&options.globals)?;
    let task = ctx
        .board
        .get(&options.id)
        .cloned()
        .ok_or_else(|| Error::NotFound(options.id.clone()))?;

    let mut human = HumanOutput::new(format!("Task {}", task.id));
    push_load_warnings(&mut human, &ctx.load);
    push_task_summary(&mut human, &task, &ctx.config.display.due_label);

    emit_success(ctx.output(&options.globals), "show", &task, Some(&human))
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let ctx = load_context(&options.globals)?;

    let spec = ViewSpec {
        priority_filter: options
            .priority
            .as_deref()
            .map(PriorityFilter::from_str)
            .transpose()?
            .unwrap_or_default(),
        search_text: options.search.unwrap_or_default(),
        sort_key: options
            .sort
            .as_deref()
            .map(SortKey::from_str)
            .transpose()?
            .unwrap_or_default(),
    };
    let columns = ctx.board.view(&spec);

    let mut human = HumanOutput::new(format!("Tasks ({})", ctx.board.len()));
    push_load_warnings(&mut human, &ctx.load);
    if !spec.is_identity() {
        human.push_summary("Priority", spec.priority_filter.label());
        if !spec.search_text.trim().is_empty() {
            human.push_summary("Search", spec.search_text.trim());
        }
        human.push_summary("Sort", spec.sort_key.as_str());
    }
    for column in &columns {
        let hidden = column.suppressed.len();
        let heading = if hidden > 0 && !options.hidden {
            format!("{} ({}, {} hidden)", column.title, column.visible.len(), hidden)
        } else {
            format!("{} ({})", column.title, column.visible.len())
        };
        human.push_detail(heading);
        for task in &column.visible {
            human.push_detail(format!("  {}", task_line(task, &ctx.config.display.due_label)));
        }
        if options.hidden {
            for task in &column.suppressed {
                human.push_detail(format!(
                    "  (hidden) {}",
                    task_line(task, &ctx.config.display.due_label)
                ));
            }
        }
    }
    if ctx.board.is_empty() {
        human.push_next_step("kb add \"first task\"");
    }

    let output = ListOutput { view: spec, columns };
    emit_success(ctx.output(&options.globals), "list", &output, Some(&human))
}

fn checked_priority(raw: Option<&str>) -> Result<Option<String>> {
    raw.map(|value| Priority::from_str(value).map(|p| p.as_str().to_string()))
        .transpose()
}

/// Command-line statuses must name a column; only stored data is coerced.
fn checked_status<S: KeyValueStore>(board: &Board<S>, raw: Option<&str>) -> Result<Option<String>> {
    raw.map(|value| board.rules().column(value).map(|status| status.to_string()))
        .transpose()
}

fn confirm(prompt: &str) -> Result<bool> {
    let mut stderr = std::io::stderr();
    write!(stderr, "{prompt} [y/N] ")?;
    stderr.flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn push_task_summary(human: &mut HumanOutput, task: &Task, due_label: &str) {
    human.push_summary("ID", task.id.clone());
    human.push_summary("Title", task.title.clone());
    human.push_summary("Status", task.status.to_string());
    human.push_summary("Priority", task.priority.as_str());
    if let Some(due) = task.due_date {
        let mut label = format_due_label(due, due_label);
        if task.expired {
            label.push_str(" (overdue)");
        }
        human.push_summary("Due", label);
    }
    human.push_summary("Completed", task.completed.to_string());
    if !task.tags.is_empty() {
        human.push_summary("Tags", task.tags.join(", "));
    }
}

pub(crate) fn task_line(task: &Task, due_label: &str) -> String {
    let mut line = format!(
        "{} {} {} [{}]",
        if task.completed { "[x]" } else { "[ ]" },
        task.id,
        task.title,
        task.priority
    );
    if let Some(due) = task.due_date {
        line.push_str(&format!(" {}", format_due_label(due, due_label)));
        if task.expired {
            line.push_str(" (overdue)");
        }
    }
    for tag in &task.tags {
        line.push_str(&format!(" #{tag}"));
    }
    line
}
