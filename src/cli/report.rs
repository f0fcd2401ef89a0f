//! Read-only board reports: stats, calendar, due.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::cli::task::task_line;
use crate::cli::{load_context, push_load_warnings, Globals};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::projection::{CalendarMonth, CountField, DueCounts};
use crate::task::{parse_due_date, Task};

pub struct StatsOptions {
    pub globals: Globals,
}

pub struct CalendarOptions {
    pub month: Option<String>,
    pub globals: Globals,
}

pub struct DueOptions {
    pub date: String,
    pub globals: Globals,
}

#[derive(Serialize)]
struct StatsOutput {
    total: usize,
    by_status: BTreeMap<String, usize>,
    by_priority: BTreeMap<String, usize>,
    by_completed: BTreeMap<String, usize>,
    by_tag: BTreeMap<String, usize>,
    due: DueCounts,
}

#[derive(Serialize)]
struct DueOutput {
    date: NaiveDate,
    tasks: Vec<Task>,
}

pub fn run_stats(options: StatsOptions) -> Result<()> {
    let ctx = load_context(&options.globals)?;
    let board = &ctx.board;

    let output = StatsOutput {
        total: board.len(),
        by_status: board.count_by(CountField::Status),
        by_priority: board.count_by(CountField::Priority),
        by_completed: board.count_by(CountField::Completed),
        by_tag: board.count_by(CountField::Tag),
        due: board.due_status_counts(),
    };

    let mut human = HumanOutput::new(format!("Board stats ({} tasks)", output.total));
    push_load_warnings(&mut human, &ctx.load);
    // Columns in display order, including empty ones.
    let by_status = board
        .columns()
        .iter()
        .map(|column| format!("{}={}", column.status, column.len()))
        .collect::<Vec<_>>()
        .join(", ");
    human.push_summary("Status", by_status);
    human.push_summary("Priority", format_counts(&output.by_priority));
    human.push_summary("Completed", format_counts(&output.by_completed));
    if !output.by_tag.is_empty() {
        human.push_summary("Tags", format_counts(&output.by_tag));
    }
    human.push_summary(
        "Due",
        format!(
            "overdue={}, on_time={}, no_date={}",
            output.due.overdue, output.due.on_time, output.due.no_date
        ),
    );

    emit_success(ctx.output(&options.globals), "stats", &output, Some(&human))
}

pub fn run_calendar(options: CalendarOptions) -> Result<()> {
    let ctx = load_context(&options.globals)?;
    let (year, month) = match options.month.as_deref() {
        Some(raw) => parse_month(raw)?,
        None => (ctx.board.today().year(), ctx.board.today().month()),
    };
    let calendar = ctx.board.calendar_month(year, month)?;

    let mut human = HumanOutput::new(format!("Calendar {year}-{month:02}"));
    push_load_warnings(&mut human, &ctx.load);
    for line in render_grid(&calendar, ctx.board.today()) {
        human.push_detail(line);
    }
    for day in calendar.days.iter().filter(|day| !day.task_ids.is_empty()) {
        let titles = day
            .task_ids
            .iter()
            .filter_map(|id| ctx.board.get(id))
            .map(|task| task.title.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        human.push_summary(day.date.format("%Y-%m-%d").to_string(), titles);
    }

    emit_success(ctx.output(&options.globals), "calendar", &calendar, Some(&human))
}

pub fn run_due(options: DueOptions) -> Result<()> {
    let ctx = load_context(&options.globals)?;
    let date = parse_due_date(&options.date)
        .ok_or_else(|| Error::InvalidDueDate(options.date.clone()))?;
    let tasks = ctx.board.tasks_due_on(date);

    let mut human = HumanOutput::new(format!(
        "Due on {} ({})",
        date.format("%Y-%m-%d"),
        tasks.len()
    ));
    push_load_warnings(&mut human, &ctx.load);
    for task in &tasks {
        human.push_detail(task_line(task, &ctx.config.display.due_label));
    }

    let output = DueOutput { date, tasks };
    emit_success(ctx.output(&options.globals), "due", &output, Some(&human))
}

fn parse_month(raw: &str) -> Result<(i32, u32)> {
    let invalid = || Error::InvalidArgument(format!("invalid month '{raw}' (expected YYYY-MM)"));
    let (year, month) = raw.trim().split_once('-').ok_or_else(invalid)?;
    let year = year.parse::<i32>().map_err(|_| invalid())?;
    let month = month.parse::<u32>().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }
    Ok((year, month))
}

fn format_counts(counts: &BTreeMap<String, usize>) -> String {
    counts
        .iter()
        .map(|(key, count)| format!("{key}={count}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Sunday-first text grid; `*` marks days with tasks, brackets mark today.
fn render_grid(calendar: &CalendarMonth, today: NaiveDate) -> Vec<String> {
    let mut lines = vec![" Su  Mo  Tu  We  Th  Fr  Sa ".to_string()];
    let mut cells: Vec<String> = (0..calendar.leading_blanks)
        .map(|_| "    ".to_string())
        .collect();
    for day in &calendar.days {
        let mark = if day.task_ids.is_empty() { ' ' } else { '*' };
        let cell = if day.date == today {
            format!("[{:>2}]", day.date.day())
        } else {
            format!(" {:>2}{mark}", day.date.day())
        };
        cells.push(cell);
    }
    for week in cells.chunks(7) {
        lines.push(week.concat().trim_end().to_string());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::CalendarDay;

    #[test]
    fn month_argument() {
        assert_eq!(parse_month("2024-02").unwrap(), (2024, 2));
        assert_eq!(parse_month(" 2023-12 ").unwrap(), (2023, 12));
        assert!(parse_month("2024-13").is_err());
        assert!(parse_month("2024").is_err());
        assert!(parse_month("feb").is_err());
    }

    #[test]
    fn grid_marks_busy_days_and_today() {
        let first = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let days = first
            .iter_days()
            .take(29)
            .map(|date| CalendarDay {
                date,
                task_ids: if date.day() == 2 {
                    vec!["card-1".to_string()]
                } else {
                    Vec::new()
                },
            })
            .collect();
        let calendar = CalendarMonth {
            year: 2024,
            month: 2,
            leading_blanks: 4,
            days,
        };

        let lines = render_grid(&calendar, NaiveDate::from_ymd_opt(2024, 2, 3).unwrap());
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[1], "                  1   2*[ 3]");
        assert_eq!(lines[5], " 25  26  27  28  29");
    }

    #[test]
    fn counts_are_joined_in_key_order() {
        let mut counts = BTreeMap::new();
        counts.insert("medium".to_string(), 1);
        counts.insert("high".to_string(), 2);
        assert_eq!(format_counts(&counts), "high=2, medium=1");
    }
}
