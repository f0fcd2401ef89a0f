use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use crate::projection::{format_due_label, ColumnView};
use crate::storage::KeyValueStore;
use crate::task::{Priority, Task};

use super::app::{AppState, DeleteConfirmState, StatusKind};
use super::editor::{EditorFieldId, EditorKind, EditorState};
use super::layout::{BoardLayout, ColumnLayout};

const HELP_KEY_WIDTH: usize = 10;
const EDITOR_LABEL_WIDTH: usize = 10;
const COLOR_TEXT: Color = Color::Rgb(234, 236, 239);
const COLOR_MUTED: Color = Color::Rgb(160, 165, 172);
const COLOR_MUTED_DARK: Color = Color::Rgb(118, 124, 130);
const COLOR_INFO: Color = Color::Rgb(116, 198, 219);
const COLOR_WARNING: Color = Color::Rgb(244, 200, 98);
const COLOR_ERROR: Color = Color::Rgb(255, 107, 107);
const COLOR_SUCCESS: Color = Color::Rgb(126, 210, 146);
const COLOR_ACCENT: Color = Color::Rgb(122, 170, 255);
const COLOR_BORDER_COLUMN: Color = Color::Rgb(92, 126, 166);
const COLOR_BORDER_ACTIVE: Color = Color::Rgb(180, 156, 92);

pub fn render<S: KeyValueStore>(frame: &mut Frame, app: &mut AppState<S>) {
    let area = frame.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(3),
            ]
            .as_ref(),
        )
        .split(area);
    let header = chunks[0];
    let main = chunks[1];
    let footer = chunks[2];

    render_header(frame, app, header);

    let layout = BoardLayout::compute(main, &app.views, app.focus());
    for (col, (column, view)) in layout.columns.iter().zip(&app.views).enumerate() {
        render_column(frame, app, col, column, view);
    }
    render_drag_marker(frame, app, &layout);
    app.layout = layout;

    render_footer(frame, app, footer);

    if let Some(editor) = app.editor.as_ref() {
        render_editor_modal(frame, area, editor);
    }
    if let Some(state) = app.delete_confirm.as_ref() {
        render_delete_confirm_modal(frame, area, state);
    }
    if app.show_help {
        render_help_modal(frame, area);
    }
}

fn render_header<S: KeyValueStore>(frame: &mut Frame, app: &AppState<S>, area: Rect) {
    let spec = &app.spec;
    let search = if app.search_active {
        format!("search: {}_", spec.search_text)
    } else if spec.search_text.is_empty() {
        "search: -".to_string()
    } else {
        format!("search: {}", spec.search_text)
    };
    let spans = vec![
        Span::styled(
            "kb",
            Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(
            format!("priority: {}", spec.priority_filter.label()),
            Style::default().fg(COLOR_WARNING),
        ),
        Span::raw("  "),
        Span::styled(search, Style::default().fg(COLOR_INFO)),
        Span::raw("  "),
        Span::styled(
            format!("sort: {}", spec.sort_key.as_str()),
            Style::default().fg(COLOR_SUCCESS),
        ),
        Span::raw("  "),
        Span::styled(
            app.board.today().format("%Y-%m-%d").to_string(),
            Style::default().fg(COLOR_MUTED_DARK),
        ),
    ];
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_column<S: KeyValueStore>(
    frame: &mut Frame,
    app: &AppState<S>,
    col: usize,
    column: &ColumnLayout,
    view: &ColumnView,
) {
    let focused = app.selected_column == col;
    let hidden = view.suppressed.len();
    let title = if hidden > 0 {
        format!(" {} ({}, {} hidden) ", view.title, view.visible.len(), hidden)
    } else {
        format!(" {} ({}) ", view.title, view.visible.len())
    };
    let border = if focused {
        COLOR_BORDER_ACTIVE
    } else {
        COLOR_BORDER_COLUMN
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(border));
    frame.render_widget(block, column.area);

    if column.cards.is_empty() {
        let text = if hidden > 0 { "No matches" } else { "No tasks" };
        let empty = Paragraph::new(Line::from(Span::styled(
            text,
            Style::default().fg(COLOR_MUTED_DARK),
        )));
        let row = Rect::new(
            column.inner.x,
            column.inner.y,
            column.inner.width,
            column.inner.height.min(1),
        );
        frame.render_widget(empty, row);
        return;
    }

    let width = column.inner.width as usize;
    for card in &column.cards {
        let Some(task) = view.visible.get(card.index) else {
            continue;
        };
        let selected = focused && app.selected_card == card.index;
        let dragging = app
            .drag
            .as_ref()
            .is_some_and(|drag| drag.task_id() == task.id);
        let lines = card_lines(task, &app.due_label, width, selected, dragging);
        frame.render_widget(Paragraph::new(lines), card.area);
    }
}

fn card_lines(
    task: &Task,
    due_label: &str,
    width: usize,
    selected: bool,
    dragging: bool,
) -> Vec<Line<'static>> {
    let check = if task.completed { "[x] " } else { "[ ] " };
    let mut title_style = Style::default().fg(COLOR_TEXT).add_modifier(Modifier::BOLD);
    if task.completed {
        title_style = title_style
            .fg(COLOR_MUTED)
            .add_modifier(Modifier::CROSSED_OUT);
    }
    let mut title = vec![
        Span::styled(check.to_string(), Style::default().fg(COLOR_MUTED)),
        Span::styled(
            truncate_text(&task.title, width.saturating_sub(check.len())),
            title_style,
        ),
    ];

    let mut meta = vec![Span::styled(
        format!("{:<6}", task.priority.as_str()),
        Style::default().fg(priority_color(task.priority)),
    )];
    if let Some(due) = task.due_date {
        let style = if task.expired {
            Style::default().fg(COLOR_ERROR).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(COLOR_MUTED)
        };
        let mut label = format_due_label(due, due_label);
        if task.expired {
            label.push_str(" !");
        }
        meta.push(Span::styled(label, style));
    }
    if !task.tags.is_empty() {
        let tags = task
            .tags
            .iter()
            .map(|tag| format!("#{tag}"))
            .collect::<Vec<_>>()
            .join(" ");
        meta.push(Span::raw(" "));
        meta.push(Span::styled(tags, Style::default().fg(COLOR_ACCENT)));
    }

    if selected || dragging {
        let modifier = if dragging {
            Modifier::DIM
        } else {
            Modifier::REVERSED
        };
        for span in title.iter_mut().chain(meta.iter_mut()) {
            span.style = span.style.add_modifier(modifier);
        }
    }

    vec![Line::from(title), Line::from(meta), Line::from("")]
}

fn render_drag_marker<S: KeyValueStore>(frame: &mut Frame, app: &AppState<S>, layout: &BoardLayout) {
    let Some(hover) = app.drag.as_ref().and_then(|drag| drag.preview()) else {
        return;
    };
    let Some(column) = layout
        .columns
        .iter()
        .find(|column| column.status == hover.status)
    else {
        return;
    };
    let Some(row) = column.marker_row(&hover.slot) else {
        return;
    };
    let width = column.inner.width;
    let marker = Paragraph::new(Line::from(Span::styled(
        "━".repeat(width as usize),
        Style::default().fg(COLOR_SUCCESS).add_modifier(Modifier::BOLD),
    )));
    frame.render_widget(marker, Rect::new(column.inner.x, row, width, 1));
}

fn render_footer<S: KeyValueStore>(frame: &mut Frame, app: &AppState<S>, area: Rect) {
    let hint = app.footer_hint();
    let hint_span = Span::styled(hint, Style::default().fg(COLOR_INFO));
    let line = if let Some((status, kind)) = app.status_line() {
        let status_style = match kind {
            StatusKind::Error => Style::default()
                .fg(COLOR_ERROR)
                .add_modifier(Modifier::BOLD),
            StatusKind::Info => Style::default().fg(COLOR_WARNING),
        };
        Line::from(vec![
            hint_span,
            Span::raw("  |  "),
            Span::styled(status, status_style),
        ])
    } else {
        Line::from(hint_span)
    };
    let counts_line = Line::from(Span::styled(
        app.task_count_summary(),
        Style::default().fg(COLOR_ACCENT),
    ));
    let widget = Paragraph::new(vec![line, counts_line])
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(Style::default().fg(COLOR_BORDER_COLUMN)),
        );
    frame.render_widget(widget, area);
}

fn render_editor_modal(frame: &mut Frame, area: Rect, editor: &EditorState) {
    let content_width = area.width.saturating_sub(8).min(64);
    let height = (editor.fields().len() as u16 + 6).min(area.height.saturating_sub(2));
    let modal = centered_rect(content_width, height, area);
    frame.render_widget(Clear, modal);

    let width = content_width.saturating_sub(2) as usize;
    let title = match editor.kind() {
        EditorKind::NewTask => "New Task",
        EditorKind::EditTask => "Edit Task",
    };
    let widget = Paragraph::new(build_editor_lines(editor, width))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(Style::default().fg(COLOR_BORDER_ACTIVE)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(widget, modal);
}

fn build_editor_lines(editor: &EditorState, width: usize) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    for (idx, field) in editor.fields().iter().enumerate() {
        let is_active = idx == editor.active_index();
        let label = format!("{:<width$}", field.label, width = EDITOR_LABEL_WIDTH);
        let (value, value_style) = if field.value.trim().is_empty() {
            let placeholder = match field.id {
                EditorFieldId::Title => "<required>",
                EditorFieldId::DueDate => "YYYY-MM-DD (optional)",
                EditorFieldId::Tags => "comma separated (optional)",
                _ => "(optional)",
            };
            (placeholder.to_string(), Style::default().fg(COLOR_MUTED))
        } else {
            (field.value.clone(), Style::default().fg(COLOR_TEXT))
        };
        let value = match field.id {
            EditorFieldId::Priority | EditorFieldId::Status | EditorFieldId::Completed => {
                format!("< {value} >")
            }
            _ if is_active => format!("{value}_"),
            _ => value,
        };
        let mut spans = vec![
            Span::styled(label, Style::default().fg(COLOR_TEXT)),
            Span::raw(" "),
            Span::styled(
                truncate_text(&value, width.saturating_sub(EDITOR_LABEL_WIDTH + 1)),
                value_style,
            ),
        ];
        if is_active {
            for span in &mut spans {
                span.style = span.style.add_modifier(Modifier::REVERSED);
            }
        }
        lines.push(Line::from(spans));
    }

    if let Some(error) = editor.error() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            error.to_string(),
            Style::default()
                .fg(COLOR_ERROR)
                .add_modifier(Modifier::BOLD),
        )));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "tab next  left/right/space choose  enter/ctrl-s save  esc cancel",
        Style::default().fg(COLOR_MUTED_DARK),
    )));
    lines
}

fn render_delete_confirm_modal(frame: &mut Frame, area: Rect, state: &DeleteConfirmState) {
    let content_width = area.width.saturating_sub(8).min(64);
    let height = 8u16.min(area.height.saturating_sub(2));
    let modal = centered_rect(content_width, height, area);
    frame.render_widget(Clear, modal);

    let title_width = (content_width as usize).saturating_sub(9);
    let lines: Vec<Line<'static>> = vec![
        Line::from(Span::styled(
            "Delete task?",
            Style::default()
                .fg(COLOR_ERROR)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("ID: ", Style::default().fg(COLOR_MUTED_DARK)),
            Span::styled(state.task_id.clone(), Style::default().fg(COLOR_MUTED)),
        ]),
        Line::from(vec![
            Span::styled("Title: ", Style::default().fg(COLOR_MUTED_DARK)),
            Span::styled(
                truncate_text(&state.title, title_width),
                Style::default().fg(COLOR_TEXT),
            ),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "y/enter confirm  n/esc cancel",
            Style::default().fg(COLOR_MUTED_DARK),
        )),
    ];

    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Delete Task"))
        .wrap(Wrap { trim: true });
    frame.render_widget(widget, modal);
}

fn render_help_modal(frame: &mut Frame, area: Rect) {
    let content_width = area.width.saturating_sub(8).min(56);
    let width = content_width.saturating_sub(2) as usize;
    let mut lines = vec![help_header("Board")];
    for (keys, desc) in HELP_ENTRIES {
        lines.push(help_line(keys, desc, width));
    }
    let height = (lines.len() as u16 + 2).min(area.height.saturating_sub(2));
    let modal = centered_rect(content_width, height, area);
    frame.render_widget(Clear, modal);
    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Help"))
        .wrap(Wrap { trim: true });
    frame.render_widget(widget, modal);
}

const HELP_ENTRIES: [(&str, &str); 14] = [
    ("h/l", "previous/next column"),
    ("j/k", "next/previous card"),
    ("n", "new task in this column"),
    ("e enter", "edit task"),
    ("d", "delete task"),
    ("space", "toggle completed"),
    ("H/L", "move card to previous/next column"),
    ("J/K", "move card down/up"),
    ("p", "cycle priority filter"),
    ("/", "search titles"),
    ("s", "cycle sort"),
    ("r", "reload from disk"),
    ("mouse", "drag cards between columns"),
    ("q", "quit"),
];

fn help_header(title: &str) -> Line<'static> {
    Line::from(Span::styled(
        title.to_string(),
        Style::default().fg(COLOR_INFO).add_modifier(Modifier::BOLD),
    ))
}

fn help_line(keys: &str, desc: &str, width: usize) -> Line<'static> {
    let key_text = pad_text(keys, HELP_KEY_WIDTH.min(width));
    let desc_width = width.saturating_sub(HELP_KEY_WIDTH + 1);
    let desc_text = truncate_text(desc, desc_width);
    Line::from(vec![
        Span::styled(
            key_text,
            Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(desc_text, Style::default().fg(COLOR_MUTED)),
    ])
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width.saturating_sub(2));
    let height = height.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn priority_color(priority: Priority) -> Color {
    match priority {
        Priority::High => Color::Rgb(255, 87, 87),
        Priority::Medium => COLOR_WARNING,
        Priority::Low => COLOR_MUTED,
    }
}

fn pad_text(value: &str, width: usize) -> String {
    let text = truncate_text(value, width);
    format!("{text:width$}")
}

fn truncate_text(value: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= max {
        return value.to_string();
    }
    if max <= 3 {
        return chars[..max].iter().collect();
    }
    let mut out: String = chars[..(max - 3)].iter().collect();
    out.push_str("...");
    out
}
