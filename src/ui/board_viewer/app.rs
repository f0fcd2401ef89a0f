use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyModifiers,
    MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use crate::board::{Board, Submission};
use crate::drag::DragSession;
use crate::error::Result;
use crate::events::BoardEvent;
use crate::expiry;
use crate::projection::{ColumnView, SortKey, ViewSpec};
use crate::storage::{FileStore, KeyValueStore};
use crate::task::Task;

use super::editor::{EditorAction, EditorState};
use super::layout::BoardLayout;
use super::view;

const EVENT_POLL_MS: u64 = 120;
const WATCH_DEBOUNCE_MS: u64 = 200;

enum UiMsg {
    StoreChanged,
    WatchError(String),
}

#[derive(Clone, Copy)]
pub(crate) enum StatusKind {
    Error,
    Info,
}

pub(crate) struct DeleteConfirmState {
    pub(crate) task_id: String,
    pub(crate) title: String,
}

pub struct AppState<S: KeyValueStore> {
    pub(crate) board: Board<S>,
    pub(crate) spec: ViewSpec,
    pub(crate) views: Vec<ColumnView>,
    pub(crate) selected_column: usize,
    pub(crate) selected_card: usize,
    pub(crate) editor: Option<EditorState>,
    pub(crate) delete_confirm: Option<DeleteConfirmState>,
    pub(crate) drag: Option<DragSession>,
    pub(crate) layout: BoardLayout,
    pub(crate) search_active: bool,
    pub(crate) show_help: bool,
    pub(crate) due_label: String,
    board_events: Receiver<BoardEvent>,
    /// Task to select on the next refresh
    follow: Option<String>,
    status_message: Option<String>,
    info_message: Option<String>,
    watch_error: Option<String>,
}

impl<S: KeyValueStore> AppState<S> {
    pub fn new(mut board: Board<S>, due_label: impl Into<String>) -> Self {
        let (event_tx, event_rx) = mpsc::channel();
        board.subscribe(move |event: &BoardEvent| {
            let _ = event_tx.send(event.clone());
        });

        let mut app = Self {
            board,
            spec: ViewSpec::default(),
            views: Vec::new(),
            selected_column: 0,
            selected_card: 0,
            editor: None,
            delete_confirm: None,
            drag: None,
            layout: BoardLayout::default(),
            search_active: false,
            show_help: false,
            due_label: due_label.into(),
            board_events: event_rx,
            follow: None,
            status_message: None,
            info_message: None,
            watch_error: None,
        };
        app.refresh();
        app
    }

    pub(crate) fn focus(&self) -> Option<(usize, usize)> {
        Some((self.selected_column, self.selected_card))
    }

    pub(crate) fn selected_task(&self) -> Option<&Task> {
        self.views
            .get(self.selected_column)
            .and_then(|view| view.visible.get(self.selected_card))
    }

    pub(crate) fn status_line(&self) -> Option<(String, StatusKind)> {
        if let Some(message) = self.status_message.as_ref() {
            return Some((message.clone(), StatusKind::Error));
        }
        if let Some(error) = self.watch_error.as_ref() {
            return Some((error.clone(), StatusKind::Error));
        }
        self.info_message
            .as_ref()
            .map(|info| (info.clone(), StatusKind::Info))
    }

    pub(crate) fn footer_hint(&self) -> String {
        if self.delete_confirm.is_some() {
            return "y confirm delete  esc cancel".to_string();
        }
        if self.editor.is_some() {
            return "tab next  enter/ctrl-s save  esc cancel".to_string();
        }
        if self.search_active {
            return "type to search  backspace delete  enter done  esc clear".to_string();
        }
        if self.drag.is_some() {
            return "release to drop  release outside a column to cancel".to_string();
        }
        "h/l column  j/k card  n new  e edit  d delete  space done  H/L J/K move  p/s// view  ? help  q quit"
            .to_string()
    }

    pub(crate) fn task_count_summary(&self) -> String {
        let visible: usize = self.views.iter().map(|view| view.visible.len()).sum();
        let due = self.board.due_status_counts();
        let done = self.board.tasks().filter(|task| task.completed).count();
        format!(
            "tasks: {}  shown: {}  done: {}  overdue: {}",
            self.board.len(),
            visible,
            done,
            due.overdue
        )
    }

    fn set_error(&mut self, message: String) {
        self.status_message = Some(message);
        self.info_message = None;
    }

    fn set_info(&mut self, message: String) {
        self.info_message = Some(message);
        self.status_message = None;
    }

    /// Re-project the board, keeping the selection on the same task when possible.
    fn refresh(&mut self) {
        let target = self
            .follow
            .take()
            .or_else(|| self.selected_task().map(|task| task.id.clone()));
        self.views = self.board.view(&self.spec);

        if let Some(id) = target {
            let found = self.views.iter().enumerate().find_map(|(col, view)| {
                view.visible
                    .iter()
                    .position(|task| task.id == id)
                    .map(|card| (col, card))
            });
            if let Some((col, card)) = found {
                self.selected_column = col;
                self.selected_card = card;
                return;
            }
        }
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        if self.views.is_empty() {
            self.selected_column = 0;
            self.selected_card = 0;
            return;
        }
        self.selected_column = self.selected_column.min(self.views.len() - 1);
        let len = self.views[self.selected_column].visible.len();
        self.selected_card = self.selected_card.min(len.saturating_sub(1));
    }

    /// Apply board events raised since the last call; returns whether any arrived.
    pub(crate) fn sync_board_events(&mut self) -> bool {
        let mut changed = false;
        while let Ok(event) = self.board_events.try_recv() {
            changed = true;
            match event {
                BoardEvent::BoardReloaded { tasks } => {
                    self.set_info(format!("reloaded from disk ({tasks} tasks)"));
                }
                BoardEvent::ExpirationChanged { task_ids } => {
                    self.set_info(format!("{} task(s) changed due state", task_ids.len()));
                }
                _ => {}
            }
        }
        if changed {
            self.refresh();
        }
        changed
    }

    /// Day boundary check; re-evaluates expiration when the date moved.
    pub(crate) fn tick(&mut self, today: NaiveDate) {
        if today != self.board.today() {
            self.board.set_today(today);
            self.sync_board_events();
        }
    }

    fn reload(&mut self) {
        match self.board.reload() {
            Ok(true) => {}
            Ok(false) => self.set_info("already up to date".to_string()),
            Err(err) => self.set_error(format!("reload failed: {err}")),
        }
        self.sync_board_events();
    }

    /// Returns true when the viewer should exit.
    pub(crate) fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return true;
        }

        let quit = if self.delete_confirm.is_some() {
            self.handle_delete_key(key);
            false
        } else if self.editor.is_some() {
            self.handle_editor_key(key);
            false
        } else if self.show_help {
            self.show_help = false;
            false
        } else if self.search_active {
            self.handle_search_key(key);
            false
        } else {
            self.handle_board_key(key)
        };

        self.sync_board_events();
        quit
    }

    fn handle_board_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Esc => {
                if self.spec.search_text.is_empty() {
                    return true;
                }
                self.spec.search_text.clear();
                self.refresh();
            }
            KeyCode::Char('?') => self.show_help = true,
            KeyCode::Char('h') | KeyCode::Left => self.move_column(-1),
            KeyCode::Char('l') | KeyCode::Right => self.move_column(1),
            KeyCode::Char('j') | KeyCode::Down => self.move_card(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_card(-1),
            KeyCode::Char('n') => {
                let statuses = self.board.rules().columns().to_vec();
                let status = self
                    .views
                    .get(self.selected_column)
                    .map(|view| view.status.clone())
                    .unwrap_or_else(|| self.board.rules().default_status().clone());
                self.editor = Some(EditorState::new_task(statuses, &status));
            }
            KeyCode::Char('e') | KeyCode::Enter => {
                let statuses = self.board.rules().columns().to_vec();
                let editor = self
                    .selected_task()
                    .map(|task| EditorState::edit_task(statuses, task));
                if editor.is_some() {
                    self.editor = editor;
                }
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                let confirm = self.selected_task().map(|task| DeleteConfirmState {
                    task_id: task.id.clone(),
                    title: task.title.clone(),
                });
                if confirm.is_some() {
                    self.delete_confirm = confirm;
                }
            }
            KeyCode::Char(' ') => {
                if let Some(id) = self.selected_task().map(|task| task.id.clone()) {
                    match self.board.toggle_completed(&id) {
                        Ok(task) => {
                            let state = if task.completed { "completed" } else { "reopened" };
                            self.set_info(format!("{state}: {}", task.title));
                        }
                        Err(err) => self.set_error(err.to_string()),
                    }
                }
            }
            KeyCode::Char('H') => self.shift_column(-1),
            KeyCode::Char('L') => self.shift_column(1),
            KeyCode::Char('J') => self.reorder(1),
            KeyCode::Char('K') => self.reorder(-1),
            KeyCode::Char('p') => {
                self.spec.priority_filter = self.spec.priority_filter.next();
                self.set_info(format!("priority: {}", self.spec.priority_filter.label()));
                self.refresh();
            }
            KeyCode::Char('s') => {
                self.spec.sort_key = self.spec.sort_key.next();
                self.set_info(format!("sort: {}", self.spec.sort_key.as_str()));
                self.refresh();
            }
            KeyCode::Char('/') => self.search_active = true,
            KeyCode::Char('r') => self.reload(),
            _ => {}
        }
        false
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => self.search_active = false,
            KeyCode::Esc => {
                self.search_active = false;
                self.spec.search_text.clear();
            }
            KeyCode::Backspace => {
                self.spec.search_text.pop();
            }
            KeyCode::Char(ch) if !ch.is_control() => self.spec.search_text.push(ch),
            _ => return,
        }
        self.refresh();
    }

    fn handle_editor_key(&mut self, key: KeyEvent) {
        let Some(editor) = self.editor.as_mut() else {
            return;
        };
        match editor.handle_key(key) {
            EditorAction::None => {}
            EditorAction::Cancel => {
                self.editor = None;
                self.set_info("edit cancelled".to_string());
            }
            EditorAction::Submit => {
                let draft = editor.draft();
                let editing = editor.task_id().map(str::to_string);
                match self.board.submit(editing.as_deref(), draft) {
                    Ok(submission) => {
                        let message = match &submission {
                            Submission::Created(task) => format!("created: {}", task.title),
                            Submission::Updated(task) => format!("updated: {}", task.title),
                        };
                        self.follow = Some(submission.into_task().id);
                        self.editor = None;
                        self.set_info(message);
                    }
                    Err(err) => {
                        if let Some(editor) = self.editor.as_mut() {
                            editor.set_error(err.to_string());
                        }
                    }
                }
            }
        }
    }

    fn handle_delete_key(&mut self, key: KeyEvent) {
        let Some(confirm) = self.delete_confirm.take() else {
            return;
        };
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                match self.board.remove(&confirm.task_id) {
                    Ok(task) => self.set_info(format!("deleted: {}", task.title)),
                    Err(err) => self.set_error(err.to_string()),
                }
            }
            KeyCode::Char('n') | KeyCode::Char('q') | KeyCode::Esc => {
                self.set_info("cancelled".to_string());
            }
            _ => self.delete_confirm = Some(confirm),
        }
    }

    fn move_column(&mut self, delta: isize) {
        if self.views.is_empty() {
            return;
        }
        let max = self.views.len() as isize - 1;
        self.selected_column = (self.selected_column as isize + delta).clamp(0, max) as usize;
        self.clamp_selection();
    }

    fn move_card(&mut self, delta: isize) {
        let Some(view) = self.views.get(self.selected_column) else {
            return;
        };
        if view.visible.is_empty() {
            return;
        }
        let max = view.visible.len() as isize - 1;
        self.selected_card = (self.selected_card as isize + delta).clamp(0, max) as usize;
    }

    /// Move the selected card to the end of a neighbouring column.
    fn shift_column(&mut self, delta: isize) {
        let Some(id) = self.selected_task().map(|task| task.id.clone()) else {
            return;
        };
        let target = self.selected_column as isize + delta;
        let Some(status) = usize::try_from(target)
            .ok()
            .and_then(|col| self.views.get(col))
            .map(|view| view.status.to_string())
        else {
            return;
        };
        self.apply_move(&id, &status, usize::MAX);
    }

    /// Swap the selected card with its visible neighbour.
    fn reorder(&mut self, delta: isize) {
        if self.spec.sort_key != SortKey::None {
            self.set_info("reordering is off while sorted".to_string());
            return;
        }
        let Some(view) = self.views.get(self.selected_column) else {
            return;
        };
        let Some(task) = view.visible.get(self.selected_card) else {
            return;
        };
        let neighbour = self.selected_card as isize + delta;
        let Some(neighbour) = usize::try_from(neighbour)
            .ok()
            .and_then(|idx| view.visible.get(idx))
        else {
            return;
        };
        let Some((_, index)) = self.board.position(&neighbour.id) else {
            return;
        };
        let id = task.id.clone();
        let status = view.status.to_string();
        self.apply_move(&id, &status, index);
    }

    fn apply_move(&mut self, id: &str, status: &str, index: usize) {
        match self.board.move_to(id, status, index) {
            Ok(task) => {
                self.follow = Some(task.id);
            }
            Err(err) => self.set_error(err.to_string()),
        }
    }

    pub(crate) fn handle_mouse(&mut self, mouse: MouseEvent) {
        let (x, y) = (mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let Some((col, column)) = self.layout.column_at(x, y) else {
                    return;
                };
                let card = column.card_at(x, y).map(|card| (card.index, card.task_id.clone()));
                self.selected_column = col;
                match card {
                    Some((index, task_id)) => {
                        self.selected_card = index;
                        match DragSession::start(&self.board, &task_id) {
                            Ok(session) => self.drag = Some(session),
                            Err(err) => self.set_error(err.to_string()),
                        }
                    }
                    None => self.clamp_selection(),
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                let hit = self
                    .layout
                    .column_at(x, y)
                    .map(|(_, column)| (column.status.clone(), column.bounds()));
                let Some(drag) = self.drag.as_mut() else {
                    return;
                };
                match hit {
                    Some((status, bounds)) => {
                        drag.over(status, f64::from(y) + 0.5, &bounds);
                    }
                    None => {
                        if let Some(status) = drag.preview().map(|hover| hover.status.clone()) {
                            drag.leave(&status);
                        }
                    }
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                let Some(drag) = self.drag.take() else {
                    return;
                };
                // A release outside every column abandons the gesture.
                if drag.preview().is_none() || self.layout.column_at(x, y).is_none() {
                    drag.cancel();
                    return;
                }
                match drag.drop(&mut self.board) {
                    Ok(Some(task)) => {
                        self.set_info(format!("moved: {}", task.title));
                        self.follow = Some(task.id);
                    }
                    Ok(None) => {}
                    Err(err) => self.set_error(err.to_string()),
                }
                self.sync_board_events();
            }
            _ => {}
        }
    }

    fn handle_ui_msg(&mut self, msg: UiMsg) {
        match msg {
            UiMsg::StoreChanged => {
                if let Err(err) = self.board.reload() {
                    self.set_error(format!("reload failed: {err}"));
                }
                self.sync_board_events();
            }
            UiMsg::WatchError(err) => {
                self.watch_error = Some(format!("watch error: {err}"));
            }
        }
    }
}

pub fn run(board: Board<FileStore>, due_label: &str) -> Result<()> {
    let watch_dir = board.store().dir().to_path_buf();
    std::fs::create_dir_all(&watch_dir)?;

    let (ui_tx, ui_rx) = mpsc::channel();
    spawn_watch(watch_dir, ui_tx);

    let mut app = AppState::new(board, due_label);
    run_terminal(&mut app, ui_rx)
}

fn run_terminal(app: &mut AppState<FileStore>, ui_rx: Receiver<UiMsg>) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, app, ui_rx);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState<FileStore>,
    ui_rx: Receiver<UiMsg>,
) -> Result<()> {
    let mut dirty = true;
    loop {
        while let Ok(msg) = ui_rx.try_recv() {
            app.handle_ui_msg(msg);
            dirty = true;
        }

        app.tick(expiry::today());
        dirty |= app.sync_board_events();

        if dirty {
            terminal.draw(|frame| view::render(frame, app))?;
            dirty = false;
        }

        if event::poll(Duration::from_millis(EVENT_POLL_MS))? {
            match event::read()? {
                Event::Key(key) => {
                    if app.handle_key(key) {
                        break;
                    }
                    dirty = true;
                }
                Event::Mouse(mouse) => {
                    app.handle_mouse(mouse);
                    dirty = true;
                }
                Event::Resize(_, _) => dirty = true,
                _ => {}
            }
        }
    }
    Ok(())
}

fn spawn_watch(store_dir: PathBuf, ui_tx: Sender<UiMsg>) {
    thread::spawn(move || {
        let (event_tx, event_rx) = mpsc::channel();
        let watcher: notify::Result<RecommendedWatcher> = notify::recommended_watcher(move |res| {
            let _ = event_tx.send(res);
        });

        let mut watcher = match watcher {
            Ok(watcher) => watcher,
            Err(err) => {
                let _ = ui_tx.send(UiMsg::WatchError(err.to_string()));
                return;
            }
        };
        if let Err(err) = watcher.watch(&store_dir, RecursiveMode::NonRecursive) {
            let _ = ui_tx.send(UiMsg::WatchError(err.to_string()));
            return;
        }

        let debounce = Duration::from_millis(WATCH_DEBOUNCE_MS);
        let mut pending: Option<Instant> = None;

        loop {
            let timeout = pending
                .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                .unwrap_or(Duration::from_secs(3600));
            match event_rx.recv_timeout(timeout) {
                Ok(Ok(event)) => {
                    if touches_snapshot(&event.paths) {
                        pending = Some(Instant::now() + debounce);
                    }
                }
                Ok(Err(err)) => {
                    let _ = ui_tx.send(UiMsg::WatchError(err.to_string()));
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if pending.take().is_some() && ui_tx.send(UiMsg::StoreChanged).is_err() {
                        break;
                    }
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
    });
}

/// Lock files and temp files churn on every write; only `.json` changes matter.
fn touches_snapshot(paths: &[PathBuf]) -> bool {
    paths.is_empty()
        || paths
            .iter()
            .any(|path| path.extension().is_some_and(|ext| ext == "json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BoardOptions;
    use crate::projection::{PriorityFilter, DEFAULT_DUE_LABEL};
    use crate::storage::MemoryStore;
    use crate::task::TaskDraft;
    use ratatui::layout::Rect;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn app_with(tasks: &[(&str, &str)]) -> AppState<MemoryStore> {
        let (mut board, _) =
            Board::open(MemoryStore::new(), BoardOptions::default(), day(2024, 6, 1)).unwrap();
        for (title, status) in tasks {
            board.create(TaskDraft::new(*title).status(*status)).unwrap();
        }
        AppState::new(board, DEFAULT_DUE_LABEL)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn press(app: &mut AppState<MemoryStore>, code: KeyCode) -> bool {
        app.handle_key(key(code))
    }

    fn titles(app: &AppState<MemoryStore>, col: usize) -> Vec<String> {
        app.views[col]
            .visible
            .iter()
            .map(|task| task.title.clone())
            .collect()
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn quit_keys() {
        let mut app = app_with(&[]);
        assert!(press(&mut app, KeyCode::Char('q')));
        assert!(app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(!press(&mut app, KeyCode::Char('j')));
    }

    #[test]
    fn new_task_through_the_editor() {
        let mut app = app_with(&[]);
        press(&mut app, KeyCode::Char('l'));
        press(&mut app, KeyCode::Char('n'));
        assert!(app.editor.is_some());

        for ch in "Ship it".chars() {
            press(&mut app, KeyCode::Char(ch));
        }
        app.handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL));

        assert!(app.editor.is_none());
        assert_eq!(titles(&app, 1), vec!["Ship it"]);
        assert_eq!(app.selected_task().unwrap().title, "Ship it");
        assert_eq!(app.board.len(), 1);
    }

    #[test]
    fn editor_stays_open_on_invalid_input() {
        let mut app = app_with(&[]);
        press(&mut app, KeyCode::Char('n'));
        app.handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL));

        let editor = app.editor.as_ref().unwrap();
        assert!(editor.error().is_some());
        assert!(app.board.is_empty());

        press(&mut app, KeyCode::Esc);
        assert!(app.editor.is_none());
    }

    #[test]
    fn delete_requires_confirmation() {
        let mut app = app_with(&[("a", "pending"), ("b", "pending")]);
        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.board.len(), 2);

        press(&mut app, KeyCode::Char('d'));
        assert_eq!(app.delete_confirm.as_ref().unwrap().title, "a");
        press(&mut app, KeyCode::Char('y'));
        assert_eq!(titles(&app, 0), vec!["b"]);
        assert_eq!(app.selected_task().unwrap().title, "b");
    }

    #[test]
    fn shift_and_reorder_follow_the_card() {
        let mut app = app_with(&[("a", "pending"), ("b", "pending"), ("c", "pending")]);

        press(&mut app, KeyCode::Char('J'));
        assert_eq!(titles(&app, 0), vec!["b", "a", "c"]);
        assert_eq!(app.selected_card, 1);

        press(&mut app, KeyCode::Char('J'));
        assert_eq!(titles(&app, 0), vec!["b", "c", "a"]);
        press(&mut app, KeyCode::Char('K'));
        assert_eq!(titles(&app, 0), vec!["b", "a", "c"]);

        press(&mut app, KeyCode::Char('L'));
        assert_eq!(titles(&app, 1), vec!["a"]);
        assert_eq!((app.selected_column, app.selected_card), (1, 0));

        press(&mut app, KeyCode::Char('H'));
        assert_eq!(titles(&app, 0), vec!["b", "c", "a"]);
    }

    #[test]
    fn reorder_is_refused_while_sorted() {
        let mut app = app_with(&[("a", "pending"), ("b", "pending")]);
        press(&mut app, KeyCode::Char('s'));
        assert_eq!(app.spec.sort_key, SortKey::Priority);
        press(&mut app, KeyCode::Char('J'));
        assert_eq!(app.board.column("pending").unwrap().tasks[0].title, "a");
        assert!(app.status_line().is_some());
    }

    #[test]
    fn toggle_and_filters() {
        let mut app = app_with(&[("Fix bug", "pending"), ("Write docs", "pending")]);
        press(&mut app, KeyCode::Char(' '));
        assert!(app.board.column("pending").unwrap().tasks[0].completed);

        press(&mut app, KeyCode::Char('p'));
        assert_eq!(app.spec.priority_filter, PriorityFilter::default().next());

        let mut app = app_with(&[("Fix bug", "pending"), ("Write docs", "pending")]);
        press(&mut app, KeyCode::Char('/'));
        for ch in "docs".chars() {
            press(&mut app, KeyCode::Char(ch));
        }
        press(&mut app, KeyCode::Enter);
        assert!(!app.search_active);
        assert_eq!(titles(&app, 0), vec!["Write docs"]);

        // Esc clears an active search before it quits.
        assert!(!press(&mut app, KeyCode::Esc));
        assert_eq!(titles(&app, 0).len(), 2);
    }

    #[test]
    fn mouse_drag_moves_card_between_columns() {
        let mut app = app_with(&[("a", "pending"), ("b", "pending")]);
        app.layout = BoardLayout::compute(Rect::new(0, 0, 60, 20), &app.views, app.focus());

        app.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 5, 5));
        assert_eq!(app.selected_task().unwrap().title, "b");
        assert!(app.drag.is_some());

        app.handle_mouse(mouse(MouseEventKind::Drag(MouseButton::Left), 25, 3));
        app.handle_mouse(mouse(MouseEventKind::Up(MouseButton::Left), 25, 3));

        assert!(app.drag.is_none());
        assert_eq!(titles(&app, 0), vec!["a"]);
        assert_eq!(titles(&app, 1), vec!["b"]);
        assert_eq!(app.selected_task().unwrap().title, "b");
    }

    #[test]
    fn release_outside_columns_cancels_drag() {
        let mut app = app_with(&[("a", "pending"), ("b", "pending")]);
        app.layout = BoardLayout::compute(Rect::new(0, 0, 60, 20), &app.views, app.focus());

        app.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 5, 5));
        app.handle_mouse(mouse(MouseEventKind::Drag(MouseButton::Left), 25, 3));
        app.handle_mouse(mouse(MouseEventKind::Up(MouseButton::Left), 200, 100));

        assert!(app.drag.is_none());
        assert_eq!(titles(&app, 0), vec!["a", "b"]);
        assert!(titles(&app, 1).is_empty());
        assert_eq!(app.board.store().writes(), 2);
    }

    #[test]
    fn click_without_drag_only_selects() {
        let mut app = app_with(&[("a", "pending"), ("b", "pending")]);
        app.layout = BoardLayout::compute(Rect::new(0, 0, 60, 20), &app.views, app.focus());

        app.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 5, 2));
        app.handle_mouse(mouse(MouseEventKind::Up(MouseButton::Left), 5, 2));

        assert!(app.drag.is_none());
        assert_eq!(titles(&app, 0), vec!["a", "b"]);
        assert_eq!(app.board.store().writes(), 2);
    }

    #[test]
    fn tick_reevaluates_expiration_on_a_new_day() {
        let (mut board, _) =
            Board::open(MemoryStore::new(), BoardOptions::default(), day(2024, 6, 1)).unwrap();
        board
            .create(TaskDraft::new("Pay rent").due("2024-06-02"))
            .unwrap();
        let mut app = AppState::new(board, DEFAULT_DUE_LABEL);
        assert!(!app.views[0].visible[0].expired);

        app.tick(day(2024, 6, 1));
        assert!(app.status_line().is_none());

        app.tick(day(2024, 6, 3));
        assert!(app.views[0].visible[0].expired);
        assert!(matches!(app.status_line(), Some((_, StatusKind::Info))));
    }
}
