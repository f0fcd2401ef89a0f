use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::task::{Priority, Status, Task, TaskDraft};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorKind {
    NewTask,
    EditTask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorFieldId {
    Title,
    Priority,
    Status,
    DueDate,
    Tags,
    Completed,
}

impl EditorFieldId {
    /// Fields cycled with left/right or space instead of typed into.
    fn is_choice(self) -> bool {
        matches!(
            self,
            EditorFieldId::Priority | EditorFieldId::Status | EditorFieldId::Completed
        )
    }
}

#[derive(Debug, Clone)]
pub struct EditorField {
    pub id: EditorFieldId,
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorAction {
    None,
    Cancel,
    Submit,
}

#[derive(Debug, Clone)]
pub struct EditorState {
    kind: EditorKind,
    fields: Vec<EditorField>,
    active: usize,
    error: Option<String>,
    statuses: Vec<Status>,
    task_id: Option<String>,
}

impl EditorState {
    pub fn new_task(statuses: Vec<Status>, status: &Status) -> Self {
        Self::build(
            EditorKind::NewTask,
            None,
            statuses,
            TaskDraft::new("").status(status.as_str()),
        )
    }

    pub fn edit_task(statuses: Vec<Status>, task: &Task) -> Self {
        Self::build(
            EditorKind::EditTask,
            Some(task.id.clone()),
            statuses,
            TaskDraft::from_task(task),
        )
    }

    fn build(
        kind: EditorKind,
        task_id: Option<String>,
        statuses: Vec<Status>,
        draft: TaskDraft,
    ) -> Self {
        let field = |id, label, value: String| EditorField { id, label, value };
        Self {
            kind,
            fields: vec![
                field(EditorFieldId::Title, "Title", draft.title),
                field(
                    EditorFieldId::Priority,
                    "Priority",
                    draft
                        .priority
                        .unwrap_or_else(|| Priority::default().as_str().to_string()),
                ),
                field(
                    EditorFieldId::Status,
                    "Status",
                    draft.status.unwrap_or_default(),
                ),
                field(
                    EditorFieldId::DueDate,
                    "Due date",
                    draft.due_date.unwrap_or_default(),
                ),
                field(EditorFieldId::Tags, "Tags", draft.tags.join(", ")),
                field(
                    EditorFieldId::Completed,
                    "Completed",
                    yes_no(draft.completed).to_string(),
                ),
            ],
            active: 0,
            error: None,
            statuses,
            task_id,
        }
    }

    pub fn kind(&self) -> EditorKind {
        self.kind
    }

    /// Id of the task being edited; `None` for a new task.
    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    pub fn fields(&self) -> &[EditorField] {
        &self.fields
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, message: String) {
        self.error = Some(message);
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> EditorAction {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('s') => return EditorAction::Submit,
                KeyCode::Char('u') => {
                    if let Some(field) = self.current_field_mut() {
                        if !field.id.is_choice() {
                            field.value.clear();
                        }
                    }
                    self.error = None;
                }
                _ => {}
            }
            return EditorAction::None;
        }

        let choice = self
            .fields
            .get(self.active)
            .is_some_and(|field| field.id.is_choice());

        match key.code {
            KeyCode::Esc => return EditorAction::Cancel,
            KeyCode::Tab | KeyCode::Down => self.move_active(1),
            KeyCode::BackTab | KeyCode::Up => self.move_active(-1),
            KeyCode::Enter => {
                if self.active + 1 >= self.fields.len() {
                    return EditorAction::Submit;
                }
                self.move_active(1);
            }
            KeyCode::Right | KeyCode::Char(' ') if choice => self.cycle(1),
            KeyCode::Left if choice => self.cycle(-1),
            KeyCode::Backspace => {
                if let Some(field) = self.current_field_mut() {
                    field.value.pop();
                }
            }
            KeyCode::Char(ch) if !choice && !ch.is_control() => {
                if let Some(field) = self.current_field_mut() {
                    field.value.push(ch);
                }
            }
            _ => {}
        }

        self.error = None;
        EditorAction::None
    }

    /// Current values as a draft; validation is left to the board.
    pub fn draft(&self) -> TaskDraft {
        let value = |id| self.field_value(id).trim().to_string();
        let due = value(EditorFieldId::DueDate);
        TaskDraft {
            title: self.field_value(EditorFieldId::Title).to_string(),
            priority: Some(value(EditorFieldId::Priority)),
            status: Some(value(EditorFieldId::Status)),
            due_date: (!due.is_empty()).then_some(due),
            completed: self.field_value(EditorFieldId::Completed) == yes_no(true),
            tags: self
                .field_value(EditorFieldId::Tags)
                .split(',')
                .map(str::to_string)
                .collect(),
        }
    }

    fn cycle(&mut self, delta: isize) {
        let statuses: Vec<String> = self.statuses.iter().map(|s| s.to_string()).collect();
        let Some(field) = self.fields.get_mut(self.active) else {
            return;
        };
        let options: Vec<String> = match field.id {
            EditorFieldId::Priority => Priority::ALL
                .iter()
                .map(|priority| priority.as_str().to_string())
                .collect(),
            EditorFieldId::Status => statuses,
            EditorFieldId::Completed => vec![yes_no(false).to_string(), yes_no(true).to_string()],
            _ => return,
        };
        if options.is_empty() {
            return;
        }
        let current = options
            .iter()
            .position(|option| option.eq_ignore_ascii_case(field.value.trim()))
            .unwrap_or(0) as isize;
        let next = (current + delta).rem_euclid(options.len() as isize) as usize;
        field.value = options[next].clone();
    }

    fn move_active(&mut self, delta: isize) {
        let len = self.fields.len() as isize;
        if len == 0 {
            self.active = 0;
            return;
        }
        self.active = (self.active as isize + delta).rem_euclid(len) as usize;
    }

    fn current_field_mut(&mut self) -> Option<&mut EditorField> {
        self.fields.get_mut(self.active)
    }

    fn field_value(&self, id: EditorFieldId) -> &str {
        self.fields
            .iter()
            .find(|field| field.id == id)
            .map(|field| field.value.as_str())
            .unwrap_or("")
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
