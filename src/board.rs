//! The ordered board store.
//!
//! A `Board` owns every task, grouped into configured columns in display
//! order. Each mutating operation is one transaction: apply the change,
//! encode the snapshot, write it to the key-value store, then notify
//! subscribers. A failed write restores the previous columns, so the board
//! and its persisted snapshot never diverge.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::codec::exchange::{self, SkippedRow};
use crate::codec::{snapshot, DecodedRecord};
use crate::config::{ColumnConfig, Config};
use crate::error::{Error, Result};
use crate::events::BoardEvent;
use crate::expiry::is_expired;
use crate::storage::KeyValueStore;
use crate::task::{DueDatePolicy, IdGenerator, Status, Task, TaskDraft, TaskRules};

/// A status column and its tasks in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub status: Status,
    pub title: String,
    pub tasks: Vec<Task>,
}

impl Column {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.tasks.iter().position(|task| task.id == id)
    }
}

/// Everything a board needs from configuration.
#[derive(Debug, Clone)]
pub struct BoardOptions {
    pub columns: Vec<ColumnConfig>,
    pub rules: TaskRules,
    pub key: String,
    pub id_prefix: String,
    pub placeholder_title: String,
}

impl BoardOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            columns: config.board.columns.clone(),
            rules: TaskRules::from_config(&config.board),
            key: config.storage.key.clone(),
            id_prefix: config.board.id_prefix.clone(),
            placeholder_title: config.exchange.placeholder_title.clone(),
        }
    }
}

impl Default for BoardOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// What happened while reading the stored snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub loaded: usize,
    /// Records whose status named no column
    pub reassigned: usize,
    /// Records dropped because their id was already on the board
    pub duplicates: usize,
    /// Snapshot entries that were not task records
    pub skipped: usize,
    /// Records stored without an id that were given one
    pub minted: usize,
    /// Description of an unreadable snapshot that was set aside
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovered: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: Vec<String>,
    /// Imported records that were given a fresh id
    pub renamed: usize,
    pub skipped: Vec<SkippedRow>,
}

/// Outcome of an editor submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Created(Task),
    Updated(Task),
}

impl Submission {
    pub fn task(&self) -> &Task {
        match self {
            Submission::Created(task) | Submission::Updated(task) => task,
        }
    }

    pub fn into_task(self) -> Task {
        match self {
            Submission::Created(task) | Submission::Updated(task) => task,
        }
    }
}

pub type SubscriptionId = u64;

type Listener = Box<dyn FnMut(&BoardEvent)>;

pub struct Board<S: KeyValueStore> {
    store: S,
    key: String,
    rules: TaskRules,
    placeholder_title: String,
    columns: Vec<Column>,
    ids: IdGenerator,
    issued: HashSet<String>,
    today: NaiveDate,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: SubscriptionId,
}

impl<S: KeyValueStore> Board<S> {
    /// Build a board and populate it from the store.
    pub fn open(store: S, options: BoardOptions, today: NaiveDate) -> Result<(Self, LoadReport)> {
        let columns = empty_columns(&options.columns);
        let mut board = Self {
            store,
            key: options.key,
            rules: options.rules,
            placeholder_title: options.placeholder_title,
            columns,
            ids: IdGenerator::new(&options.id_prefix),
            issued: HashSet::new(),
            today,
            listeners: Vec::new(),
            next_subscription: 1,
        };
        let (columns, report) = board.read_snapshot()?;
        board.columns = columns;
        board.persist_minted(&report);
        tracing::debug!(
            key = %board.key,
            loaded = report.loaded,
            reassigned = report.reassigned,
            "board opened"
        );
        Ok((board, report))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, status: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|column| column.status.as_str() == status)
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.locate(id)
            .map(|(col, idx)| &self.columns[col].tasks[idx])
    }

    /// Column status and index of a task.
    pub fn position(&self, id: &str) -> Option<(Status, usize)> {
        self.locate(id)
            .map(|(col, idx)| (self.columns[col].status.clone(), idx))
    }

    /// All tasks in canonical order: column order, then position.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.columns.iter().flat_map(|column| column.tasks.iter())
    }

    pub fn len(&self) -> usize {
        self.columns.iter().map(Column::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn rules(&self) -> &TaskRules {
        &self.rules
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn placeholder_title(&self) -> &str {
        &self.placeholder_title
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Current contents in the exchange (CSV) format.
    pub fn export_csv(&self) -> String {
        exchange::encode(self.tasks())
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    pub fn create(&mut self, draft: TaskDraft) -> Result<Task> {
        let valid = self.rules.validate(&draft)?;
        let col = self.column_index(&valid.status)?;
        let id = self.fresh_id();
        let mut task = Task::from_valid(id, valid);
        task.expired = is_expired(task.due_date, self.today);

        let before = self.columns.clone();
        self.columns[col].tasks.push(task.clone());
        let event = BoardEvent::TaskCreated {
            task_id: task.id.clone(),
            status: task.status.to_string(),
            index: self.columns[col].len() - 1,
        };
        self.commit(before, vec![event])?;
        tracing::debug!(task_id = %task.id, status = %task.status, "task created");
        Ok(task)
    }

    /// Replace a task's fields. A status change appends it to the new column.
    pub fn update(&mut self, id: &str, draft: TaskDraft) -> Result<Task> {
        let (col, idx) = self
            .locate(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let valid = self.rules.validate(&draft)?;
        let dest = self.column_index(&valid.status)?;

        let before = self.columns.clone();
        let from = self.columns[col].status.to_string();
        let mut events = Vec::new();

        let task = if dest == col {
            let task = &mut self.columns[col].tasks[idx];
            task.apply(valid);
            task.expired = is_expired(task.due_date, self.today);
            task.clone()
        } else {
            let mut task = self.columns[col].tasks.remove(idx);
            task.apply(valid);
            task.expired = is_expired(task.due_date, self.today);
            self.columns[dest].tasks.push(task.clone());
            events.push(BoardEvent::TaskMoved {
                task_id: task.id.clone(),
                from,
                to: task.status.to_string(),
                index: self.columns[dest].len() - 1,
            });
            task
        };
        events.insert(
            0,
            BoardEvent::TaskUpdated {
                task_id: task.id.clone(),
                status: task.status.to_string(),
            },
        );

        self.commit(before, events)?;
        tracing::debug!(task_id = %task.id, status = %task.status, "task updated");
        Ok(task)
    }

    /// Editor submit: update when editing an existing task, otherwise create.
    /// A stale id falls back to creating the task.
    pub fn submit(&mut self, editing: Option<&str>, draft: TaskDraft) -> Result<Submission> {
        let Some(id) = editing else {
            return self.create(draft).map(Submission::Created);
        };
        match self.update(id, draft.clone()) {
            Ok(task) => Ok(Submission::Updated(task)),
            Err(Error::NotFound(_)) => {
                tracing::warn!(task_id = id, "edited task no longer exists, creating it");
                self.create(draft).map(Submission::Created)
            }
            Err(err) => Err(err),
        }
    }

    /// Delete a task. Asking for confirmation is the caller's job.
    pub fn remove(&mut self, id: &str) -> Result<Task> {
        let (col, idx) = self
            .locate(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        let before = self.columns.clone();
        let task = self.columns[col].tasks.remove(idx);
        let event = BoardEvent::TaskRemoved {
            task_id: task.id.clone(),
            status: task.status.to_string(),
        };
        self.commit(before, vec![event])?;
        tracing::debug!(task_id = %task.id, "task removed");
        Ok(task)
    }

    pub fn toggle_completed(&mut self, id: &str) -> Result<Task> {
        let (col, idx) = self
            .locate(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        let before = self.columns.clone();
        let task = &mut self.columns[col].tasks[idx];
        task.completed = !task.completed;
        task.expired = is_expired(task.due_date, self.today);
        let task = task.clone();
        let event = BoardEvent::TaskCompletionToggled {
            task_id: task.id.clone(),
            completed: task.completed,
        };
        self.commit(before, vec![event])?;
        tracing::debug!(task_id = %task.id, completed = task.completed, "task toggled");
        Ok(task)
    }

    /// Move a task to `index` of `status`'s column, clamped after removal.
    pub fn move_to(&mut self, id: &str, status: &str, index: usize) -> Result<Task> {
        let (col, idx) = self
            .locate(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let status = self.rules.column(status)?;
        let dest = self.column_index(&status)?;

        let dest_len = if dest == col {
            self.columns[dest].len() - 1
        } else {
            self.columns[dest].len()
        };
        let index = index.min(dest_len);
        if dest == col && index == idx {
            return Ok(self.columns[col].tasks[idx].clone());
        }

        let before = self.columns.clone();
        let from = self.columns[col].status.to_string();
        let mut task = self.columns[col].tasks.remove(idx);
        task.status = status;
        task.expired = is_expired(task.due_date, self.today);
        self.columns[dest].tasks.insert(index, task.clone());

        let event = BoardEvent::TaskMoved {
            task_id: task.id.clone(),
            from,
            to: task.status.to_string(),
            index,
        };
        self.commit(before, vec![event])?;
        tracing::debug!(task_id = %task.id, status = %task.status, index, "task moved");
        Ok(task)
    }

    /// Append decoded records in one transaction.
    ///
    /// An imported id is kept unless it was already issued in this session.
    pub fn import(
        &mut self,
        records: Vec<DecodedRecord>,
        skipped: Vec<SkippedRow>,
    ) -> Result<ImportReport> {
        let mut report = ImportReport {
            skipped,
            ..ImportReport::default()
        };
        let before = self.columns.clone();

        for record in records {
            let valid = match self.rules.validate_with(&record.draft, DueDatePolicy::Lenient) {
                Ok(valid) => valid,
                Err(err) => {
                    tracing::warn!(error = %err, "import record rejected");
                    continue;
                }
            };
            let Some(col) = self
                .columns
                .iter()
                .position(|column| column.status == valid.status)
            else {
                continue;
            };
            let id = match record.id {
                Some(id) if !self.issued.contains(&id) => {
                    self.issued.insert(id.clone());
                    id
                }
                Some(_) => {
                    report.renamed += 1;
                    self.fresh_id()
                }
                None => self.fresh_id(),
            };
            let mut task = Task::from_valid(id, valid);
            task.expired = is_expired(task.due_date, self.today);
            report.imported.push(task.id.clone());
            self.columns[col].tasks.push(task);
        }

        if report.imported.is_empty() {
            return Ok(report);
        }

        let event = BoardEvent::TasksImported {
            task_ids: report.imported.clone(),
            skipped: report.skipped.len(),
        };
        self.commit(before, vec![event])?;
        tracing::debug!(
            imported = report.imported.len(),
            skipped = report.skipped.len(),
            "tasks imported"
        );
        Ok(report)
    }

    /// Decode a CSV document and import it.
    pub fn import_csv(&mut self, raw: &str) -> Result<ImportReport> {
        let decoded = exchange::decode(raw, &self.placeholder_title);
        self.import(decoded.records, decoded.skipped)
    }

    /// Consistency backstop: re-derive status and expiration from the
    /// columns and rewrite the snapshot only if it differs from storage.
    pub fn resync(&mut self) -> Result<bool> {
        let before = self.columns.clone();
        let today = self.today;
        for column in &mut self.columns {
            for task in &mut column.tasks {
                task.status = column.status.clone();
                task.expired = is_expired(task.due_date, today);
            }
        }

        let encoded = snapshot::encode(self.tasks())?;
        let stored = match self.store.get(&self.key) {
            Ok(stored) => stored,
            // Already set aside on load; overwrite it.
            Err(Error::InvalidUtf8 { .. }) => None,
            Err(err) => {
                self.columns = before;
                return Err(err);
            }
        };
        if stored.as_deref() == Some(encoded.as_str()) {
            return Ok(false);
        }

        if let Err(err) = self.store.set(&self.key, &encoded) {
            self.columns = before;
            return Err(err);
        }
        tracing::debug!(key = %self.key, "board resynced");
        self.notify(&BoardEvent::BoardResynced);
        Ok(true)
    }

    /// Re-read the store after another process wrote it.
    pub fn reload(&mut self) -> Result<bool> {
        let (columns, report) = self.read_snapshot()?;
        if columns == self.columns {
            return Ok(false);
        }
        self.columns = columns;
        tracing::debug!(loaded = report.loaded, "board reloaded");
        self.notify(&BoardEvent::BoardReloaded {
            tasks: report.loaded,
        });
        self.persist_minted(&report);
        Ok(true)
    }

    /// Write back ids minted for id-less records so they stay stable.
    fn persist_minted(&mut self, report: &LoadReport) {
        if report.minted == 0 {
            return;
        }
        if let Err(err) = self.resync() {
            tracing::warn!(error = %err, minted = report.minted, "could not persist minted task ids");
        }
    }

    /// Change the reference day; returns ids whose expiration flipped.
    pub fn set_today(&mut self, today: NaiveDate) -> Vec<String> {
        self.today = today;
        let mut flipped = Vec::new();
        for task in self.columns.iter_mut().flat_map(|c| c.tasks.iter_mut()) {
            let expired = is_expired(task.due_date, today);
            if expired != task.expired {
                task.expired = expired;
                flipped.push(task.id.clone());
            }
        }
        if !flipped.is_empty() {
            self.notify(&BoardEvent::ExpirationChanged {
                task_ids: flipped.clone(),
            });
        }
        flipped
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    pub fn subscribe(&mut self, listener: impl FnMut(&BoardEvent) + 'static) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn locate(&self, id: &str) -> Option<(usize, usize)> {
        self.columns
            .iter()
            .enumerate()
            .find_map(|(col, column)| column.position(id).map(|idx| (col, idx)))
    }

    fn column_index(&self, status: &Status) -> Result<usize> {
        self.columns
            .iter()
            .position(|column| &column.status == status)
            .ok_or_else(|| Error::UnknownColumn(status.to_string()))
    }

    fn fresh_id(&mut self) -> String {
        loop {
            let id = self.ids.next_id();
            if self.issued.insert(id.clone()) {
                return id;
            }
        }
    }

    fn commit(&mut self, before: Vec<Column>, events: Vec<BoardEvent>) -> Result<()> {
        if let Err(err) = self.persist() {
            tracing::warn!(error = %err, "snapshot write failed, changes rolled back");
            self.columns = before;
            return Err(err);
        }
        for event in &events {
            self.notify(event);
        }
        Ok(())
    }

    fn persist(&mut self) -> Result<()> {
        let encoded = snapshot::encode(self.tasks())?;
        self.store.set(&self.key, &encoded)
    }

    fn notify(&mut self, event: &BoardEvent) {
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }

    fn read_snapshot(&mut self) -> Result<(Vec<Column>, LoadReport)> {
        let mut columns: Vec<Column> = self
            .columns
            .iter()
            .map(|column| Column {
                status: column.status.clone(),
                title: column.title.clone(),
                tasks: Vec::new(),
            })
            .collect();
        let mut report = LoadReport::default();

        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok((columns, report)),
            Err(Error::InvalidUtf8 { reason, lossy }) => {
                let reason = format!("Stored value is not valid UTF-8: {reason}");
                self.set_aside(&lossy, reason, &mut report);
                return Ok((columns, report));
            }
            Err(err) => return Err(err),
        };

        let decoded = match snapshot::decode(&raw, &self.placeholder_title) {
            Ok(decoded) => decoded,
            Err(err) => {
                self.set_aside(&raw, err.to_string(), &mut report);
                return Ok((columns, report));
            }
        };
        report.skipped = decoded.skipped;

        let mut seen = HashSet::new();
        for record in decoded.records {
            let known_status = record
                .draft
                .status
                .as_deref()
                .and_then(|raw| self.rules.resolve_status(raw))
                .is_some();
            let valid = match self.rules.validate_with(&record.draft, DueDatePolicy::Lenient) {
                Ok(valid) => valid,
                Err(err) => {
                    tracing::warn!(error = %err, "dropping stored record");
                    report.skipped += 1;
                    continue;
                }
            };
            if !known_status {
                report.reassigned += 1;
            }

            let id = match record.id {
                Some(id) if seen.contains(&id) => {
                    tracing::warn!(task_id = %id, "duplicate task id in snapshot, keeping first");
                    report.duplicates += 1;
                    continue;
                }
                Some(id) => id,
                None => {
                    report.minted += 1;
                    self.fresh_id()
                }
            };
            seen.insert(id.clone());
            self.issued.insert(id.clone());

            let Some(col) = columns.iter().position(|c| c.status == valid.status) else {
                continue;
            };
            let mut task = Task::from_valid(id, valid);
            task.expired = is_expired(task.due_date, self.today);
            columns[col].tasks.push(task);
            report.loaded += 1;
        }

        Ok((columns, report))
    }

    /// Copy an unreadable snapshot to `<key>.bak` before anything overwrites it.
    fn set_aside(&mut self, raw: &str, reason: String, report: &mut LoadReport) {
        let backup_key = format!("{}.bak", self.key);
        tracing::warn!(key = %self.key, error = %reason, backup = %backup_key, "unreadable snapshot, starting empty");
        match self.store.set(&backup_key, raw) {
            Ok(()) => report.backup_key = Some(backup_key),
            Err(backup_err) => {
                tracing::warn!(error = %backup_err, "could not back up unreadable snapshot")
            }
        }
        report.recovered = Some(reason);
    }
}

fn empty_columns(configs: &[ColumnConfig]) -> Vec<Column> {
    configs
        .iter()
        .map(|config| Column {
            status: Status::new(config.id.clone()),
            title: config.display_title().to_string(),
            tasks: Vec::new(),
        })
        .collect()
}
