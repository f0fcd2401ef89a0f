use std::fs;

use chrono::NaiveDate;
use kb::board::{Board, BoardOptions};
use kb::drag::{CardBounds, DragSession};
use kb::events::EventSink;
use kb::storage::{FileStore, Storage};
use kb::task::{Status, TaskDraft};
use serde_json::Value;
use tempfile::TempDir;

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn open(dir: &TempDir) -> Board<FileStore> {
    let storage = Storage::new(dir.path());
    let (board, _) = Board::open(
        storage.file_store(1000),
        BoardOptions::default(),
        day(2024, 6, 1),
    )
    .expect("open board");
    board
}

fn titles(board: &Board<FileStore>, status: &str) -> Vec<String> {
    board
        .column(status)
        .expect("column")
        .tasks
        .iter()
        .map(|task| task.title.clone())
        .collect()
}

#[test]
fn second_board_sees_writes_after_reload() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let mut first = open(&dir);
    let mut second = open(&dir);

    first.create(TaskDraft::new("from first").status("doing"))?;
    assert!(second.is_empty());

    assert!(second.reload()?);
    assert_eq!(titles(&second, "doing"), vec!["from first"]);
    assert!(!second.reload()?);
    Ok(())
}

#[test]
fn reopen_preserves_order_and_fields() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    {
        let mut board = open(&dir);
        board.create(TaskDraft::new("a").priority("high").tag("x"))?;
        let b = board.create(TaskDraft::new("b").due("2024-05-01"))?;
        board.create(TaskDraft::new("c"))?;
        board.move_to(&b.id, "pending", 0)?;
    }

    let board = open(&dir);
    assert_eq!(titles(&board, "pending"), vec!["b", "a", "c"]);
    let b = &board.column("pending").expect("pending").tasks[0];
    assert!(b.expired);
    assert_eq!(b.due_date, Some(day(2024, 5, 1)));
    Ok(())
}

#[test]
fn drag_between_columns_persists_once() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let mut board = open(&dir);
    let a = board.create(TaskDraft::new("a"))?;
    board.create(TaskDraft::new("x").status("done"))?;
    board.create(TaskDraft::new("y").status("done"))?;

    let targets: Vec<CardBounds> = board
        .column("done")
        .expect("done")
        .tasks
        .iter()
        .enumerate()
        .map(|(i, task)| CardBounds::new(task.id.clone(), i as f64 * 3.0, 3.0))
        .collect();

    let mut session = DragSession::start(&board, &a.id)?;
    session.over(Status::new("done"), 4.0, &targets);
    let moved = session.drop(&mut board)?.expect("moved");
    assert_eq!(moved.status.as_str(), "done");

    let reopened = open(&dir);
    assert_eq!(titles(&reopened, "done"), vec!["x", "a", "y"]);
    assert!(titles(&reopened, "pending").is_empty());
    Ok(())
}

#[test]
fn event_file_receives_jsonl() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let events_path = dir.path().join("events.jsonl");
    let mut board = open(&dir);
    board.subscribe(EventSink::file(&events_path)?.into_listener());

    let task = board.create(TaskDraft::new("tracked"))?;
    board.toggle_completed(&task.id)?;
    board.remove(&task.id)?;

    let raw = fs::read_to_string(&events_path)?;
    let kinds: Vec<String> = raw
        .lines()
        .map(|line| serde_json::from_str::<Value>(line).expect("event line"))
        .map(|event| event["event"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(
        kinds,
        vec!["task_created", "task_completion_toggled", "task_removed"]
    );
    Ok(())
}

#[test]
fn non_utf8_snapshot_starts_empty_with_backup() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let store_dir = dir.path().join("store");
    fs::create_dir_all(&store_dir)?;
    fs::write(store_dir.join("kanbanTasks_v2.json"), [0xff, 0xfe, b'[', b']'])?;

    let storage = Storage::new(dir.path());
    let (mut board, report) = Board::open(
        storage.file_store(1000),
        BoardOptions::default(),
        day(2024, 6, 1),
    )?;
    assert!(board.is_empty());
    assert!(report.recovered.is_some());
    assert_eq!(report.backup_key.as_deref(), Some("kanbanTasks_v2.bak"));
    let backup = fs::read_to_string(store_dir.join("kanbanTasks_v2.bak.json"))?;
    assert!(backup.ends_with("[]"));

    // The bad bytes are replaced by the first write.
    board.create(TaskDraft::new("fresh"))?;
    assert_eq!(titles(&open(&dir), "pending"), vec!["fresh"]);
    Ok(())
}

#[test]
fn records_without_ids_keep_their_ids_across_opens() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let store_dir = dir.path().join("store");
    fs::create_dir_all(&store_dir)?;
    fs::write(
        store_dir.join("kanbanTasks_v2.json"),
        r#"[{"title":"x","status":"pending"}]"#,
    )?;

    let first = open(&dir);
    let second = open(&dir);
    let first_id = &first.column("pending").expect("column").tasks[0].id;
    let second_id = &second.column("pending").expect("column").tasks[0].id;
    assert_eq!(first_id, second_id);
    Ok(())
}
