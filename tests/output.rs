use kb::output::{format_human, HumanOutput};

#[test]
fn format_human_includes_sections() {
    let mut human = HumanOutput::new("Board exported");
    human.push_summary("File", "kanban-tasks-2024-06-01.csv");
    human.push_detail("Pending (2)");
    human.push_warning("1 stored task(s) had an unknown status");
    human.push_next_step("kb list");

    let rendered = format_human(&human);
    assert!(rendered.contains("Board exported"));
    assert!(rendered.contains("Summary:"));
    assert!(rendered.contains("- File: kanban-tasks-2024-06-01.csv"));
    assert!(rendered.contains("Details:"));
    assert!(rendered.contains("- Pending (2)"));
    assert!(rendered.contains("Warnings:"));
    assert!(rendered.contains("Next steps:"));
    assert!(rendered.contains("- kb list"));
}

#[test]
fn format_human_omits_empty_sections() {
    let human = HumanOutput::new("Snapshot already up to date");
    assert_eq!(format_human(&human), "Snapshot already up to date");
}
