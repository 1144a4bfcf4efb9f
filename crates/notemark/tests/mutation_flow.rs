use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

use chrono::NaiveDate;
use notemark::{
    FilesystemVault, FixedClock, Notebook, NotemarkConfig, NotemarkError, UpdateEvent, Vault,
};

fn notebook_at(root: &std::path::Path) -> Notebook<FilesystemVault> {
    let config = NotemarkConfig {
        archive_path: "Log/2024/Done.md".to_string(),
        ..NotemarkConfig::default()
    };
    Notebook::new(FilesystemVault::new(root), config)
        .with_clock(FixedClock(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()))
}

#[test]
fn complete_then_uncomplete_round_trips_and_keeps_archive() {
    let dir = tempfile::tempdir().unwrap();
    let original = "# Week\n- [ ] #task write report #work\n";
    fs::write(dir.path().join("Week.md"), original).unwrap();
    let mut notebook = notebook_at(dir.path());
    notebook.scan_all().unwrap();

    let task = notebook.tasks().remove(0);
    let report = notebook.complete(&task).unwrap();
    assert_eq!(report.after, "- [x] #task-done @2024-03-01 write report #work");
    assert!(report.archived);
    assert!(dir.path().join("Log/2024").is_dir());

    let done = notebook.completed_tasks(None).remove(0);
    assert_eq!(done.line, task.line);
    notebook.uncomplete(&done).unwrap();

    assert_eq!(fs::read_to_string(dir.path().join("Week.md")).unwrap(), original);
    assert_eq!(
        fs::read_to_string(dir.path().join("Log/2024/Done.md")).unwrap(),
        "- [x] write report #work #task-done @2024-03-01\n"
    );
}

#[test]
fn archive_is_appended_not_rewritten() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("Log/2024")).unwrap();
    fs::write(dir.path().join("Log/2024/Done.md"), "- [x] older #task-done @2024-01-01").unwrap();
    fs::write(dir.path().join("a.md"), "## Chores #task\n- dishes\n").unwrap();
    let mut notebook = notebook_at(dir.path());
    notebook.scan_all().unwrap();

    let section = notebook.tasks().into_iter().find(|t| t.is_section).unwrap();
    notebook.complete(&section).unwrap();

    assert_eq!(
        fs::read_to_string(dir.path().join("Log/2024/Done.md")).unwrap(),
        "- [x] older #task-done @2024-01-01\n- [x] Chores #task-done @2024-03-01\n- [x] dishes #task-done @2024-03-01\n"
    );
    assert!(notebook.completed_tasks(None).iter().all(|t| t.path == "a.md"));
}

#[test]
fn external_edit_between_scan_and_complete_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.md");
    fs::write(&path, "1\n2\n3\n4\n- [ ] #task five\n").unwrap();
    let mut notebook = notebook_at(dir.path());
    notebook.scan_all().unwrap();
    let task = notebook.tasks().remove(0);
    assert_eq!(task.line, 4);

    let edited = "1\n2\n3\n4\n- [ ] five, now untagged\n";
    fs::write(&path, edited).unwrap();
    let err = notebook.complete(&task).unwrap_err();
    assert!(matches!(err, NotemarkError::PreconditionMismatch { line: 4, .. }));
    assert_eq!(fs::read_to_string(&path).unwrap(), edited);
    assert!(!notebook.vault().exists("Log/2024/Done.md"));
}

#[test]
fn mutations_notify_after_store_update() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.md"), "- #idea build a shed\n").unwrap();
    let mut notebook = notebook_at(dir.path());
    notebook.scan_all().unwrap();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let id = notebook.on_updated(move |event| sink.borrow_mut().push(event.clone()));

    let idea = notebook.ideas().remove(0);
    notebook.convert_idea_to_task(&idea).unwrap();
    assert_eq!(*seen.borrow(), vec![UpdateEvent::Scanned("a.md".into())]);
    assert_eq!(notebook.tasks()[0].raw_text, "- [ ] #task build a shed");

    assert!(notebook.unsubscribe(id));
    let task = notebook.tasks().remove(0);
    notebook.remove_marker(&task, "#task").unwrap();
    assert_eq!(seen.borrow().len(), 1);
}
